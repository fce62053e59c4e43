use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::transactions::{Transaction, TransactionDirection};

/// Total debit spend for one category over a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
}

/// Total debit spend for one merchant over a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantTotal {
    pub merchant: String,
    pub total: Decimal,
}

/// Granularity of the trend series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendInterval {
    Daily,
    Weekly,
    Monthly,
}

/// One point of the trend series. Periods are consecutive: ranges with no
/// transactions appear as zero-valued points, never as gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period_start: NaiveDate,
    pub total: Decimal,
}

/// The aggregate bundle handed to the advisory generator and to reporting
/// views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendSnapshot {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_spend: Decimal,
    pub category_totals: Vec<CategoryTotal>,
    pub merchant_totals: Vec<MerchantTotal>,
    pub transaction_count: usize,
}

/// One suggested saving lever in the advisory output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsAction {
    pub category: String,
    pub current_spend: Decimal,
    pub suggested_reduction_pct: u32,
    pub suggested_monthly_savings: Decimal,
    pub reason: String,
}

/// Structured advisory output built from aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightNarrative {
    pub summary: String,
    pub top_spend_drivers: Vec<CategoryTotal>,
    pub top_merchants: Vec<MerchantTotal>,
    pub potential_savings_actions: Vec<SavingsAction>,
    pub risk_flags: Vec<String>,
    pub confidence: f64,
}

/// Domain model for a persisted advisory report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightReport {
    pub id: String,
    pub owner_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub summary: String,
    pub narrative: InsightNarrative,
    pub created_at: DateTime<Utc>,
}

/// Database model for insight reports
#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::insight_reports)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InsightReportDB {
    pub id: String,
    pub owner_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub summary: String,
    pub payload_json: String,
    pub created_at: NaiveDateTime,
}

/// Input model for persisting an advisory report
#[derive(Debug, Clone)]
pub struct NewInsightReport {
    pub owner_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub summary: String,
    pub narrative: InsightNarrative,
}

/// Sums debit amounts per category, sorted by amount descending with the
/// category key ascending as the tiebreak.
pub fn category_totals_from(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut by_category: BTreeMap<&str, Decimal> = BTreeMap::new();
    for transaction in transactions {
        if transaction.direction != TransactionDirection::Debit {
            continue;
        }
        *by_category.entry(&transaction.category).or_default() += transaction.amount;
    }

    let mut totals: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            category: category.to_string(),
            total,
        })
        .collect();
    totals.sort_by(|a, b| b.total.cmp(&a.total).then(a.category.cmp(&b.category)));
    totals
}

/// Sums debit amounts per merchant, same ordering contract as categories.
pub fn merchant_totals_from(transactions: &[Transaction]) -> Vec<MerchantTotal> {
    let mut by_merchant: BTreeMap<&str, Decimal> = BTreeMap::new();
    for transaction in transactions {
        if transaction.direction != TransactionDirection::Debit {
            continue;
        }
        *by_merchant.entry(&transaction.merchant_normalized).or_default() += transaction.amount;
    }

    let mut totals: Vec<MerchantTotal> = by_merchant
        .into_iter()
        .map(|(merchant, total)| MerchantTotal {
            merchant: merchant.to_string(),
            total,
        })
        .collect();
    totals.sort_by(|a, b| b.total.cmp(&a.total).then(a.merchant.cmp(&b.merchant)));
    totals
}

/// Start of the period containing `date`. Weeks start on Monday.
pub fn period_start(date: NaiveDate, interval: TrendInterval) -> NaiveDate {
    match interval {
        TrendInterval::Daily => date,
        TrendInterval::Weekly => {
            date - Duration::days(date.weekday().num_days_from_monday() as i64)
        }
        TrendInterval::Monthly => date.with_day(1).unwrap_or(date),
    }
}

fn next_period(start: NaiveDate, interval: TrendInterval) -> NaiveDate {
    match interval {
        TrendInterval::Daily => start + Duration::days(1),
        TrendInterval::Weekly => start + Duration::days(7),
        TrendInterval::Monthly => start.checked_add_months(Months::new(1)).unwrap_or(start),
    }
}

/// Debit totals per period across every consecutive period covering the
/// range. With no explicit range the committed dates bound it; an empty
/// input yields an empty series.
pub fn trend_series_from(
    transactions: &[Transaction],
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    interval: TrendInterval,
) -> Vec<TrendPoint> {
    let observed_min = transactions.iter().map(|t| t.transaction_date).min();
    let observed_max = transactions.iter().map(|t| t.transaction_date).max();

    let range_start = match start_date.or(observed_min) {
        Some(date) => date,
        None => return Vec::new(),
    };
    let range_end = match end_date.or(observed_max) {
        Some(date) => date,
        None => return Vec::new(),
    };
    if range_end < range_start {
        return Vec::new();
    }

    let mut totals: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for transaction in transactions {
        if transaction.direction != TransactionDirection::Debit {
            continue;
        }
        if transaction.transaction_date < range_start || transaction.transaction_date > range_end {
            continue;
        }
        let bucket = period_start(transaction.transaction_date, interval);
        *totals.entry(bucket).or_default() += transaction.amount;
    }

    let mut series = Vec::new();
    let mut period = period_start(range_start, interval);
    while period <= range_end {
        series.push(TrendPoint {
            period_start: period,
            total: totals.get(&period).copied().unwrap_or(Decimal::ZERO),
        });
        period = next_period(period, interval);
    }
    series
}
