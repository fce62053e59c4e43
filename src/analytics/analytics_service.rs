use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use num_traits::Zero;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use super::analytics_model::*;
use super::analytics_traits::{AnalyticsServiceTrait, InsightRepositoryTrait, SpendAdvisoryTrait};
use crate::constants::DISPLAY_DECIMAL_PRECISION;
use crate::errors::{Error, Result, ValidationError};
use crate::transactions::{Transaction, TransactionFilter, TransactionRepositoryTrait};

/// Deterministic advisory placeholder. Produces well-formed structured
/// output from the aggregates until a language-model generator replaces
/// it behind the same trait.
pub struct DeterministicSpendAdvisory;

impl SpendAdvisoryTrait for DeterministicSpendAdvisory {
    fn generate(&self, snapshot: &SpendSnapshot) -> InsightNarrative {
        let top_spend_drivers: Vec<CategoryTotal> = snapshot
            .category_totals
            .iter()
            .take(3)
            .cloned()
            .map(|mut total| {
                total.total = total.total.round_dp(DISPLAY_DECIMAL_PRECISION);
                total
            })
            .collect();
        let top_merchants: Vec<MerchantTotal> = snapshot
            .merchant_totals
            .iter()
            .take(5)
            .cloned()
            .map(|mut total| {
                total.total = total.total.round_dp(DISPLAY_DECIMAL_PRECISION);
                total
            })
            .collect();

        let potential_savings_actions: Vec<SavingsAction> = top_spend_drivers
            .iter()
            .map(|driver| SavingsAction {
                category: driver.category.clone(),
                current_spend: driver.total,
                suggested_reduction_pct: 10,
                suggested_monthly_savings: (driver.total * dec!(0.1))
                    .round_dp(DISPLAY_DECIMAL_PRECISION),
                reason: format!("{} is one of your top spending categories.", driver.category),
            })
            .collect();

        let category_names: Vec<&str> = top_spend_drivers
            .iter()
            .map(|driver| driver.category.as_str())
            .collect();
        let summary = format!(
            "Total debit spend in selected period is ${:.2}. Top categories: {}.",
            snapshot.total_spend.round_dp(DISPLAY_DECIMAL_PRECISION),
            if category_names.is_empty() {
                "none".to_string()
            } else {
                category_names.join(", ")
            }
        );

        InsightNarrative {
            summary,
            top_spend_drivers,
            top_merchants,
            potential_savings_actions,
            risk_flags: Vec::new(),
            confidence: 0.72,
        }
    }
}

pub struct AnalyticsService {
    transaction_repo: Arc<dyn TransactionRepositoryTrait>,
    insight_repo: Arc<dyn InsightRepositoryTrait>,
    advisory: Arc<dyn SpendAdvisoryTrait>,
}

impl AnalyticsService {
    pub fn new(
        transaction_repo: Arc<dyn TransactionRepositoryTrait>,
        insight_repo: Arc<dyn InsightRepositoryTrait>,
        advisory: Arc<dyn SpendAdvisoryTrait>,
    ) -> Self {
        AnalyticsService {
            transaction_repo,
            insight_repo,
            advisory,
        }
    }

    fn load_range(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Transaction>> {
        let filter = TransactionFilter {
            start_date,
            end_date,
            category: None,
            limit: None,
            offset: None,
        };
        self.transaction_repo.get_transactions(owner_id, &filter)
    }
}

#[async_trait]
impl AnalyticsServiceTrait for AnalyticsService {
    fn category_totals(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<CategoryTotal>> {
        let transactions = self.load_range(owner_id, start_date, end_date)?;
        Ok(category_totals_from(&transactions))
    }

    fn merchant_totals(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<MerchantTotal>> {
        let transactions = self.load_range(owner_id, start_date, end_date)?;
        Ok(merchant_totals_from(&transactions))
    }

    fn trend_series(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        interval: TrendInterval,
    ) -> Result<Vec<TrendPoint>> {
        let transactions = self.load_range(owner_id, start_date, end_date)?;
        Ok(trend_series_from(
            &transactions,
            start_date,
            end_date,
            interval,
        ))
    }

    fn build_snapshot(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<SpendSnapshot> {
        let transactions = self.load_range(owner_id, start_date, end_date)?;
        let category_totals = category_totals_from(&transactions);
        let merchant_totals = merchant_totals_from(&transactions);
        let total_spend: Decimal = category_totals.iter().map(|total| total.total).sum();

        debug!(
            "Snapshot for owner {}: {} transactions, total spend {}",
            owner_id,
            transactions.len(),
            total_spend
        );

        Ok(SpendSnapshot {
            start_date,
            end_date,
            total_spend,
            category_totals,
            merchant_totals,
            transaction_count: transactions.len(),
        })
    }

    async fn generate_insight(
        &self,
        owner_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<InsightReport> {
        let snapshot = self.build_snapshot(owner_id, start_date, end_date)?;
        if snapshot.transaction_count == 0 && snapshot.total_spend.is_zero() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "No transactions found for selected range".to_string(),
            )));
        }

        let narrative = self.advisory.generate(&snapshot);
        self.insight_repo
            .insert_insight(NewInsightReport {
                owner_id: owner_id.to_string(),
                start_date,
                end_date,
                summary: narrative.summary.clone(),
                narrative,
            })
            .await
    }

    fn get_insight(&self, owner_id: &str, insight_id: &str) -> Result<InsightReport> {
        self.insight_repo
            .get_insight(owner_id, insight_id)?
            .ok_or_else(|| {
                Error::Validation(ValidationError::InvalidInput(format!(
                    "Insight report not found: {}",
                    insight_id
                )))
            })
    }
}
