use chrono::NaiveDate;
use rust_decimal_macros::dec;
use spendscope_core::analytics::{AnalyticsServiceTrait, TrendInterval};
use spendscope_core::transactions::{
    NewManualTransaction, TransactionDirection, TransactionServiceTrait,
};

mod common;
use common::{setup, OWNER};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

async fn add_spend(
    ctx: &common::TestContext,
    on: NaiveDate,
    merchant: &str,
    amount: rust_decimal::Decimal,
    category: &str,
) {
    ctx.transactions
        .create_manual_transaction(
            OWNER,
            NewManualTransaction {
                transaction_date: on,
                description_raw: format!("{} purchase", merchant),
                merchant_normalized: Some(merchant.to_string()),
                amount,
                currency: "USD".to_string(),
                direction: TransactionDirection::Debit,
                category: category.to_string(),
            },
        )
        .await
        .expect("Failed to create manual transaction");
}

#[tokio::test]
async fn category_totals_sum_and_order_deterministically() {
    let ctx = setup().await;
    add_spend(&ctx, date(2024, 3, 1), "store", dec!(30), "groceries_other").await;
    add_spend(&ctx, date(2024, 3, 2), "cafe", dec!(20), "eating_out").await;
    add_spend(&ctx, date(2024, 3, 3), "diner", dec!(10), "eating_out").await;

    let totals = ctx
        .analytics
        .category_totals(OWNER, None, None)
        .expect("Failed to compute totals");

    assert_eq!(totals.len(), 2);
    // Equal totals break ties on the category key.
    assert_eq!(totals[0].category, "eating_out");
    assert_eq!(totals[0].total, dec!(30));
    assert_eq!(totals[1].category, "groceries_other");
    assert_eq!(totals[1].total, dec!(30));

    let sum: rust_decimal::Decimal = totals.iter().map(|t| t.total).sum();
    assert_eq!(sum, dec!(60));
}

#[tokio::test]
async fn merchant_totals_and_date_filters() {
    let ctx = setup().await;
    add_spend(&ctx, date(2024, 2, 15), "cafe", dec!(5), "eating_out").await;
    add_spend(&ctx, date(2024, 3, 1), "cafe", dec!(7), "eating_out").await;
    add_spend(&ctx, date(2024, 3, 2), "bookstore", dec!(12), "entertainment").await;

    let totals = ctx
        .analytics
        .merchant_totals(OWNER, Some(date(2024, 3, 1)), None)
        .expect("Failed to compute totals");

    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0].merchant, "bookstore");
    assert_eq!(totals[0].total, dec!(12));
    assert_eq!(totals[1].merchant, "cafe");
    assert_eq!(totals[1].total, dec!(7));
}

#[tokio::test]
async fn empty_ranges_yield_empty_aggregates_not_errors() {
    let ctx = setup().await;

    assert!(ctx
        .analytics
        .category_totals(OWNER, None, None)
        .expect("Failed to compute totals")
        .is_empty());
    assert!(ctx
        .analytics
        .merchant_totals(OWNER, None, None)
        .expect("Failed to compute totals")
        .is_empty());
    assert!(ctx
        .analytics
        .trend_series(OWNER, None, None, TrendInterval::Monthly)
        .expect("Failed to compute trend")
        .is_empty());
}

#[tokio::test]
async fn trend_series_covers_consecutive_months() {
    let ctx = setup().await;
    add_spend(&ctx, date(2024, 1, 15), "cafe", dec!(10), "eating_out").await;
    add_spend(&ctx, date(2024, 3, 10), "cafe", dec!(20), "eating_out").await;

    let series = ctx
        .analytics
        .trend_series(OWNER, None, None, TrendInterval::Monthly)
        .expect("Failed to compute trend");

    assert_eq!(series.len(), 3);
    assert_eq!(series[0].period_start, date(2024, 1, 1));
    assert_eq!(series[0].total, dec!(10));
    assert_eq!(series[1].period_start, date(2024, 2, 1));
    assert_eq!(series[1].total, dec!(0));
    assert_eq!(series[2].period_start, date(2024, 3, 1));
    assert_eq!(series[2].total, dec!(20));
}

#[tokio::test]
async fn insight_generation_persists_a_structured_report() {
    let ctx = setup().await;
    add_spend(&ctx, date(2024, 3, 1), "store", dec!(120), "groceries_other").await;
    add_spend(&ctx, date(2024, 3, 2), "cafe", dec!(40), "eating_out").await;

    let report = ctx
        .analytics
        .generate_insight(OWNER, Some(date(2024, 3, 1)), Some(date(2024, 3, 31)))
        .await
        .expect("Failed to generate insight");

    assert!(report.summary.contains("Total debit spend"));
    assert_eq!(report.narrative.top_spend_drivers.len(), 2);
    assert_eq!(
        report.narrative.top_spend_drivers[0].category,
        "groceries_other"
    );
    assert_eq!(report.narrative.potential_savings_actions.len(), 2);
    assert_eq!(
        report.narrative.potential_savings_actions[0].suggested_monthly_savings,
        dec!(12.00)
    );
    assert!(report.narrative.risk_flags.is_empty());

    // Reading it back returns the same structured payload.
    let fetched = ctx
        .analytics
        .get_insight(OWNER, &report.id)
        .expect("Failed to fetch insight");
    assert_eq!(fetched.summary, report.summary);
    assert_eq!(fetched.narrative.confidence, report.narrative.confidence);
}

#[tokio::test]
async fn insight_generation_requires_transactions_in_range() {
    let ctx = setup().await;
    add_spend(&ctx, date(2024, 3, 1), "store", dec!(120), "groceries_other").await;

    let err = ctx
        .analytics
        .generate_insight(OWNER, Some(date(2025, 1, 1)), Some(date(2025, 1, 31)))
        .await
        .expect_err("empty range must not produce a report");
    assert!(err.to_string().contains("No transactions found"));
}
