use rust_decimal_macros::dec;
use spendscope_core::classification::{ClassificationServiceTrait, NewClassificationRule};
use spendscope_core::dedupe::{DuplicateReason, DuplicateScope};
use spendscope_core::imports::{ImportServiceTrait, ImportStatus};
use spendscope_core::reviews::{ReviewFilter, ReviewServiceTrait, ReviewStatus};
use spendscope_core::transactions::{
    TransactionDirection, TransactionFilter, TransactionServiceTrait,
};

mod common;
use common::{ingest, setup, OWNER};

fn all_transactions(ctx: &common::TestContext) -> Vec<spendscope_core::transactions::Transaction> {
    ctx.transactions
        .get_transactions(OWNER, &TransactionFilter::default())
        .expect("Failed to list transactions")
}

fn pending_reviews(ctx: &common::TestContext) -> Vec<spendscope_core::reviews::DuplicateReview> {
    ctx.reviews
        .list_reviews(
            OWNER,
            &ReviewFilter {
                status: Some(ReviewStatus::Pending),
                ..Default::default()
            },
        )
        .expect("Failed to list reviews")
}

#[tokio::test]
async fn statement_rows_become_classified_transactions() {
    let ctx = setup().await;

    ctx.classification
        .create_rule(
            OWNER,
            NewClassificationRule {
                rule_type: "merchant_contains".to_string(),
                pattern: "blue bottle".to_string(),
                category: "eating_out".to_string(),
                confidence: 0.9,
                priority: 10,
                is_active: true,
            },
        )
        .await
        .expect("Failed to create rule");

    let record = ingest(
        &ctx,
        "march.csv",
        "Date,Description,Amount\n\
         2024-03-01,BLUE BOTTLE ROASTERS,-4.50\n\
         2024-03-02,CITY OF PORTLAND WATER,-63.20\n\
         2024-03-03,PAYROLL ACME CORP,2100.00\n",
    )
    .await;

    assert_eq!(record.status, ImportStatus::Completed);
    assert_eq!(record.total_rows, 3);
    assert_eq!(record.processed_rows, 3);
    assert_eq!(record.error_message, None);

    let transactions = all_transactions(&ctx);
    assert_eq!(transactions.len(), 3);

    let coffee = transactions
        .iter()
        .find(|t| t.description_raw.contains("BLUE BOTTLE"))
        .expect("coffee row missing");
    assert_eq!(coffee.category, "eating_out");
    assert_eq!(coffee.direction, TransactionDirection::Debit);
    assert_eq!(coffee.amount, dec!(4.50));
    assert!(!coffee.is_user_assigned);

    let payroll = transactions
        .iter()
        .find(|t| t.description_raw.contains("PAYROLL"))
        .expect("payroll row missing");
    assert_eq!(payroll.direction, TransactionDirection::Credit);
    assert_eq!(payroll.category, "uncategorized");
    assert_eq!(payroll.category_confidence, 0.0);
}

#[tokio::test]
async fn ingesting_the_same_file_twice_is_idempotent() {
    let ctx = setup().await;
    let content = "Date,Description,Amount\n\
                   2024-03-01,GROCERY MART,-30.00\n\
                   2024-03-02,GAS STATION,-45.00\n";

    let first = ingest(&ctx, "march.csv", content).await;
    assert_eq!(first.status, ImportStatus::Completed);
    assert_eq!(all_transactions(&ctx).len(), 2);
    assert!(pending_reviews(&ctx).is_empty());

    let second = ingest(&ctx, "march-again.csv", content).await;
    assert_eq!(second.status, ImportStatus::Completed);
    // Progress still counts every examined row.
    assert_eq!(second.processed_rows, 2);

    // No new transactions; both rows are queued for review instead.
    assert_eq!(all_transactions(&ctx).len(), 2);
    let reviews = pending_reviews(&ctx);
    assert_eq!(reviews.len(), 2);
    for review in &reviews {
        assert_eq!(review.duplicate_scope, DuplicateScope::ExistingData);
        assert_eq!(review.duplicate_reason, DuplicateReason::FingerprintMatch);
        assert_eq!(review.source_import_id, second.id);
        assert!(review.matched_transaction_id.is_some());
    }
}

#[tokio::test]
async fn one_bad_row_does_not_fail_the_import() {
    let ctx = setup().await;

    let mut content = String::from("Date,Description,Amount\n");
    for day in 1..=9 {
        content.push_str(&format!("2024-03-{:02},SHOP NUMBER {},-{}.00\n", day, day, day));
    }
    content.push_str("2024-03-10,BROKEN ROW,not-a-number\n");

    let record = ingest(&ctx, "march.csv", &content).await;
    assert_eq!(record.status, ImportStatus::Completed);
    assert_eq!(record.total_rows, 10);
    assert_eq!(record.processed_rows, 10);
    assert_eq!(all_transactions(&ctx).len(), 9);
}

#[tokio::test]
async fn repeats_within_one_file_are_queued_for_review() {
    let ctx = setup().await;
    let record = ingest(
        &ctx,
        "march.csv",
        "Date,Description,Amount\n\
         2024-03-01,COFFEE CART,-4.00\n\
         2024-03-01,COFFEE CART,-4.00\n",
    )
    .await;

    assert_eq!(record.status, ImportStatus::Completed);
    assert_eq!(record.processed_rows, 2);
    assert_eq!(all_transactions(&ctx).len(), 1);

    let reviews = pending_reviews(&ctx);
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].duplicate_scope, DuplicateScope::SameImport);
    assert_eq!(reviews[0].matched_transaction_id, None);
    assert_eq!(reviews[0].source_row_number, 2);
}

#[tokio::test]
async fn unrecognized_columns_fail_the_whole_import() {
    let ctx = setup().await;
    let record = ingest(&ctx, "weird.csv", "Foo,Bar\n1,2\n3,4\n").await;

    assert_eq!(record.status, ImportStatus::Failed);
    assert_eq!(record.processed_rows, 0);
    let message = record.error_message.expect("failure must record a cause");
    assert!(
        message.contains("Unrecognized statement layout"),
        "unexpected error message: {}",
        message
    );
}

#[tokio::test]
async fn split_debit_credit_columns_are_reconciled() {
    let ctx = setup().await;
    let record = ingest(
        &ctx,
        "bank.csv",
        "Date,Description,Debit,Credit\n\
         2024-03-01,GROCERY MART,30.00,\n\
         2024-03-02,REFUND GROCERY MART,,12.50\n\
         2024-03-03,BAD ROW,5.00,5.00\n",
    )
    .await;

    assert_eq!(record.status, ImportStatus::Completed);
    // The conflicting row is skipped but still counted as examined.
    assert_eq!(record.processed_rows, 3);

    let transactions = all_transactions(&ctx);
    assert_eq!(transactions.len(), 2);

    let debit = transactions
        .iter()
        .find(|t| t.amount == dec!(30.00))
        .expect("debit row missing");
    assert_eq!(debit.direction, TransactionDirection::Debit);

    let credit = transactions
        .iter()
        .find(|t| t.amount == dec!(12.50))
        .expect("credit row missing");
    assert_eq!(credit.direction, TransactionDirection::Credit);
}

#[tokio::test]
async fn terminal_imports_cannot_be_reprocessed() {
    let ctx = setup().await;
    let record = ingest(
        &ctx,
        "march.csv",
        "Date,Description,Amount\n2024-03-01,SHOP,-1.00\n",
    )
    .await;
    assert_eq!(record.status, ImportStatus::Completed);

    let err = ctx
        .imports
        .process_import(OWNER, &record.id)
        .await
        .expect_err("terminal import must not re-enter processing");
    assert!(err.to_string().contains("Invalid import status transition"));
}
