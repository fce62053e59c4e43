use spendscope_core::imports::ImportServiceTrait;
use spendscope_core::reviews::{
    BulkResolveRequest, ReviewAction, ReviewFilter, ReviewRepositoryTrait, ReviewServiceTrait,
    ReviewStatus,
};
use spendscope_core::transactions::{TransactionFilter, TransactionServiceTrait};

mod common;
use common::{ingest, setup, OWNER};

const STATEMENT: &str = "Date,Description,Amount\n\
                         2024-03-01,GROCERY MART,-30.00\n\
                         2024-03-02,GAS STATION,-45.00\n";

/// Ingests the same file twice so every row of the second run is pending
/// review.
async fn setup_with_pending_reviews(ctx: &common::TestContext) {
    ingest(ctx, "first.csv", STATEMENT).await;
    let second = ingest(ctx, "second.csv", STATEMENT).await;
    assert_eq!(second.processed_rows, 2);
}

fn transaction_count(ctx: &common::TestContext) -> usize {
    ctx.transactions
        .get_transactions(OWNER, &TransactionFilter::default())
        .expect("Failed to list transactions")
        .len()
}

fn reviews_with_status(
    ctx: &common::TestContext,
    status: ReviewStatus,
) -> Vec<spendscope_core::reviews::DuplicateReview> {
    ctx.reviews
        .list_reviews(
            OWNER,
            &ReviewFilter {
                status: Some(status),
                ..Default::default()
            },
        )
        .expect("Failed to list reviews")
}

#[tokio::test]
async fn confirming_a_duplicate_never_creates_a_transaction() {
    let ctx = setup().await;
    setup_with_pending_reviews(&ctx).await;
    assert_eq!(transaction_count(&ctx), 2);

    let pending = reviews_with_status(&ctx, ReviewStatus::Pending);
    let outcome = ctx
        .reviews
        .resolve_review(
            OWNER,
            &pending[0].id,
            ReviewAction::ConfirmDuplicate,
            Some("same charge on both statements".to_string()),
        )
        .await
        .expect("Failed to resolve review");

    assert_eq!(outcome.status, ReviewStatus::ConfirmedDuplicate);
    assert_eq!(outcome.created_transaction_id, None);
    assert_eq!(transaction_count(&ctx), 2);

    // The row stays behind as a terminal audit record.
    let confirmed = reviews_with_status(&ctx, ReviewStatus::ConfirmedDuplicate);
    assert_eq!(confirmed.len(), 1);
    assert_eq!(
        confirmed[0].review_note.as_deref(),
        Some("same charge on both statements")
    );
    assert!(confirmed[0].reviewed_at.is_some());

    // Terminal reviews reject a second resolution.
    let err = ctx
        .reviews
        .resolve_review(OWNER, &pending[0].id, ReviewAction::NotDuplicate, None)
        .await
        .expect_err("resolved review must not resolve again");
    assert!(err.to_string().contains("not pending"));
}

#[tokio::test]
async fn ignoring_a_duplicate_promotes_exactly_one_transaction() {
    let ctx = setup().await;
    setup_with_pending_reviews(&ctx).await;
    assert_eq!(transaction_count(&ctx), 2);

    let pending = reviews_with_status(&ctx, ReviewStatus::Pending);
    let review = pending[0].clone();

    let outcome = ctx
        .reviews
        .resolve_review(OWNER, &review.id, ReviewAction::NotDuplicate, None)
        .await
        .expect("Failed to resolve review");

    assert_eq!(outcome.status, ReviewStatus::Ignored);
    let created_id = outcome
        .created_transaction_id
        .expect("promotion must create a transaction");
    assert_eq!(transaction_count(&ctx), 3);

    // The review row is gone once promoted.
    assert_eq!(reviews_with_status(&ctx, ReviewStatus::Pending).len(), 1);
    assert!(ctx
        .review_repo
        .get_review(OWNER, &review.id)
        .expect("Failed to load review")
        .is_none());

    // The promoted transaction carries a salted fingerprint so it cannot
    // collide with the committed row it duplicated.
    use spendscope_core::transactions::TransactionRepositoryTrait;
    let created = ctx
        .transaction_repo
        .get_transaction_by_id(OWNER, &created_id)
        .expect("Failed to load transaction")
        .expect("created transaction must exist");
    assert_ne!(created.dedupe_fingerprint, review.dedupe_fingerprint);
    assert_eq!(created.merchant_normalized, review.merchant_normalized);
    assert_eq!(created.amount, review.amount);
}

#[tokio::test]
async fn bulk_resolve_rejects_a_stale_expected_count() {
    let ctx = setup().await;
    setup_with_pending_reviews(&ctx).await;

    let pending = reviews_with_status(&ctx, ReviewStatus::Pending);
    assert_eq!(pending.len(), 2);

    let err = ctx
        .reviews
        .bulk_resolve(
            OWNER,
            BulkResolveRequest {
                review_ids: pending.iter().map(|r| r.id.clone()).collect(),
                action: ReviewAction::ConfirmDuplicate,
                expected_pending_count: 3,
            },
        )
        .await
        .expect_err("count mismatch must abort");
    assert!(err.to_string().contains("Expected 3 pending reviews"));

    // Nothing was mutated.
    assert_eq!(reviews_with_status(&ctx, ReviewStatus::Pending).len(), 2);
    assert_eq!(transaction_count(&ctx), 2);
}

#[tokio::test]
async fn bulk_resolve_applies_every_item_when_counts_match() {
    let ctx = setup().await;
    setup_with_pending_reviews(&ctx).await;

    let pending = reviews_with_status(&ctx, ReviewStatus::Pending);
    let summary = ctx
        .reviews
        .bulk_resolve(
            OWNER,
            BulkResolveRequest {
                review_ids: pending.iter().map(|r| r.id.clone()).collect(),
                action: ReviewAction::NotDuplicate,
                expected_pending_count: 2,
            },
        )
        .await
        .expect("Failed to bulk resolve");

    assert_eq!(summary.requested_count, 2);
    assert_eq!(summary.resolved_count, 2);
    assert_eq!(summary.created_transactions_count, 2);

    assert!(reviews_with_status(&ctx, ReviewStatus::Pending).is_empty());
    assert_eq!(transaction_count(&ctx), 4);

    // The source import's processed counter reflects the promotions.
    let second = ctx
        .imports
        .list_imports(OWNER)
        .expect("Failed to list imports")
        .into_iter()
        .find(|record| record.filename == "second.csv")
        .expect("second import missing");
    assert_eq!(second.processed_rows, 4);
}

#[tokio::test]
async fn duplicate_review_ids_are_deduplicated_before_the_count_check() {
    let ctx = setup().await;
    setup_with_pending_reviews(&ctx).await;

    let pending = reviews_with_status(&ctx, ReviewStatus::Pending);
    let mut ids: Vec<String> = pending.iter().map(|r| r.id.clone()).collect();
    ids.push(ids[0].clone());

    let summary = ctx
        .reviews
        .bulk_resolve(
            OWNER,
            BulkResolveRequest {
                review_ids: ids,
                action: ReviewAction::ConfirmDuplicate,
                expected_pending_count: 2,
            },
        )
        .await
        .expect("Failed to bulk resolve");

    assert_eq!(summary.requested_count, 2);
    assert_eq!(summary.resolved_count, 2);
    assert_eq!(summary.created_transactions_count, 0);
}
