use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::classification::Classification;
use crate::dedupe::{DuplicateReason, DuplicateScope};
use crate::ingest::TransactionDraft;
use crate::transactions::TransactionDirection;

/// Lifecycle of a duplicate review: pending until a human adjudicates,
/// then terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    ConfirmedDuplicate,
    Ignored,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::ConfirmedDuplicate => "confirmed_duplicate",
            ReviewStatus::Ignored => "ignored",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ReviewStatus::Pending),
            "confirmed_duplicate" => Ok(ReviewStatus::ConfirmedDuplicate),
            "ignored" => Ok(ReviewStatus::Ignored),
            other => Err(format!("Unknown duplicate review status: {}", other)),
        }
    }
}

/// Reviewer verdict on one pending review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    /// The row really is a duplicate: keep it out of the ledger.
    ConfirmDuplicate,
    /// False positive: promote the stored draft into a real transaction.
    NotDuplicate,
}

/// Domain model for a duplicate review entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReview {
    pub id: String,
    pub owner_id: String,
    pub source_import_id: String,
    pub source_row_number: i32,
    pub duplicate_scope: DuplicateScope,
    pub duplicate_reason: DuplicateReason,
    pub matched_transaction_id: Option<String>,
    pub transaction_date: NaiveDate,
    pub posted_date: Option<NaiveDate>,
    pub description_raw: String,
    pub merchant_normalized: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: TransactionDirection,
    pub dedupe_fingerprint: String,
    pub status: ReviewStatus,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl DuplicateReview {
    /// Rebuilds the normalized draft held by this review, for
    /// classification at promotion time.
    pub fn to_draft(&self) -> TransactionDraft {
        TransactionDraft {
            transaction_date: self.transaction_date,
            posted_date: self.posted_date,
            description_raw: self.description_raw.clone(),
            merchant_normalized: self.merchant_normalized.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            direction: self.direction,
            source_category: String::new(),
        }
    }
}

/// Database model for duplicate reviews
#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::duplicate_reviews)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DuplicateReviewDB {
    pub id: String,
    pub owner_id: String,
    pub source_import_id: String,
    pub source_row_number: i32,
    pub duplicate_scope: String,
    pub duplicate_reason: String,
    pub matched_transaction_id: Option<String>,
    pub transaction_date: NaiveDate,
    pub posted_date: Option<NaiveDate>,
    pub description_raw: String,
    pub merchant_normalized: String,
    pub amount: String,
    pub currency: String,
    pub direction: String,
    pub dedupe_fingerprint: String,
    pub status: String,
    pub review_note: Option<String>,
    pub created_at: NaiveDateTime,
    pub reviewed_at: Option<NaiveDateTime>,
}

/// Input model for queueing a review from the deduplication gate. The
/// draft is stored in full so a promotion can rebuild the transaction
/// without re-reading the source file.
#[derive(Debug, Clone)]
pub struct NewDuplicateReview {
    pub owner_id: String,
    pub source_import_id: String,
    pub source_row_number: i32,
    pub duplicate_scope: DuplicateScope,
    pub duplicate_reason: DuplicateReason,
    pub matched_transaction_id: Option<String>,
    pub transaction_date: NaiveDate,
    pub posted_date: Option<NaiveDate>,
    pub description_raw: String,
    pub merchant_normalized: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: TransactionDirection,
    pub dedupe_fingerprint: String,
}

impl NewDuplicateReview {
    pub fn from_draft(
        owner_id: &str,
        source_import_id: &str,
        source_row_number: i32,
        scope: DuplicateScope,
        reason: DuplicateReason,
        matched_transaction_id: Option<String>,
        draft: &TransactionDraft,
        fingerprint: &str,
    ) -> Self {
        NewDuplicateReview {
            owner_id: owner_id.to_string(),
            source_import_id: source_import_id.to_string(),
            source_row_number,
            duplicate_scope: scope,
            duplicate_reason: reason,
            matched_transaction_id,
            transaction_date: draft.transaction_date,
            posted_date: draft.posted_date,
            description_raw: draft.description_raw.clone(),
            merchant_normalized: draft.merchant_normalized.clone(),
            amount: draft.amount,
            currency: draft.currency.clone(),
            direction: draft.direction,
            dedupe_fingerprint: fingerprint.to_string(),
        }
    }

    pub fn into_db(self, id: String, now: NaiveDateTime) -> DuplicateReviewDB {
        DuplicateReviewDB {
            id,
            owner_id: self.owner_id,
            source_import_id: self.source_import_id,
            source_row_number: self.source_row_number,
            duplicate_scope: self.duplicate_scope.as_str().to_string(),
            duplicate_reason: self.duplicate_reason.as_str().to_string(),
            matched_transaction_id: self.matched_transaction_id,
            transaction_date: self.transaction_date,
            posted_date: self.posted_date,
            description_raw: self.description_raw,
            merchant_normalized: self.merchant_normalized,
            amount: self.amount.to_string(),
            currency: self.currency,
            direction: self.direction.as_str().to_string(),
            dedupe_fingerprint: self.dedupe_fingerprint,
            status: ReviewStatus::Pending.as_str().to_string(),
            review_note: None,
            created_at: now,
            reviewed_at: None,
        }
    }
}

/// Filter for listing reviews
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFilter {
    pub import_id: Option<String>,
    pub status: Option<ReviewStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One prepared resolution, classification already computed for
/// promotions so the repository transaction stays pure persistence.
#[derive(Debug, Clone)]
pub struct ReviewResolution {
    pub review: DuplicateReview,
    pub action: ReviewAction,
    pub classification: Option<Classification>,
    pub note: Option<String>,
}

/// Outcome of resolving one review
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOutcome {
    pub review_id: String,
    pub status: ReviewStatus,
    pub created_transaction_id: Option<String>,
}

/// Bulk resolution request with the count-matching safeguard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResolveRequest {
    pub review_ids: Vec<String>,
    pub action: ReviewAction,
    /// What the caller believes the live pending count to be. The call is
    /// rejected outright on mismatch.
    pub expected_pending_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResolveSummary {
    pub action: ReviewAction,
    pub requested_count: usize,
    pub resolved_count: usize,
    pub created_transactions_count: usize,
}

// Conversion implementations
impl From<DuplicateReviewDB> for DuplicateReview {
    fn from(db: DuplicateReviewDB) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            source_import_id: db.source_import_id,
            source_row_number: db.source_row_number,
            duplicate_scope: DuplicateScope::from_str(&db.duplicate_scope)
                .unwrap_or(DuplicateScope::ExistingData),
            duplicate_reason: DuplicateReason::from_str(&db.duplicate_reason)
                .unwrap_or(DuplicateReason::FingerprintMatch),
            matched_transaction_id: db.matched_transaction_id,
            transaction_date: db.transaction_date,
            posted_date: db.posted_date,
            description_raw: db.description_raw,
            merchant_normalized: db.merchant_normalized,
            amount: Decimal::from_str(&db.amount).unwrap_or_default(),
            currency: db.currency,
            direction: TransactionDirection::from_str(&db.direction)
                .unwrap_or(TransactionDirection::Debit),
            dedupe_fingerprint: db.dedupe_fingerprint,
            status: ReviewStatus::from_str(&db.status).unwrap_or(ReviewStatus::Pending),
            review_note: db.review_note,
            created_at: DateTime::from_naive_utc_and_offset(db.created_at, Utc),
            reviewed_at: db
                .reviewed_at
                .map(|at| DateTime::from_naive_utc_and_offset(at, Utc)),
        }
    }
}
