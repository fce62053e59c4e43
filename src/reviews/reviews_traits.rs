use async_trait::async_trait;

use super::reviews_model::*;
use crate::errors::Result;

/// Trait defining the contract for duplicate review repository
/// operations.
#[async_trait]
pub trait ReviewRepositoryTrait: Send + Sync {
    fn list_reviews(&self, owner_id: &str, filter: &ReviewFilter) -> Result<Vec<DuplicateReview>>;

    fn get_review(&self, owner_id: &str, review_id: &str) -> Result<Option<DuplicateReview>>;

    fn get_reviews_by_ids(
        &self,
        owner_id: &str,
        review_ids: &[String],
    ) -> Result<Vec<DuplicateReview>>;

    /// Applies a set of prepared resolutions in one transaction:
    /// all-or-nothing. Promotions insert exactly one transaction each
    /// (salting an already-committed fingerprint), bump the source
    /// import's processed count, and delete the review row; confirmations
    /// mark the row terminal in place.
    async fn apply_resolutions(
        &self,
        resolutions: Vec<ReviewResolution>,
    ) -> Result<Vec<ResolveOutcome>>;
}

/// Trait defining the contract for duplicate review service operations.
#[async_trait]
pub trait ReviewServiceTrait: Send + Sync {
    fn list_reviews(&self, owner_id: &str, filter: &ReviewFilter) -> Result<Vec<DuplicateReview>>;

    async fn resolve_review(
        &self,
        owner_id: &str,
        review_id: &str,
        action: ReviewAction,
        note: Option<String>,
    ) -> Result<ResolveOutcome>;

    async fn bulk_resolve(
        &self,
        owner_id: &str,
        request: BulkResolveRequest,
    ) -> Result<BulkResolveSummary>;
}
