use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use super::reviews_model::*;
use super::reviews_traits::{ReviewRepositoryTrait, ReviewServiceTrait};
use crate::classification::{ClassificationServiceTrait, RuleSet};
use crate::constants::BULK_REVIEW_MAX;
use crate::errors::{Error, Result, ReviewError};

pub struct ReviewService {
    review_repo: Arc<dyn ReviewRepositoryTrait>,
    classification: Arc<dyn ClassificationServiceTrait>,
}

impl ReviewService {
    pub fn new(
        review_repo: Arc<dyn ReviewRepositoryTrait>,
        classification: Arc<dyn ClassificationServiceTrait>,
    ) -> Self {
        ReviewService {
            review_repo,
            classification,
        }
    }

    /// Prepares one resolution. Promotions are classified here, before the
    /// persistence transaction, so the write path stays pure persistence.
    fn prepare(
        &self,
        owner_id: &str,
        review: DuplicateReview,
        action: ReviewAction,
        note: Option<String>,
        rule_set: &RuleSet,
    ) -> Result<ReviewResolution> {
        let classification = match action {
            ReviewAction::NotDuplicate => {
                Some(
                    self.classification
                        .classify(owner_id, &review.to_draft(), rule_set)?,
                )
            }
            ReviewAction::ConfirmDuplicate => None,
        };

        Ok(ReviewResolution {
            review,
            action,
            classification,
            note,
        })
    }
}

#[async_trait]
impl ReviewServiceTrait for ReviewService {
    fn list_reviews(&self, owner_id: &str, filter: &ReviewFilter) -> Result<Vec<DuplicateReview>> {
        self.review_repo.list_reviews(owner_id, filter)
    }

    async fn resolve_review(
        &self,
        owner_id: &str,
        review_id: &str,
        action: ReviewAction,
        note: Option<String>,
    ) -> Result<ResolveOutcome> {
        let review = self
            .review_repo
            .get_review(owner_id, review_id)?
            .ok_or_else(|| Error::Review(ReviewError::NotFound(review_id.to_string())))?;

        if review.status != ReviewStatus::Pending {
            return Err(Error::Review(ReviewError::NotPending(review_id.to_string())));
        }

        let rule_set = match action {
            ReviewAction::NotDuplicate => self.classification.load_rule_set(owner_id)?,
            ReviewAction::ConfirmDuplicate => RuleSet::default(),
        };
        let resolution = self.prepare(owner_id, review, action, note, &rule_set)?;

        let outcomes = self.review_repo.apply_resolutions(vec![resolution]).await?;
        outcomes
            .into_iter()
            .next()
            .ok_or_else(|| Error::Review(ReviewError::NotFound(review_id.to_string())))
    }

    async fn bulk_resolve(
        &self,
        owner_id: &str,
        request: BulkResolveRequest,
    ) -> Result<BulkResolveSummary> {
        // Deduplicate requested ids, preserving order.
        let mut review_ids: Vec<String> = Vec::with_capacity(request.review_ids.len());
        for id in request.review_ids {
            if !review_ids.contains(&id) {
                review_ids.push(id);
            }
        }
        let requested_count = review_ids.len();

        if requested_count > BULK_REVIEW_MAX {
            return Err(Error::Review(ReviewError::TooManyItems {
                requested: requested_count,
                limit: BULK_REVIEW_MAX,
            }));
        }

        let rows = self.review_repo.get_reviews_by_ids(owner_id, &review_ids)?;
        let pending: Vec<DuplicateReview> = rows
            .into_iter()
            .filter(|review| review.status == ReviewStatus::Pending)
            .collect();

        // Count-matching safeguard: if the live pending set is not what
        // the caller saw, abort with no effect at all.
        if pending.len() != request.expected_pending_count {
            return Err(Error::Review(ReviewError::CountMismatch {
                expected: request.expected_pending_count,
                actual: pending.len(),
            }));
        }

        let rule_set = match request.action {
            ReviewAction::NotDuplicate => self.classification.load_rule_set(owner_id)?,
            ReviewAction::ConfirmDuplicate => RuleSet::default(),
        };

        let mut resolutions = Vec::with_capacity(pending.len());
        for review in pending {
            resolutions.push(self.prepare(owner_id, review, request.action, None, &rule_set)?);
        }

        let outcomes = self.review_repo.apply_resolutions(resolutions).await?;
        let resolved_count = outcomes.len();
        let created_transactions_count = outcomes
            .iter()
            .filter(|outcome| outcome.created_transaction_id.is_some())
            .count();

        info!(
            "Bulk-resolved {} duplicate reviews for owner {} ({} transactions created)",
            resolved_count, owner_id, created_transactions_count
        );

        Ok(BulkResolveSummary {
            action: request.action,
            requested_count,
            resolved_count,
            created_transactions_count,
        })
    }
}
