use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use super::reviews_model::*;
use super::reviews_traits::ReviewRepositoryTrait;
use crate::classification::{Classification, ClassificationRationale};
use crate::constants::UNCATEGORIZED;
use crate::db::{get_connection, WriteHandle};
use crate::dedupe::salted_fingerprint;
use crate::errors::Result;
use crate::schema::{duplicate_reviews, statement_imports, transactions};
use crate::transactions::transactions_model::TransactionDB;

pub struct ReviewRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ReviewRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        ReviewRepository { pool, writer }
    }
}

/// Finds a fingerprint not yet committed for this owner, salting the
/// review's own fingerprint as many times as needed. Runs inside the
/// resolution transaction so the probe and the insert cannot be split by
/// another write.
fn available_fingerprint(
    conn: &mut SqliteConnection,
    owner_id: &str,
    base: &str,
    review_id: &str,
) -> Result<String> {
    let mut candidate = base.to_string();
    let mut attempt: u32 = 0;
    loop {
        let taken = transactions::table
            .filter(transactions::owner_id.eq(owner_id))
            .filter(transactions::dedupe_fingerprint.eq(&candidate))
            .select(transactions::id)
            .first::<String>(conn)
            .optional()?
            .is_some();
        if !taken {
            return Ok(candidate);
        }
        candidate = salted_fingerprint(base, review_id, attempt);
        attempt += 1;
    }
}

#[async_trait]
impl ReviewRepositoryTrait for ReviewRepository {
    fn list_reviews(&self, owner_id: &str, filter: &ReviewFilter) -> Result<Vec<DuplicateReview>> {
        let mut conn = get_connection(&self.pool)?;

        let mut query = duplicate_reviews::table
            .filter(duplicate_reviews::owner_id.eq(owner_id))
            .into_boxed();

        if let Some(ref import_id) = filter.import_id {
            query = query.filter(duplicate_reviews::source_import_id.eq(import_id.clone()));
        }
        if let Some(status) = filter.status {
            query = query.filter(duplicate_reviews::status.eq(status.as_str()));
        }

        query = query.order((
            duplicate_reviews::created_at.desc(),
            duplicate_reviews::source_row_number.asc(),
        ));

        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let rows = query.load::<DuplicateReviewDB>(&mut conn)?;
        Ok(rows.into_iter().map(DuplicateReview::from).collect())
    }

    fn get_review(&self, owner_id: &str, review_id: &str) -> Result<Option<DuplicateReview>> {
        let mut conn = get_connection(&self.pool)?;
        let row = duplicate_reviews::table
            .filter(duplicate_reviews::id.eq(review_id))
            .filter(duplicate_reviews::owner_id.eq(owner_id))
            .first::<DuplicateReviewDB>(&mut conn)
            .optional()?;
        Ok(row.map(DuplicateReview::from))
    }

    fn get_reviews_by_ids(
        &self,
        owner_id: &str,
        review_ids: &[String],
    ) -> Result<Vec<DuplicateReview>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = duplicate_reviews::table
            .filter(duplicate_reviews::owner_id.eq(owner_id))
            .filter(duplicate_reviews::id.eq_any(review_ids))
            .load::<DuplicateReviewDB>(&mut conn)?;
        Ok(rows.into_iter().map(DuplicateReview::from).collect())
    }

    async fn apply_resolutions(
        &self,
        resolutions: Vec<ReviewResolution>,
    ) -> Result<Vec<ResolveOutcome>> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Vec<ResolveOutcome>> {
                let now = Utc::now().naive_utc();
                let mut outcomes = Vec::with_capacity(resolutions.len());

                for resolution in resolutions {
                    let review = &resolution.review;
                    match resolution.action {
                        ReviewAction::ConfirmDuplicate => {
                            diesel::update(duplicate_reviews::table.find(&review.id))
                                .set((
                                    duplicate_reviews::status
                                        .eq(ReviewStatus::ConfirmedDuplicate.as_str()),
                                    duplicate_reviews::review_note.eq(resolution.note.clone()),
                                    duplicate_reviews::reviewed_at.eq(Some(now)),
                                ))
                                .execute(conn)?;

                            outcomes.push(ResolveOutcome {
                                review_id: review.id.clone(),
                                status: ReviewStatus::ConfirmedDuplicate,
                                created_transaction_id: None,
                            });
                        }
                        ReviewAction::NotDuplicate => {
                            let fingerprint = available_fingerprint(
                                conn,
                                &review.owner_id,
                                &review.dedupe_fingerprint,
                                &review.id,
                            )?;
                            let classification =
                                resolution.classification.clone().unwrap_or(Classification {
                                    category: UNCATEGORIZED.to_string(),
                                    confidence: 0.0,
                                    rationale: ClassificationRationale::Fallback,
                                });

                            let transaction_id = Uuid::new_v4().to_string();
                            let db = TransactionDB {
                                id: transaction_id.clone(),
                                owner_id: review.owner_id.clone(),
                                source_import_id: review.source_import_id.clone(),
                                transaction_date: review.transaction_date,
                                posted_date: review.posted_date,
                                description_raw: review.description_raw.clone(),
                                merchant_normalized: review.merchant_normalized.clone(),
                                amount: review.amount.to_string(),
                                currency: review.currency.clone(),
                                direction: review.direction.as_str().to_string(),
                                category: classification.category,
                                category_confidence: classification.confidence,
                                is_user_assigned: false,
                                dedupe_fingerprint: fingerprint,
                                created_at: now,
                                updated_at: now,
                            };
                            diesel::insert_into(transactions::table)
                                .values(&db)
                                .execute(conn)?;

                            diesel::update(
                                statement_imports::table.find(&review.source_import_id),
                            )
                            .set((
                                statement_imports::processed_rows
                                    .eq(statement_imports::processed_rows + 1),
                                statement_imports::updated_at.eq(now),
                            ))
                            .execute(conn)?;

                            diesel::delete(duplicate_reviews::table.find(&review.id))
                                .execute(conn)?;

                            outcomes.push(ResolveOutcome {
                                review_id: review.id.clone(),
                                status: ReviewStatus::Ignored,
                                created_transaction_id: Some(transaction_id),
                            });
                        }
                    }
                }

                Ok(outcomes)
            })
            .await
    }
}
