use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::SqliteConnection;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use super::imports_errors::ImportError;
use super::imports_model::*;
use super::imports_traits::ImportRepositoryTrait;
use crate::constants::ERROR_MESSAGE_MAX_LEN;
use crate::db::{get_connection, WriteHandle};
use crate::dedupe::{DuplicateReason, DuplicateScope};
use crate::errors::{Error, Result};
use crate::reviews::reviews_model::{DuplicateReviewDB, ReviewStatus};
use crate::schema::{duplicate_reviews, statement_imports, transactions, uploaded_statements};

pub struct ImportRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ImportRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        ImportRepository { pool, writer }
    }
}

fn load_import(conn: &mut SqliteConnection, import_id: &str) -> Result<StatementImportDB> {
    Ok(statement_imports::table
        .find(import_id)
        .first::<StatementImportDB>(conn)
        .optional()?
        .ok_or_else(|| ImportError::NotFound(import_id.to_string()))?)
}

fn guard_transition(current: &StatementImportDB, next: ImportStatus) -> Result<()> {
    let status = ImportStatus::from_str(&current.status).unwrap_or(ImportStatus::Queued);
    if !status.can_transition_to(next) {
        return Err(Error::Import(ImportError::InvalidTransition {
            from: current.status.clone(),
            to: next.as_str().to_string(),
        }));
    }
    Ok(())
}

#[async_trait]
impl ImportRepositoryTrait for ImportRepository {
    fn get_import(&self, owner_id: &str, import_id: &str) -> Result<Option<StatementImport>> {
        let mut conn = get_connection(&self.pool)?;
        let row = statement_imports::table
            .filter(statement_imports::id.eq(import_id))
            .filter(statement_imports::owner_id.eq(owner_id))
            .first::<StatementImportDB>(&mut conn)
            .optional()?;
        Ok(row.map(StatementImport::from))
    }

    fn list_imports(&self, owner_id: &str) -> Result<Vec<StatementImport>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = statement_imports::table
            .filter(statement_imports::owner_id.eq(owner_id))
            .order(statement_imports::created_at.desc())
            .load::<StatementImportDB>(&mut conn)?;
        Ok(rows.into_iter().map(StatementImport::from).collect())
    }

    fn get_statement_content(&self, import_id: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(uploaded_statements::table
            .filter(uploaded_statements::import_id.eq(import_id))
            .select(uploaded_statements::content_text)
            .first::<String>(&mut conn)
            .optional()?)
    }

    async fn create_import(
        &self,
        new_import: NewStatementImport,
        content: String,
    ) -> Result<StatementImport> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<StatementImport> {
                let now = Utc::now().naive_utc();
                let id = new_import
                    .id
                    .unwrap_or_else(|| Uuid::new_v4().to_string());

                let import_row = StatementImportDB {
                    id: id.clone(),
                    owner_id: new_import.owner_id,
                    filename: new_import.filename,
                    institution_hint: new_import.institution_hint,
                    status: ImportStatus::Queued.as_str().to_string(),
                    total_rows: 0,
                    processed_rows: 0,
                    error_message: None,
                    started_at: None,
                    finished_at: None,
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(statement_imports::table)
                    .values(&import_row)
                    .execute(conn)?;

                let content_row = UploadedStatementDB {
                    id: Uuid::new_v4().to_string(),
                    import_id: id.clone(),
                    original_filename: import_row.filename.clone(),
                    content_text: content,
                    created_at: now,
                };
                diesel::insert_into(uploaded_statements::table)
                    .values(&content_row)
                    .execute(conn)?;

                Ok(StatementImport::from(
                    statement_imports::table
                        .find(&id)
                        .first::<StatementImportDB>(conn)?,
                ))
            })
            .await
    }

    async fn mark_processing(&self, import_id: &str) -> Result<StatementImport> {
        let import_id = import_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<StatementImport> {
                let current = load_import(conn, &import_id)?;
                guard_transition(&current, ImportStatus::Processing)?;

                let now = Utc::now().naive_utc();
                diesel::update(statement_imports::table.find(&import_id))
                    .set((
                        statement_imports::status.eq(ImportStatus::Processing.as_str()),
                        statement_imports::total_rows.eq(0),
                        statement_imports::processed_rows.eq(0),
                        statement_imports::error_message.eq(None::<String>),
                        statement_imports::started_at.eq(Some(now)),
                        statement_imports::finished_at.eq(None::<chrono::NaiveDateTime>),
                        statement_imports::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                Ok(StatementImport::from(load_import(conn, &import_id)?))
            })
            .await
    }

    async fn mark_completed(
        &self,
        import_id: &str,
        total_rows: i32,
        processed_rows: i32,
    ) -> Result<StatementImport> {
        let import_id = import_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<StatementImport> {
                let current = load_import(conn, &import_id)?;
                guard_transition(&current, ImportStatus::Completed)?;

                let now = Utc::now().naive_utc();
                diesel::update(statement_imports::table.find(&import_id))
                    .set((
                        statement_imports::status.eq(ImportStatus::Completed.as_str()),
                        statement_imports::total_rows.eq(total_rows),
                        statement_imports::processed_rows.eq(processed_rows),
                        statement_imports::finished_at.eq(Some(now)),
                        statement_imports::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                Ok(StatementImport::from(load_import(conn, &import_id)?))
            })
            .await
    }

    async fn mark_failed(&self, import_id: &str, reason: &str) -> Result<StatementImport> {
        let import_id = import_id.to_string();
        let reason: String = reason.chars().take(ERROR_MESSAGE_MAX_LEN).collect();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<StatementImport> {
                let current = load_import(conn, &import_id)?;
                guard_transition(&current, ImportStatus::Failed)?;

                let now = Utc::now().naive_utc();
                diesel::update(statement_imports::table.find(&import_id))
                    .set((
                        statement_imports::status.eq(ImportStatus::Failed.as_str()),
                        statement_imports::error_message.eq(Some(reason)),
                        statement_imports::finished_at.eq(Some(now)),
                        statement_imports::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                Ok(StatementImport::from(load_import(conn, &import_id)?))
            })
            .await
    }

    async fn persist_batch(&self, batch: ImportBatch) -> Result<BatchOutcome> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<BatchOutcome> {
                let now = Utc::now().naive_utc();
                let mut outcome = BatchOutcome::default();

                for accepted in batch.accepted {
                    let transaction_id = Uuid::new_v4().to_string();
                    let fingerprint = accepted.transaction.dedupe_fingerprint.clone();
                    let db = accepted.transaction.clone().into_db(transaction_id, now);

                    match diesel::insert_into(transactions::table)
                        .values(&db)
                        .execute(conn)
                    {
                        Ok(_) => outcome.inserted += 1,
                        Err(DieselError::DatabaseError(
                            DatabaseErrorKind::UniqueViolation,
                            _,
                        )) => {
                            // Lost the insert race to a concurrent import:
                            // route to the review queue instead of failing.
                            let matched_transaction_id = transactions::table
                                .filter(transactions::owner_id.eq(&batch.owner_id))
                                .filter(transactions::dedupe_fingerprint.eq(&fingerprint))
                                .select(transactions::id)
                                .first::<String>(conn)
                                .optional()?;

                            let review = DuplicateReviewDB {
                                id: Uuid::new_v4().to_string(),
                                owner_id: batch.owner_id.clone(),
                                source_import_id: batch.import_id.clone(),
                                source_row_number: accepted.source_row_number,
                                duplicate_scope: DuplicateScope::ExistingData.as_str().to_string(),
                                duplicate_reason: DuplicateReason::FingerprintMatch
                                    .as_str()
                                    .to_string(),
                                matched_transaction_id,
                                transaction_date: accepted.transaction.transaction_date,
                                posted_date: accepted.transaction.posted_date,
                                description_raw: accepted.transaction.description_raw.clone(),
                                merchant_normalized: accepted
                                    .transaction
                                    .merchant_normalized
                                    .clone(),
                                amount: accepted.transaction.amount.to_string(),
                                currency: accepted.transaction.currency.clone(),
                                direction: accepted.transaction.direction.as_str().to_string(),
                                dedupe_fingerprint: fingerprint,
                                status: ReviewStatus::Pending.as_str().to_string(),
                                review_note: None,
                                created_at: now,
                                reviewed_at: None,
                            };
                            diesel::insert_into(duplicate_reviews::table)
                                .values(&review)
                                .execute(conn)?;
                            outcome.raced_duplicates += 1;
                        }
                        Err(other) => return Err(other.into()),
                    }
                }

                for review in batch.reviews {
                    let db = review.into_db(Uuid::new_v4().to_string(), now);
                    diesel::insert_into(duplicate_reviews::table)
                        .values(&db)
                        .execute(conn)?;
                    outcome.queued_reviews += 1;
                }

                diesel::update(statement_imports::table.find(&batch.import_id))
                    .set((
                        statement_imports::processed_rows.eq(batch.processed_rows),
                        statement_imports::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                Ok(outcome)
            })
            .await
    }

    async fn get_or_create_manual_import(&self, owner_id: &str) -> Result<StatementImport> {
        let owner_id = owner_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<StatementImport> {
                let existing = statement_imports::table
                    .filter(statement_imports::owner_id.eq(&owner_id))
                    .filter(statement_imports::status.eq(ImportStatus::Manual.as_str()))
                    .first::<StatementImportDB>(conn)
                    .optional()?;

                if let Some(row) = existing {
                    return Ok(StatementImport::from(row));
                }

                let now = Utc::now().naive_utc();
                let row = StatementImportDB {
                    id: Uuid::new_v4().to_string(),
                    owner_id: owner_id.clone(),
                    filename: "manual_entries".to_string(),
                    institution_hint: None,
                    status: ImportStatus::Manual.as_str().to_string(),
                    total_rows: 0,
                    processed_rows: 0,
                    error_message: None,
                    started_at: None,
                    finished_at: Some(now),
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(statement_imports::table)
                    .values(&row)
                    .execute(conn)?;

                Ok(StatementImport::from(row))
            })
            .await
    }

    async fn increment_counters(
        &self,
        import_id: &str,
        total_delta: i32,
        processed_delta: i32,
    ) -> Result<()> {
        let import_id = import_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let now = Utc::now().naive_utc();
                diesel::update(statement_imports::table.find(&import_id))
                    .set((
                        statement_imports::total_rows
                            .eq(statement_imports::total_rows + total_delta),
                        statement_imports::processed_rows
                            .eq(statement_imports::processed_rows + processed_delta),
                        statement_imports::updated_at.eq(now),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .await
    }
}
