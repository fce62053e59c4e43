use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::reviews::NewDuplicateReview;
use crate::transactions::NewTransaction;

/// Lifecycle states of a statement import. Transitions are monotonic:
/// terminal states are never left, and nothing moves backwards.
/// `manual` is the synthetic bucket owning manually entered transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Manual,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Queued => "queued",
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
            ImportStatus::Manual => "manual",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportStatus::Completed | ImportStatus::Failed)
    }

    /// Monotonic transition table. Re-entering `processing` is allowed so
    /// an import abandoned mid-run can be retried from scratch.
    pub fn can_transition_to(&self, next: ImportStatus) -> bool {
        matches!(
            (self, next),
            (ImportStatus::Queued, ImportStatus::Processing)
                | (ImportStatus::Processing, ImportStatus::Processing)
                | (ImportStatus::Processing, ImportStatus::Completed)
                | (ImportStatus::Queued, ImportStatus::Failed)
                | (ImportStatus::Processing, ImportStatus::Failed)
        )
    }
}

impl FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queued" => Ok(ImportStatus::Queued),
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "failed" => Ok(ImportStatus::Failed),
            "manual" => Ok(ImportStatus::Manual),
            other => Err(format!("Unknown import status: {}", other)),
        }
    }
}

/// Domain model for one ingestion run. This is also the status object
/// surrounding layers poll until the status is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementImport {
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    pub institution_hint: Option<String>,
    pub status: ImportStatus,
    /// Rows present in the source file.
    pub total_rows: i32,
    /// Rows examined so far: accepted, queued as duplicates and rejected
    /// rows all count. Monotonically non-decreasing within a run.
    pub processed_rows: i32,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database model for statement imports
#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::statement_imports)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StatementImportDB {
    pub id: String,
    pub owner_id: String,
    pub filename: String,
    pub institution_hint: Option<String>,
    pub status: String,
    pub total_rows: i32,
    pub processed_rows: i32,
    pub error_message: Option<String>,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Database model for uploaded statement content. The decoded text is
/// kept verbatim so a retry re-reads exactly what was uploaded.
#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::uploaded_statements)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UploadedStatementDB {
    pub id: String,
    pub import_id: String,
    pub original_filename: String,
    pub content_text: String,
    pub created_at: NaiveDateTime,
}

/// Input model for registering an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStatementImport {
    pub id: Option<String>,
    pub owner_id: String,
    pub filename: String,
    pub institution_hint: Option<String>,
}

/// One accepted row awaiting persistence, with its source position for
/// race-loser review records.
#[derive(Debug, Clone)]
pub struct AcceptedRow {
    pub source_row_number: i32,
    pub transaction: NewTransaction,
}

/// One flush unit of the orchestrator: everything decided for a slice of
/// rows, persisted in a single transaction.
#[derive(Debug)]
pub struct ImportBatch {
    pub import_id: String,
    pub owner_id: String,
    pub accepted: Vec<AcceptedRow>,
    pub reviews: Vec<NewDuplicateReview>,
    /// High-water mark of rows examined, stored for progress polling.
    pub processed_rows: i32,
}

/// Persistence outcome of one batch
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub queued_reviews: usize,
    /// Rows that lost the unique-index race to a concurrent import and
    /// were routed to the review queue instead.
    pub raced_duplicates: usize,
}

// Conversion implementations
impl From<StatementImportDB> for StatementImport {
    fn from(db: StatementImportDB) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            filename: db.filename,
            institution_hint: db.institution_hint,
            status: ImportStatus::from_str(&db.status).unwrap_or(ImportStatus::Queued),
            total_rows: db.total_rows,
            processed_rows: db.processed_rows,
            error_message: db.error_message,
            started_at: db
                .started_at
                .map(|at| DateTime::from_naive_utc_and_offset(at, Utc)),
            finished_at: db
                .finished_at
                .map(|at| DateTime::from_naive_utc_and_offset(at, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(db.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(db.updated_at, Utc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_never_left() {
        for terminal in [ImportStatus::Completed, ImportStatus::Failed] {
            for next in [
                ImportStatus::Queued,
                ImportStatus::Processing,
                ImportStatus::Completed,
                ImportStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn processing_can_be_retried_and_finished() {
        assert!(ImportStatus::Queued.can_transition_to(ImportStatus::Processing));
        assert!(ImportStatus::Processing.can_transition_to(ImportStatus::Processing));
        assert!(ImportStatus::Processing.can_transition_to(ImportStatus::Completed));
        assert!(ImportStatus::Processing.can_transition_to(ImportStatus::Failed));
        assert!(!ImportStatus::Queued.can_transition_to(ImportStatus::Completed));
        assert!(!ImportStatus::Completed.can_transition_to(ImportStatus::Processing));
    }
}
