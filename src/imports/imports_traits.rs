use async_trait::async_trait;

use super::imports_model::*;
use crate::errors::Result;

/// Trait defining the contract for statement import repository
/// operations.
#[async_trait]
pub trait ImportRepositoryTrait: Send + Sync {
    fn get_import(&self, owner_id: &str, import_id: &str) -> Result<Option<StatementImport>>;

    fn list_imports(&self, owner_id: &str) -> Result<Vec<StatementImport>>;

    fn get_statement_content(&self, import_id: &str) -> Result<Option<String>>;

    /// Registers a queued import together with its decoded file content,
    /// in one transaction.
    async fn create_import(
        &self,
        new_import: NewStatementImport,
        content: String,
    ) -> Result<StatementImport>;

    /// queued/processing -> processing. Resets counters and the error
    /// message for a fresh run.
    async fn mark_processing(&self, import_id: &str) -> Result<StatementImport>;

    async fn mark_completed(
        &self,
        import_id: &str,
        total_rows: i32,
        processed_rows: i32,
    ) -> Result<StatementImport>;

    /// Records the causal failure and finishes the import.
    async fn mark_failed(&self, import_id: &str, reason: &str) -> Result<StatementImport>;

    /// Persists one batch of accepted rows and queued reviews plus the
    /// progress counter, transactionally. Rows losing the
    /// (owner, fingerprint) unique-index race are converted to reviews
    /// inside the same transaction.
    async fn persist_batch(&self, batch: ImportBatch) -> Result<BatchOutcome>;

    /// The owner's synthetic bucket import for manual entries.
    async fn get_or_create_manual_import(&self, owner_id: &str) -> Result<StatementImport>;

    async fn increment_counters(
        &self,
        import_id: &str,
        total_delta: i32,
        processed_delta: i32,
    ) -> Result<()>;
}

/// Trait defining the contract for the import orchestrator.
#[async_trait]
pub trait ImportServiceTrait: Send + Sync {
    /// Accepts an uploaded file for an already-authorized owner and
    /// registers a queued import.
    async fn create_import(
        &self,
        owner_id: &str,
        filename: &str,
        content: &[u8],
        institution_hint: Option<String>,
    ) -> Result<StatementImport>;

    fn get_import(&self, owner_id: &str, import_id: &str) -> Result<StatementImport>;

    fn list_imports(&self, owner_id: &str) -> Result<Vec<StatementImport>>;

    /// Drives one queued import to a terminal state: parse, normalize,
    /// fingerprint, gate, classify survivors, persist in row batches.
    /// Returns the terminal import record; processing failures land in
    /// `status = failed` with the causal error message rather than an
    /// `Err`.
    async fn process_import(&self, owner_id: &str, import_id: &str) -> Result<StatementImport>;
}
