use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;

use super::imports_errors::ImportError;
use super::imports_model::*;
use super::imports_traits::{ImportRepositoryTrait, ImportServiceTrait};
use crate::classification::{ClassificationServiceTrait, RuleSet};
use crate::constants::IMPORT_BATCH_SIZE;
use crate::dedupe::{build_fingerprint, DedupeGate, GateDecision};
use crate::errors::{Error, Result};
use crate::ingest::{
    normalize_row, read_header, select_profile, IngestConfig, ParsedRow, RowParser,
};
use crate::reviews::NewDuplicateReview;
use crate::transactions::{NewTransaction, TransactionRepositoryTrait};

/// Drives one uploaded file through parse, normalize, fingerprint, gate,
/// classify and persist, tracking progress and status along the way.
pub struct ImportService {
    import_repo: Arc<dyn ImportRepositoryTrait>,
    transaction_repo: Arc<dyn TransactionRepositoryTrait>,
    classification: Arc<dyn ClassificationServiceTrait>,
    config: IngestConfig,
}

enum RowOutcome {
    Accepted(AcceptedRow),
    Queued(NewDuplicateReview),
    Skipped,
}

impl ImportService {
    pub fn new(
        import_repo: Arc<dyn ImportRepositoryTrait>,
        transaction_repo: Arc<dyn TransactionRepositoryTrait>,
        classification: Arc<dyn ClassificationServiceTrait>,
        config: IngestConfig,
    ) -> Self {
        ImportService {
            import_repo,
            transaction_repo,
            classification,
            config,
        }
    }

    fn evaluate_row(
        &self,
        owner_id: &str,
        import_id: &str,
        parsed: ParsedRow,
        rule_set: &RuleSet,
        gate: &mut DedupeGate,
    ) -> Result<RowOutcome> {
        let fields = match parsed.fields {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Import {}: skipping row {}: {}", import_id, parsed.row_number, e);
                return Ok(RowOutcome::Skipped);
            }
        };

        let draft = match normalize_row(&fields, &self.config) {
            Ok(draft) => draft,
            Err(e) => {
                warn!("Import {}: skipping row {}: {}", import_id, parsed.row_number, e);
                return Ok(RowOutcome::Skipped);
            }
        };

        let fingerprint = build_fingerprint(
            owner_id,
            draft.transaction_date,
            &draft.merchant_normalized,
            draft.amount,
            draft.direction,
        );

        match gate.check(owner_id, &draft, &fingerprint)? {
            GateDecision::Insert => {
                // Classification runs only for rows that survive the gate.
                let classification = self.classification.classify(owner_id, &draft, rule_set)?;
                Ok(RowOutcome::Accepted(AcceptedRow {
                    source_row_number: parsed.row_number as i32,
                    transaction: NewTransaction {
                        owner_id: owner_id.to_string(),
                        source_import_id: import_id.to_string(),
                        transaction_date: draft.transaction_date,
                        posted_date: draft.posted_date,
                        description_raw: draft.description_raw.clone(),
                        merchant_normalized: draft.merchant_normalized.clone(),
                        amount: draft.amount,
                        currency: draft.currency.clone(),
                        direction: draft.direction,
                        category: classification.category,
                        category_confidence: classification.confidence,
                        is_user_assigned: false,
                        dedupe_fingerprint: fingerprint,
                    },
                }))
            }
            GateDecision::Duplicate {
                scope,
                reason,
                matched_transaction_id,
            } => Ok(RowOutcome::Queued(NewDuplicateReview::from_draft(
                owner_id,
                import_id,
                parsed.row_number as i32,
                scope,
                reason,
                matched_transaction_id,
                &draft,
                &fingerprint,
            ))),
        }
    }

    async fn flush(
        &self,
        owner_id: &str,
        import_id: &str,
        accepted: &mut Vec<AcceptedRow>,
        reviews: &mut Vec<NewDuplicateReview>,
        processed_rows: i32,
    ) -> Result<BatchOutcome> {
        let batch = ImportBatch {
            import_id: import_id.to_string(),
            owner_id: owner_id.to_string(),
            accepted: std::mem::take(accepted),
            reviews: std::mem::take(reviews),
            processed_rows,
        };
        let outcome = self.import_repo.persist_batch(batch).await?;
        debug!(
            "Import {}: batch flushed at row {} (inserted={}, reviews={}, raced={})",
            import_id,
            processed_rows,
            outcome.inserted,
            outcome.queued_reviews,
            outcome.raced_duplicates
        );
        Ok(outcome)
    }

    /// The row loop. Any error escaping this function fails the whole
    /// import with that error as the recorded cause.
    async fn run_pipeline(&self, owner_id: &str, import_id: &str) -> Result<(i32, i32)> {
        let content = self
            .import_repo
            .get_statement_content(import_id)?
            .ok_or_else(|| ImportError::MissingContent(import_id.to_string()))?;

        let record = self
            .import_repo
            .get_import(owner_id, import_id)?
            .ok_or_else(|| ImportError::NotFound(import_id.to_string()))?;

        let header = read_header(&content)?;
        let profile = select_profile(
            &self.config.profiles,
            &header,
            record.institution_hint.as_deref(),
        )
        .ok_or_else(|| {
            ImportError::SchemaDetection(format!(
                "no institution profile matches columns [{}]",
                header.join(", ")
            ))
        })?;
        info!(
            "Import {}: using institution profile '{}'",
            import_id, profile.name
        );

        let parser = RowParser::new(profile);
        // First pass only counts rows, so progress polling has a stable
        // denominator before any row is examined.
        let total_rows = parser.rows(&content)?.count() as i32;

        let rule_set = self.classification.load_rule_set(owner_id)?;
        let mut gate = DedupeGate::new(self.transaction_repo.clone());

        let mut processed_rows: i32 = 0;
        let mut accepted: Vec<AcceptedRow> = Vec::new();
        let mut reviews: Vec<NewDuplicateReview> = Vec::new();

        for parsed in parser.rows(&content)? {
            processed_rows += 1;

            match self.evaluate_row(owner_id, import_id, parsed, &rule_set, &mut gate)? {
                RowOutcome::Accepted(row) => accepted.push(row),
                RowOutcome::Queued(review) => reviews.push(review),
                RowOutcome::Skipped => {}
            }

            if processed_rows as usize % IMPORT_BATCH_SIZE == 0 {
                self.flush(owner_id, import_id, &mut accepted, &mut reviews, processed_rows)
                    .await?;
            }
        }

        self.flush(owner_id, import_id, &mut accepted, &mut reviews, processed_rows)
            .await?;

        Ok((total_rows, processed_rows))
    }
}

#[async_trait]
impl ImportServiceTrait for ImportService {
    async fn create_import(
        &self,
        owner_id: &str,
        filename: &str,
        content: &[u8],
        institution_hint: Option<String>,
    ) -> Result<StatementImport> {
        let import_id = uuid::Uuid::new_v4().to_string();
        let filename = if filename.trim().is_empty() {
            format!("statement-{}.csv", import_id)
        } else {
            filename.to_string()
        };

        // Decode up front and store the text verbatim; a retry re-reads
        // exactly what was uploaded.
        let decoded = String::from_utf8_lossy(content);
        let decoded = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);

        let record = self
            .import_repo
            .create_import(
                NewStatementImport {
                    id: Some(import_id),
                    owner_id: owner_id.to_string(),
                    filename,
                    institution_hint,
                },
                decoded.to_string(),
            )
            .await?;

        info!(
            "Import {} created for owner {} ({})",
            record.id, owner_id, record.filename
        );
        Ok(record)
    }

    fn get_import(&self, owner_id: &str, import_id: &str) -> Result<StatementImport> {
        self.import_repo
            .get_import(owner_id, import_id)?
            .ok_or_else(|| Error::Import(ImportError::NotFound(import_id.to_string())))
    }

    fn list_imports(&self, owner_id: &str) -> Result<Vec<StatementImport>> {
        self.import_repo.list_imports(owner_id)
    }

    async fn process_import(&self, owner_id: &str, import_id: &str) -> Result<StatementImport> {
        let record = self.get_import(owner_id, import_id)?;
        if !record.status.can_transition_to(ImportStatus::Processing) {
            return Err(Error::Import(ImportError::InvalidTransition {
                from: record.status.as_str().to_string(),
                to: ImportStatus::Processing.as_str().to_string(),
            }));
        }

        self.import_repo.mark_processing(import_id).await?;

        match self.run_pipeline(owner_id, import_id).await {
            Ok((total_rows, processed_rows)) => {
                info!(
                    "Import {} completed: {} rows examined of {}",
                    import_id, processed_rows, total_rows
                );
                self.import_repo
                    .mark_completed(import_id, total_rows, processed_rows)
                    .await
            }
            Err(cause) => {
                // Record the causal error, not a downstream symptom.
                error!("Import {} failed: {}", import_id, cause);
                self.import_repo
                    .mark_failed(import_id, &cause.to_string())
                    .await
            }
        }
    }
}
