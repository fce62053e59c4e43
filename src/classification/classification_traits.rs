use async_trait::async_trait;
use std::path::Path;

use super::classification_model::*;
use crate::errors::Result;
use crate::ingest::TransactionDraft;

/// Trait defining the contract for classification rule repository
/// operations.
#[async_trait]
pub trait ClassificationRuleRepositoryTrait: Send + Sync {
    fn get_rules(
        &self,
        owner_id: &str,
        rule_type: Option<RuleType>,
        is_active: Option<bool>,
    ) -> Result<Vec<ClassificationRule>>;

    fn get_active_rules(&self, owner_id: &str) -> Result<Vec<ClassificationRule>>;

    fn get_rule_by_id(&self, owner_id: &str, rule_id: &str) -> Result<Option<ClassificationRule>>;

    async fn create_rule(
        &self,
        owner_id: &str,
        new_rule: NewClassificationRule,
    ) -> Result<ClassificationRule>;

    async fn update_rule(
        &self,
        owner_id: &str,
        rule_id: &str,
        changeset: ClassificationRuleChangeset,
    ) -> Result<ClassificationRule>;

    async fn delete_rule(&self, owner_id: &str, rule_id: &str) -> Result<usize>;

    /// Inserts rules preserving list order (creation order becomes the
    /// evaluation tiebreak). With `replace_existing`, the owner's current
    /// rules are removed first, in the same transaction.
    async fn insert_rules(
        &self,
        owner_id: &str,
        rules: Vec<NewClassificationRule>,
        replace_existing: bool,
    ) -> Result<usize>;
}

/// Trait defining the contract for the classification engine and rule
/// management.
#[async_trait]
pub trait ClassificationServiceTrait: Send + Sync {
    /// Snapshot of the owner's active rules in evaluation order.
    fn load_rule_set(&self, owner_id: &str) -> Result<RuleSet>;

    /// Layered classification: rules, then recurrence, then fallback.
    fn classify(
        &self,
        owner_id: &str,
        draft: &TransactionDraft,
        rule_set: &RuleSet,
    ) -> Result<Classification>;

    fn list_rules(
        &self,
        owner_id: &str,
        rule_type: Option<RuleType>,
        is_active: Option<bool>,
    ) -> Result<Vec<ClassificationRule>>;

    async fn create_rule(
        &self,
        owner_id: &str,
        new_rule: NewClassificationRule,
    ) -> Result<ClassificationRule>;

    async fn update_rule(
        &self,
        owner_id: &str,
        rule_id: &str,
        update: UpdateClassificationRule,
    ) -> Result<ClassificationRule>;

    async fn delete_rule(&self, owner_id: &str, rule_id: &str) -> Result<()>;

    /// Explicit bulk re-classification pass. User-assigned rows are
    /// excluded unless the request opts in.
    async fn recategorize(
        &self,
        owner_id: &str,
        request: RecategorizeRequest,
    ) -> Result<RecategorizeSummary>;

    /// Writes the owner's rules to the external config format. Lossless
    /// round-trip input for `load_rules`.
    async fn export_rules(&self, owner_id: &str, path: &Path) -> Result<usize>;

    async fn load_rules(
        &self,
        owner_id: &str,
        path: &Path,
        replace_existing: bool,
    ) -> Result<usize>;
}

/// Filter and counts for the bulk re-classification pass.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecategorizeRequest {
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    pub category: Option<String>,
    #[serde(default)]
    pub include_user_assigned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecategorizeSummary {
    pub scanned_rows: usize,
    pub updated_rows: usize,
    pub unchanged_rows: usize,
    pub skipped_user_assigned_rows: usize,
}
