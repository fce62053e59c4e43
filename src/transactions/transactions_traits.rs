use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::transactions_model::*;
use crate::errors::Result;

/// Trait defining the contract for transaction repository operations.
#[async_trait]
pub trait TransactionRepositoryTrait: Send + Sync {
    fn get_transactions(
        &self,
        owner_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>>;

    fn get_transaction_by_id(
        &self,
        owner_id: &str,
        transaction_id: &str,
    ) -> Result<Option<Transaction>>;

    /// Returns the id of the committed transaction holding this
    /// fingerprint, if any.
    fn find_by_fingerprint(&self, owner_id: &str, fingerprint: &str) -> Result<Option<String>>;

    /// Returns the id of a committed transaction matching the natural key
    /// (date, casefolded merchant, 2-dp amount, direction), if any.
    fn find_by_natural_key(
        &self,
        owner_id: &str,
        transaction_date: NaiveDate,
        merchant: &str,
        amount: Decimal,
        direction: TransactionDirection,
    ) -> Result<Option<String>>;

    /// Committed transaction dates for a (merchant, amount) pair, oldest
    /// first. Evidence for the recurrence heuristic.
    fn get_merchant_amount_dates(
        &self,
        owner_id: &str,
        merchant: &str,
        amount: Decimal,
    ) -> Result<Vec<NaiveDate>>;

    async fn insert_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction>;

    async fn set_category(
        &self,
        owner_id: &str,
        transaction_id: &str,
        category: &str,
        confidence: f64,
        is_user_assigned: bool,
    ) -> Result<Transaction>;

    /// Applies a re-classification pass's changes in one transaction.
    async fn apply_reassignments(&self, reassignments: Vec<CategoryReassignment>) -> Result<usize>;
}

/// Trait defining the contract for transaction service operations.
#[async_trait]
pub trait TransactionServiceTrait: Send + Sync {
    fn get_transactions(
        &self,
        owner_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>>;

    async fn create_manual_transaction(
        &self,
        owner_id: &str,
        input: NewManualTransaction,
    ) -> Result<Transaction>;

    async fn set_category(
        &self,
        owner_id: &str,
        transaction_id: &str,
        category: &str,
    ) -> Result<Transaction>;
}
