use log::debug;
use std::sync::Arc;

use crate::categories::categories_model::normalize_category_key;
use crate::categories::categories_traits::CategoryRepositoryTrait;
use crate::constants::MERCHANT_MAX_LEN;
use crate::dedupe::build_fingerprint;
use crate::errors::{Error, Result, ValidationError};
use crate::imports::imports_traits::ImportRepositoryTrait;
use crate::transactions::transactions_model::*;
use crate::transactions::transactions_traits::{
    TransactionRepositoryTrait, TransactionServiceTrait,
};
use async_trait::async_trait;

pub struct TransactionService {
    transaction_repo: Arc<dyn TransactionRepositoryTrait>,
    category_repo: Arc<dyn CategoryRepositoryTrait>,
    import_repo: Arc<dyn ImportRepositoryTrait>,
}

impl TransactionService {
    pub fn new(
        transaction_repo: Arc<dyn TransactionRepositoryTrait>,
        category_repo: Arc<dyn CategoryRepositoryTrait>,
        import_repo: Arc<dyn ImportRepositoryTrait>,
    ) -> Self {
        TransactionService {
            transaction_repo,
            category_repo,
            import_repo,
        }
    }

    fn resolve_existing_category(&self, owner_id: &str, name: &str) -> Result<String> {
        let key = normalize_category_key(name)?;
        self.category_repo
            .get_category_by_name(owner_id, &key)?
            .map(|category| category.name)
            .ok_or_else(|| {
                Error::Validation(ValidationError::InvalidInput(format!(
                    "Category '{}' does not exist",
                    key
                )))
            })
    }
}

#[async_trait]
impl TransactionServiceTrait for TransactionService {
    fn get_transactions(
        &self,
        owner_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        self.transaction_repo.get_transactions(owner_id, filter)
    }

    async fn create_manual_transaction(
        &self,
        owner_id: &str,
        input: NewManualTransaction,
    ) -> Result<Transaction> {
        input.validate().map_err(Error::Validation)?;
        let category = self.resolve_existing_category(owner_id, &input.category)?;

        let merchant = match input.merchant_normalized.as_deref().map(str::trim) {
            Some(merchant) if !merchant.is_empty() => merchant.to_string(),
            _ => input
                .description_raw
                .trim()
                .chars()
                .take(MERCHANT_MAX_LEN)
                .collect(),
        };
        let merchant = if merchant.is_empty() {
            "manual_entry".to_string()
        } else {
            merchant
        };

        let fingerprint = build_fingerprint(
            owner_id,
            input.transaction_date,
            &merchant,
            input.amount,
            input.direction,
        );

        if let Some(existing_id) = self
            .transaction_repo
            .find_by_fingerprint(owner_id, &fingerprint)?
        {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Duplicate transaction exists with same date, merchant, amount, and direction. Existing transaction id: {}",
                existing_id
            ))));
        }
        if let Some(existing_id) = self.transaction_repo.find_by_natural_key(
            owner_id,
            input.transaction_date,
            &merchant,
            input.amount,
            input.direction,
        )? {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Duplicate transaction exists with same date, merchant, amount, and direction. Existing transaction id: {}",
                existing_id
            ))));
        }

        let manual_import = self.import_repo.get_or_create_manual_import(owner_id).await?;
        debug!(
            "Creating manual transaction for owner {} under import {}",
            owner_id, manual_import.id
        );

        let transaction = self
            .transaction_repo
            .insert_transaction(NewTransaction {
                owner_id: owner_id.to_string(),
                source_import_id: manual_import.id.clone(),
                transaction_date: input.transaction_date,
                posted_date: None,
                description_raw: input.description_raw.trim().to_string(),
                merchant_normalized: merchant,
                amount: input.amount,
                currency: input.currency.to_uppercase(),
                direction: input.direction,
                category,
                category_confidence: 1.0,
                is_user_assigned: true,
                dedupe_fingerprint: fingerprint,
            })
            .await?;

        self.import_repo
            .increment_counters(&manual_import.id, 1, 1)
            .await?;

        Ok(transaction)
    }

    async fn set_category(
        &self,
        owner_id: &str,
        transaction_id: &str,
        category: &str,
    ) -> Result<Transaction> {
        let category = self.resolve_existing_category(owner_id, category)?;
        self.transaction_repo
            .set_category(owner_id, transaction_id, &category, 1.0, true)
            .await
    }
}
