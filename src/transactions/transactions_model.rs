use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ValidationError;

/// Direction of money movement relative to the owner's account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Debit,
    Credit,
}

impl TransactionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionDirection::Debit => "debit",
            TransactionDirection::Credit => "credit",
        }
    }
}

impl FromStr for TransactionDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debit" => Ok(TransactionDirection::Debit),
            "credit" => Ok(TransactionDirection::Credit),
            other => Err(format!("Unknown transaction direction: {}", other)),
        }
    }
}

/// Domain model for a committed canonical transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub owner_id: String,
    pub source_import_id: String,
    pub transaction_date: NaiveDate,
    pub posted_date: Option<NaiveDate>,
    pub description_raw: String,
    pub merchant_normalized: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: TransactionDirection,
    pub category: String,
    pub category_confidence: f64,
    pub is_user_assigned: bool,
    pub dedupe_fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database model for transactions
#[derive(Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::transactions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TransactionDB {
    pub id: String,
    pub owner_id: String,
    pub source_import_id: String,
    pub transaction_date: NaiveDate,
    pub posted_date: Option<NaiveDate>,
    pub description_raw: String,
    pub merchant_normalized: String,
    pub amount: String,
    pub currency: String,
    pub direction: String,
    pub category: String,
    pub category_confidence: f64,
    pub is_user_assigned: bool,
    pub dedupe_fingerprint: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Input model for persisting a new transaction. The id is generated at
/// persistence time and never supplied by callers.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub owner_id: String,
    pub source_import_id: String,
    pub transaction_date: NaiveDate,
    pub posted_date: Option<NaiveDate>,
    pub description_raw: String,
    pub merchant_normalized: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: TransactionDirection,
    pub category: String,
    pub category_confidence: f64,
    pub is_user_assigned: bool,
    pub dedupe_fingerprint: String,
}

impl NewTransaction {
    pub fn into_db(self, id: String, now: NaiveDateTime) -> TransactionDB {
        TransactionDB {
            id,
            owner_id: self.owner_id,
            source_import_id: self.source_import_id,
            transaction_date: self.transaction_date,
            posted_date: self.posted_date,
            description_raw: self.description_raw,
            merchant_normalized: self.merchant_normalized,
            amount: self.amount.to_string(),
            currency: self.currency,
            direction: self.direction.as_str().to_string(),
            category: self.category,
            category_confidence: self.category_confidence,
            is_user_assigned: self.is_user_assigned,
            dedupe_fingerprint: self.dedupe_fingerprint,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input model for manual transaction entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewManualTransaction {
    pub transaction_date: NaiveDate,
    pub description_raw: String,
    pub merchant_normalized: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub direction: TransactionDirection,
    pub category: String,
}

impl NewManualTransaction {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.description_raw.trim().is_empty() {
            return Err(ValidationError::MissingField("description_raw".to_string()));
        }
        if self.amount.is_sign_negative() {
            return Err(ValidationError::InvalidInput(
                "Amount must be a non-negative magnitude".to_string(),
            ));
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::MissingField("category".to_string()));
        }
        Ok(())
    }
}

/// Filter for transaction listings and bulk passes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One category change produced by a re-classification pass
#[derive(Debug, Clone)]
pub struct CategoryReassignment {
    pub transaction_id: String,
    pub category: String,
    pub confidence: f64,
}

// Conversion implementations
impl From<TransactionDB> for Transaction {
    fn from(db: TransactionDB) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            source_import_id: db.source_import_id,
            transaction_date: db.transaction_date,
            posted_date: db.posted_date,
            description_raw: db.description_raw,
            merchant_normalized: db.merchant_normalized,
            amount: Decimal::from_str(&db.amount).unwrap_or_default(),
            currency: db.currency,
            direction: TransactionDirection::from_str(&db.direction)
                .unwrap_or(TransactionDirection::Debit),
            category: db.category,
            category_confidence: db.category_confidence,
            is_user_assigned: db.is_user_assigned,
            dedupe_fingerprint: db.dedupe_fingerprint,
            created_at: DateTime::from_naive_utc_and_offset(db.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(db.updated_at, Utc),
        }
    }
}
