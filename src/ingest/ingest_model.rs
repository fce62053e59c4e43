use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::constants::DEFAULT_CURRENCY;
use crate::ingest::ingest_profiles::{builtin_profiles, InstitutionProfile};
use crate::transactions::TransactionDirection;

/// Canonical fields a statement column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Date,
    PostedDate,
    Description,
    Amount,
    Debit,
    Credit,
    SourceCategory,
}

/// Raw values extracted from one source row, keyed by canonical field.
/// Values are trimmed; empty cells are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRowFields {
    pub date: Option<String>,
    pub posted_date: Option<String>,
    pub description: Option<String>,
    pub amount: Option<String>,
    pub debit: Option<String>,
    pub credit: Option<String>,
    pub source_category: Option<String>,
}

/// One row of the source file with its 1-based position. A malformed row
/// carries its error instead of aborting the surrounding file.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub row_number: usize,
    pub fields: std::result::Result<RawRowFields, RowParseError>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RowParseError {
    #[error("malformed row: {0}")]
    Malformed(String),
}

/// Row-level normalization failure naming the offending field.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RowValidationError {
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("field '{field}' is malformed: {value}")]
    MalformedField { field: &'static str, value: String },

    #[error("both debit and credit columns are populated")]
    ConflictingAmounts,
}

/// Normalized, institution-independent transaction shape. Not yet
/// classified and not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub transaction_date: NaiveDate,
    pub posted_date: Option<NaiveDate>,
    pub description_raw: String,
    pub merchant_normalized: String,
    pub amount: Decimal,
    pub currency: String,
    pub direction: TransactionDirection,
    pub source_category: String,
}

/// Runtime configuration for the ingestion pipeline: the closed set of
/// institution profiles plus normalizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    #[serde(default = "builtin_profiles")]
    pub profiles: Vec<InstitutionProfile>,
    #[serde(default = "default_home_currency")]
    pub home_currency: String,
    #[serde(default)]
    pub merchant_aliases: HashMap<String, String>,
}

fn default_home_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            profiles: builtin_profiles(),
            home_currency: default_home_currency(),
            merchant_aliases: HashMap::new(),
        }
    }
}
