use chrono::NaiveDateTime;
use diesel::prelude::*;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, ValidationError};

/// A named spending bucket: a unique key per owner plus display metadata.
#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    PartialEq,
    Serialize,
    Deserialize,
    Debug,
    Clone,
)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Input model for creating a category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    pub display_name: Option<String>,
}

lazy_static! {
    static ref NON_KEY_CHARS_RE: Regex = Regex::new(r"[^a-z0-9_]+").unwrap();
    static ref UNDERSCORE_RUN_RE: Regex = Regex::new(r"_+").unwrap();
}

/// Collapses a free-form category name into its stored key:
/// lowercase `[a-z0-9_]`, max 64 chars.
pub fn normalize_category_key(name: &str) -> Result<String> {
    let lowered = name.trim().to_lowercase();
    let replaced = NON_KEY_CHARS_RE.replace_all(&lowered, "_");
    let squeezed = UNDERSCORE_RUN_RE.replace_all(&replaced, "_");
    let trimmed = squeezed.trim_matches('_');

    if trimmed.is_empty() {
        return Err(Error::Validation(ValidationError::InvalidInput(
            "Category name must contain letters or numbers".to_string(),
        )));
    }
    Ok(trimmed.chars().take(64).collect())
}
