use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{ConfigError, Result};
use crate::ingest::ingest_model::CanonicalField;

/// Selects a source column either by header name (case-insensitive) or by
/// zero-based position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSelector {
    Index(usize),
    Name(String),
}

impl ColumnSelector {
    fn resolve(&self, header: &[String]) -> Option<usize> {
        match self {
            ColumnSelector::Index(idx) => {
                if *idx < header.len() {
                    Some(*idx)
                } else {
                    None
                }
            }
            ColumnSelector::Name(name) => {
                let wanted = name.trim().to_lowercase();
                header
                    .iter()
                    .position(|column| column.trim().to_lowercase() == wanted)
            }
        }
    }
}

/// One canonical-field mapping inside a profile. Candidate selectors are
/// tried in order; the first that resolves against the header wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub field: CanonicalField,
    pub columns: Vec<ColumnSelector>,
    #[serde(default)]
    pub required: bool,
}

impl FieldMapping {
    fn named(field: CanonicalField, names: &[&str], required: bool) -> Self {
        FieldMapping {
            field,
            columns: names
                .iter()
                .map(|n| ColumnSelector::Name((*n).to_string()))
                .collect(),
            required,
        }
    }
}

/// Data-only description of one institution's statement layout: a mapping
/// from canonical field to source column selectors. No code per
/// institution, only tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionProfile {
    pub name: String,
    pub mappings: Vec<FieldMapping>,
}

impl InstitutionProfile {
    /// True when every required mapping resolves against the header.
    pub fn matches_header(&self, header: &[String]) -> bool {
        self.mappings
            .iter()
            .filter(|mapping| mapping.required)
            .all(|mapping| self.resolve(mapping.field, header).is_some())
    }

    /// Resolves a canonical field to a column index for the given header.
    pub fn resolve(&self, field: CanonicalField, header: &[String]) -> Option<usize> {
        self.mappings
            .iter()
            .find(|mapping| mapping.field == field)
            .and_then(|mapping| {
                mapping
                    .columns
                    .iter()
                    .find_map(|selector| selector.resolve(header))
            })
    }
}

/// The built-in profile set. Split debit/credit layouts are listed before
/// the generic signed-amount layout so files carrying dedicated debit and
/// credit columns are not mistaken for signed-amount files.
pub fn builtin_profiles() -> Vec<InstitutionProfile> {
    vec![
        InstitutionProfile {
            name: "split_debit_credit".to_string(),
            mappings: vec![
                FieldMapping::named(
                    CanonicalField::Date,
                    &["date", "transaction date", "posting date"],
                    true,
                ),
                FieldMapping::named(
                    CanonicalField::PostedDate,
                    &["posted date", "post date"],
                    false,
                ),
                FieldMapping::named(
                    CanonicalField::Description,
                    &["description", "memo", "merchant", "name", "details"],
                    true,
                ),
                FieldMapping::named(CanonicalField::Debit, &["debit", "withdrawal"], true),
                FieldMapping::named(CanonicalField::Credit, &["credit", "deposit"], true),
                FieldMapping::named(CanonicalField::Amount, &["amount"], false),
                FieldMapping::named(
                    CanonicalField::SourceCategory,
                    &["category", "type", "transaction type"],
                    false,
                ),
            ],
        },
        InstitutionProfile {
            name: "generic_signed_amount".to_string(),
            mappings: vec![
                FieldMapping::named(
                    CanonicalField::Date,
                    &["date", "transaction date", "posted date", "posting date"],
                    true,
                ),
                FieldMapping::named(
                    CanonicalField::PostedDate,
                    &["posted date", "post date"],
                    false,
                ),
                FieldMapping::named(
                    CanonicalField::Description,
                    &["description", "memo", "merchant", "name", "details"],
                    true,
                ),
                FieldMapping::named(
                    CanonicalField::Amount,
                    &["amount", "transaction amount"],
                    true,
                ),
                FieldMapping::named(
                    CanonicalField::SourceCategory,
                    &["category", "type", "transaction type"],
                    false,
                ),
            ],
        },
    ]
}

/// Loads additional profiles from a JSON file. Loaded profiles are tried
/// before the built-in set.
pub fn load_profiles(path: &Path) -> Result<Vec<InstitutionProfile>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)?;
    let profiles: Vec<InstitutionProfile> = serde_json::from_str(&raw).map_err(|e| {
        crate::errors::Error::Config(ConfigError::InvalidValue(format!(
            "institution profiles at {}: {}",
            path.display(),
            e
        )))
    })?;
    Ok(profiles)
}

/// Picks the profile for a file: an explicit institution hint wins (and
/// must still match the header); otherwise the first profile whose
/// required columns all appear wins.
pub fn select_profile<'a>(
    profiles: &'a [InstitutionProfile],
    header: &[String],
    hint: Option<&str>,
) -> Option<&'a InstitutionProfile> {
    if let Some(hint) = hint {
        let wanted = hint.trim().to_lowercase();
        return profiles
            .iter()
            .find(|profile| profile.name.to_lowercase() == wanted)
            .filter(|profile| profile.matches_header(header));
    }

    profiles
        .iter()
        .find(|profile| profile.matches_header(header))
}
