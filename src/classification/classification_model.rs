use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::{Error, Result, ValidationError};

/// Match semantics supported by classification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    MerchantExact,
    MerchantContains,
    DescriptionContains,
    SourceCategoryContains,
    TextContains,
}

pub const ALLOWED_RULE_TYPES: &[&str] = &[
    "merchant_exact",
    "merchant_contains",
    "description_contains",
    "source_category_contains",
    "text_contains",
];

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::MerchantExact => "merchant_exact",
            RuleType::MerchantContains => "merchant_contains",
            RuleType::DescriptionContains => "description_contains",
            RuleType::SourceCategoryContains => "source_category_contains",
            RuleType::TextContains => "text_contains",
        }
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merchant_exact" => Ok(RuleType::MerchantExact),
            "merchant_contains" => Ok(RuleType::MerchantContains),
            "description_contains" => Ok(RuleType::DescriptionContains),
            "source_category_contains" => Ok(RuleType::SourceCategoryContains),
            "text_contains" => Ok(RuleType::TextContains),
            _ => Err(format!(
                "Unsupported rule_type. Allowed values: {}",
                ALLOWED_RULE_TYPES.join(", ")
            )),
        }
    }
}

/// Database model for classification rules
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
#[diesel(table_name = crate::schema::classification_rules)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRule {
    pub id: String,
    pub owner_id: String,
    pub rule_type: String,
    pub pattern: String,
    pub category: String,
    pub confidence: f64,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Normalized text views of one draft, computed once per row and shared
/// across all rule evaluations.
#[derive(Debug, Clone)]
pub struct ClassificationText {
    pub description: String,
    pub merchant: String,
    pub source_category: String,
    pub combined: String,
}

pub(crate) fn normalize_text(value: &str) -> String {
    value
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl ClassificationText {
    pub fn new(description: &str, merchant: &str, source_category: &str) -> Self {
        let description = normalize_text(description);
        let merchant = normalize_text(merchant);
        let source_category = normalize_text(source_category);
        let combined = format!("{} {}", description, merchant).trim().to_string();
        ClassificationText {
            description,
            merchant,
            source_category,
            combined,
        }
    }
}

impl ClassificationRule {
    /// Checks whether this rule matches the given normalized text.
    pub fn matches(&self, text: &ClassificationText) -> bool {
        let pattern = normalize_text(&self.pattern);
        if pattern.is_empty() {
            return false;
        }

        match RuleType::from_str(&self.rule_type) {
            Ok(RuleType::MerchantExact) => text.merchant == pattern,
            Ok(RuleType::MerchantContains) => text.merchant.contains(&pattern),
            Ok(RuleType::DescriptionContains) => text.description.contains(&pattern),
            Ok(RuleType::SourceCategoryContains) => text.source_category.contains(&pattern),
            Ok(RuleType::TextContains) => text.combined.contains(&pattern),
            Err(_) => false,
        }
    }
}

/// Input model for creating a classification rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClassificationRule {
    pub rule_type: String,
    pub pattern: String,
    pub category: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_confidence() -> f64 {
    0.8
}

fn default_priority() -> i32 {
    100
}

fn default_is_active() -> bool {
    true
}

impl NewClassificationRule {
    /// Rejects invalid rules at write time. Out-of-range values are never
    /// clamped.
    pub fn validate(&self) -> Result<()> {
        RuleType::from_str(&self.rule_type)
            .map_err(|e| Error::Validation(ValidationError::InvalidInput(e)))?;
        if self.pattern.trim().is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "pattern".to_string(),
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Rule confidence must be within [0, 1], got {}",
                self.confidence
            ))));
        }
        if self.priority < 0 {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Rule priority must be non-negative, got {}",
                self.priority
            ))));
        }
        Ok(())
    }
}

/// Input model for updating a classification rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassificationRule {
    pub rule_type: Option<String>,
    pub pattern: Option<String>,
    pub category: Option<String>,
    pub confidence: Option<f64>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
}

/// Changeset applied to the rules table; None fields stay untouched.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::classification_rules)]
pub struct ClassificationRuleChangeset {
    pub rule_type: Option<String>,
    pub pattern: Option<String>,
    pub category: Option<String>,
    pub confidence: Option<f64>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    pub updated_at: NaiveDateTime,
}

/// Why a classification came out the way it did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationRationale {
    Rule { rule_id: String },
    RecurringInterval,
    Fallback,
}

/// Outcome of classifying one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub category: String,
    pub confidence: f64,
    pub rationale: ClassificationRationale,
}

/// Owner-scoped, evaluation-ordered snapshot of active rules. Evaluation
/// is an explicit ordered iteration with early return: the total order is
/// (priority asc, created_at asc, id asc) and the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<ClassificationRule>) -> Self {
        rules.retain(|rule| rule.is_active);
        rules.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        RuleSet { rules }
    }

    pub fn first_match(&self, text: &ClassificationText) -> Option<&ClassificationRule> {
        self.rules.iter().find(|rule| rule.matches(text))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}
