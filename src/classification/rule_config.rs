use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::classification_model::ClassificationRule;
use crate::errors::{ConfigError, Error, Result};

/// External, version-controllable form of one classification rule. The
/// file format is an ordered JSON array of these entries; an export is a
/// lossless round-trip input to a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfigEntry {
    pub rule_type: String,
    pub pattern: String,
    pub category: String,
    pub confidence: f64,
    pub priority: i32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

impl RuleConfigEntry {
    fn normalized(self) -> RuleConfigEntry {
        RuleConfigEntry {
            rule_type: self.rule_type.trim().to_lowercase(),
            pattern: self.pattern.trim().to_lowercase(),
            category: self.category.trim().to_lowercase(),
            confidence: self.confidence,
            priority: self.priority,
            is_active: self.is_active,
        }
    }

    fn is_complete(&self) -> bool {
        !self.rule_type.is_empty() && !self.pattern.is_empty() && !self.category.is_empty()
    }
}

impl From<&ClassificationRule> for RuleConfigEntry {
    fn from(rule: &ClassificationRule) -> Self {
        RuleConfigEntry {
            rule_type: rule.rule_type.clone(),
            pattern: rule.pattern.clone(),
            category: rule.category.clone(),
            confidence: rule.confidence,
            priority: rule.priority,
            is_active: rule.is_active,
        }
    }
}

/// Reads the rules config file. A missing file is an empty rule list, not
/// an error; incomplete entries are skipped.
pub fn load_rules_file(path: &Path) -> Result<Vec<RuleConfigEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = fs::read_to_string(path)?;
    let entries: Vec<RuleConfigEntry> = serde_json::from_str(&raw).map_err(|e| {
        Error::Config(ConfigError::InvalidValue(format!(
            "rules config at {} must be a JSON array of rule entries: {}",
            path.display(),
            e
        )))
    })?;

    Ok(entries
        .into_iter()
        .map(RuleConfigEntry::normalized)
        .filter(RuleConfigEntry::is_complete)
        .collect())
}

/// Writes the rules config file, creating parent directories as needed.
pub fn save_rules_file(path: &Path, entries: &[RuleConfigEntry]) -> Result<()> {
    let normalized: Vec<RuleConfigEntry> = entries
        .iter()
        .cloned()
        .map(RuleConfigEntry::normalized)
        .filter(RuleConfigEntry::is_complete)
        .collect();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut payload = serde_json::to_string_pretty(&normalized)?;
    payload.push('\n');
    fs::write(path, payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(rule_type: &str, pattern: &str, category: &str, priority: i32) -> RuleConfigEntry {
        RuleConfigEntry {
            rule_type: rule_type.to_string(),
            pattern: pattern.to_string(),
            category: category.to_string(),
            confidence: 0.85,
            priority,
            is_active: true,
        }
    }

    #[test]
    fn export_then_load_round_trips_losslessly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");

        let entries = vec![
            entry("merchant_contains", "netflix", "subscriptions", 10),
            entry("description_contains", "uber", "transportation", 20),
            RuleConfigEntry {
                is_active: false,
                ..entry("text_contains", "whole foods", "groceries_other", 30)
            },
        ];

        save_rules_file(&path, &entries).unwrap();
        let loaded = load_rules_file(&path).unwrap();
        assert_eq!(loaded, entries);
    }

    #[test]
    fn missing_file_is_an_empty_rule_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nowhere.json");
        assert_eq!(load_rules_file(&path).unwrap(), Vec::new());
    }

    #[test]
    fn incomplete_entries_are_skipped_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r#"[
                {"rule_type": "merchant_contains", "pattern": "", "category": "x", "confidence": 0.5, "priority": 1},
                {"rule_type": "merchant_contains", "pattern": "netflix", "category": "subscriptions", "confidence": 0.9, "priority": 2}
            ]"#,
        )
        .unwrap();

        let loaded = load_rules_file(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].pattern, "netflix");
    }

    #[test]
    fn patterns_are_normalized_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r#"[{"rule_type": "Merchant_Contains", "pattern": "  NetFlix ", "category": "Subscriptions", "confidence": 0.9, "priority": 2}]"#,
        )
        .unwrap();

        let loaded = load_rules_file(&path).unwrap();
        assert_eq!(loaded[0].rule_type, "merchant_contains");
        assert_eq!(loaded[0].pattern, "netflix");
        assert_eq!(loaded[0].category, "subscriptions");
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        assert!(load_rules_file(&path).is_err());
    }
}
