use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use super::classification_model::*;
use super::classification_traits::{
    ClassificationRuleRepositoryTrait, ClassificationServiceTrait, RecategorizeRequest,
    RecategorizeSummary,
};
use super::rule_config::{load_rules_file, save_rules_file, RuleConfigEntry};
use crate::categories::categories_model::normalize_category_key;
use crate::categories::categories_traits::CategoryRepositoryTrait;
use crate::categories::NewCategory;
use crate::constants::{
    RECURRENCE_GAP_TOLERANCE_DAYS, RECURRENCE_MAX_GAP_DAYS, RECURRENCE_MIN_GAP_DAYS,
    RECURRENCE_MIN_PRIOR, RECURRING_CATEGORY, RECURRING_CONFIDENCE, UNCATEGORIZED,
};
use crate::errors::{Error, Result, ValidationError};
use crate::ingest::TransactionDraft;
use crate::transactions::transactions_model::{CategoryReassignment, TransactionFilter};
use crate::transactions::TransactionRepositoryTrait;

/// True when the committed dates plus the candidate form a roughly
/// periodic series: enough occurrences, and every gap close to the median
/// gap, with the median between weekly and yearly.
pub fn is_roughly_periodic(prior_dates: &[NaiveDate], candidate: NaiveDate) -> bool {
    if prior_dates.len() < RECURRENCE_MIN_PRIOR {
        return false;
    }

    let mut dates: Vec<NaiveDate> = prior_dates.to_vec();
    dates.push(candidate);
    dates.sort();
    dates.dedup();
    if dates.len() < RECURRENCE_MIN_PRIOR + 1 {
        return false;
    }

    let gaps: Vec<i64> = dates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days())
        .collect();

    let mut sorted_gaps = gaps.clone();
    sorted_gaps.sort_unstable();
    let median_gap = sorted_gaps[sorted_gaps.len() / 2];

    if !(RECURRENCE_MIN_GAP_DAYS..=RECURRENCE_MAX_GAP_DAYS).contains(&median_gap) {
        return false;
    }

    gaps.iter()
        .all(|gap| (gap - median_gap).abs() <= RECURRENCE_GAP_TOLERANCE_DAYS)
}

/// The layered engine as a pure function of its inputs: rule set first,
/// recurrence evidence second, fallback last.
pub fn classify_draft(
    draft: &TransactionDraft,
    rule_set: &RuleSet,
    prior_dates: &[NaiveDate],
) -> Classification {
    let text = ClassificationText::new(
        &draft.description_raw,
        &draft.merchant_normalized,
        &draft.source_category,
    );

    if let Some(rule) = rule_set.first_match(&text) {
        return Classification {
            category: rule.category.clone(),
            confidence: rule.confidence,
            rationale: ClassificationRationale::Rule {
                rule_id: rule.id.clone(),
            },
        };
    }

    if is_roughly_periodic(prior_dates, draft.transaction_date) {
        return Classification {
            category: RECURRING_CATEGORY.to_string(),
            confidence: RECURRING_CONFIDENCE,
            rationale: ClassificationRationale::RecurringInterval,
        };
    }

    Classification {
        category: UNCATEGORIZED.to_string(),
        confidence: 0.0,
        rationale: ClassificationRationale::Fallback,
    }
}

pub struct ClassificationService {
    rule_repo: Arc<dyn ClassificationRuleRepositoryTrait>,
    transaction_repo: Arc<dyn TransactionRepositoryTrait>,
    category_repo: Arc<dyn CategoryRepositoryTrait>,
}

impl ClassificationService {
    pub fn new(
        rule_repo: Arc<dyn ClassificationRuleRepositoryTrait>,
        transaction_repo: Arc<dyn TransactionRepositoryTrait>,
        category_repo: Arc<dyn CategoryRepositoryTrait>,
    ) -> Self {
        ClassificationService {
            rule_repo,
            transaction_repo,
            category_repo,
        }
    }

    /// Resolves a rule's target category, creating it on demand.
    async fn resolve_rule_category(&self, owner_id: &str, name: &str) -> Result<String> {
        let key = normalize_category_key(name)?;
        if self
            .category_repo
            .get_category_by_name(owner_id, &key)?
            .is_some()
        {
            return Ok(key);
        }
        self.category_repo
            .create_category(
                owner_id,
                NewCategory {
                    name: key.clone(),
                    display_name: None,
                },
            )
            .await?;
        Ok(key)
    }

    fn normalized_new_rule(new_rule: &NewClassificationRule, category: String) -> NewClassificationRule {
        NewClassificationRule {
            rule_type: new_rule.rule_type.trim().to_lowercase(),
            pattern: new_rule.pattern.trim().to_lowercase(),
            category,
            confidence: new_rule.confidence,
            priority: new_rule.priority,
            is_active: new_rule.is_active,
        }
    }
}

#[async_trait]
impl ClassificationServiceTrait for ClassificationService {
    fn load_rule_set(&self, owner_id: &str) -> Result<RuleSet> {
        let rules = self.rule_repo.get_active_rules(owner_id)?;
        Ok(RuleSet::new(rules))
    }

    fn classify(
        &self,
        owner_id: &str,
        draft: &TransactionDraft,
        rule_set: &RuleSet,
    ) -> Result<Classification> {
        let text = ClassificationText::new(
            &draft.description_raw,
            &draft.merchant_normalized,
            &draft.source_category,
        );

        if let Some(rule) = rule_set.first_match(&text) {
            return Ok(Classification {
                category: rule.category.clone(),
                confidence: rule.confidence,
                rationale: ClassificationRationale::Rule {
                    rule_id: rule.id.clone(),
                },
            });
        }

        // Recurrence evidence is only fetched once no rule matched.
        let prior_dates = self.transaction_repo.get_merchant_amount_dates(
            owner_id,
            &draft.merchant_normalized,
            draft.amount,
        )?;
        if is_roughly_periodic(&prior_dates, draft.transaction_date) {
            return Ok(Classification {
                category: RECURRING_CATEGORY.to_string(),
                confidence: RECURRING_CONFIDENCE,
                rationale: ClassificationRationale::RecurringInterval,
            });
        }

        Ok(Classification {
            category: UNCATEGORIZED.to_string(),
            confidence: 0.0,
            rationale: ClassificationRationale::Fallback,
        })
    }

    fn list_rules(
        &self,
        owner_id: &str,
        rule_type: Option<RuleType>,
        is_active: Option<bool>,
    ) -> Result<Vec<ClassificationRule>> {
        self.rule_repo.get_rules(owner_id, rule_type, is_active)
    }

    async fn create_rule(
        &self,
        owner_id: &str,
        new_rule: NewClassificationRule,
    ) -> Result<ClassificationRule> {
        new_rule.validate()?;
        let category = self.resolve_rule_category(owner_id, &new_rule.category).await?;
        self.rule_repo
            .create_rule(owner_id, Self::normalized_new_rule(&new_rule, category))
            .await
    }

    async fn update_rule(
        &self,
        owner_id: &str,
        rule_id: &str,
        update: UpdateClassificationRule,
    ) -> Result<ClassificationRule> {
        let existing = self
            .rule_repo
            .get_rule_by_id(owner_id, rule_id)?
            .ok_or_else(|| {
                Error::Validation(ValidationError::InvalidInput(format!(
                    "Classification rule not found: {}",
                    rule_id
                )))
            })?;

        // Validate the merged result so a partial update cannot smuggle in
        // an invalid value.
        let merged = NewClassificationRule {
            rule_type: update
                .rule_type
                .clone()
                .unwrap_or_else(|| existing.rule_type.clone()),
            pattern: update
                .pattern
                .clone()
                .unwrap_or_else(|| existing.pattern.clone()),
            category: update
                .category
                .clone()
                .unwrap_or_else(|| existing.category.clone()),
            confidence: update.confidence.unwrap_or(existing.confidence),
            priority: update.priority.unwrap_or(existing.priority),
            is_active: update.is_active.unwrap_or(existing.is_active),
        };
        merged.validate()?;

        let category = match update.category {
            Some(ref name) => Some(self.resolve_rule_category(owner_id, name).await?),
            None => None,
        };

        let changeset = ClassificationRuleChangeset {
            rule_type: update.rule_type.map(|v| v.trim().to_lowercase()),
            pattern: update.pattern.map(|v| v.trim().to_lowercase()),
            category,
            confidence: update.confidence,
            priority: update.priority,
            is_active: update.is_active,
            updated_at: chrono::Utc::now().naive_utc(),
        };

        self.rule_repo.update_rule(owner_id, rule_id, changeset).await
    }

    async fn delete_rule(&self, owner_id: &str, rule_id: &str) -> Result<()> {
        let deleted = self.rule_repo.delete_rule(owner_id, rule_id).await?;
        if deleted == 0 {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Classification rule not found: {}",
                rule_id
            ))));
        }
        Ok(())
    }

    async fn recategorize(
        &self,
        owner_id: &str,
        request: RecategorizeRequest,
    ) -> Result<RecategorizeSummary> {
        let rule_set = self.load_rule_set(owner_id)?;
        if rule_set.is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "No active classification rules found".to_string(),
            )));
        }

        let filter = TransactionFilter {
            start_date: request.start_date,
            end_date: request.end_date,
            category: request.category.clone(),
            limit: None,
            offset: None,
        };
        let rows = self.transaction_repo.get_transactions(owner_id, &filter)?;

        let scanned_rows = rows.len();
        let mut unchanged_rows = 0;
        let mut skipped_user_assigned_rows = 0;
        let mut reassignments = Vec::new();

        for row in rows {
            if row.is_user_assigned && !request.include_user_assigned {
                skipped_user_assigned_rows += 1;
                continue;
            }

            let draft = TransactionDraft {
                transaction_date: row.transaction_date,
                posted_date: row.posted_date,
                description_raw: row.description_raw.clone(),
                merchant_normalized: row.merchant_normalized.clone(),
                amount: row.amount,
                currency: row.currency.clone(),
                direction: row.direction,
                source_category: String::new(),
            };
            let classification = self.classify(owner_id, &draft, &rule_set)?;

            // A fallback result never downgrades a row that already holds
            // a category.
            if classification.rationale == ClassificationRationale::Fallback
                && row.category != UNCATEGORIZED
            {
                unchanged_rows += 1;
                continue;
            }

            if row.category == classification.category
                && (row.category_confidence - classification.confidence).abs() < 1e-9
            {
                unchanged_rows += 1;
                continue;
            }

            reassignments.push(CategoryReassignment {
                transaction_id: row.id,
                category: classification.category,
                confidence: classification.confidence,
            });
        }

        let updated_rows = if reassignments.is_empty() {
            0
        } else {
            self.transaction_repo
                .apply_reassignments(reassignments)
                .await?
        };

        info!(
            "Recategorized owner {}: scanned={} updated={} unchanged={} skipped_user_assigned={}",
            owner_id, scanned_rows, updated_rows, unchanged_rows, skipped_user_assigned_rows
        );

        Ok(RecategorizeSummary {
            scanned_rows,
            updated_rows,
            unchanged_rows,
            skipped_user_assigned_rows,
        })
    }

    async fn export_rules(&self, owner_id: &str, path: &Path) -> Result<usize> {
        let rules = self.rule_repo.get_rules(owner_id, None, None)?;
        let entries: Vec<RuleConfigEntry> = rules.iter().map(RuleConfigEntry::from).collect();
        save_rules_file(path, &entries)?;
        info!("Exported {} rules to {}", entries.len(), path.display());
        Ok(entries.len())
    }

    async fn load_rules(
        &self,
        owner_id: &str,
        path: &Path,
        replace_existing: bool,
    ) -> Result<usize> {
        let entries = load_rules_file(path)?;
        if entries.is_empty() {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "No valid rules found in config file at {}",
                path.display()
            ))));
        }

        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            let new_rule = NewClassificationRule {
                rule_type: entry.rule_type,
                pattern: entry.pattern,
                category: entry.category,
                confidence: entry.confidence,
                priority: entry.priority,
                is_active: entry.is_active,
            };
            new_rule.validate()?;
            let category = self.resolve_rule_category(owner_id, &new_rule.category).await?;
            rules.push(Self::normalized_new_rule(&new_rule, category));
        }

        let loaded = self
            .rule_repo
            .insert_rules(owner_id, rules, replace_existing)
            .await?;
        debug!(
            "Loaded {} rules from {} (replace_existing={})",
            loaded,
            path.display(),
            replace_existing
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::TransactionDirection;
    use rust_decimal_macros::dec;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn draft(merchant: &str, description: &str) -> TransactionDraft {
        TransactionDraft {
            transaction_date: date(2024, 4, 5),
            posted_date: None,
            description_raw: description.to_string(),
            merchant_normalized: merchant.to_string(),
            amount: dec!(15.99),
            currency: "USD".to_string(),
            direction: TransactionDirection::Debit,
            source_category: String::new(),
        }
    }

    #[test]
    fn monthly_history_is_periodic() {
        let prior = vec![date(2024, 1, 5), date(2024, 2, 5), date(2024, 3, 5)];
        assert!(is_roughly_periodic(&prior, date(2024, 4, 5)));
    }

    #[test]
    fn weekly_history_is_periodic() {
        let prior = vec![date(2024, 3, 4), date(2024, 3, 11)];
        assert!(is_roughly_periodic(&prior, date(2024, 3, 18)));
    }

    #[test]
    fn irregular_history_is_not_periodic() {
        let prior = vec![date(2024, 1, 5), date(2024, 1, 9), date(2024, 3, 2)];
        assert!(!is_roughly_periodic(&prior, date(2024, 4, 5)));
    }

    #[test]
    fn too_few_occurrences_are_not_periodic() {
        assert!(!is_roughly_periodic(&[], date(2024, 4, 5)));
        assert!(!is_roughly_periodic(&[date(2024, 3, 5)], date(2024, 4, 5)));
    }

    #[test]
    fn same_day_repeats_are_not_periodic() {
        let prior = vec![date(2024, 4, 5), date(2024, 4, 5)];
        assert!(!is_roughly_periodic(&prior, date(2024, 4, 5)));
    }

    #[test]
    fn rules_win_over_recurrence() {
        let rule = ClassificationRule {
            id: "r1".to_string(),
            owner_id: "owner-1".to_string(),
            rule_type: "merchant_contains".to_string(),
            pattern: "netflix".to_string(),
            category: "entertainment".to_string(),
            confidence: 0.95,
            priority: 1,
            is_active: true,
            created_at: date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap(),
            updated_at: date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap(),
        };
        let rule_set = RuleSet::new(vec![rule]);
        let prior = vec![date(2024, 1, 5), date(2024, 2, 5), date(2024, 3, 5)];

        let outcome = classify_draft(&draft("netflix", "NETFLIX.COM"), &rule_set, &prior);
        assert_eq!(outcome.category, "entertainment");
        assert_eq!(
            outcome.rationale,
            ClassificationRationale::Rule {
                rule_id: "r1".to_string()
            }
        );
    }

    #[test]
    fn recurrence_applies_when_no_rule_matches() {
        let rule_set = RuleSet::new(vec![]);
        let prior = vec![date(2024, 1, 5), date(2024, 2, 5), date(2024, 3, 5)];

        let outcome = classify_draft(&draft("acme gym", "ACME GYM"), &rule_set, &prior);
        assert_eq!(outcome.category, RECURRING_CATEGORY);
        assert_eq!(outcome.confidence, RECURRING_CONFIDENCE);
        assert_eq!(outcome.rationale, ClassificationRationale::RecurringInterval);
    }

    #[test]
    fn fallback_is_uncategorized_with_zero_confidence() {
        let rule_set = RuleSet::new(vec![]);
        let outcome = classify_draft(&draft("one off shop", "ONE OFF SHOP"), &rule_set, &[]);
        assert_eq!(outcome.category, UNCATEGORIZED);
        assert_eq!(outcome.confidence, 0.0);
        assert_eq!(outcome.rationale, ClassificationRationale::Fallback);
    }
}
