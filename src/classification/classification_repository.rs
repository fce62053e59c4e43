use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use super::classification_model::*;
use super::classification_traits::ClassificationRuleRepositoryTrait;
use crate::db::{get_connection, WriteHandle};
use crate::errors::{Error, Result, ValidationError};
use crate::schema::classification_rules;

pub struct ClassificationRuleRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl ClassificationRuleRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        ClassificationRuleRepository { pool, writer }
    }
}

fn build_row(owner_id: &str, new_rule: NewClassificationRule) -> ClassificationRule {
    let now = Utc::now().naive_utc();
    ClassificationRule {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        rule_type: new_rule.rule_type,
        pattern: new_rule.pattern,
        category: new_rule.category,
        confidence: new_rule.confidence,
        priority: new_rule.priority,
        is_active: new_rule.is_active,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl ClassificationRuleRepositoryTrait for ClassificationRuleRepository {
    fn get_rules(
        &self,
        owner_id: &str,
        rule_type: Option<RuleType>,
        is_active: Option<bool>,
    ) -> Result<Vec<ClassificationRule>> {
        let mut conn = get_connection(&self.pool)?;

        let mut query = classification_rules::table
            .filter(classification_rules::owner_id.eq(owner_id))
            .into_boxed();

        if let Some(rule_type) = rule_type {
            query = query.filter(classification_rules::rule_type.eq(rule_type.as_str()));
        }
        if let Some(is_active) = is_active {
            query = query.filter(classification_rules::is_active.eq(is_active));
        }

        Ok(query
            .order((
                classification_rules::priority.asc(),
                classification_rules::created_at.asc(),
                classification_rules::id.asc(),
            ))
            .load::<ClassificationRule>(&mut conn)?)
    }

    fn get_active_rules(&self, owner_id: &str) -> Result<Vec<ClassificationRule>> {
        self.get_rules(owner_id, None, Some(true))
    }

    fn get_rule_by_id(
        &self,
        owner_id: &str,
        rule_id: &str,
    ) -> Result<Option<ClassificationRule>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(classification_rules::table
            .filter(classification_rules::id.eq(rule_id))
            .filter(classification_rules::owner_id.eq(owner_id))
            .first::<ClassificationRule>(&mut conn)
            .optional()?)
    }

    async fn create_rule(
        &self,
        owner_id: &str,
        new_rule: NewClassificationRule,
    ) -> Result<ClassificationRule> {
        let row = build_row(owner_id, new_rule);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<ClassificationRule> {
                diesel::insert_into(classification_rules::table)
                    .values(&row)
                    .execute(conn)?;
                Ok(classification_rules::table
                    .find(&row.id)
                    .first::<ClassificationRule>(conn)?)
            })
            .await
    }

    async fn update_rule(
        &self,
        owner_id: &str,
        rule_id: &str,
        changeset: ClassificationRuleChangeset,
    ) -> Result<ClassificationRule> {
        let owner_id = owner_id.to_string();
        let rule_id = rule_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<ClassificationRule> {
                let affected = diesel::update(
                    classification_rules::table
                        .filter(classification_rules::id.eq(&rule_id))
                        .filter(classification_rules::owner_id.eq(&owner_id)),
                )
                .set(&changeset)
                .execute(conn)?;

                if affected == 0 {
                    return Err(Error::Validation(ValidationError::InvalidInput(format!(
                        "Classification rule not found: {}",
                        rule_id
                    ))));
                }

                Ok(classification_rules::table
                    .find(&rule_id)
                    .first::<ClassificationRule>(conn)?)
            })
            .await
    }

    async fn delete_rule(&self, owner_id: &str, rule_id: &str) -> Result<usize> {
        let owner_id = owner_id.to_string();
        let rule_id = rule_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                Ok(diesel::delete(
                    classification_rules::table
                        .filter(classification_rules::id.eq(&rule_id))
                        .filter(classification_rules::owner_id.eq(&owner_id)),
                )
                .execute(conn)?)
            })
            .await
    }

    async fn insert_rules(
        &self,
        owner_id: &str,
        rules: Vec<NewClassificationRule>,
        replace_existing: bool,
    ) -> Result<usize> {
        let owner_id = owner_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                if replace_existing {
                    diesel::delete(
                        classification_rules::table
                            .filter(classification_rules::owner_id.eq(&owner_id)),
                    )
                    .execute(conn)?;
                }

                let mut inserted = 0;
                for new_rule in rules {
                    let row = build_row(&owner_id, new_rule);
                    diesel::insert_into(classification_rules::table)
                        .values(&row)
                        .execute(conn)?;
                    inserted += 1;
                }
                Ok(inserted)
            })
            .await
    }
}
