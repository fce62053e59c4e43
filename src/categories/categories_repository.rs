use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;
use uuid::Uuid;

use super::categories_model::{Category, NewCategory};
use super::categories_traits::CategoryRepositoryTrait;
use crate::db::{get_connection, WriteHandle};
use crate::errors::Result;
use crate::schema::{categories, transactions};

pub struct CategoryRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl CategoryRepository {
    pub fn new(
        pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        CategoryRepository { pool, writer }
    }
}

#[async_trait]
impl CategoryRepositoryTrait for CategoryRepository {
    fn get_categories(&self, owner_id: &str) -> Result<Vec<Category>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(categories::table
            .filter(categories::owner_id.eq(owner_id))
            .order(categories::name.asc())
            .load::<Category>(&mut conn)?)
    }

    fn get_category_by_name(&self, owner_id: &str, name: &str) -> Result<Option<Category>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(categories::table
            .filter(categories::owner_id.eq(owner_id))
            .filter(categories::name.eq(name))
            .first::<Category>(&mut conn)
            .optional()?)
    }

    fn is_category_in_use(&self, owner_id: &str, name: &str) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = transactions::table
            .filter(transactions::owner_id.eq(owner_id))
            .filter(transactions::category.eq(name))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }

    async fn create_category(
        &self,
        owner_id: &str,
        new_category: NewCategory,
    ) -> Result<Category> {
        let owner_id = owner_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Category> {
                let row = Category {
                    id: Uuid::new_v4().to_string(),
                    owner_id,
                    name: new_category.name,
                    display_name: new_category.display_name,
                    created_at: Utc::now().naive_utc(),
                };

                diesel::insert_into(categories::table)
                    .values(&row)
                    .execute(conn)?;

                Ok(categories::table.find(&row.id).first::<Category>(conn)?)
            })
            .await
    }

    async fn delete_category(&self, owner_id: &str, name: &str) -> Result<usize> {
        let owner_id = owner_id.to_string();
        let name = name.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                Ok(diesel::delete(
                    categories::table
                        .filter(categories::owner_id.eq(&owner_id))
                        .filter(categories::name.eq(&name)),
                )
                .execute(conn)?)
            })
            .await
    }

    async fn ensure_categories(&self, owner_id: &str, names: Vec<String>) -> Result<usize> {
        let owner_id = owner_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let existing: Vec<String> = categories::table
                    .filter(categories::owner_id.eq(&owner_id))
                    .select(categories::name)
                    .load(conn)?;

                let now = Utc::now().naive_utc();
                let mut created = 0;
                for name in names {
                    if existing.contains(&name) {
                        continue;
                    }
                    let row = Category {
                        id: Uuid::new_v4().to_string(),
                        owner_id: owner_id.clone(),
                        name,
                        display_name: None,
                        created_at: now,
                    };
                    diesel::insert_into(categories::table)
                        .values(&row)
                        .execute(conn)?;
                    created += 1;
                }
                Ok(created)
            })
            .await
    }
}
