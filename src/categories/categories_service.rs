use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use super::categories_model::{normalize_category_key, Category, NewCategory};
use super::categories_traits::{CategoryRepositoryTrait, CategoryServiceTrait};
use crate::constants::{DEFAULT_CATEGORIES, UNCATEGORIZED};
use crate::errors::{Error, Result, ValidationError};

pub struct CategoryService {
    category_repo: Arc<dyn CategoryRepositoryTrait>,
}

impl CategoryService {
    pub fn new(category_repo: Arc<dyn CategoryRepositoryTrait>) -> Self {
        CategoryService { category_repo }
    }
}

#[async_trait]
impl CategoryServiceTrait for CategoryService {
    fn list_categories(&self, owner_id: &str) -> Result<Vec<Category>> {
        self.category_repo.get_categories(owner_id)
    }

    async fn create_category(
        &self,
        owner_id: &str,
        new_category: NewCategory,
    ) -> Result<Category> {
        let key = normalize_category_key(&new_category.name)?;

        if let Some(existing) = self.category_repo.get_category_by_name(owner_id, &key)? {
            return Ok(existing);
        }

        self.category_repo
            .create_category(
                owner_id,
                NewCategory {
                    name: key,
                    display_name: new_category.display_name,
                },
            )
            .await
    }

    async fn delete_category(&self, owner_id: &str, name: &str) -> Result<()> {
        let key = normalize_category_key(name)?;

        if key == UNCATEGORIZED {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "The 'uncategorized' sentinel cannot be deleted".to_string(),
            )));
        }
        if self.category_repo.is_category_in_use(owner_id, &key)? {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Cannot delete category '{}': transactions are assigned to it",
                key
            ))));
        }

        let deleted = self.category_repo.delete_category(owner_id, &key).await?;
        if deleted == 0 {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Category '{}' does not exist",
                key
            ))));
        }
        Ok(())
    }

    async fn seed_defaults(&self, owner_id: &str) -> Result<usize> {
        let created = self
            .category_repo
            .ensure_categories(
                owner_id,
                DEFAULT_CATEGORIES.iter().map(|n| n.to_string()).collect(),
            )
            .await?;
        if created > 0 {
            info!("Seeded {} default categories for owner {}", created, owner_id);
        }
        Ok(created)
    }
}
