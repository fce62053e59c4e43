use async_trait::async_trait;

use super::categories_model::{Category, NewCategory};
use crate::errors::Result;

/// Trait defining the contract for category repository operations.
#[async_trait]
pub trait CategoryRepositoryTrait: Send + Sync {
    fn get_categories(&self, owner_id: &str) -> Result<Vec<Category>>;

    fn get_category_by_name(&self, owner_id: &str, name: &str) -> Result<Option<Category>>;

    fn is_category_in_use(&self, owner_id: &str, name: &str) -> Result<bool>;

    async fn create_category(&self, owner_id: &str, new_category: NewCategory)
        -> Result<Category>;

    async fn delete_category(&self, owner_id: &str, name: &str) -> Result<usize>;

    /// Inserts any of the given keys that do not exist yet. Returns how
    /// many were created.
    async fn ensure_categories(&self, owner_id: &str, names: Vec<String>) -> Result<usize>;
}

/// Trait defining the contract for category service operations.
#[async_trait]
pub trait CategoryServiceTrait: Send + Sync {
    fn list_categories(&self, owner_id: &str) -> Result<Vec<Category>>;

    /// Creates a category under its normalized key; returns the existing
    /// row when the key is already present.
    async fn create_category(&self, owner_id: &str, new_category: NewCategory)
        -> Result<Category>;

    async fn delete_category(&self, owner_id: &str, name: &str) -> Result<()>;

    /// Seeds the default taxonomy for an owner. Idempotent.
    async fn seed_defaults(&self, owner_id: &str) -> Result<usize>;
}
