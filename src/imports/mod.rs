pub mod imports_errors;
pub mod imports_model;
pub mod imports_repository;
pub mod imports_service;
pub mod imports_traits;

pub use imports_errors::ImportError;
pub use imports_model::*;
pub use imports_repository::ImportRepository;
pub use imports_service::ImportService;
pub use imports_traits::{ImportRepositoryTrait, ImportServiceTrait};
