pub mod reviews_model;
pub mod reviews_repository;
pub mod reviews_service;
pub mod reviews_traits;

pub use reviews_model::*;
pub use reviews_repository::ReviewRepository;
pub use reviews_service::ReviewService;
pub use reviews_traits::{ReviewRepositoryTrait, ReviewServiceTrait};
