pub mod analytics_model;
pub mod analytics_repository;
pub mod analytics_service;
pub mod analytics_traits;

pub use analytics_model::*;
pub use analytics_repository::InsightRepository;
pub use analytics_service::{AnalyticsService, DeterministicSpendAdvisory};
pub use analytics_traits::{AnalyticsServiceTrait, InsightRepositoryTrait, SpendAdvisoryTrait};
