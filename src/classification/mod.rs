pub mod classification_model;
pub mod classification_repository;
pub mod classification_service;
pub mod classification_traits;
pub mod rule_config;

pub use classification_model::*;
pub use classification_repository::ClassificationRuleRepository;
pub use classification_service::{classify_draft, is_roughly_periodic, ClassificationService};
pub use classification_traits::{
    ClassificationRuleRepositoryTrait, ClassificationServiceTrait, RecategorizeRequest,
    RecategorizeSummary,
};
pub use rule_config::{load_rules_file, save_rules_file, RuleConfigEntry};
