pub mod ingest_model;
pub mod ingest_normalizer;
pub mod ingest_parser;
pub mod ingest_profiles;

pub use ingest_model::*;
pub use ingest_normalizer::*;
pub use ingest_parser::*;
pub use ingest_profiles::*;
