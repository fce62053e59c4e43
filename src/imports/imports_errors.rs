use thiserror::Error;

/// Errors specific to statement import handling.
#[derive(Error, Debug)]
pub enum ImportError {
    /// File-level failure: no configured institution profile recognizes
    /// the file's columns. No rows are processed.
    #[error("Unrecognized statement layout: {0}")]
    SchemaDetection(String),

    #[error("Import not found: {0}")]
    NotFound(String),

    #[error("Uploaded statement content not found for import {0}")]
    MissingContent(String),

    #[error("Invalid import status transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },
}
