//! Error types for the hl7 crate.

use thiserror::Error;

/// Errors that can occur when parsing HL7 values or FHIR output.
#[derive(Debug, Error)]
pub enum Hl7Error {
    /// The value is not a valid HL7 v2 `DTM`.
    #[error("invalid hl7 dtm: '{0}'")]
    InvalidDtm(String),

    /// The rendered FHIR text is not valid JSON.
    #[error("invalid fhir json: {0}")]
    InvalidFhir(#[from] serde_json::Error),
}

/// Result type for hl7 operations.
pub type Result<T> = std::result::Result<T, Hl7Error>;
