//! Error types for conversion.
//!
//! This module provides [`RenderError`], the error type for everything above
//! the filter layer: loading configuration, resolving templates, rendering, and
//! parsing the rendered FHIR. Filters themselves fail with
//! [`minijinja::Error`] so that the enclosing render aborts; those errors are
//! folded into [`RenderError`] at the engine boundary.

use std::fmt;

use fhirconv_hl7::Hl7Error;

/// Error type for conversion operations.
#[derive(Debug)]
pub enum RenderError {
    /// Template syntax error or an undefined filter/function.
    TemplateError(String),

    /// Template not found by the loader.
    TemplateNotFound(String),

    /// Data serialization error, including rendered output that is not JSON.
    SerializationError(String),

    /// I/O error (e.g., reading a template or code mapping from disk).
    IoError(std::io::Error),

    /// A filter rejected its input.
    OperationError(String),

    /// Invalid converter configuration.
    ConfigError(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::TemplateError(msg) => write!(f, "template error: {}", msg),
            RenderError::TemplateNotFound(name) => write!(f, "template not found: {}", name),
            RenderError::SerializationError(msg) => write!(f, "serialization error: {}", msg),
            RenderError::IoError(err) => write!(f, "I/O error: {}", err),
            RenderError::OperationError(msg) => write!(f, "{}", msg),
            RenderError::ConfigError(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::IoError(err)
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for RenderError {
    fn from(err: serde_yaml::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}

impl From<Hl7Error> for RenderError {
    fn from(err: Hl7Error) -> Self {
        match err {
            Hl7Error::InvalidFhir(err) => {
                RenderError::SerializationError(format!("failed to render FHIR: {}", err))
            }
            other => RenderError::OperationError(other.to_string()),
        }
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::TemplateNotFound => RenderError::TemplateNotFound(err.to_string()),
            ErrorKind::SyntaxError
            | ErrorKind::BadEscape
            | ErrorKind::UndefinedError
            | ErrorKind::UnknownTest
            | ErrorKind::UnknownFunction
            | ErrorKind::UnknownFilter
            | ErrorKind::UnknownMethod => RenderError::TemplateError(err.to_string()),
            ErrorKind::BadSerialization => RenderError::SerializationError(err.to_string()),
            _ => RenderError::OperationError(err.to_string()),
        }
    }
}
