//! Error types for Lumen.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, LLM transport, catalog loading,
//! filter validation, structured extraction, and prompts.

use thiserror::Error;

/// Unified error type for Lumen.
///
/// All fallible functions return `Result<T, AppError>`.
/// An empty filter result is not an error; see `FilterOutcome::NoResults`
/// in `lumen-catalog`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, HTTP status, response shape)
    #[error("LLM error: {0}")]
    Llm(String),

    /// The provider refused the request itself (bad key, invalid body); resending cannot help
    #[error("LLM request rejected: {0}")]
    LlmRejected(String),

    /// Catalog file errors (unreadable or malformed JSONL)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// A field is unknown to the record schema, or a value does not fit it
    #[error("Schema error: {0}")]
    Schema(String),

    /// A comparison operator outside `==, !=, >, >=, <, <=`
    #[error("Unsupported operator: '{0}'")]
    UnsupportedOperator(String),

    /// The language model output could not be turned into the requested structure
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_field() {
        let err = AppError::Schema("Column 'wattage' does not exist".to_string());
        assert!(err.to_string().contains("wattage"));
    }

    #[test]
    fn test_unsupported_operator_display() {
        let err = AppError::UnsupportedOperator("=~".to_string());
        assert_eq!(err.to_string(), "Unsupported operator: '=~'");
    }

    #[test]
    fn test_rejected_llm_display() {
        let err = AppError::LlmRejected("OpenAI API error (401 Unauthorized)".to_string());
        assert_eq!(
            err.to_string(),
            "LLM request rejected: OpenAI API error (401 Unauthorized)"
        );
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
