//! Error types for binding resolution and deployment generation

use conduit_catalog::CatalogError;
use conduit_model::ModelError;
use thiserror::Error;

/// Errors surfaced to callers of the binding engine
#[derive(Error, Debug)]
pub enum BindingError {
    /// The document is not of a kind any parser handles
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The document matched a parser but could not be decoded
    #[error("Document deserialization error: {0}")]
    Deserialize(#[from] serde_yaml::Error),

    #[error("Missing document section: {0}")]
    MissingSection(String),

    #[error("Invalid path separator pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Deployment generation error: {0}")]
    Generation(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl BindingError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            BindingError::UnsupportedFormat(_) => "ERR_BINDING_UNSUPPORTED_FORMAT",
            BindingError::Deserialize(_) => "ERR_BINDING_DESERIALIZE",
            BindingError::MissingSection(_) => "ERR_BINDING_MISSING_SECTION",
            BindingError::Pattern(_) => "ERR_BINDING_PATTERN",
            BindingError::Generation(_) => "ERR_BINDING_GENERATION",
            BindingError::Catalog(e) => e.error_code(),
            BindingError::Model(e) => e.error_code(),
        }
    }

    /// Whether the caller supplied a document that cannot be used at all
    pub fn is_rejected_input(&self) -> bool {
        matches!(
            self,
            BindingError::UnsupportedFormat(_)
                | BindingError::Deserialize(_)
                | BindingError::MissingSection(_)
        )
    }
}

pub type BindingResult<T> = Result<T, BindingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_model::ParameterType;

    #[test]
    fn test_error_codes() {
        let err = BindingError::UnsupportedFormat("kind: Integration".to_string());
        assert_eq!(err.error_code(), "ERR_BINDING_UNSUPPORTED_FORMAT");
        assert!(err.is_rejected_input());

        let err: BindingError = ModelError::Coercion {
            parameter: "period".to_string(),
            expected: ParameterType::Number,
            value: "\"soon\"".to_string(),
        }
        .into();
        assert!(err.error_code().starts_with("ERR_MODEL_"));
        assert!(!err.is_rejected_input());
    }
}
