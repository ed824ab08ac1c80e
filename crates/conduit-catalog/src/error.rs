//! Error types for the step catalog

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading sources, parsing descriptors or serving the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Archive error in {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single descriptor that could not be turned into steps
    #[error("Invalid descriptor {name}: {reason}")]
    Descriptor { name: String, reason: String },

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Catalog build failed: {0}")]
    BuildFailed(String),

    /// The readiness wait gave up before a build completed
    #[error("Catalog not ready: {0}")]
    NotReady(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

impl CatalogError {
    pub fn descriptor(name: impl Into<String>, reason: impl ToString) -> Self {
        CatalogError::Descriptor {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CatalogError::SourceNotFound(_) => "ERR_CATALOG_SOURCE_NOT_FOUND",
            CatalogError::Archive { .. } => "ERR_CATALOG_ARCHIVE",
            CatalogError::Io { .. } => "ERR_CATALOG_IO",
            CatalogError::Descriptor { .. } => "ERR_CATALOG_DESCRIPTOR",
            CatalogError::Json(_) => "ERR_CATALOG_JSON_PARSE",
            CatalogError::Yaml(_) => "ERR_CATALOG_YAML_PARSE",
            CatalogError::BuildFailed(_) => "ERR_CATALOG_BUILD_FAILED",
            CatalogError::NotReady(_) => "ERR_CATALOG_NOT_READY",
            CatalogError::Config(_) => "ERR_CATALOG_CONFIG",
            CatalogError::Task(_) => "ERR_CATALOG_TASK",
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
