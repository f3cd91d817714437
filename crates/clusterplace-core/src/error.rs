//! Error types for clusterplace

use thiserror::Error;

/// Main error type for clusterplace
#[derive(Error, Debug)]
pub enum ClusterPlaceError {
    /// Label selector could not be converted into a registry query
    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),

    /// Registry list failed for a reason other than not-found
    #[error("Registry error: {0}")]
    Registry(String),

    /// Registry reported that the requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Deep copy round trip failed
    #[error("Copy error: {0}")]
    Copy(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ClusterPlaceError {
    /// Whether this error means "no such resource" rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterPlaceError::NotFound(_))
    }
}

/// Result type for clusterplace operations
pub type ClusterPlaceResult<T> = Result<T, ClusterPlaceError>;

impl From<serde_json::Error> for ClusterPlaceError {
    fn from(err: serde_json::Error) -> Self {
        ClusterPlaceError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for ClusterPlaceError {
    fn from(err: toml::de::Error) -> Self {
        ClusterPlaceError::Config(err.to_string())
    }
}
