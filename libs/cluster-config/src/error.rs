//! Error types for loading and validating cluster configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or validating a cluster configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A node entry declared a negative replica count.
    #[error("invalid replica count for node {index} ({role}): {replicas}, must be >= 0")]
    InvalidReplicas {
        index: usize,
        role: String,
        replicas: i32,
    },

    /// A node entry has an empty image reference.
    #[error("node {index} has no image")]
    MissingImage { index: usize },

    /// The configuration document is not valid TOML for this schema.
    #[error("failed to parse cluster config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("failed to read cluster config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Returns true if this error was raised by validation rather than loading.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            ConfigError::InvalidReplicas { .. } | ConfigError::MissingImage { .. }
        )
    }
}
