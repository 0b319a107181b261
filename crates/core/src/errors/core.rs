use thiserror::Error;

/// Result alias for configuration and logging operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type shared by the goose crates
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Logging setup failed: {message}")]
    Logging { message: String },
}

impl CoreError {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new logging error
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    /// Whether this error came from configuration resolution
    pub fn is_configuration(&self) -> bool {
        matches!(self, CoreError::Configuration { .. } | CoreError::Yaml(_))
    }
}
