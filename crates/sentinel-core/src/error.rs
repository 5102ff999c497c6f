use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Short error code string, mirrored on the dashboard's error surface.
    pub fn code(&self) -> &'static str {
        match self {
            SentinelError::Config(_) => "CONFIG_ERROR",
            SentinelError::Serialization(_) => "SERIALIZATION_ERROR",
            SentinelError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
