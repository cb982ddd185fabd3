use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Transport setup error: {0}")]
    TransportError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a configuration error with a plain message.
    pub fn config(msg: impl Into<String>) -> Self {
        AppError::ConfigError(anyhow::anyhow!(msg.into()))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::TransportError(anyhow::Error::new(err))
    }
}
