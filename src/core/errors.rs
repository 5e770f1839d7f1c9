use thiserror::Error;
use super::types::JobId;

/// A defect raised by an event handler.
///
/// Distinct from a business failure (see [`Outcome::Failure`](super::events::Outcome)):
/// a defect stops the publish loop and propagates to whoever published the event.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Error, Debug)]
pub enum UploaderError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Event handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Uploader was destroyed")]
    Destroyed,

    #[error("Manager shut down")]
    ManagerShutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploaderError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(HandlerError::new(message))
    }
}

/// Error alias
pub type Result<T, E = UploaderError> = std::result::Result<T, E>;
