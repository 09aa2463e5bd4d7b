//! Shared error types for the matching platform

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Malformed {event} event: {message}")]
    MalformedEvent { event: &'static str, message: String },
}

impl SharedError {
    pub fn malformed(event: &'static str, message: impl Into<String>) -> Self {
        SharedError::MalformedEvent {
            event,
            message: message.into(),
        }
    }
}

pub type SharedResult<T> = Result<T, SharedError>;
