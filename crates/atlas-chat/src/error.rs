//! Error types for the conversation engine.

use atlas_core::error::AtlasError;

/// Errors from the chat engine and its transports.
///
/// Session-level operations absorb these into fixed user-visible text; they
/// surface unmodified only from [`Transport`](crate::transport::Transport)
/// implementations and attachment loading.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("attachment error: {0}")]
    Attachment(String),
    #[error("render error: {0}")]
    Render(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<AtlasError> for ChatError {
    fn from(err: AtlasError) -> Self {
        match err {
            AtlasError::Io(e) => ChatError::Attachment(e.to_string()),
            other => ChatError::Config(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Decode(err.to_string())
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}
