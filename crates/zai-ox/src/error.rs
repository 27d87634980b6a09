use ai_ox_common::CommonRequestError;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use thiserror::Error;

/// Errors produced while translating a chat request through the Z.ai backend
#[derive(Debug, Error)]
pub enum ZaiError {
    /// HTTP client errors (connect, timeout, body read)
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    /// A line of the upstream stream could not be decoded
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    /// Image upload failed; the request is abandoned before reaching upstream
    #[error("Image upload failed: {0}")]
    ImageUpload(String),

    /// The flattened conversation has no message to sign
    #[error("Conversation has no text message to send")]
    EmptyConversation,

    /// Upstream stream ended before the final metadata or done marker
    #[error("Upstream stream ended early after {received_chars} characters")]
    IncompleteResponse { received_chars: usize },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<CommonRequestError> for ZaiError {
    fn from(err: CommonRequestError) -> Self {
        match err {
            CommonRequestError::Http(e) => Self::Http(e),
            CommonRequestError::Api { status, message } => Self::Upstream { status, message },
        }
    }
}

impl ZaiError {
    /// Short machine-readable kind, used in caller-facing error events
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) | Self::Upstream { .. } => "upstream_error",
            Self::Serde(_) | Self::InvalidEventData(_) => "invalid_upstream_data",
            Self::ImageUpload(_) => "image_upload_error",
            Self::EmptyConversation => "invalid_request_error",
            Self::IncompleteResponse { .. } => "incomplete_response",
            Self::Config(_) => "configuration_error",
        }
    }
}

impl Serialize for ZaiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ZaiError", 2)?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("type", self.kind())?;
        state.end()
    }
}
