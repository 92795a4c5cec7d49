use crate::core::state::WorkflowState;
use thiserror::Error;

/// Shown when a failure carries no message of its own.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong in the magic kingdom.";

#[derive(Debug, Error)]
pub enum StoryError {
    /// Rejected before any network call.
    #[error("{0}")]
    Validation(String),

    #[error("Gemini API error: {0}")]
    Provider(String),

    #[error("Malformed story response: {0}")]
    MalformedResponse(String),

    #[error("No image data received")]
    NoImageReturned,

    #[error("No audio data received")]
    NoAudioReturned,

    #[error("Invalid base64 payload: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("Cannot {action} while {state:?}")]
    InvalidState {
        state: WorkflowState,
        action: &'static str,
    },
}

impl From<reqwest::Error> for StoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoryError::Provider(format!("request timed out: {}", err))
        } else {
            StoryError::Provider(err.to_string())
        }
    }
}

impl StoryError {
    /// Message for the error view, never empty.
    pub fn user_message(&self) -> String {
        let message = match self {
            StoryError::Provider(detail) | StoryError::Validation(detail)
                if detail.trim().is_empty() =>
            {
                String::new()
            }
            other => other.to_string(),
        };
        if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}
