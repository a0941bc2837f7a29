use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimecardError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element is detached from the page: {0}")]
    ElementDetached(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("Script evaluation failed: {0}")]
    ScriptError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Template rendering failed: {0}")]
    Render(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for TimecardError {
    fn from(e: serde_json::Error) -> Self {
        TimecardError::Internal(format!("JSON error: {e}"))
    }
}

impl From<minijinja::Error> for TimecardError {
    fn from(e: minijinja::Error) -> Self {
        TimecardError::Render(e.to_string())
    }
}

/// Failures of the Azure DevOps client.
///
/// Transport and decode problems never surface here; the client logs them and
/// returns an empty result instead.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Azure DevOps Token not found. Please set it.")]
    MissingToken,

    #[error("Stored token is not valid base64: {0}")]
    InvalidToken(String),

    #[error("{context} Error: {status} {reason}")]
    Status {
        context: &'static str,
        status: u16,
        reason: String,
    },
}
