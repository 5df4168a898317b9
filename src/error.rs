use thiserror::Error;

/// Failures surfaced by the backend client and the store.
///
/// Kept `Clone` so the last failure can sit in the published store state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("network error: {0}")]
    Network(String),

    #[error("session expired")]
    Auth,

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("no active session")]
    NoSession,
}

impl NotificationError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth | Self::NoSession)
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Result of a local mutation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    AlreadyRead,
    // The id is no longer held, e.g. a clear-all raced with this call
    NotFoundLocal,
}
