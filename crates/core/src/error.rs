//! Error types for the session bootstrap path.

/// Failures raised while talking to a connection-details endpoint.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, String),
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Response body from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A fatal error while bootstrapping a session.
///
/// Nothing in the bootstrap layer recovers from these; they are handed back to
/// whoever called [`crate::session::Session::start`].
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Connection details payload has an unexpected shape: {0}")]
    InvalidPayload(#[source] serde_json::Error),
    #[error("Custom token source failed: {0}")]
    Custom(#[source] anyhow::Error),
    #[error("Failed to connect to room: {0}")]
    Connect(String),
}
