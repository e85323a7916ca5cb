//! Error types and result handling.
//!
//! All fallible operations in this crate return [`Result`], an alias over
//! [`Error`]. The variants map one-to-one onto the failure classes a caller
//! of [`CollabClient::update_page_content`](crate::CollabClient::update_page_content)
//! can observe:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | [`Error::Credential`] | The collab-token endpoint rejected the API token |
//! | [`Error::Authentication`] | The session handshake reported permission denied |
//! | [`Error::Timeout`] | No terminal handshake event within the visibility deadline |
//! | [`Error::Replace`] | The atomic replace transaction failed |
//! | [`Error::Transport`] | WebSocket-level failure |
//! | [`Error::Http`] | HTTP-level failure on the auth path |
//! | [`Error::Protocol`] | Malformed wire frame or contract misuse |
//!
//! Errors surface to the caller exactly once; teardown failures after the
//! caller has already received its outcome are logged and swallowed.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while replacing page content over a live
/// collaboration session.
#[derive(Debug, Error)]
pub enum Error {
    /// The credential provider rejected the request (non-2xx response).
    ///
    /// Carries the upstream status code and the response body so callers can
    /// distinguish an expired API token from a misconfigured base URL.
    #[error("failed to get collab token: {status} - {detail}")]
    Credential {
        /// HTTP status code returned by the token endpoint.
        status: u16,
        /// Response body (or status text) returned by the token endpoint.
        detail: String,
    },

    /// The collaboration server denied the session credential during the
    /// handshake. Terminal; this crate performs no retries.
    #[error("authentication failed for collaboration connection: {0}")]
    Authentication(String),

    /// No terminal handshake event arrived within the visibility deadline.
    #[error("connection timeout to collaboration server")]
    Timeout,

    /// The atomic replace transaction raised; the session has been torn down.
    #[error("content replace failed: {0}")]
    Replace(String),

    /// WebSocket-level failure.
    #[error("websocket error: {0}")]
    Transport(Box<tokio_tungstenite::tungstenite::Error>),

    /// HTTP-level failure while talking to the auth endpoints.
    #[error("http error: {0}")]
    Http(String),

    /// A wire frame could not be decoded, or the session was used outside
    /// its contract (e.g. mutating the shared document before it
    /// synchronized).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Transport(Box::new(e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::Protocol(format!("invalid utf-8 in frame: {}", e))
    }
}
