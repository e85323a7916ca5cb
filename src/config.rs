//! Client configuration.
//!
//! All timing and naming knobs of the replace lifecycle live here so callers
//! can tune them without touching protocol code.
//!
//! # Examples
//!
//! ```
//! use pagesync::ClientConfig;
//!
//! // Default configuration
//! let config = ClientConfig::default();
//! assert_eq!(config.visibility_deadline_ms, 25_000);
//!
//! // Custom deadlines for a latency-sensitive caller
//! let config = ClientConfig {
//!     visibility_deadline_ms: 10_000,
//!     propagation_grace_ms: 5_000,
//!     ..Default::default()
//! };
//! assert_eq!(config.room_name("42"), "page.42");
//! ```

/// Configuration for [`CollabClient`](crate::CollabClient).
///
/// # Deadlines
///
/// Two independent durations bound the replace lifecycle:
///
/// - **Visibility deadline**: maximum time the caller waits for the replace
///   to be reported complete. If neither synchronization nor a terminal
///   handshake event arrives in time, the outcome is
///   [`Error::Timeout`](crate::Error::Timeout).
/// - **Propagation grace period**: after a successful replace the session is
///   kept open this long so the server can flush its persistence debounce,
///   then closed unconditionally. This is a heuristic lower bound, not a
///   durability guarantee; the caller has already received its result.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum time in milliseconds to wait for the replace to become
    /// visible to the caller.
    pub visibility_deadline_ms: u64,

    /// How long in milliseconds the session lingers after a successful
    /// replace before being closed in the background.
    pub propagation_grace_ms: u64,

    /// Prefix used to derive the collaboration room name from a page ID.
    pub room_prefix: String,

    /// Path segment the collaboration websocket is mounted on.
    pub collab_mount_path: String,

    /// Name of the shared root fragment holding the page content.
    pub root_fragment: String,

    /// Request timeout in milliseconds for the auth HTTP client.
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            visibility_deadline_ms: 25_000,
            propagation_grace_ms: 15_000,
            room_prefix: "page.".to_string(),
            collab_mount_path: "/collab".to_string(),
            root_fragment: "default".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Derive the collaboration room name for a page.
    ///
    /// The server routes the session to the correct document replica based
    /// on this name.
    pub fn room_name(&self, page_id: &str) -> String {
        format!("{}{}", self.room_prefix, page_id)
    }
}
