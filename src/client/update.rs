//! Public client facade and the replace lifecycle coordinator.
//!
//! [`CollabClient::update_page_content`] is the sole mutating entry point.
//! Internally a [`ReplaceCoordinator`] owns the session handle and the two
//! deadlines, with a single teardown path, so the one-terminal-close
//! invariant holds structurally rather than by convention:
//!
//! - **Visibility deadline**: if neither synchronization nor a terminal
//!   handshake event arrives in time, the session is closed and the caller
//!   gets a timeout error.
//! - **Propagation grace period**: after a successful replace the caller is
//!   resolved *immediately* while the session lingers on a detached task,
//!   giving the server a bounded window to flush its persistence debounce;
//!   that background close swallows errors because the contract to the
//!   caller is already fulfilled.
//!
//! Decoupling "the caller may proceed" from "the edit is durably synced" is
//! a deliberate latency/durability trade-off; the grace period is a
//! heuristic lower bound, not a durability guarantee.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::client::auth;
use crate::client::endpoint::resolve_collab_url;
use crate::client::session::{CollabSession, SessionEvent};
use crate::config::ClientConfig;
use crate::convert::{DocumentTree, MarkdownConverter};
use crate::error::{Error, Result};

/// Client for replacing page content on a collaboration server.
///
/// Holds configuration, an HTTP client for the auth endpoints, and the
/// Markdown converter. One websocket session is opened per
/// [`update_page_content`](CollabClient::update_page_content) call and
/// never reused.
///
/// # Examples
///
/// ```ignore
/// use pagesync::CollabClient;
///
/// #[tokio::main]
/// async fn main() -> pagesync::Result<()> {
///     let client = CollabClient::new();
///     let token = client.collab_token("https://wiki.example.com/api", "api-key").await?;
///     client
///         .update_page_content("42", "# Title\n\nBody text.", &token, "https://wiki.example.com/api")
///         .await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct CollabClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    converter: MarkdownConverter,
}

impl CollabClient {
    /// Create a client with default configuration.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_default();
        CollabClient {
            http,
            config: Arc::new(config),
            converter: MarkdownConverter::new(),
        }
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Exchange an API token for a collaboration session token.
    pub async fn collab_token(&self, base_url: &str, api_token: &str) -> Result<String> {
        auth::collab_token(&self.http, base_url, api_token).await
    }

    /// Log in with email and password, returning an auth token.
    pub async fn login(&self, base_url: &str, email: &str, password: &str) -> Result<String> {
        auth::login(&self.http, base_url, email, password).await
    }

    /// Replace the entire content of a page with converted Markdown.
    ///
    /// Resolves once the content has been visibly replaced in the live
    /// session; the session then lingers in the background for the
    /// propagation grace period before detaching. Rejects with
    /// [`Error::Authentication`], [`Error::Timeout`], [`Error::Replace`] or
    /// [`Error::Transport`]; no retries are performed.
    pub async fn update_page_content(
        &self,
        page_id: &str,
        markdown: &str,
        collab_token: &str,
        base_url: &str,
    ) -> Result<()> {
        info!(page_id, "starting realtime page update");
        debug!(
            token_prefix = %collab_token.chars().take(5).collect::<String>(),
            "using collab token"
        );

        let tree = self.converter.convert(markdown);
        let url = resolve_collab_url(base_url, &self.config.collab_mount_path);
        let room = self.config.room_name(page_id);
        debug!(%url, %room, "resolved collaboration endpoint");

        ReplaceCoordinator::new(self.config.clone())
            .run(&url, &room, collab_token, &tree)
            .await
    }
}

impl Default for CollabClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrates one replace invocation over one session.
///
/// Owns the session handle; `teardown` is the only failure-path close site,
/// and the propagation-grace task is the only success-path close site, so
/// every exit closes the session exactly once.
struct ReplaceCoordinator {
    config: Arc<ClientConfig>,
    session: Option<CollabSession>,
}

impl ReplaceCoordinator {
    fn new(config: Arc<ClientConfig>) -> Self {
        ReplaceCoordinator {
            config,
            session: None,
        }
    }

    async fn run(mut self, url: &str, room: &str, token: &str, tree: &DocumentTree) -> Result<()> {
        self.session = Some(CollabSession::open(url, room, token).await?);

        if let Err(e) = self.await_synchronized().await {
            self.teardown("handshake did not complete").await;
            return Err(e);
        }

        let replaced = match self.session.as_ref() {
            Some(session) => session.replace_content(&self.config.root_fragment, tree),
            None => Err(Error::Replace("session vanished before replace".to_string())),
        };
        if let Err(e) = replaced {
            self.teardown("replace failed").await;
            return Err(e);
        }

        // The caller resolves now; the session lingers so the server can
        // flush before we disconnect.
        if let Some(session) = self.session.take() {
            let grace = Duration::from_millis(self.config.propagation_grace_ms);
            info!(room = %session.room(), grace_ms = self.config.propagation_grace_ms,
                  "content replaced; session detaching in background");
            tokio::spawn(linger_and_close(session, grace));
        }
        Ok(())
    }

    /// Wait until the session synchronizes, fails authentication, or the
    /// visibility deadline expires. A transport drop before synchronization
    /// only ends the wait early if a terminal event accompanied it;
    /// otherwise the deadline converts it into a timeout.
    async fn await_synchronized(&mut self) -> Result<()> {
        let deadline =
            tokio::time::sleep(Duration::from_millis(self.config.visibility_deadline_ms));
        tokio::pin!(deadline);
        let Some(session) = self.session.as_mut() else {
            return Err(Error::Timeout);
        };

        loop {
            tokio::select! {
                _ = &mut deadline => return Err(Error::Timeout),
                event = session.next_event() => match event {
                    Some(SessionEvent::Synchronized) => return Ok(()),
                    Some(SessionEvent::AuthFailed(reason)) => {
                        return Err(Error::Authentication(reason));
                    }
                    Some(SessionEvent::Connected) => {}
                    Some(SessionEvent::Disconnected) | Some(SessionEvent::Closed) => {
                        debug!("transport dropped before synchronization");
                    }
                    None => {
                        // Event source exhausted; nothing further can
                        // arrive, so wait out the deadline.
                        deadline.as_mut().await;
                        return Err(Error::Timeout);
                    }
                },
            }
        }
    }

    /// Sole failure-path teardown. Close errors are logged, never surfaced:
    /// the caller is about to receive the original error.
    async fn teardown(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            debug!(reason, "tearing down collaboration session");
            if let Err(e) = session.close().await {
                debug!("session close failed during teardown: {}", e);
            }
        }
    }
}

/// Background task holding the session open for the propagation grace
/// period, then closing it unconditionally. Failures are swallowed; the
/// caller already has its result.
async fn linger_and_close(session: CollabSession, grace: Duration) {
    tokio::time::sleep(grace).await;
    debug!(room = %session.room(), "closing background session after propagation grace");
    if let Err(e) = session.close().await {
        debug!("background session close failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_uses_default_config() {
        let client = CollabClient::new();
        assert_eq!(client.config().visibility_deadline_ms, 25_000);
        assert_eq!(client.config().room_name("42"), "page.42");
    }

    #[test]
    fn test_update_future_is_send() {
        // Callers spawn the whole replace onto worker tasks.
        fn assert_send<T: Send>(_: T) {}
        let client = CollabClient::new();
        assert_send(client.update_page_content("1", "# x", "token", "http://localhost"));
    }

    #[test]
    fn test_with_config_overrides() {
        let client = CollabClient::with_config(ClientConfig {
            visibility_deadline_ms: 1_000,
            ..Default::default()
        });
        assert_eq!(client.config().visibility_deadline_ms, 1_000);
    }
}
