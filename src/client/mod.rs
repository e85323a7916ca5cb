//! Collaboration client: endpoint resolution, credentials, session,
//! atomic replace, and lifecycle coordination.
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── endpoint - collaboration websocket address resolution
//! ├── auth     - collab-token and login credential helpers
//! ├── session  - synchronized document session and handshake state machine
//! ├── replace  - atomic root-content replacement on the shared document
//! └── update   - CollabClient facade and dual-deadline coordinator
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CollabClient`] | Public facade; one session per replace call |
//! | [`CollabSession`] | Live session handle with event delivery |
//! | [`SessionState`] | Handshake state (connecting → synchronized) |
//! | [`SessionEvent`] | Connection and handshake progress events |
//!
//! # Examples
//!
//! ```
//! use pagesync::client::resolve_collab_url;
//!
//! let url = resolve_collab_url("https://wiki.example.com/api", "/collab");
//! assert_eq!(url, "wss://wiki.example.com/collab");
//! ```

mod auth;
mod endpoint;
pub(crate) mod replace;
mod session;
mod update;

pub use endpoint::resolve_collab_url;
pub use replace::replace_root_content;
pub use session::{CollabSession, SessionEvent, SessionState};
pub use update::CollabClient;
