#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Pagesync: realtime page content replacement
//!
//! This crate replaces the entire content of a page on a Yjs-compatible
//! collaboration server by joining the page's live editing session, exactly
//! as another editor would, and swapping the document's root content in one
//! CRDT transaction.
//!
//! ## Overview
//!
//! A replace invocation moves through five stages:
//!
//! 1. **Convert** - Markdown source becomes a typed document tree
//! 2. **Resolve** - the service base URL becomes a collab websocket address
//! 3. **Synchronize** - the session connects, authenticates, and reconciles
//!    the local replica with server-held state
//! 4. **Replace** - the root fragment is cleared and the new tree merged in,
//!    inside a single transaction
//! 5. **Detach** - the caller resolves immediately; the session lingers for
//!    a propagation grace period, then closes unconditionally
//!
//! ## Key Guarantees
//!
//! - **At-most-one replace** per session, even against a faulty transport
//! - **No early mutation**: writes before synchronization are refused
//! - **Exactly one terminal close** on every exit path; double-close is a
//!   no-op
//! - **Exactly-once outcome**: the caller's future resolves or rejects once;
//!   background teardown failures are logged, never surfaced
//!
//! ## Client Usage
//!
//! ```ignore
//! use pagesync::{ClientConfig, CollabClient};
//!
//! #[tokio::main]
//! async fn main() -> pagesync::Result<()> {
//!     let client = CollabClient::with_config(ClientConfig {
//!         visibility_deadline_ms: 10_000,
//!         ..Default::default()
//!     });
//!
//!     let token = client
//!         .collab_token("https://wiki.example.com/api", "api-key")
//!         .await?;
//!     client
//!         .update_page_content("42", "# Title\n\nBody text.", &token,
//!                              "https://wiki.example.com/api")
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[client]** - facade, session, atomic replace, endpoint and credential
//!   helpers
//! - **[convert]** - Markdown to document tree conversion
//! - **[protocol]** - lib0 codec and wire frame model
//! - **[config]** - tunable deadlines, room naming, and mount path
//! - **[error]** - error types and result handling

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod protocol;

pub use client::{CollabClient, CollabSession, SessionEvent, SessionState};
pub use config::ClientConfig;
pub use convert::{DocumentTree, MarkdownConverter};
pub use error::{Error, Result};
