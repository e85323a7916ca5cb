//! Collaboration wire protocol: lib0 codec and frame model.
//!
//! The collaboration server multiplexes documents over a single websocket
//! endpoint, so every binary frame opens with the room name it addresses,
//! followed by a message type tag and a type-specific payload. This module
//! owns that framing; the session layer in [`crate::client`] decides what to
//! do with each decoded message.
//!
//! # Frame layout
//!
//! ```text
//! frame = varString(roomName) • varUint(messageType) • payload
//!
//! messageType:
//!   0 = Sync        (Yjs sync sub-protocol: step 1, step 2, update)
//!   1 = Awareness   (presence; ignored)
//!   2 = Auth        (bearer token / denied / authenticated)
//!   3 = QueryAwareness (ignored)
//!   5 = Stateless   (ignored)
//!   8 = SyncStatus  (ignored)
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Reader`] | Cursor decoding lib0 primitives from a frame |
//! | [`Frame`] | A decoded frame: room name plus message |
//! | [`Incoming`] | The message variants a peer can send |
//!
//! # Examples
//!
//! ```
//! use pagesync::protocol::{decode_frame, encode_update, Incoming};
//!
//! let frame = encode_update("page.42", &[1, 2, 3]);
//! let decoded = decode_frame(&frame).unwrap();
//! assert_eq!(decoded.room, "page.42");
//! assert!(matches!(decoded.message, Incoming::Update(_)));
//! ```

mod codec;
mod message;

pub use codec::{write_var_bytes, write_var_string, write_var_uint, Reader};
pub use message::{
    constants, decode_frame, encode_auth, encode_authenticated, encode_permission_denied,
    encode_sync_step1, encode_sync_step2, encode_update, Frame, Incoming,
};
