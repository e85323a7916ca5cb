//! Frame model for the collaboration wire protocol.
//!
//! Every websocket frame is scoped to one room and carries one message:
//!
//! ```text
//! frame = varString(roomName) • varUint(messageType) • payload
//! ```
//!
//! The sync category wraps the Yjs synchronization sub-protocol:
//!
//! ```text
//! sync payload = varUint(syncType) • varUint8Array(data)
//!
//! syncType:
//!   0 = SyncStep1  (sender's state vector)
//!   1 = SyncStep2  (missing updates relative to a received state vector)
//!   2 = Update     (incremental update)
//! ```
//!
//! Authentication runs over its own category: the client sends its bearer
//! token once after connecting; the server answers with either a permission
//! denial (terminal) or an authenticated notice carrying the granted scope.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::codec::{write_var_bytes, write_var_string, write_var_uint, Reader};

/// Top-level message type tags.
pub mod constants {
    /// Yjs synchronization sub-protocol.
    pub const MESSAGE_SYNC: u64 = 0;
    /// User presence updates (ignored by this client).
    pub const MESSAGE_AWARENESS: u64 = 1;
    /// Bearer-token authentication.
    pub const MESSAGE_AUTH: u64 = 2;
    /// Awareness state query (ignored by this client).
    pub const MESSAGE_QUERY_AWARENESS: u64 = 3;
    /// Application-defined stateless messages (ignored by this client).
    pub const MESSAGE_STATELESS: u64 = 5;
    /// Server-side sync status notices (ignored by this client).
    pub const MESSAGE_SYNC_STATUS: u64 = 8;

    /// Sync sub-type: state vector announcement.
    pub const SYNC_STEP_1: u64 = 0;
    /// Sync sub-type: reply with missing updates.
    pub const SYNC_STEP_2: u64 = 1;
    /// Sync sub-type: incremental update.
    pub const SYNC_UPDATE: u64 = 2;

    /// Auth sub-type: client presents a bearer token.
    pub const AUTH_TOKEN: u64 = 0;
    /// Auth sub-type: server denies access.
    pub const AUTH_PERMISSION_DENIED: u64 = 1;
    /// Auth sub-type: server grants access.
    pub const AUTH_AUTHENTICATED: u64 = 2;
}

/// A decoded server-to-client message, already stripped of its room scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// The server announced its state vector; reply with a [`SyncStep2`]
    /// containing everything it is missing.
    ///
    /// [`SyncStep2`]: encode_sync_step2
    SyncStep1(Bytes),
    /// The server sent the updates our state vector was missing.
    SyncStep2(Bytes),
    /// An incremental update from another collaborator.
    Update(Bytes),
    /// A client presented its bearer token (seen only when acting as the
    /// server side, e.g. in tests).
    Token(String),
    /// The credential was rejected; the session is dead.
    PermissionDenied(String),
    /// The credential was accepted with the given scope.
    Authenticated(String),
    /// A message type this client does not act on (awareness, stateless,
    /// sync status, or anything unknown).
    Ignored(u64),
}

/// A decoded frame: the room it addresses plus its message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Room name the message is scoped to.
    pub room: String,
    /// The message itself.
    pub message: Incoming,
}

/// Decode one binary websocket frame.
///
/// Unknown message types decode to [`Incoming::Ignored`] rather than an
/// error so that protocol extensions never kill a live session.
pub fn decode_frame(data: &[u8]) -> Result<Frame> {
    let mut reader = Reader::new(data);
    let room = reader.read_var_string()?;
    let message_type = reader.read_var_uint()?;

    let message = match message_type {
        constants::MESSAGE_SYNC => {
            let sync_type = reader.read_var_uint()?;
            let payload = Bytes::copy_from_slice(reader.read_var_bytes()?);
            match sync_type {
                constants::SYNC_STEP_1 => Incoming::SyncStep1(payload),
                constants::SYNC_STEP_2 => Incoming::SyncStep2(payload),
                constants::SYNC_UPDATE => Incoming::Update(payload),
                other => {
                    return Err(Error::Protocol(format!(
                        "unknown sync message type {}",
                        other
                    )))
                }
            }
        }
        constants::MESSAGE_AUTH => {
            let auth_type = reader.read_var_uint()?;
            let detail = reader.read_var_string()?;
            match auth_type {
                constants::AUTH_TOKEN => Incoming::Token(detail),
                constants::AUTH_PERMISSION_DENIED => Incoming::PermissionDenied(detail),
                constants::AUTH_AUTHENTICATED => Incoming::Authenticated(detail),
                other => {
                    return Err(Error::Protocol(format!(
                        "unknown auth message type {}",
                        other
                    )))
                }
            }
        }
        other => Incoming::Ignored(other),
    };

    Ok(Frame { room, message })
}

fn frame_header(room: &str, message_type: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(room.len() + 8);
    write_var_string(&mut buf, room);
    write_var_uint(&mut buf, message_type);
    buf
}

/// Encode a client authentication frame carrying a bearer token.
pub fn encode_auth(room: &str, token: &str) -> Vec<u8> {
    let mut buf = frame_header(room, constants::MESSAGE_AUTH);
    write_var_uint(&mut buf, constants::AUTH_TOKEN);
    write_var_string(&mut buf, token);
    buf
}

/// Encode a sync-step-1 frame announcing the local state vector.
pub fn encode_sync_step1(room: &str, state_vector: &[u8]) -> Vec<u8> {
    encode_sync(room, constants::SYNC_STEP_1, state_vector)
}

/// Encode a sync-step-2 frame replying with missing updates.
pub fn encode_sync_step2(room: &str, update: &[u8]) -> Vec<u8> {
    encode_sync(room, constants::SYNC_STEP_2, update)
}

/// Encode an incremental update frame.
pub fn encode_update(room: &str, update: &[u8]) -> Vec<u8> {
    encode_sync(room, constants::SYNC_UPDATE, update)
}

fn encode_sync(room: &str, sync_type: u64, payload: &[u8]) -> Vec<u8> {
    let mut buf = frame_header(room, constants::MESSAGE_SYNC);
    write_var_uint(&mut buf, sync_type);
    write_var_bytes(&mut buf, payload);
    buf
}

/// Encode a server permission-denied frame.
///
/// Only the test harness acts as a server, but keeping both directions next
/// to each other keeps the dialect in one place.
pub fn encode_permission_denied(room: &str, reason: &str) -> Vec<u8> {
    let mut buf = frame_header(room, constants::MESSAGE_AUTH);
    write_var_uint(&mut buf, constants::AUTH_PERMISSION_DENIED);
    write_var_string(&mut buf, reason);
    buf
}

/// Encode a server authenticated frame.
pub fn encode_authenticated(room: &str, scope: &str) -> Vec<u8> {
    let mut buf = frame_header(room, constants::MESSAGE_AUTH);
    write_var_uint(&mut buf, constants::AUTH_AUTHENTICATED);
    write_var_string(&mut buf, scope);
    buf
}
