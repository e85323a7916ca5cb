//! Synchronized document session.
//!
//! A [`CollabSession`] owns one live websocket connection to a named
//! document room and drives the connect → authenticate → synchronize
//! handshake. Handshake progress is communicated through [`SessionEvent`]s
//! delivered over an mpsc channel rather than callbacks; the state machine
//! itself lives in `SessionDriver`, a plain struct that can be exercised in
//! tests without a socket.
//!
//! # Lifecycle
//!
//! 1. [`CollabSession::open`] connects, sends the bearer token and the local
//!    state vector, and spawns a reader and a writer task.
//! 2. The server answers with sync step 2; the first one marks the session
//!    [`SessionState::Synchronized`] and emits
//!    [`SessionEvent::Synchronized`] exactly once.
//! 3. Local transactions are forwarded to the server through a document
//!    update observer; remote updates are applied under a dedicated
//!    transaction origin so they are never echoed back.
//! 4. [`CollabSession::close`] is idempotent and safe from any state;
//!    dropping the session aborts the background tasks.
//!
//! # Ordering guarantees
//!
//! [`SessionEvent::Synchronized`] never fires before
//! [`SessionEvent::Connected`], and [`SessionEvent::AuthFailed`] is terminal
//! and mutually exclusive with it for a given connection attempt.
//!
//! # Mutation contract
//!
//! The shared document must not be mutated before the session has
//! synchronized: the local replica has not reconciled with server-held
//! state yet, and early writes could be silently overwritten or produce a
//! divergent merge. [`CollabSession::replace_content`] enforces this and
//! refuses with an error.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};
use uuid::Uuid;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, Origin, ReadTxn, StateVector, Transact, Update};

use crate::convert::DocumentTree;
use crate::error::{Error, Result};
use crate::protocol::{self, Incoming};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Shared handle to the session's replicated document.
pub(crate) type SharedDoc = Arc<Mutex<Doc>>;

/// Transaction origin tag for updates received from the server.
///
/// The update observer skips transactions carrying this origin so remote
/// changes are not reflected back over the wire.
fn remote_origin() -> Origin {
    Origin::from("remote-sync")
}

/// Handshake state of a collaboration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Websocket established, credential not yet accepted.
    Connecting,
    /// Credential and state vector sent, waiting for the server.
    Authenticating,
    /// Local replica reconciled with server-held state; mutations are safe.
    Synchronized,
    /// The server denied the credential. Terminal.
    AuthFailed,
    /// The session was closed, locally or by the server.
    Closed,
}

/// Events emitted by a session as the handshake and connection progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The websocket connection is established.
    Connected,
    /// The connection dropped abruptly before a clean close.
    Disconnected,
    /// The connection closed cleanly.
    Closed,
    /// The handshake completed; the shared document may be mutated.
    Synchronized,
    /// The server denied the session credential (with its reason).
    AuthFailed(String),
}

/// Outcome of feeding one frame to the session driver.
struct DriverStep {
    events: Vec<SessionEvent>,
    /// A terminal step ends the read loop; no further frames are processed.
    terminal: bool,
}

impl DriverStep {
    fn none() -> Self {
        DriverStep {
            events: Vec::new(),
            terminal: false,
        }
    }

    fn emit(event: SessionEvent) -> Self {
        DriverStep {
            events: vec![event],
            terminal: false,
        }
    }
}

/// Explicit finite-state machine over inbound frames.
///
/// One state variable, transitions triggered by decoded messages. Pure
/// enough to be tested by feeding frames directly.
struct SessionDriver {
    room: String,
    doc: SharedDoc,
    outbound: mpsc::UnboundedSender<Message>,
    state: SessionState,
    synced: bool,
}

impl SessionDriver {
    fn new(room: String, doc: SharedDoc, outbound: mpsc::UnboundedSender<Message>) -> Self {
        SessionDriver {
            room,
            doc,
            outbound,
            state: SessionState::Authenticating,
            synced: false,
        }
    }

    fn state(&self) -> SessionState {
        self.state
    }

    fn on_frame(&mut self, data: &[u8]) -> Result<DriverStep> {
        let frame = protocol::decode_frame(data)?;
        if frame.room != self.room {
            trace!(room = %frame.room, "ignoring frame for foreign room");
            return Ok(DriverStep::none());
        }

        match frame.message {
            Incoming::SyncStep1(sv) => {
                let sv = StateVector::decode_v1(&sv)
                    .map_err(|e| Error::Protocol(format!("bad state vector: {}", e)))?;
                let update = {
                    let doc = self.doc.lock();
                    let txn = doc.transact();
                    txn.encode_state_as_update_v1(&sv)
                };
                let reply = protocol::encode_sync_step2(&self.room, &update);
                let _ = self.outbound.send(Message::Binary(reply));
                Ok(DriverStep::none())
            }
            Incoming::SyncStep2(update) => {
                self.apply_remote(&update)?;
                if !self.synced {
                    self.synced = true;
                    self.state = SessionState::Synchronized;
                    debug!(room = %self.room, "session synchronized");
                    return Ok(DriverStep::emit(SessionEvent::Synchronized));
                }
                Ok(DriverStep::none())
            }
            Incoming::Update(update) => {
                self.apply_remote(&update)?;
                Ok(DriverStep::none())
            }
            Incoming::PermissionDenied(reason) => {
                self.state = SessionState::AuthFailed;
                warn!(room = %self.room, %reason, "authentication failed");
                Ok(DriverStep {
                    events: vec![SessionEvent::AuthFailed(reason)],
                    terminal: true,
                })
            }
            Incoming::Authenticated(scope) => {
                debug!(room = %self.room, %scope, "authenticated");
                Ok(DriverStep::none())
            }
            Incoming::Token(_) => {
                trace!("ignoring client-side auth frame");
                Ok(DriverStep::none())
            }
            Incoming::Ignored(message_type) => {
                trace!(message_type, "ignoring message");
                Ok(DriverStep::none())
            }
        }
    }

    /// Apply a remote update inside a transaction tagged with the remote
    /// origin, so the local update observer does not echo it back.
    fn apply_remote(&self, update: &[u8]) -> Result<()> {
        let update = Update::decode_v1(update)
            .map_err(|e| Error::Protocol(format!("undecodable update: {}", e)))?;
        let doc = self.doc.lock();
        let mut txn = doc.transact_mut_with(remote_origin());
        txn.apply_update(update)
            .map_err(|e| Error::Protocol(format!("update apply failed: {}", e)))
    }
}

/// A live synchronized-document session against one collaboration room.
///
/// Created with [`CollabSession::open`]; progress arrives via
/// [`CollabSession::next_event`] (or the [`Stream`] impl). Exactly one
/// session exists per replace invocation; the shared document is owned by
/// the session for its lifetime and discarded on close.
pub struct CollabSession {
    id: Uuid,
    room: String,
    doc: SharedDoc,
    events: mpsc::Receiver<SessionEvent>,
    state_rx: watch::Receiver<SessionState>,
    state_tx: Arc<watch::Sender<SessionState>>,
    outbound: mpsc::UnboundedSender<Message>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CollabSession {
    /// Open a session: connect the websocket, present the credential, and
    /// start synchronizing.
    ///
    /// Returns as soon as the connection is up and the handshake frames are
    /// on the wire; completion is reported through events, not the return
    /// value.
    pub async fn open(url: &str, room: &str, token: &str) -> Result<CollabSession> {
        let (ws, _response) = connect_async(url).await?;
        let id = Uuid::new_v4();
        debug!(session = %id, %url, room, "websocket connected");

        let (mut sink, stream) = ws.split();
        let doc: SharedDoc = Arc::new(Mutex::new(Doc::new()));
        let (event_tx, events) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let state_tx = Arc::new(state_tx);
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<Message>();

        // Forward local transactions (the replace) to the server. Remote
        // applications are filtered out by their transaction origin. The
        // subscription guard is leaked on purpose: the observer must stay
        // registered for the document's whole lifetime, and the guard type
        // is not `Send`, so holding it in the session handle would prevent
        // the handle from moving onto a spawned task.
        {
            let update_tx = outbound.clone();
            let update_room = room.to_string();
            let guard = doc.lock();
            let sub = guard
                .observe_update_v1(move |txn, event| {
                    if txn.origin() == Some(&remote_origin()) {
                        return;
                    }
                    let frame = protocol::encode_update(&update_room, &event.update);
                    let _ = update_tx.send(Message::Binary(frame));
                })
                .map_err(|e| {
                    Error::Protocol(format!("update observer registration failed: {}", e))
                })?;
            std::mem::forget(sub);
        }

        let _ = event_tx.send(SessionEvent::Connected).await;

        // Handshake: credential first, then our state vector.
        if !token.is_empty() {
            sink.send(Message::Binary(protocol::encode_auth(room, token)))
                .await?;
        }
        let state_vector = {
            let doc = doc.lock();
            let txn = doc.transact();
            txn.state_vector().encode_v1()
        };
        sink.send(Message::Binary(protocol::encode_sync_step1(
            room,
            &state_vector,
        )))
        .await?;
        state_tx.send_replace(SessionState::Authenticating);

        let writer = tokio::spawn(run_writer(sink, outbound_rx));
        let driver = SessionDriver::new(room.to_string(), doc.clone(), outbound.clone());
        let reader = tokio::spawn(run_reader(stream, driver, event_tx, state_tx.clone()));

        Ok(CollabSession {
            id,
            room: room.to_string(),
            doc,
            events,
            state_rx,
            state_tx,
            outbound,
            closed: Arc::new(AtomicBool::new(false)),
            reader,
            writer,
        })
    }

    /// Room this session is attached to.
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Current handshake state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Receive the next session event. Returns `None` once the connection
    /// tasks have ended and all pending events were consumed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Atomically replace the shared document's entire root content with
    /// the given tree.
    ///
    /// Refuses with a protocol error if the session has not synchronized:
    /// mutating the replica before reconciliation is a protocol violation.
    /// The resulting update is forwarded to the server by the session's
    /// update observer.
    pub fn replace_content(&self, fragment: &str, tree: &DocumentTree) -> Result<()> {
        if self.state() != SessionState::Synchronized {
            return Err(Error::Protocol(
                "shared document mutated before synchronization".to_string(),
            ));
        }
        let doc = self.doc.lock();
        crate::client::replace::replace_root_content(&doc, fragment, tree)
    }

    /// Close the session.
    ///
    /// Idempotent and safe from any state, including before any event has
    /// fired. Repeated calls are no-ops.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(session = %self.id, room = %self.room, "closing collaboration session");
        let _ = self.outbound.send(Message::Close(None));
        self.state_tx.send_replace(SessionState::Closed);
        // Yield once so the writer gets a chance to flush the close frame.
        tokio::task::yield_now().await;
        Ok(())
    }
}

impl Stream for CollabSession {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for CollabSession {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.reader.abort();
        self.writer.abort();
    }
}

/// Forward queued frames to the websocket until the channel or the sink
/// closes.
async fn run_writer(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!("websocket write failed: {}", e);
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Read frames, drive the handshake state machine, and publish its events.
async fn run_reader(
    mut stream: SplitStream<WsStream>,
    mut driver: SessionDriver,
    events: mpsc::Sender<SessionEvent>,
    state: Arc<watch::Sender<SessionState>>,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(data)) => match driver.on_frame(&data) {
                Ok(step) => {
                    state.send_replace(driver.state());
                    for event in step.events {
                        if events.send(event).await.is_err() {
                            return;
                        }
                    }
                    if step.terminal {
                        return;
                    }
                }
                Err(e) => {
                    warn!("dropping session after protocol error: {}", e);
                    let _ = events.send(SessionEvent::Disconnected).await;
                    return;
                }
            },
            Ok(Message::Close(_)) => {
                state.send_replace(SessionState::Closed);
                let _ = events.send(SessionEvent::Closed).await;
                return;
            }
            // Pings are answered by the transport; text frames are not part
            // of the protocol.
            Ok(_) => {}
            Err(e) => {
                debug!("websocket read failed: {}", e);
                let _ = events.send(SessionEvent::Disconnected).await;
                return;
            }
        }
    }
    let _ = events.send(SessionEvent::Closed).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use yrs::GetString;
    use yrs::XmlFragment;

    fn driver() -> (SessionDriver, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let doc: SharedDoc = Arc::new(Mutex::new(Doc::new()));
        (SessionDriver::new("page.42".to_string(), doc, tx), rx)
    }

    /// Encode another replica's content as a sync-step-2 frame.
    fn step2_with_content(room: &str, text: &str) -> Vec<u8> {
        let remote = Doc::new();
        let fragment = remote.get_or_insert_xml_fragment("default");
        {
            let mut txn = remote.transact_mut();
            let paragraph = fragment.insert(&mut txn, 0, yrs::XmlElementPrelim::empty("paragraph"));
            paragraph.insert(&mut txn, 0, yrs::XmlTextPrelim::new(text));
        }
        let update = remote
            .transact()
            .encode_state_as_update_v1(&StateVector::default());
        protocol::encode_sync_step2(room, &update)
    }

    #[test]
    fn test_synchronized_fires_once() {
        let (mut driver, _rx) = driver();

        let step = driver.on_frame(&step2_with_content("page.42", "hello")).unwrap();
        assert_eq!(step.events, vec![SessionEvent::Synchronized]);
        assert_eq!(driver.state(), SessionState::Synchronized);

        // A faulty transport may deliver sync step 2 twice; the event must
        // not repeat.
        let step = driver.on_frame(&step2_with_content("page.42", "again")).unwrap();
        assert!(step.events.is_empty());
        assert!(!step.terminal);
    }

    #[test]
    fn test_remote_content_is_applied() {
        let (mut driver, _rx) = driver();
        driver
            .on_frame(&step2_with_content("page.42", "from server"))
            .unwrap();

        let doc = driver.doc.lock();
        let fragment = doc.get_or_insert_xml_fragment("default");
        let txn = doc.transact();
        assert!(fragment.get_string(&txn).contains("from server"));
    }

    #[test]
    fn test_auth_failure_is_terminal() {
        let (mut driver, _rx) = driver();
        let frame = protocol::encode_permission_denied("page.42", "invalid token");
        let step = driver.on_frame(&frame).unwrap();
        assert_eq!(
            step.events,
            vec![SessionEvent::AuthFailed("invalid token".to_string())]
        );
        assert!(step.terminal);
        assert_eq!(driver.state(), SessionState::AuthFailed);
    }

    #[test]
    fn test_sync_step1_gets_a_reply() {
        let (mut driver, mut rx) = driver();
        let sv = StateVector::default().encode_v1();
        let step = driver
            .on_frame(&protocol::encode_sync_step1("page.42", &sv))
            .unwrap();
        assert!(step.events.is_empty());

        let reply = rx.try_recv().expect("expected a sync step 2 reply");
        let Message::Binary(data) = reply else {
            panic!("expected binary frame");
        };
        let frame = protocol::decode_frame(&data).unwrap();
        assert!(matches!(frame.message, Incoming::SyncStep2(_)));
    }

    #[test]
    fn test_foreign_room_is_ignored() {
        let (mut driver, _rx) = driver();
        let step = driver
            .on_frame(&step2_with_content("page.99", "elsewhere"))
            .unwrap();
        assert!(step.events.is_empty());
        assert_eq!(driver.state(), SessionState::Authenticating);
    }

    #[test]
    fn test_session_handle_is_send() {
        // The session must move onto spawned tasks (the background close
        // after the propagation grace period runs on one).
        fn assert_send<T: Send>() {}
        assert_send::<CollabSession>();
    }

    #[test]
    fn test_garbage_frame_errors() {
        let (mut driver, _rx) = driver();
        assert!(driver.on_frame(&[0xff, 0xff, 0xff]).is_err());
    }
}
