//! Duplex WebSocket channel for streaming synthesis and recognition.
//!
//! Inbound frames are dispatched to a [`ChannelHandler`] from a single reader
//! task, in arrival order. Outbound frames go through a bounded queue drained
//! by a writer task.
//!
//! Lifecycle:
//!
//! ```text
//! Disconnected -> Connecting -> Open -> Streaming -> Closing -> Closed
//!                     \___________\________\___________\-----> Error
//! ```
//!
//! `Closed` and `Error` are terminal. `on_open` and `on_close` fire at most
//! once each. After [`StreamingChannel::cancel`] no callback starts.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use http::HeaderMap;
use serde::Serialize;
use serde_json::json;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message, client::IntoClientRequest},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use url::Url;

use crate::error::{Error, Result};

const WRITE_QUEUE: usize = 64;

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    /// At least one inbound frame has been delivered.
    Streaming,
    /// A close frame was sent; waiting for the peer.
    Closing,
    Closed,
    Error,
}

impl ChannelState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Error)
    }

    /// Returns true while frames may still be written.
    pub fn is_writable(&self) -> bool {
        matches!(self, ChannelState::Open | ChannelState::Streaming)
    }
}

/// Receives channel events.
///
/// Callbacks run on the reader task and must not block for long.
pub trait ChannelHandler: Send + Sync + 'static {
    fn on_open(&self) {}

    /// A binary frame, typically an audio chunk.
    fn on_message(&self, data: Bytes);

    /// A text frame, typically a JSON status or result document.
    fn on_text(&self, _text: &str) {}

    fn on_error(&self, _error: &Error) {}

    fn on_close(&self) {}
}

/// Shared state cell. Terminal states are sticky.
///
/// Watchers are notified only after the callback tied to a transition has
/// returned, so [`StreamingChannel::wait`] never observes a terminal state
/// before `on_close` / `on_error` ran.
///
/// `dispatch` is held while a handler callback runs and while the channel
/// is torn down, so a cancel from another thread waits for the callback in
/// flight and no callback starts after it. It is reentrant so a callback
/// may cancel its own channel.
struct StateCell {
    current: Mutex<ChannelState>,
    notify: watch::Sender<ChannelState>,
    dispatch: ReentrantMutex<()>,
}

impl StateCell {
    fn new(initial: ChannelState) -> Arc<Self> {
        let (notify, _) = watch::channel(initial);
        Arc::new(Self {
            current: Mutex::new(initial),
            notify,
            dispatch: ReentrantMutex::new(()),
        })
    }

    fn get(&self) -> ChannelState {
        *self.current.lock()
    }

    /// Moves to `to` unless already terminal, runs `then` if the state
    /// changed, and notifies watchers. Returns whether the state changed.
    fn transition_then(&self, to: ChannelState, then: impl FnOnce()) -> bool {
        let changed = {
            let mut current = self.current.lock();
            if current.is_terminal() || *current == to {
                false
            } else {
                *current = to;
                true
            }
        };
        if changed {
            then();
            self.notify.send_replace(self.get());
        }
        changed
    }

    fn transition(&self, to: ChannelState) -> bool {
        self.transition_then(to, || {})
    }

    /// Moves from `from` to `to` only if the state is still `from`.
    fn advance(&self, from: ChannelState, to: ChannelState) -> bool {
        let changed = {
            let mut current = self.current.lock();
            if *current == from {
                *current = to;
                true
            } else {
                false
            }
        };
        if changed {
            self.notify.send_replace(to);
        }
        changed
    }
}

/// A connected duplex channel.
pub struct StreamingChannel {
    tx: mpsc::Sender<Message>,
    state: Arc<StateCell>,
    cancel: CancellationToken,
}

/// Cloneable handle that tears down a channel from any thread.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<StateCell>,
    cancel: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        teardown(&self.state, &self.cancel);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

fn teardown(state: &StateCell, cancel: &CancellationToken) {
    cancel.cancel();
    let _dispatch = state.dispatch.lock();
    if state.transition(ChannelState::Closed) {
        debug!("streaming channel cancelled");
    }
}

impl StreamingChannel {
    /// Opens a WebSocket to `url`, sending `headers` with the handshake.
    ///
    /// `on_open` fires before this returns; inbound frames are delivered
    /// from then on.
    pub async fn connect(
        url: &Url,
        headers: &HeaderMap,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<Self> {
        let state = StateCell::new(ChannelState::Connecting);

        let mut request = url.as_str().into_client_request()?;
        for (name, value) in headers {
            request.headers_mut().insert(name.clone(), value.clone());
        }

        debug!(%url, "connecting streaming channel");

        let ws = match connect_async(request).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                state.transition(ChannelState::Error);
                error!(error = %e, "streaming channel handshake failed");
                return Err(e.into());
            }
        };

        Ok(Self::start(ws, handler, state))
    }

    fn start<S>(ws: S, handler: Arc<dyn ChannelHandler>, state: Arc<StateCell>) -> Self
    where
        S: Stream<Item = tungstenite::Result<Message>>
            + Sink<Message, Error = tungstenite::Error>
            + Send
            + Unpin
            + 'static,
    {
        let (write, read) = ws.split();
        let (tx, rx) = mpsc::channel(WRITE_QUEUE);
        let cancel = CancellationToken::new();

        state.transition_then(ChannelState::Open, || handler.on_open());

        tokio::spawn(write_loop(
            write,
            rx,
            handler.clone(),
            state.clone(),
            cancel.clone(),
        ));
        tokio::spawn(read_loop(read, handler, state.clone(), cancel.clone()));

        Self { tx, state, cancel }
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.state.get()
    }

    /// Queues a text frame.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        let text: String = text.into();
        self.send(Message::Text(text.into())).await
    }

    /// Queues a JSON document as a text frame.
    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        self.send_text(serde_json::to_string(value)?).await
    }

    /// Queues a binary frame.
    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send(Message::Binary(data.into())).await
    }

    async fn send(&self, message: Message) -> Result<()> {
        if !self.state().is_writable() {
            return Err(Error::ChannelClosed);
        }
        self.tx.send(message).await.map_err(|_| Error::ChannelClosed)
    }

    /// Starts a graceful close. `on_close` fires when the peer completes it.
    pub async fn close(&self) -> Result<()> {
        if self.state().is_terminal() || !self.state.transition(ChannelState::Closing) {
            return Ok(());
        }
        self.tx
            .send(Message::Close(None))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Tears down the channel immediately. Pending inbound frames are
    /// discarded and no further callbacks fire. Safe from any thread.
    pub fn cancel(&self) {
        teardown(&self.state, &self.cancel);
    }

    /// Returns a handle that can cancel this channel from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            state: self.state.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Waits until the channel reaches a terminal state.
    pub async fn wait(&self) -> ChannelState {
        let mut rx = self.state.notify.subscribe();
        match rx.wait_for(ChannelState::is_terminal).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }
}

impl Drop for StreamingChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn write_loop<W>(
    mut write: W,
    mut rx: mpsc::Receiver<Message>,
    handler: Arc<dyn ChannelHandler>,
    state: Arc<StateCell>,
    cancel: CancellationToken,
) where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = rx.recv() => message,
        };
        let Some(message) = message else { break };
        let closing = matches!(message, Message::Close(_));

        if let Err(e) = write.send(message).await {
            error!(error = %e, "streaming channel write failed");
            write_failed(&*handler, &state, &cancel, Error::WebSocket(e));
            break;
        }
        if closing {
            break;
        }
    }
}

async fn read_loop<R>(
    mut read: R,
    handler: Arc<dyn ChannelHandler>,
    state: Arc<StateCell>,
    cancel: CancellationToken,
) where
    R: Stream<Item = tungstenite::Result<Message>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = read.next() => next,
        };
        if !dispatch(next, &*handler, &state, &cancel) {
            break;
        }
    }

    cancel.cancel();
}

/// Delivers one inbound item to the handler. Returns false once the reader
/// should stop.
fn dispatch(
    next: Option<tungstenite::Result<Message>>,
    handler: &dyn ChannelHandler,
    state: &StateCell,
    cancel: &CancellationToken,
) -> bool {
    let _dispatch = state.dispatch.lock();
    if cancel.is_cancelled() {
        return false;
    }

    match next {
        Some(Ok(Message::Binary(data))) => {
            state.advance(ChannelState::Open, ChannelState::Streaming);
            handler.on_message(data);
            true
        }
        Some(Ok(Message::Text(text))) => {
            if let Some(message) = error_frame(text.as_str()) {
                warn!(%message, "streaming channel reported error");
                fail(handler, state, Error::Stream(message));
                return false;
            }
            state.advance(ChannelState::Open, ChannelState::Streaming);
            handler.on_text(text.as_str());
            true
        }
        Some(Ok(Message::Close(frame))) => {
            debug!(?frame, "streaming channel closed by peer");
            state.transition_then(ChannelState::Closed, || handler.on_close());
            false
        }
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            error!(error = %e, "streaming channel read failed");
            fail(handler, state, Error::WebSocket(e));
            false
        }
        None => {
            debug!("streaming channel ended");
            state.transition_then(ChannelState::Closed, || handler.on_close());
            false
        }
    }
}

/// Reports a failed write and stops the reader.
fn write_failed(
    handler: &dyn ChannelHandler,
    state: &StateCell,
    cancel: &CancellationToken,
    err: Error,
) {
    {
        let _dispatch = state.dispatch.lock();
        if !cancel.is_cancelled() {
            fail(handler, state, err);
        }
    }
    cancel.cancel();
}

fn fail(handler: &dyn ChannelHandler, state: &StateCell, err: Error) {
    state.transition_then(ChannelState::Error, || handler.on_error(&err));
}

/// Extracts the message from a `{"error": "..."}` text frame.
fn error_frame(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value.get("error")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// First frame of a streaming synthesis session.
pub fn synthesize_message(text: &str, accept: &str) -> serde_json::Value {
    json!({ "text": text, "accept": accept })
}

/// Opens a streaming recognition turn.
pub fn recognize_start(content_type: &str, interim_results: bool) -> serde_json::Value {
    json!({
        "action": "start",
        "content-type": content_type,
        "interim_results": interim_results,
    })
}

/// Ends the current recognition turn; the service flushes final results.
pub fn recognize_stop() -> serde_json::Value {
    json!({ "action": "stop" })
}
