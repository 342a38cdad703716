//! Request/response correlation over a [`Channel`].
//!
//! A [`Transport`] encodes payloads into envelopes, runs a reader task for
//! the inbound side and pairs RPC responses with the requests waiting for
//! them. Every request completes exactly once: with its correlated
//! response, or with [`TransportError::Disconnected`] when the connection
//! goes away first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tasksync_types::{Payload, PayloadRegistry, RequestId, SyncError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{Channel, TransportError};

type Completion = oneshot::Sender<Result<Payload, TransportError>>;
type PendingTable = DashMap<RequestId, PendingRequest>;

/// A request waiting for its response on one connection.
struct PendingRequest {
    connection: u64,
    completion: Completion,
}

/// Connection lifecycle and pushed payloads, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel connected and the reader is running.
    Connected,
    /// The authority pushed a payload that answers no pending request.
    Received(Payload),
    /// The channel closed; every pending request has been failed.
    Disconnected,
}

/// RPC layer over a channel.
pub struct Transport<C: Channel> {
    channel: Arc<C>,
    registry: Arc<PayloadRegistry>,
    pending: Arc<PendingTable>,
    /// Incremented per connect; a reader only fails its own requests.
    connection: AtomicU64,
}

impl<C: Channel> Transport<C> {
    /// Create a transport over `channel`, decoding with `registry`.
    pub fn new(channel: C, registry: PayloadRegistry) -> Self {
        Self {
            channel: Arc::new(channel),
            registry: Arc::new(registry),
            pending: Arc::new(DashMap::new()),
            connection: AtomicU64::new(0),
        }
    }

    /// The underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Check if the channel is connected.
    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Connect the channel and start the reader task.
    ///
    /// The returned receiver yields `Connected` first, then pushed
    /// payloads, then `Disconnected` once the channel closes.
    pub async fn connect(
        &self,
        address: &str,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, TransportError> {
        if self.channel.is_connected() {
            return Err(TransportError::ConnectionFailed(
                "already connected".to_string(),
            ));
        }
        self.channel.connect(address).await?;
        let connection = self.connection.fetch_add(1, Ordering::SeqCst) + 1;
        info!(address, connection, "Transport connected");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let _ = events_tx.send(TransportEvent::Connected);

        let channel = Arc::clone(&self.channel);
        let registry = Arc::clone(&self.registry);
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            loop {
                match channel.recv().await {
                    Ok(bytes) => dispatch(&registry, &pending, &events_tx, &bytes),
                    Err(e) => {
                        debug!(error = %e, "Transport reader stopped");
                        break;
                    }
                }
            }
            fail_pending(&pending, Some(connection));
            let _ = events_tx.send(TransportEvent::Disconnected);
        });

        Ok(events_rx)
    }

    /// Send a payload without waiting for an answer.
    pub async fn send(&self, payload: &Payload) -> Result<(), TransportError> {
        if !self.channel.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let bytes = self.registry.encode(payload)?;
        self.channel.send(&bytes).await
    }

    /// Send an RPC payload and wait for its correlated response.
    ///
    /// Resolves with [`TransportError::Disconnected`] if the connection
    /// drops (or [`close`](Self::close) is called) first.
    pub async fn request(&self, payload: Payload) -> Result<Payload, TransportError> {
        let id = payload.request_id().ok_or_else(|| {
            TransportError::Codec(SyncError::InvalidData(format!(
                "{} carries no request identifier",
                payload.tag()
            )))
        })?;
        if !self.channel.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let bytes = self.registry.encode(&payload)?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingRequest {
                connection: self.connection.load(Ordering::SeqCst),
                completion: tx,
            },
        );

        if let Err(e) = self.channel.send(&bytes).await {
            self.pending.remove(&id);
            return Err(e);
        }
        debug!(request = %id, tag = payload.tag(), "Request sent");

        match rx.await {
            Ok(result) => result,
            // Sender dropped without completing
            Err(_) => Err(TransportError::Disconnected),
        }
    }

    /// Close the channel and fail every pending request.
    pub async fn close(&self) -> Result<(), TransportError> {
        let result = self.channel.close().await;
        fail_pending(&self.pending, None);
        result
    }
}

impl<C: Channel> std::fmt::Debug for Transport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("connected", &self.channel.is_connected())
            .field("pending_requests", &self.pending.len())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Route one inbound frame.
fn dispatch(
    registry: &PayloadRegistry,
    pending: &PendingTable,
    events: &mpsc::UnboundedSender<TransportEvent>,
    bytes: &[u8],
) {
    let payload = match registry.decode(bytes) {
        Ok(payload) => payload,
        Err(SyncError::UnknownPayloadTag(tag)) => {
            debug!(tag = %tag, "Dropping payload with unknown tag");
            return;
        }
        Err(e) => {
            warn!(error = %e, "Dropping undecodable frame");
            return;
        }
    };

    if let Some(id) = payload.request_id() {
        if let Some((_, request)) = pending.remove(&id) {
            debug!(request = %id, "Response matched");
            let _ = request.completion.send(Ok(payload));
            return;
        }
    }

    let _ = events.send(TransportEvent::Received(payload));
}

/// Complete pending requests of `connection` (all if `None`) with
/// `Disconnected`.
fn fail_pending(pending: &PendingTable, connection: Option<u64>) {
    let ids: Vec<RequestId> = pending
        .iter()
        .filter(|entry| connection.map_or(true, |c| entry.value().connection == c))
        .map(|entry| *entry.key())
        .collect();
    for id in ids {
        if let Some((_, request)) = pending.remove(&id) {
            let _ = request.completion.send(Err(TransportError::Disconnected));
        }
    }
}
