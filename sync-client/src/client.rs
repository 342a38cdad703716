//! SyncClient - the main interface for tasksync.
//!
//! This module provides [`SyncClient`], the handle applications use to
//! publish locally created events and to receive the authority's events.
//!
//! # Architecture
//!
//! A single worker task owns the outbound queue, the published log and the
//! publish state machine. Every change arrives as a command on one channel
//! and is processed in arrival order. The transport reader posts into the
//! same channel, so inbound events are serialized with local ones.
//!
//! ```text
//! Application → SyncClient (handle) ─┐
//!                                    ├→ command queue → worker → Transport → Network
//! Transport reader ──────────────────┘                    ↓
//!                                                  sync-core (pure state machine)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tasksync_client::{SyncClient, SyncConfig, TcpChannel};
//!
//! let client = SyncClient::new(TcpChannel::new(), SyncConfig::new("127.0.0.1:7000"));
//! client.set_reconciler(&list);
//! client.connect().await?;
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tasksync_core::{
    backoff_delay, AckError, AckOutcome, Action, ModelReconciler, Notification,
    OutboundEventReceiver, OutboundQueue, PublishState, SequenceTracker, Signal,
};
use tasksync_types::{
    sort_causal, Event, EventPublicationRequest, Payload, PayloadRegistry, Seq, SeqPointer,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::transport::{Channel, Transport, TransportError, TransportEvent};

/// Reconciler shared between the application and the client worker.
pub type SharedReconciler = Arc<Mutex<dyn ModelReconciler + Send>>;

/// The worker's non-owning reference to the reconciler.
type ReconcilerRef = Weak<Mutex<dyn ModelReconciler + Send>>;

/// Capacity of the notification channel.
const NOTIFICATION_CAPACITY: usize = 64;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The worker task has stopped.
    #[error("client worker stopped")]
    WorkerStopped,
}

/// Why a publication attempt did not complete.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Not connected to the authority.
    #[error("not connected")]
    NotConnected,

    /// Nothing to publish.
    #[error("outbound queue is empty")]
    EmptyQueue,

    /// The request failed in the transport (including disconnects).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No response within the publication timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Response slot count differs from the request's event count.
    #[error("acknowledged {actual} events, expected {expected}")]
    AckCountMismatch {
        /// Number of events in the request.
        expected: usize,
        /// Number of slots in the response.
        actual: usize,
    },

    /// The correlated answer was not a publication response.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(&'static str),
}

impl From<AckError> for PublishError {
    fn from(value: AckError) -> Self {
        match value {
            AckError::CountMismatch { expected, actual } => {
                PublishError::AckCountMismatch { expected, actual }
            }
        }
    }
}

/// Lifecycle notifications for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Connected to the authority.
    Connected,
    /// Connection lost or closed.
    Disconnected,
    /// A publication response was applied.
    Published {
        /// Events moved to the published log.
        accepted: usize,
        /// Events the authority did not accept.
        rejected: usize,
    },
    /// A publication attempt failed; the queue is unchanged.
    PublishFailed {
        /// Error description.
        reason: String,
    },
    /// Inbound events were applied to the model.
    Applied {
        /// Number of events in the batch.
        count: usize,
    },
    /// The model rejected an inbound batch.
    ApplyFailed {
        /// Error description.
        reason: String,
    },
}

impl From<Notification> for ClientEvent {
    fn from(value: Notification) -> Self {
        match value {
            Notification::Connected => ClientEvent::Connected,
            Notification::Disconnected => ClientEvent::Disconnected,
        }
    }
}

/// Point-in-time view of the client, for inspection and tests.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Events waiting for publication, in causal order.
    pub pending: Vec<Event>,
    /// Events the authority has accepted.
    pub published: Vec<Event>,
    /// Authority watermark.
    pub latest_seq: Seq,
    /// Next client-local counter value.
    pub client_seq: u64,
    /// Publish state.
    pub state: PublishState,
}

enum Command {
    Connect(oneshot::Sender<Result<(), ClientError>>),
    Disconnect(oneshot::Sender<()>),
    EventCreated(Event),
    InboundEvents(Vec<Event>),
    Transport { generation: u64, event: TransportEvent },
    ReconnectTimer,
    RetryTimer { attempt: u32 },
    SetReconciler(ReconcilerRef),
    Snapshot(oneshot::Sender<ClientSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// The main sync client.
///
/// Cheap to clone; all clones talk to the same worker. Must be created
/// inside a tokio runtime.
pub struct SyncClient<C: Channel> {
    commands: mpsc::UnboundedSender<Command>,
    tracker: Arc<Mutex<SequenceTracker>>,
    transport: Arc<Transport<C>>,
    wants_connection: Arc<AtomicBool>,
    notifications: broadcast::Sender<ClientEvent>,
}

impl<C: Channel> Clone for SyncClient<C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            tracker: Arc::clone(&self.tracker),
            transport: Arc::clone(&self.transport),
            wants_connection: Arc::clone(&self.wants_connection),
            notifications: self.notifications.clone(),
        }
    }
}

impl<C: Channel> SyncClient<C> {
    /// Create a client over `channel` with the default payload registry.
    pub fn new(channel: C, config: SyncConfig) -> Self {
        Self::with_registry(channel, PayloadRegistry::default(), config)
    }

    /// Create a client with a custom payload registry.
    pub fn with_registry(channel: C, registry: PayloadRegistry, config: SyncConfig) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let tracker = Arc::new(Mutex::new(SequenceTracker::new()));
        let transport = Arc::new(Transport::new(channel, registry));
        let wants_connection = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            config,
            transport: Arc::clone(&transport),
            tracker: Arc::clone(&tracker),
            queue: OutboundQueue::new(),
            state: PublishState::new(),
            reconciler: None,
            generation: 0,
            wants_connection: Arc::clone(&wants_connection),
            notifications: notifications.clone(),
            commands: commands.downgrade(),
        };
        tokio::spawn(worker.run(commands_rx));

        Self {
            commands,
            tracker,
            transport,
            wants_connection,
            notifications,
        }
    }

    /// Attach the model that inbound events are applied to.
    ///
    /// The client keeps only a weak reference; the application owns the
    /// model (which in turn holds this handle).
    pub fn set_reconciler(&self, reconciler: &SharedReconciler) {
        self.submit(Command::SetReconciler(Arc::downgrade(reconciler)));
    }

    /// Take the next causal pointer for a locally created event.
    pub fn issue_pointer(&self) -> SeqPointer {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .issue_pointer()
    }

    /// Authority watermark currently used for new pointers.
    pub fn latest_seq(&self) -> Seq {
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest_seq()
    }

    /// Queue a locally created (and already applied) event for publication.
    pub fn on_event_created(&self, event: Event) {
        self.submit(Command::EventCreated(event));
    }

    /// Apply a batch of historical events received out of band.
    ///
    /// The batch is sorted causally and applied as one reconciler call.
    pub fn on_inbound_events(&self, events: Vec<Event>) {
        self.submit(Command::InboundEvents(events));
    }

    /// Connect to the authority.
    ///
    /// Publishes the queue immediately if it is not empty.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.wants_connection.store(true, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Connect(reply))?;
        rx.await.map_err(|_| ClientError::WorkerStopped)?
    }

    /// Disconnect from the authority without reconnecting.
    ///
    /// An in-flight publication completes with `Disconnected` and leaves
    /// the queue unchanged.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.wants_connection.store(false, Ordering::SeqCst);
        self.transport.close().await?;
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Disconnect(reply))?;
        rx.await.map_err(|_| ClientError::WorkerStopped)
    }

    /// Close the connection and stop the worker.
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.wants_connection.store(false, Ordering::SeqCst);
        self.transport.close().await?;
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Shutdown(reply))?;
        rx.await.map_err(|_| ClientError::WorkerStopped)
    }

    /// Inspect the queue, published log and state.
    pub async fn snapshot(&self) -> Result<ClientSnapshot, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send_command(Command::Snapshot(reply))?;
        rx.await.map_err(|_| ClientError::WorkerStopped)
    }

    /// Subscribe to lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.notifications.subscribe()
    }

    /// Get a reference to the transport (for testing).
    pub fn transport(&self) -> &Transport<C> {
        &self.transport
    }

    fn send_command(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::WorkerStopped)
    }

    fn submit(&self, command: Command) {
        if self.send_command(command).is_err() {
            warn!("Client worker stopped, dropping command");
        }
    }
}

impl<C: Channel> OutboundEventReceiver for SyncClient<C> {
    fn issue_pointer(&self) -> SeqPointer {
        SyncClient::issue_pointer(self)
    }

    fn on_event_created(&self, event: Event) {
        SyncClient::on_event_created(self, event)
    }
}

impl<C: Channel> std::fmt::Debug for SyncClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("transport", &self.transport)
            .field("latest_seq", &self.latest_seq())
            .finish()
    }
}

/// Single writer for queue, published log and state.
struct Worker<C: Channel> {
    config: SyncConfig,
    transport: Arc<Transport<C>>,
    tracker: Arc<Mutex<SequenceTracker>>,
    queue: OutboundQueue,
    state: PublishState,
    reconciler: Option<ReconcilerRef>,
    /// Incremented per connection; events from older readers are stale.
    generation: u64,
    wants_connection: Arc<AtomicBool>,
    notifications: broadcast::Sender<ClientEvent>,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl<C: Channel> Worker<C> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            if let Command::Shutdown(reply) = command {
                let _ = self.transport.close().await;
                let _ = reply.send(());
                break;
            }
            self.handle(command).await;
        }
        debug!("Client worker stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => {
                if self.state.is_connected() {
                    let _ = reply.send(Ok(()));
                    return;
                }
                match self.open_connection().await {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                        let actions = self.step(Signal::Connected {
                            pending: self.queue.len(),
                        });
                        self.execute(actions).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Connect failed");
                        let _ = reply.send(Err(e.into()));
                    }
                }
            }
            Command::Disconnect(reply) => {
                let _ = self.transport.close().await;
                let actions = self.step(Signal::Disconnected { reconnect: false });
                self.execute(actions).await;
                let _ = reply.send(());
            }
            Command::EventCreated(event) => {
                debug!(task = %event.identifier(), kind = ?event.event_type(), "Queueing event");
                self.queue.enqueue(event);
                let actions = self.step(Signal::QueueChanged {
                    pending: self.queue.len(),
                });
                self.execute(actions).await;
            }
            Command::InboundEvents(mut events) => {
                sort_causal(&mut events);
                events.retain(|event| self.queue.record_inbound(event.clone()));
                self.apply(&events);
            }
            Command::Transport { generation, event } => {
                if generation != self.generation {
                    debug!(generation, "Ignoring event from stale connection");
                    return;
                }
                self.on_transport_event(event).await;
            }
            Command::ReconnectTimer => {
                if !self.wants_connection.load(Ordering::SeqCst) {
                    return;
                }
                let actions = self.step(Signal::ReconnectTimer);
                self.execute(actions).await;
            }
            Command::RetryTimer { attempt } => {
                let actions = self.step(Signal::RetryTimer { attempt });
                self.execute(actions).await;
            }
            Command::SetReconciler(reconciler) => {
                self.reconciler = Some(reconciler);
            }
            Command::Snapshot(reply) => {
                let tracker = self
                    .tracker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                let _ = reply.send(ClientSnapshot {
                    pending: self.queue.snapshot(),
                    published: self.queue.published().to_vec(),
                    latest_seq: tracker.latest_seq(),
                    client_seq: tracker.client_seq(),
                    state: self.state.clone(),
                });
            }
            Command::Shutdown(reply) => {
                let _ = reply.send(());
            }
        }
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {}
            TransportEvent::Received(Payload::Event(event)) => {
                if self.queue.record_inbound(event.clone()) {
                    self.apply(std::slice::from_ref(&event));
                } else {
                    debug!(seq = ?event.seq(), "Skipping duplicate event");
                }
            }
            TransportEvent::Received(Payload::Stream(stream)) => {
                let advanced = self
                    .tracker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .advance_watermark(stream.latest_seq);
                if advanced {
                    debug!(latest_seq = %stream.latest_seq, "Watermark advanced");
                } else {
                    debug!(latest_seq = %stream.latest_seq, "Ignoring stale watermark");
                }
            }
            TransportEvent::Received(other) => {
                debug!(tag = other.tag(), "Ignoring unsolicited payload");
            }
            TransportEvent::Disconnected => {
                let reconnect =
                    self.config.auto_reconnect && self.wants_connection.load(Ordering::SeqCst);
                info!(reconnect, "Connection lost");
                let actions = self.step(Signal::Disconnected { reconnect });
                self.execute(actions).await;
            }
        }
    }

    /// Feed a signal to the state machine.
    fn step(&mut self, signal: Signal) -> Vec<Action> {
        let state = std::mem::take(&mut self.state);
        let (next, actions) = state.on_signal(signal);
        self.state = next;
        actions
    }

    /// Run actions until the state machine stops producing them.
    async fn execute(&mut self, actions: Vec<Action>) {
        let mut actions: VecDeque<Action> = actions.into();
        while let Some(action) = actions.pop_front() {
            let follow_up = match action {
                Action::Publish => {
                    let signal = self.publish_once().await;
                    self.step(signal)
                }
                Action::Connect => match self.open_connection().await {
                    Ok(()) => self.step(Signal::Connected {
                        pending: self.queue.len(),
                    }),
                    Err(e) => {
                        warn!(error = %e, "Reconnect failed");
                        self.step(Signal::ConnectFailed)
                    }
                },
                Action::ScheduleReconnect { attempt } => {
                    self.schedule_reconnect(attempt);
                    Vec::new()
                }
                Action::ScheduleRetry { attempt } => {
                    self.schedule_retry(attempt);
                    Vec::new()
                }
                Action::Notify(notification) => {
                    let _ = self.notifications.send(notification.into());
                    Vec::new()
                }
            };
            actions.extend(follow_up);
        }
    }

    /// Connect the transport and forward its events into the command queue.
    async fn open_connection(&mut self) -> Result<(), TransportError> {
        let mut events = self.transport.connect(&self.config.address).await?;
        self.generation += 1;
        let generation = self.generation;

        let Some(commands) = self.commands.upgrade() else {
            return Err(TransportError::ConnectionClosed);
        };
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if commands
                    .send(Command::Transport { generation, event })
                    .is_err()
                {
                    break;
                }
            }
        });
        Ok(())
    }

    fn schedule_reconnect(&self, attempt: u32) {
        let delay = backoff_delay(attempt, self.config.max_reconnect_jitter());
        info!(attempt, ?delay, "Scheduling reconnect");

        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::ReconnectTimer);
            }
        });
    }

    fn schedule_retry(&self, attempt: u32) {
        let delay = backoff_delay(attempt, self.config.max_reconnect_jitter());
        info!(attempt, ?delay, pending = self.queue.len(), "Scheduling publication retry");

        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::RetryTimer { attempt });
            }
        });
    }

    /// One publication attempt, reported as a state machine signal.
    async fn publish_once(&mut self) -> Signal {
        let progressed = match self.publish().await {
            Ok(outcome) => {
                info!(
                    accepted = outcome.published,
                    rejected = outcome.rejected,
                    "Publication acknowledged"
                );
                let _ = self.notifications.send(ClientEvent::Published {
                    accepted: outcome.published,
                    rejected: outcome.rejected,
                });
                outcome.published > 0
            }
            Err(e) => {
                warn!(error = %e, pending = self.queue.len(), "Publication failed");
                let _ = self.notifications.send(ClientEvent::PublishFailed {
                    reason: e.to_string(),
                });
                false
            }
        };
        Signal::PublishFinished {
            pending: self.queue.len(),
            progressed,
        }
    }

    /// Send the pending queue and apply the authority's answer.
    ///
    /// Only a correlated, count-correct response changes the queue.
    async fn publish(&mut self) -> Result<AckOutcome, PublishError> {
        if !self.transport.is_connected() {
            return Err(PublishError::NotConnected);
        }
        let snapshot = self.queue.snapshot();
        if snapshot.is_empty() {
            return Err(PublishError::EmptyQueue);
        }

        let request = EventPublicationRequest::new(snapshot.clone());
        debug!(request = %request.identifier, events = snapshot.len(), "Publishing");

        let timeout = self.config.publish_timeout();
        let response =
            match tokio::time::timeout(timeout, self.transport.request(request.into())).await {
                Ok(result) => result?,
                Err(_) => {
                    // Treat as a dropped connection
                    let _ = self.transport.close().await;
                    return Err(PublishError::Timeout(timeout));
                }
            };

        match response {
            Payload::EventPublicationResponse(response) => {
                Ok(self.queue.apply_acks(&snapshot, &response.seqs)?)
            }
            other => Err(PublishError::UnexpectedResponse(other.tag())),
        }
    }

    /// Hand a causally ordered batch to the reconciler.
    fn apply(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        let Some(reconciler) = self.reconciler.as_ref().and_then(Weak::upgrade) else {
            debug!(count = events.len(), "No reconciler attached, skipping apply");
            return;
        };

        let result = reconciler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(events);
        match result {
            Ok(()) => {
                let _ = self
                    .notifications
                    .send(ClientEvent::Applied { count: events.len() });
            }
            Err(e) => {
                warn!(error = %e, "Failed to apply inbound events");
                let _ = self
                    .notifications
                    .send(ClientEvent::ApplyFailed {
                        reason: e.to_string(),
                    });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockChannel;
    use tasksync_core::ApplyError;
    use tasksync_types::{Ack, EventPublicationResponse, Stream, TaskId};

    fn test_config() -> SyncConfig {
        SyncConfig::new("authority")
            .with_auto_reconnect(false)
            .with_publish_timeout(Duration::from_secs(5))
    }

    fn encode(payload: impl Into<Payload>) -> Vec<u8> {
        PayloadRegistry::default().encode(&payload.into()).unwrap()
    }

    /// Records every batch it is asked to apply.
    #[derive(Default)]
    struct Recorder {
        batches: Vec<Vec<Event>>,
    }

    impl ModelReconciler for Recorder {
        fn apply(&mut self, events: &[Event]) -> Result<(), ApplyError> {
            self.batches.push(events.to_vec());
            Ok(())
        }
    }

    async fn next_event(rx: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for client event")
            .expect("notification channel closed")
    }

    // ===========================================
    // Pointer issuance
    // ===========================================

    #[tokio::test]
    async fn pointers_come_from_shared_tracker() {
        let client = SyncClient::new(MockChannel::new(), test_config());
        let other = client.clone();

        let a = client.issue_pointer();
        let b = other.issue_pointer();

        assert_eq!(a, SeqPointer::new(Seq::zero(), 0));
        assert_eq!(b, SeqPointer::new(Seq::zero(), 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pointers_are_distinct_and_contiguous() {
        const TASKS: u64 = 8;
        const PER_TASK: u64 = 250;

        let client = SyncClient::new(MockChannel::new(), test_config());
        let handles: Vec<_> = (0..TASKS)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move {
                    let mut issued = Vec::with_capacity(PER_TASK as usize);
                    for _ in 0..PER_TASK {
                        issued.push(client.issue_pointer());
                        tokio::task::yield_now().await;
                    }
                    issued
                })
            })
            .collect();

        let mut pointers = Vec::new();
        for handle in handles {
            pointers.extend(handle.await.unwrap());
        }
        pointers.sort();

        let expected: Vec<SeqPointer> = (0..TASKS * PER_TASK)
            .map(|client_seq| SeqPointer::new(Seq::zero(), client_seq))
            .collect();
        assert_eq!(pointers, expected);
    }

    // ===========================================
    // Offline queueing
    // ===========================================

    #[tokio::test]
    async fn events_queue_while_disconnected() {
        let channel = MockChannel::new();
        let client = SyncClient::new(channel.clone(), test_config());

        let id = TaskId::new();
        client.on_event_created(Event::insert(id, client.issue_pointer(), false, "Buy Milk", 0));
        client.on_event_created(Event::update(id, client.issue_pointer(), Some(true), None, None));

        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(snapshot.pending.len(), 1);
        assert_eq!(snapshot.pending[0].completed(), Some(true));
        assert_eq!(snapshot.state, PublishState::Disconnected);
        assert!(channel.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn connect_with_empty_queue_sends_nothing() {
        let channel = MockChannel::new();
        let client = SyncClient::new(channel.clone(), test_config());
        let mut events = client.subscribe();

        client.connect().await.unwrap();

        assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(snapshot.state, PublishState::ConnectedIdle);
        assert!(channel.sent_messages().is_empty());
    }

    // ===========================================
    // Inbound handling
    // ===========================================

    #[tokio::test]
    async fn stream_advances_watermark() {
        let channel = MockChannel::new();
        let client = SyncClient::new(channel.clone(), test_config());
        client.connect().await.unwrap();
        client.issue_pointer();

        channel.push_inbound(encode(Stream::new(Seq::new(12))));

        // Snapshot is processed after the forwarded stream
        let mut snapshot = client.snapshot().await.unwrap();
        for _ in 0..50 {
            if snapshot.latest_seq == Seq::new(12) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            snapshot = client.snapshot().await.unwrap();
        }
        assert_eq!(snapshot.latest_seq, Seq::new(12));
        assert_eq!(client.issue_pointer(), SeqPointer::new(Seq::new(12), 0));
    }

    #[tokio::test]
    async fn inbound_event_is_applied_once() {
        let channel = MockChannel::new();
        let client = SyncClient::new(channel.clone(), test_config());
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        let shared: SharedReconciler = recorder.clone();
        client.set_reconciler(&shared);
        let mut events = client.subscribe();
        client.connect().await.unwrap();
        assert_eq!(next_event(&mut events).await, ClientEvent::Connected);

        let event = Event::insert(
            TaskId::new(),
            SeqPointer::new(Seq::zero(), 0),
            false,
            "Get a lot of Beer",
            2,
        )
        .with_seq(Seq::new(1));
        channel.push_inbound(encode(event.clone()));
        channel.push_inbound(encode(event.clone()));
        channel.push_inbound(encode(Stream::new(Seq::new(1))));

        assert_eq!(next_event(&mut events).await, ClientEvent::Applied { count: 1 });

        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(recorder.lock().unwrap().batches, vec![vec![event]]);
        assert_eq!(snapshot.published.len(), 1);
    }

    #[tokio::test]
    async fn history_batch_is_sorted_before_apply() {
        let client = SyncClient::new(MockChannel::new(), test_config());
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        let shared: SharedReconciler = recorder.clone();
        client.set_reconciler(&shared);

        let later = Event::delete(TaskId::new(), SeqPointer::new(Seq::new(1), 0)).with_seq(Seq::new(2));
        let earlier = Event::insert(TaskId::new(), SeqPointer::new(Seq::zero(), 0), false, "A", 0)
            .with_seq(Seq::new(1));
        client.on_inbound_events(vec![later.clone(), earlier.clone()]);

        client.snapshot().await.unwrap();
        assert_eq!(recorder.lock().unwrap().batches, vec![vec![earlier, later]]);
    }

    // ===========================================
    // Publication
    // ===========================================

    #[tokio::test]
    async fn queued_event_publishes_when_connected() {
        let channel = MockChannel::new();
        let client = SyncClient::new(channel.clone(), test_config());
        let mut events = client.subscribe();
        client.connect().await.unwrap();

        let event = Event::insert(TaskId::new(), client.issue_pointer(), false, "Buy Milk", 0);
        client.on_event_created(event.clone());

        let frame = channel.next_sent().await;
        let request = match PayloadRegistry::default().decode(&frame).unwrap() {
            Payload::EventPublicationRequest(request) => request,
            other => panic!("expected publication request, got {:?}", other),
        };
        assert_eq!(request.events, vec![event.clone()]);

        let response = EventPublicationResponse::for_request(&request, vec![Ack::Accepted(Seq::new(1))]);
        channel.push_inbound(encode(response));

        assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
        assert_eq!(
            next_event(&mut events).await,
            ClientEvent::Published { accepted: 1, rejected: 0 }
        );

        let snapshot = client.snapshot().await.unwrap();
        assert!(snapshot.pending.is_empty());
        assert_eq!(snapshot.published, vec![event.with_seq(Seq::new(1))]);
        assert_eq!(snapshot.state, PublishState::ConnectedIdle);
    }

    #[tokio::test]
    async fn shutdown_stops_worker() {
        let client = SyncClient::new(MockChannel::new(), test_config());
        client.shutdown().await.unwrap();

        assert!(matches!(
            client.snapshot().await,
            Err(ClientError::WorkerStopped)
        ));
    }
}
