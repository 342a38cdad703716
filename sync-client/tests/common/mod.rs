//! In-test authority and helpers shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use tasksync_client::{ClientEvent, MockChannel, SyncConfig};
use tasksync_types::{
    Ack, Event, EventPublicationRequest, EventPublicationResponse, Payload, PayloadRegistry, Seq,
    Stream,
};
use tokio::sync::broadcast;

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(60);

/// Client configuration without reconnects or jitter.
pub fn test_config() -> SyncConfig {
    SyncConfig::new("authority")
        .with_auto_reconnect(false)
        .with_max_reconnect_jitter(Duration::ZERO)
}

/// Plays the authority's side of a [`MockChannel`].
pub struct Authority {
    channel: MockChannel,
    registry: PayloadRegistry,
    next_seq: u64,
}

impl Authority {
    /// Serve on `channel`; the first accepted event gets seq 1.
    pub fn new(channel: MockChannel) -> Self {
        Self {
            channel,
            registry: PayloadRegistry::default(),
            next_seq: 1,
        }
    }

    /// Wait for the next publication request the client sends.
    pub async fn next_request(&self) -> EventPublicationRequest {
        loop {
            let frame = tokio::time::timeout(WAIT, self.channel.next_sent())
                .await
                .expect("timed out waiting for a request");
            if let Ok(Payload::EventPublicationRequest(request)) = self.registry.decode(&frame) {
                return request;
            }
        }
    }

    /// Answer `request` with explicit slots.
    pub fn respond(&self, request: &EventPublicationRequest, seqs: Vec<Ack>) {
        self.push(EventPublicationResponse::for_request(request, seqs));
    }

    /// Accept every event of `request`, returning them with their seqs.
    pub fn accept_all(&mut self, request: &EventPublicationRequest) -> Vec<Event> {
        let mut accepted = Vec::with_capacity(request.events.len());
        let mut seqs = Vec::with_capacity(request.events.len());
        for event in &request.events {
            let seq = Seq::new(self.next_seq);
            self.next_seq += 1;
            seqs.push(Ack::Accepted(seq));
            accepted.push(event.clone().with_seq(seq));
        }
        self.respond(request, seqs);
        accepted
    }

    /// Push an accepted event.
    pub fn push_event(&self, event: Event) {
        self.push(event);
    }

    /// Accept an event from another device and push it to the client.
    pub fn push_foreign(&mut self, event: Event) -> Event {
        let event = event.with_seq(Seq::new(self.next_seq));
        self.next_seq += 1;
        self.push(event.clone());
        event
    }

    /// Push the current watermark.
    pub fn push_watermark(&self) {
        self.push(Stream::new(Seq::new(self.next_seq - 1)));
    }

    /// Push raw bytes.
    pub fn push_raw(&self, bytes: &[u8]) {
        self.channel.push_inbound(bytes.to_vec());
    }

    fn push(&self, payload: impl Into<Payload>) {
        let bytes = self
            .registry
            .encode(&payload.into())
            .expect("payload encodes");
        self.channel.push_inbound(bytes);
    }
}

/// Wait for the next client notification.
pub async fn next_event(rx: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for client event")
        .expect("notification channel closed")
}

/// Wait until a notification matching `pred` arrives, skipping others.
pub async fn wait_for(
    rx: &mut broadcast::Receiver<ClientEvent>,
    pred: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Number of publication requests sent on `channel` so far.
pub fn requests_sent(channel: &MockChannel) -> usize {
    let registry = PayloadRegistry::default();
    channel
        .sent_messages()
        .iter()
        .filter(|frame| {
            matches!(
                registry.decode(frame),
                Ok(Payload::EventPublicationRequest(_))
            )
        })
        .count()
}
