//! Mock channel for testing.
//!
//! Frames are injected with [`MockChannel::push_inbound`] and sent frames
//! are captured for verification. The connection can be dropped at any
//! time to simulate network loss.

use super::{Channel, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Mock channel for testing.
///
/// Clones share state, so a test keeps one clone while the transport owns
/// another.
#[derive(Debug, Default, Clone)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
    inbound_ready: Arc<Notify>,
    outbound_ready: Arc<Notify>,
}

#[derive(Debug, Default)]
struct MockChannelInner {
    connected: bool,
    epoch: u64,
    connected_address: Option<String>,
    connect_count: usize,
    sent_messages: Vec<Vec<u8>>,
    outbox: VecDeque<Vec<u8>>,
    receive_queue: VecDeque<Vec<u8>>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockChannel {
    /// Create a new mock channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a frame to the next `recv()` call.
    pub fn push_inbound(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.receive_queue.push_back(data);
        drop(inner);
        self.inbound_ready.notify_waiters();
    }

    /// Simulate the connection dropping.
    ///
    /// Pending and future `recv()` calls fail with `ConnectionClosed`.
    pub fn drop_connection(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        inner.epoch += 1;
        inner.receive_queue.clear();
        drop(inner);
        self.inbound_ready.notify_waiters();
    }

    /// Get all frames that were sent.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_messages.clone()
    }

    /// Wait for the next sent frame not yet taken by this method.
    pub async fn next_sent(&self) -> Vec<u8> {
        loop {
            let notified = self.outbound_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let frame = self.inner.lock().unwrap().outbox.pop_front();
            if let Some(frame) = frame {
                return frame;
            }
            notified.await;
        }
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.connected_address.clone()
    }

    /// Number of successful `connect()` calls.
    pub fn connect_count(&self) -> usize {
        self.inner.lock().unwrap().connect_count
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connect_count += 1;
        inner.connected_address = Some(address.to_string());
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_messages.push(data.to_vec());
        inner.outbox.push_back(data.to_vec());
        drop(inner);
        self.outbound_ready.notify_waiters();
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        // A reader from an earlier connection must not see later frames
        let epoch = self.inner.lock().unwrap().epoch;
        loop {
            let notified = self.inbound_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().unwrap();
                if !inner.connected || inner.epoch != epoch {
                    return Err(TransportError::ConnectionClosed);
                }
                if let Some(frame) = inner.receive_queue.pop_front() {
                    return Ok(frame);
                }
            }
            notified.await;
        }
    }

    fn is_connected(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.drop_connection();
        Ok(())
    }
}
