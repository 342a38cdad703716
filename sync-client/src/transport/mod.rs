//! Transport layer for tasksync.
//!
//! Two levels live here:
//! - [`Channel`]: a pluggable, connection-oriented byte pipe (TCP, mock)
//! - [`Transport`]: envelope coding plus request/response correlation on
//!   top of a channel
//!
//! # Design
//!
//! The channel trait is async and connection-oriented:
//! - `connect()` establishes a connection
//! - `send()` transmits one encoded envelope
//! - `recv()` receives one encoded envelope
//! - `close()` gracefully terminates
//!
//! # Example
//!
//! ```ignore
//! let channel = MockChannel::new();
//! let transport = Transport::new(channel, PayloadRegistry::default());
//! let mut events = transport.connect("authority").await?;
//! let response = transport.request(request.into()).await?;
//! ```

mod mock;
mod rpc;
mod tcp;

pub use mock::MockChannel;
pub use rpc::{Transport, TransportEvent};
pub use tcp::{TcpChannel, MAX_FRAME_SIZE};

use async_trait::async_trait;
use tasksync_types::SyncError;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Frame exceeds the maximum size.
    #[error("frame too large: {size} > {max}")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Maximum accepted size.
        max: usize,
    },

    /// The connection dropped before a response arrived.
    #[error("disconnected before response")]
    Disconnected,

    /// Envelope could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] SyncError),
}

/// Byte channel carrying encoded envelopes.
///
/// Implementations handle the underlying connection mechanism
/// (TCP, mock, etc). One envelope per `send`/`recv`.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Connect to the authority identified by the given address.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Send one encoded envelope.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receive one encoded envelope.
    ///
    /// Waits until data is available or the connection closes.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Check if currently connected.
    fn is_connected(&self) -> bool;

    /// Close the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}
