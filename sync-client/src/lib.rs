//! # sync-client
//!
//! Client library for the tasksync offline-first event protocol.
//!
//! This is the library applications use to keep a local task list in step
//! with a remote authority.
//!
//! ## Features
//!
//! - **Offline queue**: events are coalesced while disconnected and
//!   published as one batch on reconnect
//! - **Transport Abstraction**: Pluggable channels (TCP, mock) under an RPC
//!   correlation layer
//! - **Pure State Machine**: Uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use tasksync_client::{SyncClient, SyncConfig, TcpChannel};
//!
//! let config = SyncConfig::from_file(Path::new("tasksync.toml"))?;
//! let client = SyncClient::new(TcpChannel::new(), config);
//!
//! client.set_reconciler(&list);
//! client.connect().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod transport;

pub use client::{ClientError, ClientEvent, ClientSnapshot, PublishError, SharedReconciler, SyncClient};
pub use config::{ConfigError, SyncConfig};
pub use transport::{
    Channel, MockChannel, TcpChannel, Transport, TransportError, TransportEvent, MAX_FRAME_SIZE,
};
