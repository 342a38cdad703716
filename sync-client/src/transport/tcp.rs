//! TCP channel.
//!
//! Each envelope travels as one frame: a 4-byte big-endian length prefix
//! followed by the JSON bytes.

use super::{Channel, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Maximum frame size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Channel over a plain TCP connection.
#[derive(Debug, Default)]
pub struct TcpChannel {
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
    closed: Notify,
}

impl TcpChannel {
    /// Create an unconnected channel.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Channel for TcpChannel {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        self.connected.store(true, Ordering::SeqCst);

        debug!(address, "TCP channel connected");
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(TransportError::NotConnected)?;
        write_frame(writer, data).await
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let closed = self.closed.notified();
        tokio::pin!(closed);
        closed.as_mut().enable();

        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let mut reader = self.reader.lock().await;
        let reader = reader.as_mut().ok_or(TransportError::NotConnected)?;

        tokio::select! {
            frame = read_frame(reader) => {
                if frame.is_err() {
                    self.connected.store(false, Ordering::SeqCst);
                }
                frame
            }
            _ = &mut closed => Err(TransportError::ConnectionClosed),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.closed.notify_waiters();

        if let Some(mut writer) = self.writer.lock().await.take() {
            // Peer may already be gone
            let _ = writer.shutdown().await;
        }
        self.reader.lock().await.take();
        Ok(())
    }
}

/// Read a length-prefixed frame.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    // Read 4-byte length prefix (big-endian)
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::ConnectionClosed
        } else {
            TransportError::ReceiveFailed(e.to_string())
        }
    })?;
    let len = u32::from_be_bytes(len_buf) as usize;

    // Validate length
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    // Read frame bytes
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
    Ok(buf)
}

/// Write a length-prefixed frame.
pub(crate) async fn write_frame<W>(writer: &mut W, data: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    if data.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    // Write 4-byte length prefix
    let len = data.len() as u32;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;

    // Write frame bytes
    writer
        .write_all(data)
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;

    Ok(())
}
