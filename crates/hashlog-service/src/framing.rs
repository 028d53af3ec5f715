//! Message framing over TCP using tokio-util LinesCodec.
//!
//! Sends and receives one JSON document per line without manual buffer
//! management.

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

use crate::error::{Result, ServiceError};

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// A framed connection carrying JSON lines.
pub struct Connection {
    inner: Framed<TcpStream, LinesCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, max_frame_length: usize) -> Self {
        Self {
            inner: Framed::new(stream, LinesCodec::new_with_max_length(max_frame_length)),
        }
    }

    /// Connect to `addr`.
    pub async fn connect(addr: &str, max_frame_length: usize) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, max_frame_length))
    }

    /// Send one message as a line.
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> Result<()> {
        let line = serde_json::to_string(msg)
            .map_err(|e| ServiceError::Protocol(format!("encode error: {}", e)))?;
        self.inner.send(line).await?;
        Ok(())
    }

    /// Receive the next message, or `None` if the peer closed the
    /// connection. Blank lines are skipped.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        loop {
            match self.inner.next().await {
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => {
                    return serde_json::from_str(&line)
                        .map(Some)
                        .map_err(|e| ServiceError::Protocol(format!("decode error: {}", e)));
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }
}
