//! Client for the log service. Opens one connection per call.

use std::pin::Pin;

use async_stream::try_stream;
use futures_util::Stream;
use hashlog::{CancellationToken, Entry, TailOptions};

use crate::error::{Result, ServiceError};
use crate::framing::{Connection, DEFAULT_MAX_FRAME_LENGTH};
use crate::messages::{AppendResponse, Request, Response, StatusCode, VerifyResponse};

/// A stream of entries received from the server.
pub type RemoteEntryStream = Pin<Box<dyn Stream<Item = Result<Entry>> + Send>>;

/// Log service client.
#[derive(Debug, Clone)]
pub struct LogClient {
    addr: String,
    max_frame_length: usize,
}

impl LogClient {
    /// Create a client for the server at `addr` (`host:port`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<Connection> {
        Connection::connect(&self.addr, self.max_frame_length).await
    }

    /// Send one request and wait for its single response.
    async fn call(&self, request: Request) -> Result<Response> {
        let mut conn = self.connect().await?;
        conn.send(&request).await?;
        match conn.recv::<Response>().await? {
            Some(Response::Error(status)) => Err(status.into()),
            Some(resp) => Ok(resp),
            None => Err(ServiceError::Protocol("connection closed before response".into())),
        }
    }

    /// Append a JSON payload given as text.
    pub async fn append(&self, partition: &str, data: &str) -> Result<AppendResponse> {
        let request = Request::Append {
            partition: partition.to_string(),
            data: data.to_string(),
        };
        match self.call(request).await? {
            Response::Appended(resp) => Ok(resp),
            other => Err(unexpected(&other)),
        }
    }

    /// Stream entries of a partition.
    pub async fn read(
        &self,
        partition: &str,
        start_seq: Option<u64>,
        limit: Option<u64>,
    ) -> Result<RemoteEntryStream> {
        let mut conn = self.connect().await?;
        conn.send(&Request::Read {
            partition: partition.to_string(),
            start_seq,
            limit,
        })
        .await?;
        Ok(entry_stream(conn, CancellationToken::new()))
    }

    /// Stream entries and, with `follow`, new ones until `cancel` fires.
    ///
    /// On cancellation the stream ends without an error and yields nothing
    /// further, even entries the server sent before it saw the cancel.
    pub async fn tail(
        &self,
        partition: &str,
        options: TailOptions,
        cancel: CancellationToken,
    ) -> Result<RemoteEntryStream> {
        let mut conn = self.connect().await?;
        conn.send(&Request::Tail {
            partition: partition.to_string(),
            start_seq: Some(options.start_seq).filter(|seq| *seq > 0),
            follow: options.follow,
            last: options.last,
        })
        .await?;
        Ok(entry_stream(conn, cancel))
    }

    pub async fn verify(&self, partition: &str) -> Result<VerifyResponse> {
        let request = Request::Verify {
            partition: partition.to_string(),
        };
        match self.call(request).await? {
            Response::Verified(resp) => Ok(resp),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn list_partitions(&self) -> Result<Vec<String>> {
        match self.call(Request::ListPartitions).await? {
            Response::Partitions { partitions } => Ok(partitions),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn get_last_entry(&self, partition: &str) -> Result<Option<Entry>> {
        let request = Request::GetLastEntry {
            partition: partition.to_string(),
        };
        match self.call(request).await? {
            Response::LastEntry { entry, .. } => entry.map(|e| e.into_entry()).transpose(),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(resp: &Response) -> ServiceError {
    ServiceError::Protocol(format!("unexpected response: {:?}", resp))
}

enum Incoming {
    Frame(Result<Option<Response>>),
    Cancelled,
}

fn entry_stream(mut conn: Connection, cancel: CancellationToken) -> RemoteEntryStream {
    let stream = try_stream! {
        let mut cancel_sent = false;
        loop {
            let incoming = if cancel_sent {
                Incoming::Frame(conn.recv::<Response>().await)
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => Incoming::Cancelled,
                    frame = conn.recv::<Response>() => Incoming::Frame(frame),
                }
            };

            let frame = match incoming {
                Incoming::Cancelled => {
                    conn.send(&Request::Cancel).await?;
                    cancel_sent = true;
                    continue;
                }
                Incoming::Frame(frame) => frame?,
            };

            match frame {
                // Sent before the server saw our cancel.
                Some(Response::Entry(_)) if cancel.is_cancelled() => {}
                Some(Response::Entry(wire)) => {
                    yield wire.into_entry()?;
                }
                Some(Response::End) => break,
                Some(Response::Error(status)) => {
                    // The server confirms our cancel with a cancelled status.
                    if cancel_sent && status.code == StatusCode::Cancelled {
                        break;
                    }
                    Err::<(), _>(ServiceError::from(status))?;
                }
                Some(other) => {
                    Err::<(), _>(unexpected(&other))?;
                }
                None => {
                    Err::<(), _>(ServiceError::Protocol("connection closed mid-stream".into()))?;
                }
            }
        }
    };
    Box::pin(stream)
}
