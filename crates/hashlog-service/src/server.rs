//! TCP server for the log service.
//!
//! One task per connection. Requests on a connection are handled in order;
//! a global semaphore bounds how many are in flight across connections.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use hashlog::store::PartitionStore;
use hashlog::{CancellationToken, EngineError, Entry, EntryStream, LogEngine, TailOptions};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::error::{Result, ServiceError};
use crate::framing::{Connection, DEFAULT_MAX_FRAME_LENGTH};
use crate::messages::{Request, Response, Status, WireEntry};
use crate::service::{status_from_engine, LogService};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Maximum requests handled concurrently. A following tail holds its
    /// slot until it ends.
    pub max_workers: usize,
    pub max_frame_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 50051)),
            max_workers: 10,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

/// The log server.
pub struct LogServer<S: PartitionStore> {
    service: LogService<S>,
    config: ServerConfig,
    workers: Arc<Semaphore>,
}

impl<S: PartitionStore> LogServer<S> {
    pub fn new(engine: LogEngine<S>, config: ServerConfig) -> Self {
        let workers = Arc::new(Semaphore::new(config.max_workers.max(1)));
        Self {
            service: LogService::new(engine),
            config,
            workers,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from `listener` until `shutdown` fires. In-flight
    /// tails are cancelled on shutdown.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            max_workers = self.config.max_workers,
            "log server listening"
        );

        loop {
            let (socket, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(%peer, error = %e, "set_nodelay failed");
            }

            let handler = ConnectionHandler {
                service: self.service.clone(),
                workers: Arc::clone(&self.workers),
                shutdown: shutdown.child_token(),
                conn: Connection::new(socket, self.config.max_frame_length),
            };
            tokio::spawn(async move {
                tracing::debug!(%peer, "connection opened");
                match handler.run().await {
                    Ok(()) => tracing::debug!(%peer, "connection closed"),
                    Err(e) => tracing::debug!(%peer, error = %e, "connection closed with error"),
                }
            });
        }

        tracing::info!(addr = %local_addr, "log server stopped");
        Ok(())
    }
}

struct ConnectionHandler<S: PartitionStore> {
    service: LogService<S>,
    workers: Arc<Semaphore>,
    shutdown: CancellationToken,
    conn: Connection,
}

/// What woke a streaming response.
enum StreamEvent {
    Item(Option<hashlog::Result<Entry>>),
    Frame(Result<Option<Request>>),
}

impl<S: PartitionStore> ConnectionHandler<S> {
    async fn run(mut self) -> Result<()> {
        loop {
            let frame = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                frame = self.conn.recv::<Request>() => frame,
            };
            let request = match frame {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(ServiceError::Protocol(message)) => {
                    self.conn
                        .send(&Response::Error(Status::invalid_argument(message)))
                        .await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let _permit = Arc::clone(&self.workers)
                .acquire_owned()
                .await
                .map_err(|_| ServiceError::Protocol("server is shutting down".into()))?;

            if !self.handle(request).await? {
                return Ok(());
            }
        }
    }

    /// Handle one request. Returns `false` once the peer has gone away.
    async fn handle(&mut self, request: Request) -> Result<bool> {
        match request {
            Request::Append { partition, data } => {
                let resp = self.service.append(&partition, &data).await;
                self.conn.send(&Response::Appended(resp)).await?;
            }
            Request::Read {
                partition,
                start_seq,
                limit,
            } => match self.service.read(&partition, start_seq, limit).await {
                Ok(stream) => return self.stream_entries(stream, None).await,
                Err(status) => self.conn.send(&Response::Error(status)).await?,
            },
            Request::Tail {
                partition,
                start_seq,
                follow,
                last,
            } => {
                let cancel = self.shutdown.child_token();
                let options = TailOptions {
                    start_seq: start_seq.unwrap_or(0),
                    follow,
                    last,
                };
                match self.service.tail(&partition, options, cancel.clone()).await {
                    Ok(stream) => return self.stream_entries(stream, Some(cancel)).await,
                    Err(status) => self.conn.send(&Response::Error(status)).await?,
                }
            }
            Request::Verify { partition } => {
                let resp = self.service.verify(&partition).await;
                self.conn.send(&Response::Verified(resp)).await?;
            }
            Request::ListPartitions => {
                let resp = match self.service.list_partitions().await {
                    Ok(partitions) => Response::Partitions { partitions },
                    Err(status) => Response::Error(status),
                };
                self.conn.send(&resp).await?;
            }
            Request::GetLastEntry { partition } => {
                let resp = match self.service.get_last_entry(&partition).await {
                    Ok(entry) => Response::LastEntry {
                        found: entry.is_some(),
                        entry,
                    },
                    Err(status) => Response::Error(status),
                };
                self.conn.send(&resp).await?;
            }
            Request::Cancel => {
                // Nothing is streaming.
            }
        }
        Ok(true)
    }

    /// Forward a stream to the peer. With a cancel token the peer may stop
    /// the stream with a `cancel` frame or by disconnecting.
    async fn stream_entries(
        &mut self,
        mut stream: EntryStream,
        cancel: Option<CancellationToken>,
    ) -> Result<bool> {
        loop {
            let event = match &cancel {
                Some(_) => tokio::select! {
                    item = stream.next() => StreamEvent::Item(item),
                    frame = self.conn.recv::<Request>() => StreamEvent::Frame(frame),
                },
                None => StreamEvent::Item(stream.next().await),
            };

            match event {
                StreamEvent::Item(Some(Ok(entry))) => {
                    self.conn.send(&Response::Entry(WireEntry::from(&entry))).await?;
                }
                StreamEvent::Item(Some(Err(e))) => {
                    if !matches!(e, EngineError::Cancelled) {
                        tracing::error!(error = %e, "stream failed");
                    }
                    self.conn.send(&Response::Error(status_from_engine(e))).await?;
                    return Ok(true);
                }
                StreamEvent::Item(None) => {
                    self.conn.send(&Response::End).await?;
                    return Ok(true);
                }
                StreamEvent::Frame(Ok(Some(Request::Cancel))) => {
                    if let Some(cancel) = &cancel {
                        cancel.cancel();
                    }
                }
                StreamEvent::Frame(Ok(Some(other))) => {
                    tracing::debug!(request = ?other, "request ignored while streaming");
                }
                StreamEvent::Frame(Ok(None) | Err(_)) => {
                    if let Some(cancel) = &cancel {
                        cancel.cancel();
                    }
                    return Ok(false);
                }
            }
        }
    }
}
