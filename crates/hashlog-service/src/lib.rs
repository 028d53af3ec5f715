//! # Hashlog Service
//!
//! Network access to a hashlog engine: a line-delimited JSON protocol over
//! TCP, a server, and a client.
//!
//! ## Overview
//!
//! - [`LogService`] maps requests onto the engine and errors onto status codes
//! - [`LogServer`] accepts connections and bounds in-flight work
//! - [`LogClient`] calls a server, one connection per call
//!
//! ## Usage
//!
//! ```rust,no_run
//! use hashlog::{CancellationToken, LogEngine};
//! use hashlog::store::FileStore;
//! use hashlog_service::{LogClient, LogServer, ServerConfig};
//!
//! async fn example() {
//!     let engine = LogEngine::with_store(FileStore::open("logs").unwrap());
//!     let shutdown = CancellationToken::new();
//!     let server = LogServer::new(engine, ServerConfig::default());
//!     tokio::spawn(server.run(shutdown.clone()));
//!
//!     let client = LogClient::new("127.0.0.1:50051");
//!     let resp = client.append("orders", r#"{"id":1}"#).await.unwrap();
//!     assert!(resp.success);
//!
//!     shutdown.cancel();
//! }
//! ```

pub mod client;
pub mod error;
pub mod framing;
pub mod messages;
pub mod server;
pub mod service;

pub use client::{LogClient, RemoteEntryStream};
pub use error::{Result, ServiceError};
pub use messages::{
    AppendResponse, Request, Response, Status, StatusCode, VerifyResponse, WireEntry,
};
pub use server::{LogServer, ServerConfig};
pub use service::LogService;
