//! Lazy entry streams over a partition.
//!
//! Both streams decode lines as they are read and end with an `Err` item on
//! the first storage or decode failure. Dropping a stream releases its
//! reader.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures_util::Stream;
use hashlog_core::Entry;
use hashlog_store::LineReader;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, Result};
use crate::locks::PartitionSlot;

/// A boxed stream of entries.
pub type EntryStream = Pin<Box<dyn Stream<Item = Result<Entry>> + Send>>;

/// Options for a bounded read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Skip entries with `seq` below this.
    pub start_seq: u64,
    /// Stop after this many entries.
    pub limit: Option<u64>,
}

impl ReadOptions {
    pub fn from_seq(start_seq: u64) -> Self {
        Self {
            start_seq,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for a tail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailOptions {
    /// Skip entries with `seq` below this.
    pub start_seq: u64,
    /// Keep waiting for new entries after the existing ones are drained.
    pub follow: bool,
    /// Start at the last `n` entries present when the tail opens, like
    /// `tail -n`. Combined with `start_seq`, the later start wins.
    pub last: Option<u64>,
}

impl TailOptions {
    pub fn follow() -> Self {
        Self {
            follow: true,
            ..Self::default()
        }
    }

    pub fn start_seq(mut self, start_seq: u64) -> Self {
        self.start_seq = start_seq;
        self
    }

    pub fn last(mut self, n: u64) -> Self {
        self.last = Some(n);
        self
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

pub(crate) fn read_stream(mut reader: Box<dyn LineReader>, options: ReadOptions) -> EntryStream {
    let stream = try_stream! {
        let mut emitted = 0u64;
        loop {
            if options.limit.is_some_and(|limit| emitted >= limit) {
                break;
            }
            let Some(line) = reader.next_line().await? else {
                break;
            };
            if is_blank(&line) {
                continue;
            }
            let entry = Entry::from_line(&line)?;
            if entry.seq < options.start_seq {
                continue;
            }
            emitted += 1;
            yield entry;
        }
    };
    Box::pin(stream)
}

/// Everything a tail needs after the partition has been opened.
pub(crate) struct TailSource {
    pub(crate) reader: Box<dyn LineReader>,
    pub(crate) slot: Arc<PartitionSlot>,
    pub(crate) appended: watch::Receiver<u64>,
    pub(crate) poll_interval: Duration,
}

pub(crate) fn tail_stream(
    source: TailSource,
    options: TailOptions,
    cancel: CancellationToken,
) -> EntryStream {
    let TailSource {
        mut reader,
        slot,
        mut appended,
        poll_interval,
    } = source;

    let stream = try_stream! {
        // Keeps the notification sender alive for the stream's lifetime.
        let _slot = slot;
        let mut next_seq = options.start_seq;

        loop {
            if cancel.is_cancelled() {
                Err::<(), _>(EngineError::Cancelled)?;
            }

            while let Some(line) = reader.next_line().await? {
                if cancel.is_cancelled() {
                    tracing::debug!("tail cancelled while draining");
                    Err::<(), _>(EngineError::Cancelled)?;
                }
                if is_blank(&line) {
                    continue;
                }
                let entry = Entry::from_line(&line)?;
                // Anything at or below the last emitted seq was already sent.
                if entry.seq < next_seq {
                    continue;
                }
                next_seq = entry.seq + 1;
                yield entry;
            }

            if !options.follow {
                break;
            }

            let cancelled = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = appended.changed() => false,
                _ = tokio::time::sleep(poll_interval) => false,
            };
            if cancelled {
                tracing::debug!("tail cancelled");
                Err::<(), _>(EngineError::Cancelled)?;
            }
        }
    };
    Box::pin(stream)
}
