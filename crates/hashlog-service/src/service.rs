//! LogService: maps requests onto the engine and engine errors onto
//! status codes.

use hashlog::core::CoreError;
use hashlog::store::PartitionStore;
use hashlog::{
    AppendOutcome, CancellationToken, EngineError, EntryStream, LogEngine, ReadOptions,
    TailOptions,
};

use crate::messages::{AppendResponse, Status, VerifyResponse, WireEntry};

/// Transport-independent request handler.
pub struct LogService<S: PartitionStore> {
    engine: LogEngine<S>,
}

impl<S: PartitionStore> Clone for LogService<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<S: PartitionStore> LogService<S> {
    pub fn new(engine: LogEngine<S>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &LogEngine<S> {
        &self.engine
    }

    /// Append a JSON payload. Failures are reported in the response.
    pub async fn append(&self, partition: &str, data: &str) -> AppendResponse {
        match self.engine.append_json(partition, data).await {
            Ok(AppendOutcome::Appended(entry)) => AppendResponse::appended(&entry),
            Ok(AppendOutcome::Rejected { reason }) => AppendResponse::failed(reason),
            Err(e) => {
                tracing::error!(partition, error = %e, "append failed");
                AppendResponse::failed(e.to_string())
            }
        }
    }

    pub async fn read(
        &self,
        partition: &str,
        start_seq: Option<u64>,
        limit: Option<u64>,
    ) -> Result<EntryStream, Status> {
        let options = ReadOptions {
            start_seq: start_seq.unwrap_or(0),
            limit,
        };
        self.engine
            .read(partition, options)
            .await
            .map_err(status_from_engine)
    }

    pub async fn tail(
        &self,
        partition: &str,
        options: TailOptions,
        cancel: CancellationToken,
    ) -> Result<EntryStream, Status> {
        self.engine
            .tail(partition, options, cancel)
            .await
            .map_err(status_from_engine)
    }

    /// Verify a partition. Never fails; problems are reported as an
    /// invalid response.
    pub async fn verify(&self, partition: &str) -> VerifyResponse {
        match self.engine.verify(partition).await {
            Ok(report) => report.into(),
            Err(e) => {
                tracing::warn!(partition, error = %e, "verify could not complete");
                VerifyResponse::failed(e.to_string())
            }
        }
    }

    pub async fn list_partitions(&self) -> Result<Vec<String>, Status> {
        self.engine
            .list_partitions()
            .await
            .map(|set| set.into_iter().collect())
            .map_err(status_from_engine)
    }

    pub async fn get_last_entry(&self, partition: &str) -> Result<Option<WireEntry>, Status> {
        self.engine
            .get_last_entry(partition)
            .await
            .map(|entry| entry.as_ref().map(WireEntry::from))
            .map_err(status_from_engine)
    }
}

/// Map an engine error onto the status reported to clients.
pub fn status_from_engine(err: EngineError) -> Status {
    match &err {
        EngineError::NotFound(_) => Status::not_found(err.to_string()),
        EngineError::InvalidPayload(_) | EngineError::Core(CoreError::InvalidPartition(_)) => {
            Status::invalid_argument(err.to_string())
        }
        EngineError::Cancelled => Status::cancelled(err.to_string()),
        EngineError::Store(_) | EngineError::Core(_) => Status::internal(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::StatusCode;
    use hashlog::store::MemoryStore;

    fn service() -> LogService<MemoryStore> {
        LogService::new(LogEngine::with_store(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_append_reports_failures() {
        let svc = service();

        let ok = svc.append("p", r#"{"a":1}"#).await;
        assert!(ok.success);
        assert_eq!(ok.seq, 0);
        assert_eq!(ok.hash.len(), 64);

        let bad = svc.append("p", "nope").await;
        assert!(!bad.success);
        assert!(bad.error.unwrap().starts_with("invalid payload"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let svc = service();

        let err = svc.read("missing", None, None).await.err().unwrap();
        assert_eq!(err.code, StatusCode::NotFound);

        let err = svc.read("", None, None).await.err().unwrap();
        assert_eq!(err.code, StatusCode::InvalidArgument);

        assert_eq!(
            status_from_engine(EngineError::Cancelled).code,
            StatusCode::Cancelled
        );
    }

    #[tokio::test]
    async fn test_verify_never_fails() {
        let svc = service();

        let resp = svc.verify("").await;
        assert!(!resp.valid);
        assert!(resp.error.is_some());

        let resp = svc.verify("missing").await;
        assert!(!resp.valid);
        assert_eq!(resp.violation.as_deref(), Some("not_found"));
    }

    #[tokio::test]
    async fn test_get_last_entry() {
        let svc = service();
        assert_eq!(svc.get_last_entry("p").await.unwrap(), None);

        svc.append("p", "[1,2]").await;
        let last = svc.get_last_entry("p").await.unwrap().unwrap();
        assert_eq!(last.seq, 0);
        assert_eq!(last.data, "[1,2]");
    }
}
