//! Integration tests for the log engine over the file store.

use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;

use futures_util::StreamExt;
use hashlog::{
    ChainViolation, EngineError, LogEngine, ReadOptions, TailOptions, VerifyFailure, GENESIS_HASH,
};
use hashlog::store::{FileStoreConfig, MemoryStore};
use hashlog::CancellationToken;
use hashlog_testkit::fixtures::{collect_entries, fast_config, populate, TestLog};
use serde_json::json;

#[tokio::test]
async fn test_two_appends_then_verify() {
    let log = TestLog::new();

    let first = log.engine.append("p", json!({"a": 1})).await.unwrap();
    let second = log.engine.append("p", json!({"b": 2})).await.unwrap();

    assert_eq!(first.seq, 0);
    assert_eq!(first.prev_hash, GENESIS_HASH);
    assert_eq!(second.seq, 1);
    assert_eq!(second.prev_hash, first.hash);

    let report = log.engine.verify("p").await.unwrap();
    assert!(report.is_valid());
    assert_eq!(report.entries_verified, 2);
    assert_eq!(report.final_hash(), Some(second.hash.as_str()));
}

#[tokio::test]
async fn test_verify_missing_partition() {
    let log = TestLog::new();
    let report = log.engine.verify("q").await.unwrap();

    assert!(!report.is_valid());
    assert_eq!(report.entries_verified, 0);
    assert!(matches!(report.failure(), Some(VerifyFailure::NotFound(name)) if name == "q"));
}

#[tokio::test]
async fn test_verify_empty_partition_is_valid() {
    let log = TestLog::new();
    std::fs::write(log.partition_path("empty"), "").unwrap();

    let report = log.engine.verify("empty").await.unwrap();
    assert!(report.is_valid());
    assert_eq!(report.entries_verified, 0);
    assert_eq!(report.final_hash(), Some(GENESIS_HASH));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_are_contiguous() {
    let log = TestLog::new();
    let mut tasks = Vec::new();
    for writer in 0..8 {
        let engine = log.engine.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..25 {
                engine
                    .append("shared", json!({"writer": writer, "i": i}))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stream = log.engine.read("shared", ReadOptions::default()).await.unwrap();
    let entries = collect_entries(stream).await.unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, (0..200).collect::<Vec<_>>());

    let report = log.engine.verify("shared").await.unwrap();
    assert!(report.is_valid());
    assert_eq!(report.entries_verified, 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partitions_are_independent() {
    let log = TestLog::new();
    let a = log.engine.clone();
    let b = log.engine.clone();

    let (ra, rb) = tokio::join!(populate(&a, "alpha", 30), populate(&b, "beta", 30));
    ra.unwrap();
    rb.unwrap();

    let partitions: Vec<_> = log.engine.list_partitions().await.unwrap().into_iter().collect();
    assert_eq!(partitions, vec!["alpha", "beta"]);
    assert!(log.engine.verify("alpha").await.unwrap().is_valid());
    assert!(log.engine.verify("beta").await.unwrap().is_valid());
}

#[tokio::test]
async fn test_sanitization_collisions_share_a_chain() {
    let log = TestLog::new();

    log.engine.append("orders/eu", json!(1)).await.unwrap();
    let second = log.engine.append("orders eu", json!(2)).await.unwrap();

    assert_eq!(second.seq, 1);
    assert_eq!(second.partition, "orders eu");
    assert!(log.partition_path("orders_eu").exists());
    assert!(log.engine.verify("orders?eu").await.unwrap().is_valid());

    let partitions: Vec<_> = log.engine.list_partitions().await.unwrap().into_iter().collect();
    assert_eq!(partitions, vec!["orders_eu"]);
}

#[tokio::test]
async fn test_tampered_payload_detected() {
    let log = TestLog::new();
    populate(&log.engine, "p", 5).await.unwrap();

    let path = log.partition_path("p");
    let contents = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<String> = contents.lines().map(String::from).collect();
    lines[2] = lines[2].replace(r#""i":2"#, r#""i":999"#);
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    let report = log.engine.verify("p").await.unwrap();
    assert_eq!(report.entries_verified, 2);
    assert!(matches!(
        report.violation(),
        Some(ChainViolation::HashMismatch { index: 2, .. })
    ));
}

#[tokio::test]
async fn test_reordered_entries_detected() {
    let log = TestLog::new();
    populate(&log.engine, "p", 4).await.unwrap();

    let path = log.partition_path("p");
    let contents = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<&str> = contents.lines().collect();
    lines.swap(1, 2);
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    let report = log.engine.verify("p").await.unwrap();
    assert!(matches!(
        report.violation(),
        Some(ChainViolation::SequenceMismatch { index: 1, expected: 1, found: 2 })
    ));
}

#[tokio::test]
async fn test_read_missing_partition_is_not_found() {
    let log = TestLog::new();
    let result = log.engine.read("ghost", ReadOptions::default()).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));

    let result = log
        .engine
        .tail("ghost", TailOptions::default(), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn test_read_ranges() {
    let log = TestLog::new();
    populate(&log.engine, "p", 10).await.unwrap();

    let read = |options| {
        let engine = log.engine.clone();
        async move {
            let stream = engine.read("p", options).await.unwrap();
            collect_entries(stream)
                .await
                .unwrap()
                .into_iter()
                .map(|e| e.seq)
                .collect::<Vec<_>>()
        }
    };

    assert_eq!(read(ReadOptions::default()).await, (0..10).collect::<Vec<_>>());
    assert_eq!(read(ReadOptions::from_seq(7)).await, vec![7, 8, 9]);
    assert_eq!(read(ReadOptions::from_seq(2).limit(3)).await, vec![2, 3, 4]);
    assert_eq!(read(ReadOptions::default().limit(0)).await, Vec::<u64>::new());
    assert_eq!(read(ReadOptions::from_seq(50)).await, Vec::<u64>::new());
}

#[tokio::test]
async fn test_blank_lines_are_ignored() {
    let log = TestLog::new();
    populate(&log.engine, "p", 2).await.unwrap();

    let path = log.partition_path("p");
    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.replacen('\n', "\n\n   \n", 1)).unwrap();

    assert!(log.engine.verify("p").await.unwrap().is_valid());
    let next = log.engine.append("p", json!("after blanks")).await.unwrap();
    assert_eq!(next.seq, 2);
}

#[tokio::test]
async fn test_large_entry_beyond_read_window() {
    let config = FileStoreConfig {
        read_last_window: 64,
        ..Default::default()
    };
    let log = TestLog::with_configs(config, fast_config());
    let big = "x".repeat(100_000);

    log.engine.append("p", json!({"small": true})).await.unwrap();
    let large = log.engine.append("p", json!({ "big": big })).await.unwrap();
    let after = log.engine.append("p", json!({"small": false})).await.unwrap();

    assert_eq!(after.seq, 2);
    assert_eq!(after.prev_hash, large.hash);
    assert!(log.engine.verify("p").await.unwrap().is_valid());
}

#[tokio::test]
async fn test_torn_write_is_isolated() {
    let log = TestLog::new();
    let entries = populate(&log.engine, "p", 2).await.unwrap();

    let path = log.partition_path("p");
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(br#"{"seq":2,"ts":"2024"#).unwrap();
    drop(file);

    // Readers never see the fragment.
    let stream = log.engine.read("p", ReadOptions::default()).await.unwrap();
    assert_eq!(collect_entries(stream).await.unwrap(), entries);
    assert_eq!(log.engine.get_last_entry("p").await.unwrap(), Some(entries[1].clone()));

    // The next append chains to the last good entry on a fresh line.
    let next = log.engine.append("p", json!("recovered")).await.unwrap();
    assert_eq!(next.seq, 2);
    assert_eq!(next.prev_hash, entries[1].hash);
    assert_eq!(log.engine.get_last_entry("p").await.unwrap(), Some(next));

    // The isolated fragment is reported by verification.
    let report = log.engine.verify("p").await.unwrap();
    assert!(matches!(
        report.violation(),
        Some(ChainViolation::Malformed { index: 2, .. })
    ));
}

#[tokio::test]
async fn test_tail_follow_sees_history_then_live() {
    let log = TestLog::new();
    populate(&log.engine, "p", 3).await.unwrap();

    let cancel = CancellationToken::new();
    let mut tail = log
        .engine
        .tail("p", TailOptions::follow().start_seq(1), cancel.clone())
        .await
        .unwrap();

    assert_eq!(tail.next().await.unwrap().unwrap().seq, 1);
    assert_eq!(tail.next().await.unwrap().unwrap().seq, 2);

    let writer = log.engine.clone();
    let handle = tokio::spawn(async move { populate(&writer, "p", 3).await.unwrap() });

    for expected in 3..6 {
        let entry = tokio::time::timeout(Duration::from_secs(5), tail.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(entry.seq, expected);
    }
    handle.await.unwrap();

    cancel.cancel();
    let last = tokio::time::timeout(Duration::from_secs(5), tail.next()).await.unwrap();
    assert!(matches!(last, Some(Err(EngineError::Cancelled))));
    assert!(tail.next().await.is_none());
}

#[tokio::test]
async fn test_tail_picks_up_out_of_band_writes() {
    let log = TestLog::new();
    populate(&log.engine, "p", 1).await.unwrap();

    let cancel = CancellationToken::new();
    let mut tail = log.engine.tail("p", TailOptions::follow(), cancel.clone()).await.unwrap();
    assert_eq!(tail.next().await.unwrap().unwrap().seq, 0);

    // A second engine has its own lock table, so only polling can wake
    // the tail.
    let other = log.reopen();
    other.append("p", json!("from elsewhere")).await.unwrap();

    let entry = tokio::time::timeout(Duration::from_secs(5), tail.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(entry.seq, 1);
    cancel.cancel();
}

#[tokio::test]
async fn test_tail_without_follow_drains_and_ends() {
    let engine = LogEngine::new(MemoryStore::new(), fast_config());
    populate(&engine, "p", 4).await.unwrap();

    let stream = engine
        .tail("p", TailOptions::default().start_seq(2), CancellationToken::new())
        .await
        .unwrap();
    let seqs: Vec<u64> = collect_entries(stream)
        .await
        .unwrap()
        .iter()
        .map(|e| e.seq)
        .collect();
    assert_eq!(seqs, vec![2, 3]);
}

#[tokio::test]
async fn test_append_json_outcomes() {
    let log = TestLog::new();

    let outcome = log.engine.append_json("p", r#"{"ok": true}"#).await.unwrap();
    assert_eq!(outcome.entry().map(|e| e.seq), Some(0));

    let outcome = log.engine.append_json("p", "{broken").await.unwrap();
    assert!(outcome.entry().is_none());
    assert_eq!(log.engine.get_last_entry("p").await.unwrap().map(|e| e.seq), Some(0));
}

#[tokio::test]
async fn test_tail_cancel_stops_history_drain() {
    let engine = LogEngine::new(MemoryStore::new(), fast_config());
    populate(&engine, "p", 2000).await.unwrap();

    let cancel = CancellationToken::new();
    let mut tail = engine
        .tail("p", TailOptions::follow(), cancel.clone())
        .await
        .unwrap();
    assert_eq!(tail.next().await.unwrap().unwrap().seq, 0);

    cancel.cancel();
    let mut after_cancel = 0;
    loop {
        match tail.next().await {
            Some(Ok(_)) => after_cancel += 1,
            Some(Err(e)) => {
                assert!(matches!(e, EngineError::Cancelled));
                break;
            }
            None => panic!("tail ended without reporting cancellation"),
        }
    }
    assert_eq!(after_cancel, 0);
    assert!(tail.next().await.is_none());
}

#[tokio::test]
async fn test_tail_last_entries_then_follow() {
    let log = TestLog::new();
    populate(&log.engine, "p", 6).await.unwrap();

    let cancel = CancellationToken::new();
    let mut tail = log
        .engine
        .tail("p", TailOptions::follow().last(2), cancel.clone())
        .await
        .unwrap();
    assert_eq!(tail.next().await.unwrap().unwrap().seq, 4);
    assert_eq!(tail.next().await.unwrap().unwrap().seq, 5);

    log.engine.append("p", json!("live")).await.unwrap();
    let entry = tokio::time::timeout(Duration::from_secs(5), tail.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(entry.seq, 6);
    cancel.cancel();
}

#[tokio::test]
async fn test_wide_integers_survive_append_and_verify() {
    let log = TestLog::new();

    let raw = r#"{"n":100000000000000000000,"min":-9223372036854775809}"#;
    let outcome = log.engine.append_json("p", raw).await.unwrap();
    let entry = outcome.entry().cloned().unwrap();
    assert_eq!(
        hashlog::core::canonical_json(&entry.data),
        r#"{"min":-9223372036854775809,"n":100000000000000000000}"#
    );

    let stored = std::fs::read_to_string(log.partition_path("p")).unwrap();
    assert!(stored.contains(r#""n":100000000000000000000"#));
    assert!(!stored.contains("e+20"));

    let reopened = log.reopen();
    assert_eq!(reopened.get_last_entry("p").await.unwrap(), Some(entry));
    assert!(reopened.verify("p").await.unwrap().is_valid());
}

#[tokio::test]
async fn test_append_json_fails_on_corrupt_last_entry() {
    let log = TestLog::new();
    populate(&log.engine, "p", 2).await.unwrap();

    let mut file = OpenOptions::new()
        .append(true)
        .open(log.partition_path("p"))
        .unwrap();
    file.write_all(b"{\"seq\":2,\"not\":\"an entry\"}\n").unwrap();

    let err = log.engine.append_json("p", r#"{"ok":true}"#).await.unwrap_err();
    assert!(matches!(err, EngineError::Core(_)), "got {:?}", err);

    // Nothing was appended after the corrupt line.
    let lines = std::fs::read_to_string(log.partition_path("p")).unwrap();
    assert_eq!(lines.lines().count(), 3);

    // A bad partition name is still a rejection, not an error.
    let outcome = log.engine.append_json("", "{}").await.unwrap();
    assert!(outcome.entry().is_none());
}
