//! Directory-backed implementation of the PartitionStore trait.
//!
//! Each partition is one file, `<base_dir>/<key>.jsonl`, holding one entry
//! per line. Writes and tail scans use std::fs wrapped in async via
//! tokio::spawn_blocking; sequential reads stream through tokio::fs.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hashlog_core::PartitionKey;
use tokio::io::AsyncReadExt;

use crate::error::{Result, StoreError};
use crate::lines::{decode_line, last_complete_line, LastLine, LineBuffer};
use crate::traits::{LineReader, PartitionStore};

/// File extension for partition files.
pub const PARTITION_EXTENSION: &str = "jsonl";

/// When appended bytes are forced to stable storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Leave flushing to the operating system.
    #[default]
    Buffered,
    /// `fdatasync` after every append.
    Fsync,
}

/// Configuration for [`FileStore`].
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    pub sync: SyncPolicy,
    /// Initial number of trailing bytes scanned by `read_last`. Doubles
    /// until a complete line is found.
    pub read_last_window: usize,
    /// Buffer size for sequential reads.
    pub read_chunk_size: usize,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            sync: SyncPolicy::Buffered,
            read_last_window: 8192,
            read_chunk_size: 64 * 1024,
        }
    }
}

/// Partition store over a directory of newline-delimited files.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
    config: FileStoreConfig,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `base_dir`.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(base_dir, FileStoreConfig::default())
    }

    /// Open with a custom configuration.
    pub fn open_with_config(base_dir: impl AsRef<Path>, config: FileStoreConfig) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        tracing::debug!(dir = %base_dir.display(), sync = ?config.sync, "opened file store");
        Ok(Self { base_dir, config })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// Path of the file backing `key`.
    pub fn partition_path(&self, key: &PartitionKey) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", key.as_str(), PARTITION_EXTENSION))
    }
}

#[async_trait]
impl PartitionStore for FileStore {
    async fn append_line(&self, key: &PartitionKey, line: &str) -> Result<()> {
        let path = self.partition_path(key);
        let partition = key.as_str().to_string();
        let sync = self.config.sync;
        let mut record = Vec::with_capacity(line.len() + 2);
        record.extend_from_slice(line.as_bytes());
        record.push(b'\n');

        blocking(move || append_blocking(&path, &partition, record, sync)).await
    }

    async fn read_all(&self, key: &PartitionKey) -> Result<Option<Box<dyn LineReader>>> {
        let path = self.partition_path(key);
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Some(Box::new(FileLineReader {
                file,
                partition: key.as_str().to_string(),
                buffer: LineBuffer::default(),
                chunk: vec![0; self.config.read_chunk_size.max(1)],
            }))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_last(&self, key: &PartitionKey) -> Result<Option<String>> {
        let path = self.partition_path(key);
        let partition = key.as_str().to_string();
        let window = self.config.read_last_window.max(1);

        blocking(move || read_last_blocking(&path, &partition, window)).await
    }

    async fn exists(&self, key: &PartitionKey) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.partition_path(key)).await?)
    }

    async fn list_partitions(&self) -> Result<BTreeSet<String>> {
        let mut partitions = BTreeSet::new();
        let mut dir = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(partitions),
            Err(e) => return Err(e.into()),
        };

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PARTITION_EXTENSION) {
                continue;
            }
            if !item.file_type().await?.is_file() {
                continue;
            }
            let key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(PartitionKey::from_storage);
            match key {
                Some(key) => {
                    partitions.insert(key.as_str().to_string());
                }
                None => {
                    tracing::debug!(path = %path.display(), "skipping file with foreign name");
                }
            }
        }

        Ok(partitions)
    }
}

/// Run blocking file I/O off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
}

fn append_blocking(path: &Path, partition: &str, record: Vec<u8>, sync: SyncPolicy) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    // A crash mid-write can leave an unterminated fragment; start a fresh
    // line so the new record stays parseable.
    let len = file.metadata()?.len();
    let mut bytes = record;
    if len > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(len - 1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            tracing::warn!(partition, "partition ends with a torn line, terminating it");
            bytes.insert(0, b'\n');
        }
    }

    file.write_all(&bytes)?;
    if sync == SyncPolicy::Fsync {
        file.sync_data()?;
    }
    Ok(())
}

fn read_last_blocking(path: &Path, partition: &str, initial_window: usize) -> Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata()?.len();
    match last_line_bytes(&mut file, len, initial_window as u64)? {
        Some(bytes) => decode_line(bytes, partition).map(Some),
        None => Ok(None),
    }
}

/// Scan backwards from `len` in doubling windows for the last complete line.
fn last_line_bytes<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    initial_window: u64,
) -> io::Result<Option<Vec<u8>>> {
    let mut window = initial_window.max(1);
    loop {
        let start = len.saturating_sub(window);
        // One byte of lookbehind tells whether the window opens on a line
        // boundary.
        let from = start.saturating_sub(1);
        let mut buf = vec![0u8; (len - from) as usize];
        reader.seek(SeekFrom::Start(from))?;
        reader.read_exact(&mut buf)?;

        let (body, at_line_start) = if start == 0 {
            (&buf[..], true)
        } else {
            (&buf[1..], buf[0] == b'\n')
        };
        match last_complete_line(body, at_line_start) {
            LastLine::Found(range) => return Ok(Some(body[range].to_vec())),
            LastLine::Absent if start == 0 => return Ok(None),
            // Only blank lines in this window; earlier ones may not be.
            LastLine::Absent | LastLine::NeedMore => window = window.saturating_mul(2),
        }
    }
}

/// Streams complete lines from a partition file.
struct FileLineReader {
    file: tokio::fs::File,
    partition: String,
    buffer: LineBuffer,
    chunk: Vec<u8>,
}

#[async_trait]
impl LineReader for FileLineReader {
    async fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(line) = self.buffer.next_line(&self.partition)? {
                return Ok(Some(line));
            }
            let n = self.file.read(&mut self.chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.buffer.push(&self.chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(name: &str) -> PartitionKey {
        PartitionKey::new(name).unwrap()
    }

    async fn collect(store: &FileStore, k: &PartitionKey) -> Vec<String> {
        let mut reader = store.read_all(k).await.unwrap().unwrap();
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let k = key("orders");

        store.append_line(&k, "one").await.unwrap();
        store.append_line(&k, "two").await.unwrap();

        assert_eq!(collect(&store, &k).await, vec!["one", "two"]);
        assert_eq!(store.read_last(&k).await.unwrap().as_deref(), Some("two"));
        assert_eq!(
            fs::read_to_string(dir.path().join("orders.jsonl")).unwrap(),
            "one\ntwo\n"
        );
    }

    #[tokio::test]
    async fn test_missing_partition() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let k = key("nope");

        assert!(!store.exists(&k).await.unwrap());
        assert!(store.read_all(&k).await.unwrap().is_none());
        assert!(store.read_last(&k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_last_larger_than_window() {
        let dir = TempDir::new().unwrap();
        let config = FileStoreConfig {
            read_last_window: 16,
            ..Default::default()
        };
        let store = FileStore::open_with_config(dir.path(), config).unwrap();
        let k = key("big");
        let long = "x".repeat(20_000);

        store.append_line(&k, "first").await.unwrap();
        store.append_line(&k, &long).await.unwrap();

        assert_eq!(store.read_last(&k).await.unwrap(), Some(long));
    }

    /// Counts how many windows a backwards scan reads.
    struct CountingReader {
        inner: std::io::Cursor<Vec<u8>>,
        seeks: usize,
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            Read::read(&mut self.inner, buf)
        }
    }

    impl Seek for CountingReader {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.seeks += 1;
            self.inner.seek(pos)
        }
    }

    fn scan(data: &[u8], window: u64) -> (Option<Vec<u8>>, usize) {
        let mut reader = CountingReader {
            inner: std::io::Cursor::new(data.to_vec()),
            seeks: 0,
        };
        let found = last_line_bytes(&mut reader, data.len() as u64, window).unwrap();
        (found, reader.seeks)
    }

    #[test]
    fn test_window_on_line_boundary_reads_once() {
        // The 5-byte window is exactly "bbbb\n".
        let (found, seeks) = scan(b"aaaa\nbbbb\n", 5);
        assert_eq!(found.as_deref(), Some(&b"bbbb"[..]));
        assert_eq!(seeks, 1);
    }

    #[test]
    fn test_window_inside_line_grows() {
        let (found, seeks) = scan(b"aaaa\nbbbb\n", 4);
        assert_eq!(found.as_deref(), Some(&b"bbbb"[..]));
        assert_eq!(seeks, 2);
    }

    #[test]
    fn test_window_of_blank_lines_looks_further_back() {
        let (found, _) = scan(b"entry\n\n\n\n", 2);
        assert_eq!(found.as_deref(), Some(&b"entry"[..]));

        let (found, _) = scan(b"\n\n\n", 1);
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_torn_tail_is_ignored_then_terminated() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let k = key("torn");
        let path = store.partition_path(&k);

        fs::write(&path, "good\n{\"seq\":1,").unwrap();
        assert_eq!(store.read_last(&k).await.unwrap().as_deref(), Some("good"));
        assert_eq!(collect(&store, &k).await, vec!["good"]);

        store.append_line(&k, "next").await.unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "good\n{\"seq\":1,\nnext\n"
        );
        assert_eq!(store.read_last(&k).await.unwrap().as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_reader_resumes_after_eof() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let k = key("live");

        store.append_line(&k, "a").await.unwrap();
        let mut reader = store.read_all(&k).await.unwrap().unwrap();
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("a"));
        assert_eq!(reader.next_line().await.unwrap(), None);

        store.append_line(&k, "b").await.unwrap();
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_list_partitions() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.append_line(&key("b"), "x").await.unwrap();
        store.append_line(&key("a"), "x").await.unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("bad name.jsonl"), "ignored").unwrap();

        let partitions: Vec<_> = store.list_partitions().await.unwrap().into_iter().collect();
        assert_eq!(partitions, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_fsync_policy_appends() {
        let dir = TempDir::new().unwrap();
        let config = FileStoreConfig {
            sync: SyncPolicy::Fsync,
            ..Default::default()
        };
        let store = FileStore::open_with_config(dir.path(), config).unwrap();
        let k = key("durable");

        store.append_line(&k, "x").await.unwrap();
        assert!(store.exists(&k).await.unwrap());
    }
}
