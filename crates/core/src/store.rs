//! Persisted, capacity-bounded chunk store.
//!
//! The whole store is one JSON blob, read in full and written in full. Every
//! load-mutate-save cycle runs under a per-store mutex, so writers inside one
//! process never lose each other's updates. Separate processes sharing a blob
//! are still last-write-wins.

use crate::error::AgentError;
use crate::models::{Chunk, StoreStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

pub const STORE_FORMAT_VERSION: u32 = 1;
pub const DEFAULT_STORE_CAPACITY: usize = 500;

/// Where the store blob lives.
#[async_trait]
pub trait StoreBackend {
    /// `None` when nothing has been written yet.
    async fn read(&self) -> Result<Option<Vec<u8>>, AgentError>;

    async fn write(&self, blob: Vec<u8>) -> Result<(), AgentError>;
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(Some(blob)),
        }
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn read(&self) -> Result<Option<Vec<u8>>, AgentError> {
        Ok(self.blob.lock().await.clone())
    }

    async fn write(&self, blob: Vec<u8>) -> Result<(), AgentError> {
        *self.blob.lock().await = Some(blob);
        Ok(())
    }
}

/// JSON file on disk. Writes go to a sibling temp file that is renamed over
/// the target, so readers never observe a half-written blob.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StoreBackend for FileBackend {
    async fn read(&self) -> Result<Option<Vec<u8>>, AgentError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn write(&self, blob: Vec<u8>) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.staging_path();
        tokio::fs::write(&staging, blob).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    chunks: &'a [Chunk],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedStore {
    Versioned {
        version: u32,
        chunks: Vec<PersistedChunk>,
    },
    /// Bare array written before the snapshot carried a version.
    Legacy(Vec<PersistedChunk>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedChunk {
    id: String,
    content: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    created_at: Option<PersistedTimestamp>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedTimestamp {
    Rfc3339(DateTime<Utc>),
    EpochMillis(i64),
}

impl PersistedTimestamp {
    fn into_datetime(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Rfc3339(at) => Some(at),
            Self::EpochMillis(millis) => DateTime::from_timestamp_millis(millis),
        }
    }
}

/// Decodes a store blob, stamping `now` on entries that carry no usable
/// timestamp. Returns the chunks and how many were backfilled.
pub fn decode_snapshot(blob: &[u8], now: DateTime<Utc>) -> Result<(Vec<Chunk>, usize), AgentError> {
    let records = match serde_json::from_slice::<PersistedStore>(blob)? {
        PersistedStore::Versioned { version, chunks } => {
            if version > STORE_FORMAT_VERSION {
                return Err(AgentError::UnsupportedStoreVersion {
                    found: version,
                    supported: STORE_FORMAT_VERSION,
                });
            }
            chunks
        }
        PersistedStore::Legacy(chunks) => chunks,
    };

    let mut backfilled = 0;
    let chunks = records
        .into_iter()
        .map(|record| {
            let created_at = record
                .created_at
                .and_then(PersistedTimestamp::into_datetime)
                .unwrap_or_else(|| {
                    backfilled += 1;
                    now
                });
            Chunk {
                id: record.id,
                content: record.content,
                source: record.source,
                embedding: record.embedding,
                created_at,
            }
        })
        .collect();

    Ok((chunks, backfilled))
}

pub fn encode_snapshot(chunks: &[Chunk]) -> Result<Vec<u8>, AgentError> {
    Ok(serde_json::to_vec(&SnapshotRef {
        version: STORE_FORMAT_VERSION,
        chunks,
    })?)
}

/// Drops the oldest entries in one drain so at most `capacity` remain.
/// Returns how many were removed.
pub fn enforce_capacity(chunks: &mut Vec<Chunk>, capacity: usize) -> usize {
    let excess = chunks.len().saturating_sub(capacity);
    if excess > 0 {
        chunks.drain(..excess);
    }
    excess
}

pub struct VectorStore<B> {
    backend: B,
    capacity: usize,
    lock: Mutex<()>,
}

impl<B> VectorStore<B>
where
    B: StoreBackend + Send + Sync,
{
    pub fn new(backend: B, capacity: usize) -> Result<Self, AgentError> {
        if capacity == 0 {
            return Err(AgentError::InvalidConfig(
                "store capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            backend,
            capacity,
            lock: Mutex::new(()),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reads the full store. An absent blob is an empty store.
    pub async fn load(&self) -> Result<Vec<Chunk>, AgentError> {
        let _guard = self.lock.lock().await;
        self.read_chunks().await
    }

    /// Replaces the full store.
    pub async fn save(&self, chunks: &[Chunk]) -> Result<(), AgentError> {
        let _guard = self.lock.lock().await;
        self.write_chunks(chunks).await
    }

    /// Starts a load-mutate-save cycle. The store stays locked until the
    /// returned transaction is committed or dropped.
    pub async fn begin(&self) -> Result<StoreTransaction<'_, B>, AgentError> {
        let guard = self.lock.lock().await;
        let chunks = self.read_chunks().await?;
        Ok(StoreTransaction {
            store: self,
            _guard: guard,
            chunks,
            evicted: 0,
        })
    }

    pub async fn reset(&self) -> Result<(), AgentError> {
        self.save(&[]).await
    }

    pub async fn stats(&self) -> Result<StoreStats, AgentError> {
        let chunks = self.load().await?;
        Ok(StoreStats::from_chunks(&chunks, self.capacity))
    }

    async fn read_chunks(&self) -> Result<Vec<Chunk>, AgentError> {
        let Some(blob) = self.backend.read().await? else {
            return Ok(Vec::new());
        };
        let (chunks, backfilled) = decode_snapshot(&blob, Utc::now())?;
        if backfilled > 0 {
            warn!(backfilled, "stored chunks had no timestamp, backfilled with now");
        }
        debug!(entries = chunks.len(), "store loaded");
        Ok(chunks)
    }

    async fn write_chunks(&self, chunks: &[Chunk]) -> Result<(), AgentError> {
        let blob = encode_snapshot(chunks)?;
        self.backend.write(blob).await?;
        debug!(entries = chunks.len(), "store persisted");
        Ok(())
    }
}

pub struct StoreTransaction<'a, B> {
    store: &'a VectorStore<B>,
    _guard: MutexGuard<'a, ()>,
    chunks: Vec<Chunk>,
    evicted: usize,
}

impl<'a, B> StoreTransaction<'a, B>
where
    B: StoreBackend + Send + Sync,
{
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunks evicted so far in this transaction.
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    /// Appends and evicts down to capacity. Returns how many entries this
    /// append pushed out.
    pub fn append(&mut self, chunk: Chunk) -> usize {
        self.chunks.push(chunk);
        let evicted = enforce_capacity(&mut self.chunks, self.store.capacity);
        self.evicted += evicted;
        evicted
    }

    pub async fn commit(self) -> Result<(), AgentError> {
        self.store.write_chunks(&self.chunks).await
    }
}
