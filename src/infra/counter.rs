//! Global usage counter.
//!
//! A single named counter exposing `get_value` and `increment`. It only
//! feeds the "global simulations" display and is never correctness critical.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum CounterError {
    #[error("Counter storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Counter file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type CounterFuture<'a> = Pin<Box<dyn Future<Output = Result<u64, CounterError>> + Send + 'a>>;

/// Store for the global usage counter.
pub trait CounterStore: Send + Sync {
    /// Current value.
    fn get_value(&self) -> CounterFuture<'_>;

    /// Adds one and returns the new value.
    fn increment(&self) -> CounterFuture<'_>;
}

/// Process-local counter.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    value: AtomicU64,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }
}

impl CounterStore for MemoryCounterStore {
    fn get_value(&self) -> CounterFuture<'_> {
        let value = self.value.load(Ordering::Relaxed);
        Box::pin(async move { Ok(value) })
    }

    fn increment(&self) -> CounterFuture<'_> {
        let value = self.value.fetch_add(1, Ordering::Relaxed) + 1;
        Box::pin(async move { Ok(value) })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CounterFile {
    value: u64,
}

/// Counter persisted as `{"value": n}` in a JSON file.
///
/// The file is rewritten on every increment; the in-memory value only
/// advances once the write succeeded.
#[derive(Debug)]
pub struct FileCounterStore {
    path: PathBuf,
    value: Mutex<u64>,
}

impl FileCounterStore {
    /// Opens the counter at `path`, starting from zero if the file is missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CounterError> {
        let path = path.as_ref().to_path_buf();
        let value = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<CounterFile>(&bytes)?.value,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), value, "Opened counter file");

        Ok(Self {
            path,
            value: Mutex::new(value),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, value: u64) -> Result<(), CounterError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec(&CounterFile { value })?;
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }
}

impl CounterStore for FileCounterStore {
    fn get_value(&self) -> CounterFuture<'_> {
        Box::pin(async move { Ok(*self.value.lock().await) })
    }

    fn increment(&self) -> CounterFuture<'_> {
        Box::pin(async move {
            let mut value = self.value.lock().await;
            let next = *value + 1;
            self.persist(next).await?;
            *value = next;
            Ok(next)
        })
    }
}
