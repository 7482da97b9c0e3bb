//! Durable key → value memoization for enrichment results.
//!
//! A [`CacheStore`] is a JSON object file loaded once at start and written
//! back once at the end through an atomic replace. In between, entries live
//! in a map behind a `tokio` mutex, which is the single serialization point
//! for concurrent enrichment.
//!
//! Presence is always a key-existence check: a cached empty string means
//! "looked up, nothing found" and is never recomputed.

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Memoization store, optionally backed by a file.
#[derive(Debug)]
pub struct CacheStore<V> {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, V>>,
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// A store that is never persisted.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A never-persisted store seeded with `entries`.
    #[must_use]
    pub fn from_entries(entries: HashMap<String, V>) -> Self {
        Self {
            path: None,
            entries: Mutex::new(entries),
        }
    }

    /// Loads the store at `path`, which is also where [`save`](Self::save)
    /// writes.
    ///
    /// A missing file yields an empty store. So does a file that is not a
    /// JSON object; entries whose values do not decode are dropped. Both
    /// cases are logged.
    ///
    /// # Errors
    ///
    /// Any other failure to read the file, so that a later
    /// [`save`](Self::save) never replaces entries it could not see.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = read_entries(&path).await?;
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Reads a cache file as a plain map, with the same leniency as
    /// [`load`](Self::load).
    ///
    /// # Errors
    ///
    /// As for [`load`](Self::load).
    pub async fn read_map(path: &Path) -> Result<HashMap<String, V>> {
        read_entries(path).await
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cached value for `key`.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Whether `key` has been cached, whatever its value.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.lock().await.insert(key.into(), value);
    }

    /// Number of cached keys.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Returns the cached value for `key`, or runs `compute`, caches its
    /// success and returns it. A failed computation caches nothing.
    ///
    /// The lock is not held while `compute` runs, so independent keys are
    /// computed concurrently.
    ///
    /// # Errors
    ///
    /// Whatever `compute` fails with.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(hit) = self.get(key).await {
            tracing::trace!(key, "cache hit");
            return Ok(hit);
        }
        let value = compute().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Writes every entry to the backing file, sorted by key, replacing the
    /// previous file atomically. In-memory stores do nothing.
    ///
    /// # Errors
    ///
    /// I/O or serialization failures; the previous file is left intact.
    pub async fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let sorted: BTreeMap<String, V> = self
            .entries
            .lock()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        uplink_jsonl::write_json_atomic(path, &sorted).await?;
        tracing::debug!(path = %path.display(), entries = sorted.len(), "saved cache");
        Ok(())
    }
}

async fn read_entries<V: DeserializeOwned>(path: &Path) -> Result<HashMap<String, V>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            tracing::warn!(path = %path.display(), error = %e, "cache is not UTF-8, starting empty");
            return Ok(HashMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    let object = match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "cache is not a JSON object, starting empty");
            return Ok(HashMap::new());
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache is malformed, starting empty");
            return Ok(HashMap::new());
        }
    };

    let mut entries = HashMap::with_capacity(object.len());
    for (key, value) in object {
        match serde_json::from_value(value) {
            Ok(value) => {
                entries.insert(key, value);
            }
            Err(e) => tracing::warn!(path = %path.display(), key = %key, error = %e, "dropping cache entry"),
        }
    }
    Ok(entries)
}

/// The two stores behind merge-date enrichment.
#[derive(Debug, Default)]
pub struct EnrichmentCache {
    /// Issue key → mainline merge timestamp, `""` when none qualifies
    pub merge_dates: CacheStore<String>,
    /// Issue key → internal id, `""` when the tracker returned none
    pub issue_ids: CacheStore<String>,
}

impl EnrichmentCache {
    /// Unpersisted caches.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the merge-date cache at `path` and the id cache next to it.
    ///
    /// # Errors
    ///
    /// Either file exists but cannot be read.
    pub async fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            merge_dates: CacheStore::load(path).await?,
            issue_ids: CacheStore::load(Self::ids_path(path)).await?,
        })
    }

    /// Sibling file holding internal ids: `<stem>.ids.json`.
    #[must_use]
    pub fn ids_path(path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map_or_else(|| "cache".into(), |s| s.to_string_lossy());
        path.with_file_name(format!("{stem}.ids.json"))
    }

    /// Persists both stores.
    ///
    /// # Errors
    ///
    /// The first write that fails.
    pub async fn save(&self) -> Result<()> {
        self.merge_dates.save().await?;
        self.issue_ids.save().await
    }
}
