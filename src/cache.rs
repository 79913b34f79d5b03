//! # Cache Store Module
//!
//! Questo modulo gestisce la cache persistente digest → artefatto compresso.
//!
//! ## Responsabilità:
//! - Carica il record `.cache.json` dalla directory di cache (una volta per run)
//! - Invalida tutte le entry se lo snapshot della configurazione è cambiato
//! - Rimuove le entry orfane (artefatto mancante) prima di iniziare il lavoro
//! - Lookup/insert sincronizzati tramite un singolo mutex (`SharedCache`)
//! - Salva il record una sola volta a fine run, in modo atomico
//!
//! ## Strategia di persistence:
//! - Record JSON `{ "config": {...}, "files": { "<hex>": {...} } }`
//! - Record assente, malformato o di formato vecchio → cache vuota (solo log)
//! - Snapshot diverso → cache vuota, gli artefatti su disco diventano orfani
//! - Nessuna verifica degli artefatti al load: ci pensa `prune_orphans`
//!
//! ## Esempio struttura record:
//! ```json
//! {
//!   "config": { "image_quality": 85, "image_max_width": null },
//!   "files": {
//!     "9f86d0…": { "cached_filename": "9f86d0….png", "original_hash": "9f86d0…" }
//!   }
//! }
//! ```

use crate::error::{CompressError, Result};
use crate::fingerprint::ConfigSnapshot;
use crate::hasher::ContentDigest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Name of the persisted record inside the cache directory.
pub const CACHE_RECORD_FILE: &str = ".cache.json";

/// One cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// File name of the artifact inside the cache directory
    #[serde(rename = "cached_filename")]
    pub artifact_filename: String,
    /// Digest of the source file the artifact was produced from
    #[serde(rename = "original_hash")]
    pub original_digest: ContentDigest,
}

impl CacheEntry {
    pub fn new(artifact_filename: impl Into<String>, original_digest: ContentDigest) -> Self {
        Self {
            artifact_filename: artifact_filename.into(),
            original_digest,
        }
    }

    /// Path of the artifact under `cache_dir`, or `None` when the stored name
    /// is not a plain file name.
    pub fn artifact_path(&self, cache_dir: &Path) -> Option<PathBuf> {
        let name = Path::new(&self.artifact_filename);
        let mut components = name.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(cache_dir.join(name)),
            _ => None,
        }
    }
}

/// In-memory cache for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cache {
    #[serde(rename = "config")]
    pub snapshot: ConfigSnapshot,
    #[serde(rename = "files")]
    pub entries: HashMap<ContentDigest, CacheEntry>,
}

impl Cache {
    pub fn empty(snapshot: ConfigSnapshot) -> Self {
        Self {
            snapshot,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loads, prunes and saves the persisted cache record of one cache directory.
pub struct CacheStore {
    cache_dir: PathBuf,
    record_path: PathBuf,
    snapshot: ConfigSnapshot,
}

impl CacheStore {
    /// Opens the store, creating the cache directory when missing.
    ///
    /// Failing to create the directory is a setup error and aborts the run.
    pub async fn open(cache_dir: &Path, snapshot: ConfigSnapshot) -> Result<Self> {
        tokio::fs::create_dir_all(cache_dir).await.map_err(|e| {
            CompressError::Setup(format!(
                "cannot create cache directory {}: {}",
                cache_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
            record_path: cache_dir.join(CACHE_RECORD_FILE),
            snapshot,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[cfg(test)]
    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Reads the persisted record, falling back to an empty cache under the
    /// current snapshot when it is absent, malformed or stale.
    pub async fn load(&self) -> Cache {
        let stored = match self.read_record().await {
            Ok(Some(cache)) => cache,
            Ok(None) => {
                debug!("No cache record at {}, starting fresh", self.record_path.display());
                return Cache::empty(self.snapshot.clone());
            }
            Err(e) => {
                warn!("{}; starting with an empty cache", e);
                return Cache::empty(self.snapshot.clone());
            }
        };

        if stored.snapshot != self.snapshot {
            info!("Configuration changed, clearing cache...");
            for change in stored.snapshot.differences(&self.snapshot) {
                info!("  {}", change);
            }
            return Cache::empty(self.snapshot.clone());
        }

        debug!("Loaded {} cache entries", stored.len());
        Cache {
            snapshot: self.snapshot.clone(),
            entries: stored.entries,
        }
    }

    async fn read_record(&self) -> Result<Option<Cache>> {
        let content = match tokio::fs::read(&self.record_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CompressError::CacheCorruption {
                    path: self.record_path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| CompressError::CacheCorruption {
                path: self.record_path.clone(),
                reason: e.to_string(),
            })
    }

    /// Drops every entry whose artifact no longer exists. Returns how many were removed.
    pub fn prune_orphans(&self, cache: &mut Cache) -> usize {
        let before = cache.entries.len();
        cache.entries.retain(|digest, entry| {
            let alive = entry
                .artifact_path(&self.cache_dir)
                .map(|path| path.is_file())
                .unwrap_or(false);
            if !alive {
                debug!("Dropping orphaned cache entry {} ({})", digest, entry.artifact_filename);
            }
            alive
        });

        let removed = before - cache.entries.len();
        if removed > 0 {
            info!("Cleaned {} orphaned cache entries", removed);
        }
        removed
    }

    /// Writes `{snapshot, entries}` over any previous record.
    ///
    /// The record goes to a temp file first and is renamed into place.
    pub async fn save(&self, cache: &Cache) -> Result<()> {
        let record = Cache {
            snapshot: self.snapshot.clone(),
            entries: cache.entries.clone(),
        };
        let content = serde_json::to_vec_pretty(&record).map_err(|e| CompressError::CacheCorruption {
            path: self.record_path.clone(),
            reason: e.to_string(),
        })?;

        let cache_dir = self.cache_dir.clone();
        let record_path = self.record_path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut staged = tempfile::Builder::new()
                .prefix(".cache-")
                .suffix(".json.tmp")
                .tempfile_in(&cache_dir)
                .map_err(|e| CompressError::io(&cache_dir, e))?;
            staged
                .write_all(&content)
                .map_err(|e| CompressError::io(staged.path(), e))?;
            staged
                .persist(&record_path)
                .map_err(|e| CompressError::io(&record_path, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| CompressError::TaskPanicked {
            path: self.record_path.clone(),
            reason: e.to_string(),
        })??;

        debug!("Saved {} cache entries to {}", cache.len(), self.record_path.display());
        Ok(())
    }
}

/// Cache shared between workers. The lock is held for a single map access only.
#[derive(Debug)]
pub struct SharedCache {
    inner: Mutex<Cache>,
}

impl SharedCache {
    pub fn new(cache: Cache) -> Self {
        Self {
            inner: Mutex::new(cache),
        }
    }

    /// Synchronized read; returns a copy of the entry.
    pub async fn lookup(&self, digest: &ContentDigest) -> Option<CacheEntry> {
        self.inner.lock().await.entries.get(digest).cloned()
    }

    /// Synchronized write; replaces any entry already stored for `digest`.
    pub async fn insert(&self, digest: ContentDigest, entry: CacheEntry) {
        self.inner.lock().await.entries.insert(digest, entry);
    }

    /// Drops the entry for `digest` only if it still equals `stale`, so an
    /// entry inserted by another worker since the lookup survives.
    pub async fn remove_if(&self, digest: &ContentDigest, stale: &CacheEntry) -> bool {
        let mut cache = self.inner.lock().await;
        if cache.entries.get(digest) == Some(stale) {
            cache.entries.remove(digest);
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Copy of the whole cache, taken once all workers are done.
    pub async fn cloned(&self) -> Cache {
        self.inner.lock().await.clone()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> Cache {
        self.inner.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn snapshot_with_quality(quality: u8) -> ConfigSnapshot {
        Config {
            image_quality: quality,
            ..Config::default()
        }
        .snapshot()
    }

    fn entry_for(data: &[u8]) -> (ContentDigest, CacheEntry) {
        let digest = ContentDigest::of(data);
        let entry = CacheEntry::new(format!("{}.png", digest), digest);
        (digest, entry)
    }

    #[tokio::test]
    async fn test_load_without_record_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::open(&temp_dir.path().join("cache"), snapshot_with_quality(85))
            .await
            .unwrap();
        assert!(store.cache_dir().is_dir());

        let cache = store.load().await;
        assert!(cache.is_empty());
        assert_eq!(cache.snapshot, snapshot_with_quality(85));
    }

    #[tokio::test]
    async fn test_save_then_load_same_snapshot_keeps_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::open(temp_dir.path(), snapshot_with_quality(85))
            .await
            .unwrap();

        let mut cache = store.load().await;
        let (digest, entry) = entry_for(b"one");
        cache.entries.insert(digest, entry.clone());
        store.save(&cache).await.unwrap();

        let reloaded = CacheStore::open(temp_dir.path(), snapshot_with_quality(85))
            .await
            .unwrap()
            .load()
            .await;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.entries.get(&digest), Some(&entry));
    }

    #[tokio::test]
    async fn test_config_change_discards_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::open(temp_dir.path(), snapshot_with_quality(85))
            .await
            .unwrap();
        let mut cache = store.load().await;
        let (digest, entry) = entry_for(b"one");
        cache.entries.insert(digest, entry);
        store.save(&cache).await.unwrap();

        let changed = CacheStore::open(temp_dir.path(), snapshot_with_quality(60))
            .await
            .unwrap();
        let cache = changed.load().await;
        assert!(cache.is_empty());
        assert_eq!(cache.snapshot, snapshot_with_quality(60));
    }

    #[tokio::test]
    async fn test_malformed_record_is_treated_as_absent() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::open(temp_dir.path(), snapshot_with_quality(85))
            .await
            .unwrap();

        std::fs::write(store.record_path(), b"{ this is not json").unwrap();
        assert!(store.load().await.is_empty());

        // Legacy layout: a bare digest map without a config snapshot
        let (digest, entry) = entry_for(b"legacy");
        let legacy = serde_json::json!({ digest.to_hex(): entry });
        std::fs::write(store.record_path(), legacy.to_string()).unwrap();
        assert!(store.load().await.is_empty());

        let bad_key = serde_json::json!({
            "config": store.snapshot(),
            "files": { "not-hex": { "cached_filename": "x.png", "original_hash": digest.to_hex() } }
        });
        std::fs::write(store.record_path(), bad_key.to_string()).unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_record_uses_plugin_field_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::open(temp_dir.path(), snapshot_with_quality(85))
            .await
            .unwrap();
        let mut cache = store.load().await;
        let (digest, entry) = entry_for(b"named");
        cache.entries.insert(digest, entry);
        store.save(&cache).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.record_path()).unwrap()).unwrap();
        assert_eq!(raw["config"]["image_quality"], 85);
        let stored = &raw["files"][digest.to_hex()];
        assert_eq!(stored["cached_filename"], format!("{}.png", digest));
        assert_eq!(stored["original_hash"], digest.to_hex());
    }

    #[tokio::test]
    async fn test_prune_orphans_removes_missing_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::open(temp_dir.path(), snapshot_with_quality(85))
            .await
            .unwrap();
        let mut cache = store.load().await;

        let (kept, kept_entry) = entry_for(b"kept");
        std::fs::write(temp_dir.path().join(&kept_entry.artifact_filename), b"artifact").unwrap();
        let (orphan, orphan_entry) = entry_for(b"orphan");
        let (escape, _) = entry_for(b"escape");
        cache.entries.insert(kept, kept_entry);
        cache.entries.insert(orphan, orphan_entry);
        cache
            .entries
            .insert(escape, CacheEntry::new("../outside.png", escape));

        assert_eq!(store.prune_orphans(&mut cache), 2);
        assert!(cache.entries.contains_key(&kept));
        assert!(!cache.entries.contains_key(&orphan));
        assert!(!cache.entries.contains_key(&escape));

        let shared = SharedCache::new(cache);
        assert!(shared.lookup(&orphan).await.is_none());
    }

    #[test]
    fn test_artifact_path_rejects_non_plain_names() {
        let digest = ContentDigest::of(b"x");
        let dir = Path::new("/cache");
        assert_eq!(
            CacheEntry::new("abc.png", digest).artifact_path(dir),
            Some(PathBuf::from("/cache/abc.png"))
        );
        assert!(CacheEntry::new("../abc.png", digest).artifact_path(dir).is_none());
        assert!(CacheEntry::new("sub/abc.png", digest).artifact_path(dir).is_none());
        assert!(CacheEntry::new("/etc/passwd", digest).artifact_path(dir).is_none());
        assert!(CacheEntry::new("", digest).artifact_path(dir).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups_observe_same_entry() {
        let shared = Arc::new(SharedCache::new(Cache::empty(snapshot_with_quality(85))));
        let (digest, entry) = entry_for(b"hot");
        shared.insert(digest, entry.clone()).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move { shared.lookup(&digest).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(entry.clone()));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_are_all_recorded() {
        let shared = Arc::new(SharedCache::new(Cache::empty(snapshot_with_quality(85))));

        let mut handles = Vec::new();
        for i in 0..64u32 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                let (digest, entry) = entry_for(&i.to_le_bytes());
                shared.insert(digest, entry.clone()).await;
                shared.insert(digest, entry).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(shared.len().await, 64);
        let shared = Arc::try_unwrap(shared).unwrap();
        assert_eq!(shared.into_inner().len(), 64);
    }

    #[tokio::test]
    async fn test_remove_if_keeps_replaced_entry() {
        let shared = SharedCache::new(Cache::empty(snapshot_with_quality(85)));
        let (digest, stale) = entry_for(b"same bytes");
        shared.insert(digest, stale.clone()).await;

        // Another worker refreshed the entry after the stale one was read
        let fresh = CacheEntry::new(format!("{}.webp", digest), digest);
        shared.insert(digest, fresh.clone()).await;
        assert!(!shared.remove_if(&digest, &stale).await);
        assert_eq!(shared.lookup(&digest).await, Some(fresh.clone()));

        assert!(shared.remove_if(&digest, &fresh).await);
        assert!(shared.lookup(&digest).await.is_none());
    }
}
