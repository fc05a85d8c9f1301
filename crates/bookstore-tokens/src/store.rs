//! Disk-backed slot store for encrypted credentials
//!
//! A slot is one named record holding one ciphertext string. The global
//! scope uses the bare slot names (`accessToken`, `refreshToken`) and is
//! shared by every caller in the process: the last write wins. Subject scopes
//! prefix the slot name with an identifier so sessions do not overwrite each
//! other.
//!
//! All access goes through one tokio Mutex. Each `set` persists the whole map
//! with an atomic temp-file + rename, optionally gzip-compressed. Writes to
//! different slots are independent; there is no multi-slot transaction.
//!
//! Past `max_entries`, whole subject scopes are evicted in write order. The
//! global slots are never evicted: they hold the last value written until it
//! is overwritten.

use std::collections::HashMap;
use std::future::Future;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Store failures. Reads never fail: a missing record is `None`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("slot file is corrupt: {0}")]
    Corrupt(String),

    #[error("serializing slots: {0}")]
    Serialize(String),
}

/// Which set of slots a credential pair lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotScope {
    /// The process-wide pair, shared by all callers.
    Global,
    /// A pair owned by one subject or session.
    Subject(String),
}

impl SlotScope {
    /// Store key for `slot` within this scope.
    pub fn key(&self, slot: &str) -> String {
        match self {
            SlotScope::Global => slot.to_owned(),
            SlotScope::Subject(id) => format!("{id}/{slot}"),
        }
    }

    /// Scope name for logs.
    pub fn label(&self) -> &str {
        match self {
            SlotScope::Global => "global",
            SlotScope::Subject(id) => id,
        }
    }
}

/// Key/value storage for encrypted credentials.
///
/// Uses `Pin<Box<dyn Future>>` return types so orchestrators can hold an
/// `Arc<dyn SlotStore>`.
pub trait SlotStore: Send + Sync {
    /// Last value written to `key`, or `None` if never written (or evicted).
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

    /// Write `value` to `key`. On error the previous value is kept.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Delete `key`, returning the removed value.
    fn remove<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, StoreError>> + Send + 'a>>;
}

/// Storage-layer tuning.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Gzip the slot file on write.
    pub compress: bool,
    /// Upper bound on stored records. Past it, the least recently written
    /// subject scope is evicted as a whole; global slots are kept.
    pub max_entries: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            compress: true,
            max_entries: 1024,
        }
    }
}

/// One persisted record. `written` is a store-wide write sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: String,
    written: u64,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Slot store persisted to a single file.
pub struct DiskSlotStore {
    path: PathBuf,
    options: StoreOptions,
    state: Mutex<State>,
}

impl DiskSlotStore {
    /// Load slots from `path`.
    ///
    /// A missing file is a cold start: an empty store is created on disk.
    /// Compressed and plain files are both accepted regardless of
    /// `options.compress`; the next write uses the configured format.
    pub async fn load(path: PathBuf, options: StoreOptions) -> Result<Self, StoreError> {
        let entries = if path.exists() {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| StoreError::Io(format!("reading slot file: {e}")))?;
            let entries = decode(&bytes)?;
            info!(path = %path.display(), slots = entries.len(), "loaded credential slots");
            entries
        } else {
            info!(path = %path.display(), "slot file not found, starting with empty store");
            let entries = HashMap::new();
            write_atomic(&path, &entries, options.compress).await?;
            entries
        };

        let next_seq = entries.values().map(|e| e.written + 1).max().unwrap_or(0);
        Ok(Self {
            path,
            options,
            state: Mutex::new(State { entries, next_seq }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn set_inner(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let written = state.next_seq;
        state.next_seq += 1;

        let previous = state
            .entries
            .insert(key.to_owned(), Entry { value, written });
        let evicted = evict(&mut state.entries, key, self.options.max_entries);

        if let Err(e) = write_atomic(&self.path, &state.entries, self.options.compress).await {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(entry) => state.entries.insert(key.to_owned(), entry),
                None => state.entries.remove(key),
            };
            state.entries.extend(evicted);
            return Err(e);
        }

        for (k, _) in &evicted {
            debug!(slot = %k, "evicted least recently written subject slot");
        }
        debug!(slot = key, "stored slot");
        Ok(())
    }

    async fn remove_inner(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(removed) = state.entries.remove(key) else {
            return Ok(None);
        };
        if let Err(e) = write_atomic(&self.path, &state.entries, self.options.compress).await {
            state.entries.insert(key.to_owned(), removed);
            return Err(e);
        }
        debug!(slot = key, "removed slot");
        Ok(Some(removed.value))
    }
}

impl SlotStore for DiskSlotStore {
    fn get<'a>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state.entries.get(key).map(|e| e.value.clone())
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(self.set_inner(key, value))
    }

    fn remove<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, StoreError>> + Send + 'a>> {
        Box::pin(self.remove_inner(key))
    }
}

/// Subject id of a scoped key (`id` in `id/accessToken`). Global keys have none.
fn subject_of(key: &str) -> Option<&str> {
    key.rsplit_once('/').map(|(id, _)| id)
}

/// Drop whole subject scopes, least recently written first, until within
/// `max`. Global slots and the scope of `keep` are never evicted, so a
/// subject's access and refresh slots always leave together.
fn evict(entries: &mut HashMap<String, Entry>, keep: &str, max: usize) -> Vec<(String, Entry)> {
    let keep_subject = subject_of(keep);
    let mut evicted = Vec::new();
    while entries.len() > max.max(1) {
        let mut latest: HashMap<&str, u64> = HashMap::new();
        for (key, entry) in entries.iter() {
            match subject_of(key) {
                Some(id) if Some(id) != keep_subject => {
                    let written = latest.entry(id).or_insert(entry.written);
                    *written = (*written).max(entry.written);
                }
                _ => {}
            }
        }
        let Some(oldest) = latest
            .into_iter()
            .min_by_key(|(_, written)| *written)
            .map(|(id, _)| id.to_owned())
        else {
            break;
        };

        let keys: Vec<String> = entries
            .keys()
            .filter(|k| subject_of(k) == Some(oldest.as_str()))
            .cloned()
            .collect();
        for key in keys {
            if let Some(pair) = entries.remove_entry(&key) {
                evicted.push(pair);
            }
        }
    }
    evicted
}

fn decode(bytes: &[u8]) -> Result<HashMap<String, Entry>, StoreError> {
    let json = if bytes.starts_with(&GZIP_MAGIC) {
        let mut out = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(|e| StoreError::Corrupt(format!("gzip: {e}")))?;
        out
    } else {
        bytes.to_vec()
    };
    serde_json::from_slice(&json).map_err(|e| StoreError::Corrupt(format!("json: {e}")))
}

fn encode(entries: &HashMap<String, Entry>, compress: bool) -> Result<Vec<u8>, StoreError> {
    let json = serde_json::to_vec(entries).map_err(|e| StoreError::Serialize(e.to_string()))?;
    if !compress {
        return Ok(json);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .and_then(|_| encoder.finish())
        .map_err(|e| StoreError::Serialize(format!("gzip: {e}")))
}

/// Write slots to a file atomically.
///
/// Writes a temp file in the same directory and renames it over the target,
/// so a crash mid-write leaves the previous file intact. Permissions are 0600
/// since the file holds credentials.
async fn write_atomic(
    path: &Path,
    entries: &HashMap<String, Entry>,
    compress: bool,
) -> Result<(), StoreError> {
    let bytes = encode(entries, compress)?;

    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Io("slot path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "slots".into());
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| StoreError::Io(format!("writing temp slot file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| StoreError::Io(format!("setting slot file permissions: {e}")))?;
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        warn!(path = %path.display(), error = %e, "slot file rename failed");
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(StoreError::Io(format!("renaming temp slot file: {e}")));
    }

    debug!(path = %path.display(), bytes = bytes.len(), compressed = compress, "persisted slots");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn store_in(dir: &tempfile::TempDir, options: StoreOptions) -> DiskSlotStore {
        DiskSlotStore::load(dir.path().join("slots.db"), options)
            .await
            .unwrap()
    }

    #[test]
    fn scope_keys() {
        assert_eq!(SlotScope::Global.key("accessToken"), "accessToken");
        assert_eq!(
            SlotScope::Subject("u1".into()).key("refreshToken"),
            "u1/refreshToken"
        );
        assert_eq!(SlotScope::Global.label(), "global");
    }

    #[tokio::test]
    async fn get_returns_none_until_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, StoreOptions::default()).await;
        assert!(store.get("accessToken").await.is_none());

        store.set("accessToken", "ct-1".into()).await.unwrap();
        assert_eq!(store.get("accessToken").await.as_deref(), Some("ct-1"));
    }

    #[tokio::test]
    async fn last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, StoreOptions::default()).await;
        store.set("accessToken", "first".into()).await.unwrap();
        store.set("accessToken", "second".into()).await.unwrap();
        assert_eq!(store.get("accessToken").await.as_deref(), Some("second"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.db");

        let store = DiskSlotStore::load(path.clone(), StoreOptions::default())
            .await
            .unwrap();
        store.set("accessToken", "ct-a".into()).await.unwrap();
        store.set("refreshToken", "ct-r".into()).await.unwrap();
        drop(store);

        let reloaded = DiskSlotStore::load(path, StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(reloaded.get("accessToken").await.as_deref(), Some("ct-a"));
        assert_eq!(reloaded.get("refreshToken").await.as_deref(), Some("ct-r"));
    }

    #[tokio::test]
    async fn cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.db");
        assert!(!path.exists());

        let store = DiskSlotStore::load(path.clone(), StoreOptions::default())
            .await
            .unwrap();
        assert!(store.is_empty().await);
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
    }

    #[tokio::test]
    async fn compressed_file_is_gzip_of_slot_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, StoreOptions::default()).await;
        store.set("accessToken", "ct".into()).await.unwrap();

        let bytes = tokio::fs::read(store.path()).await.unwrap();
        assert!(bytes.starts_with(&GZIP_MAGIC));

        let mut json = String::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_string(&mut json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["accessToken"]["value"], "ct");
    }

    #[tokio::test]
    async fn plain_and_compressed_files_interoperate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.db");
        let plain = StoreOptions {
            compress: false,
            ..StoreOptions::default()
        };

        let store = DiskSlotStore::load(path.clone(), plain).await.unwrap();
        store.set("refreshToken", "ct-r".into()).await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("refreshToken"));
        drop(store);

        let compressed = DiskSlotStore::load(path.clone(), StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(compressed.get("refreshToken").await.as_deref(), Some("ct-r"));
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.db");
        std::fs::write(&path, b"{not json").unwrap();

        let result = DiskSlotStore::load(path, StoreOptions::default()).await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    fn bounded(max_entries: usize) -> StoreOptions {
        StoreOptions {
            max_entries,
            ..StoreOptions::default()
        }
    }

    #[tokio::test]
    async fn eviction_drops_least_recently_written_subject() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, bounded(4)).await;

        store.set("a/accessToken", "1".into()).await.unwrap();
        store.set("a/refreshToken", "2".into()).await.unwrap();
        store.set("b/accessToken", "3".into()).await.unwrap();
        store.set("b/refreshToken", "4".into()).await.unwrap();
        // Rewriting `a` makes `b` the oldest.
        store.set("a/accessToken", "5".into()).await.unwrap();
        store.set("c/accessToken", "6".into()).await.unwrap();

        assert_eq!(store.len().await, 3);
        assert!(store.get("b/accessToken").await.is_none());
        assert!(store.get("b/refreshToken").await.is_none());
        assert_eq!(store.get("a/accessToken").await.as_deref(), Some("5"));
        assert_eq!(store.get("a/refreshToken").await.as_deref(), Some("2"));
        assert_eq!(store.get("c/accessToken").await.as_deref(), Some("6"));
    }

    #[tokio::test]
    async fn eviction_never_splits_a_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, bounded(3)).await;

        store.set("a/accessToken", "1".into()).await.unwrap();
        store.set("a/refreshToken", "2".into()).await.unwrap();
        store.set("b/accessToken", "3".into()).await.unwrap();
        store.set("b/refreshToken", "4".into()).await.unwrap();

        assert!(store.get("a/accessToken").await.is_none());
        assert!(store.get("a/refreshToken").await.is_none());
        assert_eq!(store.get("b/accessToken").await.as_deref(), Some("3"));
        assert_eq!(store.get("b/refreshToken").await.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn global_slots_are_never_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, bounded(2)).await;

        store.set("accessToken", "g-a".into()).await.unwrap();
        store.set("refreshToken", "g-r".into()).await.unwrap();
        store.set("x/accessToken", "x".into()).await.unwrap();
        store.set("y/accessToken", "y".into()).await.unwrap();

        assert_eq!(store.get("accessToken").await.as_deref(), Some("g-a"));
        assert_eq!(store.get("refreshToken").await.as_deref(), Some("g-r"));
        assert!(store.get("x/accessToken").await.is_none());
        assert_eq!(store.get("y/accessToken").await.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn write_order_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.db");

        let store = DiskSlotStore::load(path.clone(), bounded(2)).await.unwrap();
        store.set("old/accessToken", "1".into()).await.unwrap();
        store.set("new/accessToken", "2".into()).await.unwrap();
        drop(store);

        let store = DiskSlotStore::load(path, bounded(2)).await.unwrap();
        store.set("newest/accessToken", "3".into()).await.unwrap();
        assert!(store.get("old/accessToken").await.is_none());
        assert!(store.get("new/accessToken").await.is_some());
    }

    #[tokio::test]
    async fn remove_deletes_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, StoreOptions::default()).await;
        store.set("accessToken", "ct".into()).await.unwrap();

        assert_eq!(store.remove("accessToken").await.unwrap().as_deref(), Some("ct"));
        assert!(store.remove("accessToken").await.unwrap().is_none());
        assert!(store.get("accessToken").await.is_none());
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("gone");
        std::fs::create_dir(&sub).unwrap();
        let store = DiskSlotStore::load(sub.join("slots.db"), StoreOptions::default())
            .await
            .unwrap();
        store.set("accessToken", "kept".into()).await.unwrap();

        std::fs::remove_dir_all(&sub).unwrap();
        let result = store.set("accessToken", "lost".into()).await;
        assert!(matches!(result, Err(StoreError::Io(_))));
        assert_eq!(store.get("accessToken").await.as_deref(), Some("kept"));

        let result = store.set("refreshToken", "lost".into()).await;
        assert!(result.is_err());
        assert!(store.get("refreshToken").await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, StoreOptions::default()).await;
        store.set("accessToken", "ct".into()).await.unwrap();

        let metadata = tokio::fs::metadata(store.path()).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "slot file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn concurrent_writes_dont_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slots.db");
        let store = Arc::new(
            DiskSlotStore::load(path.clone(), StoreOptions::default())
                .await
                .unwrap(),
        );

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("s{i}/accessToken");
                store.set(&key, format!("ct-{i}")).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.len().await, 10);
        let reloaded = DiskSlotStore::load(path, StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(reloaded.len().await, 10);
    }
}
