//! In-memory artwork cache with optional JSON persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use super::{ArtworkError, ArtworkRecord, ArtworkResult, ArtworkStore, SubjectKind};
use crate::protocol_constants::IMAGE_ROUTE_PREFIX;

/// File name of the persisted index inside the data directory.
const INDEX_FILE: &str = "artwork.json";

/// The index is written here first, then renamed over [`INDEX_FILE`].
const INDEX_TEMP_FILE: &str = "artwork.json.tmp";

/// [`ArtworkStore`] backed by a concurrent map.
///
/// Image references are random UUIDs; the image itself stays at its source
/// and is served through a redirect at `img/<ref>`.
pub struct MemoryArtworkStore {
    records: DashMap<(SubjectKind, String), ArtworkRecord>,
    /// Where the index is persisted, if anywhere.
    index_path: Option<PathBuf>,
    /// Held across copy-and-write so the newest copy always lands last.
    persist_lock: Mutex<()>,
}

impl MemoryArtworkStore {
    /// Creates a store that lives only in memory.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            index_path: None,
            persist_lock: Mutex::new(()),
        }
    }

    /// Opens a store persisted under `data_dir`, loading any existing index.
    ///
    /// A missing index starts empty; an unreadable one is logged and ignored.
    pub fn open(data_dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(data_dir) {
            log::warn!("[Artwork] Failed to create {}: {}", data_dir.display(), e);
        }
        let index_path = data_dir.join(INDEX_FILE);
        let records = DashMap::new();

        match std::fs::read(&index_path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<ArtworkRecord>>(&bytes) {
                Ok(loaded) => {
                    log::info!(
                        "[Artwork] Loaded {} cached record(s) from {}",
                        loaded.len(),
                        index_path.display()
                    );
                    for record in loaded {
                        records.insert((record.kind, record.key.clone()), record);
                    }
                }
                Err(e) => {
                    log::warn!(
                        "[Artwork] Ignoring unreadable index {}: {}",
                        index_path.display(),
                        e
                    );
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                log::warn!("[Artwork] Failed to read {}: {}", index_path.display(), e);
            }
        }

        Self {
            records,
            index_path: Some(index_path),
            persist_lock: Mutex::new(()),
        }
    }

    /// Returns the number of cached records, including negative ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn get(&self, kind: SubjectKind, key: &str, cached_only: bool) -> Option<ArtworkRecord> {
        self.records
            .get(&(kind, key.to_string()))
            .map(|r| r.value().clone())
            .filter(|r| !cached_only || r.has_image())
    }

    async fn insert(
        &self,
        kind: SubjectKind,
        key: String,
        image_url: Option<&str>,
        info_url: Option<&str>,
    ) -> ArtworkResult<Option<String>> {
        let image_ref = {
            let entry = self
                .records
                .entry((kind, key.clone()))
                .or_insert_with(|| ArtworkRecord {
                    kind,
                    key,
                    image_ref: image_url
                        .filter(|url| !url.is_empty())
                        .map(|_| uuid::Uuid::new_v4().to_string()),
                    image_url: image_url.map(str::to_string),
                    info_url: info_url.map(str::to_string),
                });
            entry.image_ref.clone()
        };
        self.persist().await?;
        Ok(image_ref)
    }

    async fn delete(&self, kind: SubjectKind, key: &str) -> ArtworkResult<()> {
        if self.records.remove(&(kind, key.to_string())).is_some() {
            self.persist().await?;
        }
        Ok(())
    }

    async fn persist(&self) -> ArtworkResult<()> {
        let Some(path) = &self.index_path else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;

        let snapshot: Vec<ArtworkRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        let json =
            serde_json::to_vec_pretty(&snapshot).map_err(|e| ArtworkError::Store(e.to_string()))?;

        let temp = path.with_file_name(INDEX_TEMP_FILE);
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| ArtworkError::Store(format!("{}: {}", temp.display(), e)))?;
        tokio::fs::rename(&temp, path)
            .await
            .map_err(|e| ArtworkError::Store(format!("{}: {}", path.display(), e)))
    }
}

impl Default for MemoryArtworkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtworkStore for MemoryArtworkStore {
    async fn get_album_art(
        &self,
        tag: u64,
        cached_only: bool,
    ) -> ArtworkResult<Option<ArtworkRecord>> {
        Ok(self.get(SubjectKind::Album, &tag.to_string(), cached_only))
    }

    async fn get_artist_art(
        &self,
        name: &str,
        cached_only: bool,
    ) -> ArtworkResult<Option<ArtworkRecord>> {
        Ok(self.get(SubjectKind::Artist, name, cached_only))
    }

    async fn insert_album_art(
        &self,
        tag: u64,
        image_url: Option<&str>,
        info_url: Option<&str>,
    ) -> ArtworkResult<Option<String>> {
        self.insert(SubjectKind::Album, tag.to_string(), image_url, info_url)
            .await
    }

    async fn insert_artist_art(
        &self,
        name: &str,
        image_url: Option<&str>,
        info_url: Option<&str>,
    ) -> ArtworkResult<Option<String>> {
        self.insert(SubjectKind::Artist, name.to_string(), image_url, info_url)
            .await
    }

    async fn delete_album_art(&self, tag: u64) -> ArtworkResult<()> {
        self.delete(SubjectKind::Album, &tag.to_string()).await
    }

    async fn delete_artist_art(&self, name: &str) -> ArtworkResult<()> {
        self.delete(SubjectKind::Artist, name).await
    }

    fn cache_path(&self, image_ref: &str) -> String {
        format!("{}{}", IMAGE_ROUTE_PREFIX, image_ref)
    }

    async fn image_source(&self, image_ref: &str) -> ArtworkResult<Option<String>> {
        Ok(self
            .records
            .iter()
            .find(|r| r.image_ref.as_deref() == Some(image_ref))
            .and_then(|r| r.image_url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn insert_is_idempotent() {
        let store = MemoryArtworkStore::new();
        let first = store
            .insert_album_art(7, Some("https://img.example/a.jpg"), Some("https://info/a"))
            .await
            .unwrap();
        let second = store
            .insert_album_art(7, Some("https://img.example/b.jpg"), None)
            .await
            .unwrap();

        assert!(first.is_some());
        assert_eq!(first, second);
        let record = store.get_album_art(7, false).await.unwrap().unwrap();
        assert_eq!(record.image_url.as_deref(), Some("https://img.example/a.jpg"));
        assert_eq!(record.info_url.as_deref(), Some("https://info/a"));
    }

    #[tokio::test]
    async fn negative_records_hidden_when_cached_only() {
        let store = MemoryArtworkStore::new();
        let image_ref = store.insert_artist_art("wire", None, None).await.unwrap();
        assert!(image_ref.is_none());
        assert!(store.get_artist_art("wire", false).await.unwrap().is_some());
        assert!(store.get_artist_art("wire", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_then_insert_supersedes() {
        let store = MemoryArtworkStore::new();
        store.insert_album_art(1, Some("https://old"), None).await.unwrap();
        store.delete_album_art(1).await.unwrap();
        store.insert_album_art(1, Some("https://new"), None).await.unwrap();
        let record = store.get_album_art(1, true).await.unwrap().unwrap();
        assert_eq!(record.image_url.as_deref(), Some("https://new"));
    }

    #[tokio::test]
    async fn image_source_resolves_cache_path() {
        let store = MemoryArtworkStore::new();
        let image_ref = store
            .insert_album_art(3, Some("https://img.example/c.jpg"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.cache_path(&image_ref), format!("img/{}", image_ref));
        assert_eq!(
            store.image_source(&image_ref).await.unwrap().as_deref(),
            Some("https://img.example/c.jpg")
        );
        assert!(store.image_source("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn persists_index_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = MemoryArtworkStore::open(dir.path());
            store
                .insert_artist_art("john smith", Some("https://img/js.jpg"), None)
                .await
                .unwrap();
        }
        let reopened = MemoryArtworkStore::open(dir.path());
        assert_eq!(reopened.len(), 1);
        assert!(reopened
            .get_artist_art("john smith", true)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_all_persist() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(MemoryArtworkStore::open(dir.path()));

        let writers: Vec<_> = (0..64u64)
            .map(|tag| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_album_art(tag, Some(&format!("https://img/{}.jpg", tag)), None)
                        .await
                        .unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let reopened = MemoryArtworkStore::open(dir.path());
        assert_eq!(reopened.len(), 64);
        assert!(!dir.path().join(INDEX_TEMP_FILE).exists());
    }
}
