//! Fills a snapshot's artwork fields from the cache or the provider.

use std::sync::Arc;

use super::lookup::{self, ArtLookup};
use super::{ArtworkRecord, ArtworkStore};
use crate::error::ErrorCode;
use crate::metadata::{MetadataProvider, ProviderResult, ReleaseKind};
use crate::playlist::names;
use crate::protocol_constants::{BLANK_PLACEHOLDER, PROVIDER_ICON_PLACEHOLDER};
use crate::services::{NowSnapshot, SnapshotEvent};

/// Art fields resolved for one subject.
#[derive(Debug, Default)]
struct Resolved {
    image_ref: Option<String>,
    info_url: Option<String>,
}

impl From<ArtworkRecord> for Resolved {
    fn from(record: ArtworkRecord) -> Self {
        Self {
            image_ref: record.image_ref,
            info_url: record.info_url,
        }
    }
}

/// Resolves `image_url` and `info_url` for the current track.
///
/// Lookups go to the cache first and to the provider only on a miss. Every
/// provider answer is cached, including "nothing found", so a given album or
/// artist is asked for at most once. Failed lookups are not cached.
pub struct ArtworkResolver {
    store: Arc<dyn ArtworkStore>,
    provider: Option<Arc<dyn MetadataProvider>>,
}

impl ArtworkResolver {
    /// Creates a resolver. Without a provider, snapshots are left untouched.
    pub fn new(store: Arc<dyn ArtworkStore>, provider: Option<Arc<dyn MetadataProvider>>) -> Self {
        Self { store, provider }
    }

    /// Fills the artwork fields of `snapshot` in place.
    pub async fn augment(&self, snapshot: &mut NowSnapshot) {
        let Some(provider) = self.provider.as_deref() else {
            return;
        };
        if snapshot.event != SnapshotEvent::Track || snapshot.track_artist.trim().is_empty() {
            return;
        }

        let mut resolved = Resolved::default();
        if let Some(tag) = snapshot.track_tag {
            resolved = self
                .album(provider, tag, &snapshot.track_artist, &snapshot.track_album)
                .await;
        }

        if resolved.image_ref.is_none() {
            let artist = self
                .artist(provider, &snapshot.track_artist, &snapshot.track_album)
                .await;
            resolved.image_ref = artist.image_ref;
            resolved.info_url = resolved.info_url.or(artist.info_url);
        }

        snapshot.image_url = match &resolved.image_ref {
            Some(image_ref) => self.store.cache_path(image_ref),
            None if resolved.info_url.is_some() || snapshot.track_tag.is_some() => {
                PROVIDER_ICON_PLACEHOLDER.to_string()
            }
            None => BLANK_PLACEHOLDER.to_string(),
        };
        snapshot.info_url = resolved.info_url.unwrap_or_default();
    }

    async fn album(
        &self,
        provider: &dyn MetadataProvider,
        tag: u64,
        artist: &str,
        album: &str,
    ) -> Resolved {
        match self.store.get_album_art(tag, false).await {
            Ok(Some(record)) => return record.into(),
            Ok(None) => {}
            Err(e) => {
                log::warn!("[Artwork] Album cache read for tag {} failed: {}", tag, e);
                return Resolved::default();
            }
        }

        let subject = format!("tag {}", tag);
        let result = lookup::album_art(provider, artist, album, ReleaseKind::Release, 0).await;
        let Some(found) = Self::answered(result, &subject) else {
            return Resolved::default();
        };
        let image_ref = self
            .store
            .insert_album_art(tag, found.image_url.as_deref(), found.info_url.as_deref())
            .await;
        Self::cached(image_ref, found, &subject)
    }

    async fn artist(&self, provider: &dyn MetadataProvider, artist: &str, album: &str) -> Resolved {
        let key = names::artist_key(artist);
        match self.store.get_artist_art(&key, false).await {
            Ok(Some(record)) => return record.into(),
            Ok(None) => {}
            Err(e) => {
                log::warn!("[Artwork] Artist cache read for {:?} failed: {}", key, e);
                return Resolved::default();
            }
        }

        let result = lookup::artist_art(provider, artist, Some(album)).await;
        let Some(found) = Self::answered(result, &key) else {
            return Resolved::default();
        };
        let image_ref = self
            .store
            .insert_artist_art(&key, found.image_url.as_deref(), found.info_url.as_deref())
            .await;
        Self::cached(image_ref, found, &key)
    }

    /// Returns the provider's answer, "nothing found" included, or `None` if
    /// the lookup failed.
    fn answered(lookup: ProviderResult<Option<ArtLookup>>, subject: &str) -> Option<ArtLookup> {
        match lookup {
            Ok(found) => Some(found.unwrap_or_default()),
            Err(e) => {
                log::warn!(
                    "[Provider] Lookup for {} failed ({}): {}",
                    subject,
                    e.code(),
                    e
                );
                None
            }
        }
    }

    fn cached(
        image_ref: super::ArtworkResult<Option<String>>,
        found: ArtLookup,
        subject: &str,
    ) -> Resolved {
        match image_ref {
            Ok(image_ref) => Resolved {
                image_ref,
                info_url: found.info_url,
            },
            Err(e) => {
                log::warn!(
                    "[Artwork] Caching art for {} failed ({}): {}",
                    subject,
                    e.code(),
                    e
                );
                Resolved {
                    image_ref: None,
                    info_url: found.info_url,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::lookup::testing::{artist, release, MockProvider};
    use crate::artwork::MemoryArtworkStore;

    fn track(artist: &str, tag: Option<u64>) -> NowSnapshot {
        NowSnapshot {
            id: 1,
            show_id: 1,
            track_artist: artist.into(),
            track_album: "Pink Flag".into(),
            track_tag: tag,
            event: SnapshotEvent::Track,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn without_provider_fields_stay_empty() {
        let resolver = ArtworkResolver::new(Arc::new(MemoryArtworkStore::new()), None);
        let mut snapshot = track("Wire", Some(3));
        resolver.augment(&mut snapshot).await;
        assert_eq!(snapshot.image_url, "");
        assert_eq!(snapshot.info_url, "");
    }

    #[tokio::test]
    async fn tagged_track_uses_album_art_and_caches_it() {
        let store = Arc::new(MemoryArtworkStore::new());
        let provider = Arc::new(MockProvider {
            release: Some(release(10, "https://img/pf.jpg")),
            ..Default::default()
        });
        let resolver = ArtworkResolver::new(store.clone(), Some(provider.clone()));

        let mut snapshot = track("Wire", Some(3));
        resolver.augment(&mut snapshot).await;
        assert!(snapshot.image_url.starts_with("img/"));
        assert_eq!(snapshot.info_url, "https://www.discogs.com/release/10");

        let calls = provider.calls();
        let mut again = track("Wire", Some(3));
        resolver.augment(&mut again).await;
        assert_eq!(again.image_url, snapshot.image_url);
        assert_eq!(provider.calls(), calls);
    }

    #[tokio::test]
    async fn untagged_track_falls_back_to_artist_art() {
        let store = Arc::new(MemoryArtworkStore::new());
        let provider = Arc::new(MockProvider {
            searched_artist: Some(artist(5, "Wire", "https://img/wire.jpg")),
            ..Default::default()
        });
        let resolver = ArtworkResolver::new(store.clone(), Some(provider));

        let mut snapshot = track("Wire", None);
        resolver.augment(&mut snapshot).await;
        assert!(snapshot.image_url.starts_with("img/"));
        assert!(store.get_artist_art("wire", true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn placeholders_when_nothing_found() {
        let provider = Arc::new(MockProvider::default());
        let resolver =
            ArtworkResolver::new(Arc::new(MemoryArtworkStore::new()), Some(provider.clone()));

        let mut tagged = track("Nobody", Some(8));
        resolver.augment(&mut tagged).await;
        assert_eq!(tagged.image_url, "img/discogs.svg");

        let mut untagged = track("Nobody Else", None);
        resolver.augment(&mut untagged).await;
        assert_eq!(untagged.image_url, "img/blank.gif");
        assert_eq!(untagged.info_url, "");

        // Negative results are cached too.
        let calls = provider.calls();
        resolver.augment(&mut track("Nobody Else", None)).await;
        assert_eq!(provider.calls(), calls);
    }

    #[tokio::test]
    async fn show_snapshots_are_not_augmented() {
        let provider = Arc::new(MockProvider::default());
        let resolver =
            ArtworkResolver::new(Arc::new(MemoryArtworkStore::new()), Some(provider.clone()));
        let mut snapshot = NowSnapshot {
            event: SnapshotEvent::Show,
            ..Default::default()
        };
        resolver.augment(&mut snapshot).await;
        assert_eq!(snapshot.image_url, "");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn failed_lookup_is_not_cached() {
        let store = Arc::new(MemoryArtworkStore::new());
        let failing = Arc::new(MockProvider {
            fail: true,
            ..Default::default()
        });
        let resolver = ArtworkResolver::new(store.clone(), Some(failing));

        let mut snapshot = track("Wire", Some(3));
        resolver.augment(&mut snapshot).await;
        assert_eq!(snapshot.image_url, "img/discogs.svg");
        assert!(store.get_album_art(3, false).await.unwrap().is_none());
        assert!(store.get_artist_art("wire", false).await.unwrap().is_none());

        // Once the provider answers again, the same track gets its art.
        let working = Arc::new(MockProvider {
            release: Some(release(10, "https://img/pf.jpg")),
            ..Default::default()
        });
        let resolver = ArtworkResolver::new(store.clone(), Some(working));
        let mut snapshot = track("Wire", Some(3));
        resolver.augment(&mut snapshot).await;
        assert!(snapshot.image_url.starts_with("img/"));
        assert_ne!(snapshot.image_url, "img/discogs.svg");
        assert!(store.get_album_art(3, true).await.unwrap().is_some());
    }
}
