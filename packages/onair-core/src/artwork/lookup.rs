//! Provider lookups shared by the resolver and the image queue.
//!
//! `Ok(None)` means the provider answered and had nothing. Failures are
//! returned as-is so callers can skip caching them; a failed lookup is a
//! miss for that call only.

use crate::metadata::{
    normalize_credit_name, ArtistMatch, MetadataProvider, ProviderError, ProviderResult,
    ReleaseKind, ReleaseMatch, ReleaseQuery,
};

/// Art found for a subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtLookup {
    pub image_url: Option<String>,
    pub info_url: Option<String>,
}

impl ArtLookup {
    /// Returns `true` if neither an image nor an info link was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image_url.is_none() && self.info_url.is_none()
    }
}

impl From<ReleaseMatch> for ArtLookup {
    fn from(m: ReleaseMatch) -> Self {
        Self {
            image_url: m.image_url,
            info_url: m.info_url,
        }
    }
}

impl From<ArtistMatch> for ArtLookup {
    fn from(m: ArtistMatch) -> Self {
        Self {
            image_url: m.image_url,
            info_url: m.info_url,
        }
    }
}

/// Looks up album art by artist and title.
///
/// `kind` and `skip` page through alternate candidates when the first
/// automatic choice was wrong.
pub async fn album_art(
    provider: &dyn MetadataProvider,
    artist: &str,
    album: &str,
    kind: ReleaseKind,
    skip: usize,
) -> ProviderResult<Option<ArtLookup>> {
    let query = ReleaseQuery {
        artist,
        album,
        kind,
        skip,
    };
    Ok(provider.search_release(&query).await?.map(ArtLookup::from))
}

/// Looks up artist art.
///
/// When an album title is known, first finds the release and takes the
/// artist profile from its credits, provided the credit names the same
/// artist. Otherwise, or if that fails, falls back to a plain artist search.
///
/// If the credits lookup failed transiently and the plain search finds
/// nothing, the failure is returned rather than a miss.
pub async fn artist_art(
    provider: &dyn MetadataProvider,
    artist: &str,
    album: Option<&str>,
) -> ProviderResult<Option<ArtLookup>> {
    let mut deferred: Option<ProviderError> = None;
    if let Some(album) = album.filter(|a| !a.trim().is_empty()) {
        match credited_artist(provider, artist, album).await {
            Ok(Some(found)) => return Ok(Some(found.into())),
            Ok(None) => {}
            Err(e) => {
                log::debug!("[Provider] Credits lookup for {:?} failed: {}", artist, e);
                deferred = Some(e).filter(ProviderError::is_transient);
            }
        }
    }

    match provider.search_artist(artist).await? {
        Some(found) => Ok(Some(found.into())),
        None => match deferred {
            Some(e) => Err(e),
            None => Ok(None),
        },
    }
}

async fn credited_artist(
    provider: &dyn MetadataProvider,
    artist: &str,
    album: &str,
) -> ProviderResult<Option<ArtistMatch>> {
    let Some(release) = provider
        .search_release(&ReleaseQuery::new(artist, album))
        .await?
    else {
        return Ok(None);
    };
    let detail = provider.release_detail(release.id, release.kind).await?;

    let wanted = normalize_credit_name(artist);
    let Some(credit) = detail
        .artists
        .iter()
        .find(|credit| normalize_credit_name(&credit.name) == wanted)
    else {
        return Ok(None);
    };
    provider.artist_detail(credit.id).await.map(Some)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider shared by the artwork and image queue tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::metadata::{
        ArtistCredit, ArtistMatch, MetadataProvider, ProviderError, ProviderResult,
        ReleaseDetail, ReleaseKind, ReleaseMatch, ReleaseQuery,
    };

    #[derive(Default)]
    pub struct MockProvider {
        pub fail: bool,
        pub release: Option<ReleaseMatch>,
        pub credits: Vec<ArtistCredit>,
        pub artist: Option<ArtistMatch>,
        pub searched_artist: Option<ArtistMatch>,
        pub calls: AtomicUsize,
        pub release_queries: Mutex<Vec<(String, String, ReleaseKind, usize)>>,
    }

    impl MockProvider {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn call(&self) -> ProviderResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::Status(500))
            } else {
                Ok(())
            }
        }
    }

    pub fn release(id: u64, image: &str) -> ReleaseMatch {
        ReleaseMatch {
            id,
            kind: ReleaseKind::Release,
            image_url: Some(image.to_string()),
            info_url: Some(format!("https://www.discogs.com/release/{}", id)),
        }
    }

    pub fn artist(id: u64, name: &str, image: &str) -> ArtistMatch {
        ArtistMatch {
            id,
            name: name.to_string(),
            image_url: Some(image.to_string()),
            info_url: Some(format!("https://www.discogs.com/artist/{}", id)),
        }
    }

    #[async_trait]
    impl MetadataProvider for MockProvider {
        async fn search_artist(&self, _name: &str) -> ProviderResult<Option<ArtistMatch>> {
            self.call()?;
            Ok(self.searched_artist.clone())
        }

        async fn search_release(
            &self,
            query: &ReleaseQuery<'_>,
        ) -> ProviderResult<Option<ReleaseMatch>> {
            self.call()?;
            self.release_queries.lock().push((
                query.artist.to_string(),
                query.album.to_string(),
                query.kind,
                query.skip,
            ));
            Ok(self.release.clone().map(|mut r| {
                r.kind = query.kind;
                r
            }))
        }

        async fn release_detail(
            &self,
            id: u64,
            _kind: ReleaseKind,
        ) -> ProviderResult<ReleaseDetail> {
            self.call()?;
            Ok(ReleaseDetail {
                id,
                artists: self.credits.clone(),
            })
        }

        async fn artist_detail(&self, _id: u64) -> ProviderResult<ArtistMatch> {
            self.call()?;
            self.artist
                .clone()
                .ok_or_else(|| ProviderError::Malformed("no artist".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{artist, release, MockProvider};
    use super::*;
    use crate::metadata::ArtistCredit;

    #[tokio::test]
    async fn artist_art_prefers_confirmed_credit() {
        let provider = MockProvider {
            release: Some(release(1, "https://img/release.jpg")),
            credits: vec![ArtistCredit {
                id: 9,
                name: "Wire (2)".into(),
            }],
            artist: Some(artist(9, "Wire", "https://img/wire.jpg")),
            searched_artist: Some(artist(10, "Wire UK", "https://img/other.jpg")),
            ..Default::default()
        };

        let found = artist_art(&provider, "Wire", Some("Pink Flag"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.image_url.as_deref(), Some("https://img/wire.jpg"));
    }

    #[tokio::test]
    async fn artist_art_falls_back_when_credit_differs() {
        let provider = MockProvider {
            release: Some(release(1, "https://img/release.jpg")),
            credits: vec![ArtistCredit {
                id: 9,
                name: "Various".into(),
            }],
            artist: Some(artist(9, "Various", "https://img/various.jpg")),
            searched_artist: Some(artist(10, "Wire", "https://img/wire.jpg")),
            ..Default::default()
        };

        let found = artist_art(&provider, "Wire", Some("Pink Flag"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.image_url.as_deref(), Some("https://img/wire.jpg"));
    }

    #[tokio::test]
    async fn provider_failure_is_reported_not_a_miss() {
        let provider = MockProvider {
            fail: true,
            ..Default::default()
        };
        let err = artist_art(&provider, "Wire", Some("Pink Flag"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(album_art(&provider, "Wire", "Pink Flag", ReleaseKind::Release, 0)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn nothing_found_is_a_miss() {
        let provider = MockProvider::default();
        assert!(artist_art(&provider, "Nobody", Some("Nothing"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn album_art_passes_paging_through() {
        let provider = MockProvider {
            release: Some(release(4, "https://img/4.jpg")),
            ..Default::default()
        };
        let found = album_art(&provider, "Wire", "154", ReleaseKind::Master, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.image_url.as_deref(), Some("https://img/4.jpg"));
        let queries = provider.release_queries.lock();
        assert_eq!(queries[0].2, ReleaseKind::Master);
        assert_eq!(queries[0].3, 3);
    }
}
