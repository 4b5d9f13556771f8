//! Artwork cache and resolution.
//!
//! Resolved cover art is cached per album tag and per normalised artist name.
//! The cache itself is an external collaborator reached through
//! [`ArtworkStore`]; [`ArtworkResolver`] fills in a snapshot's art fields on
//! every broadcast, and the [`ImageQueue`](crate::services::ImageQueue)
//! pre-fetches art in the background.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod lookup;
mod resolver;
mod store;

pub use resolver::ArtworkResolver;
pub use store::MemoryArtworkStore;

/// Errors raised by an [`ArtworkStore`].
#[derive(Debug, Error)]
pub enum ArtworkError {
    /// The backing store failed.
    #[error("artwork store failure: {0}")]
    Store(String),
}

/// Convenient Result alias for artwork store operations.
pub type ArtworkResult<T> = Result<T, ArtworkError>;

/// What a cached record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubjectKind {
    Album,
    Artist,
}

/// A cached artwork lookup result.
///
/// A record with neither image nor info URL remembers that the lookup was
/// made and found nothing, so the provider is not asked again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkRecord {
    pub kind: SubjectKind,
    pub key: String,
    /// Store-local reference to the cached image.
    pub image_ref: Option<String>,
    /// Where the image was originally found.
    pub image_url: Option<String>,
    pub info_url: Option<String>,
}

impl ArtworkRecord {
    /// Returns `true` if the record carries an image.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image_ref.is_some()
    }
}

/// Cache of previously resolved artist and album artwork.
#[async_trait]
pub trait ArtworkStore: Send + Sync {
    /// Looks up album art by catalog tag.
    ///
    /// With `cached_only`, records without an image are treated as absent.
    async fn get_album_art(&self, tag: u64, cached_only: bool)
        -> ArtworkResult<Option<ArtworkRecord>>;

    /// Looks up artist art by normalised artist name.
    ///
    /// With `cached_only`, records without an image are treated as absent.
    async fn get_artist_art(
        &self,
        name: &str,
        cached_only: bool,
    ) -> ArtworkResult<Option<ArtworkRecord>>;

    /// Caches album art. Returns the image reference, which is the existing
    /// one if the tag is already cached.
    async fn insert_album_art(
        &self,
        tag: u64,
        image_url: Option<&str>,
        info_url: Option<&str>,
    ) -> ArtworkResult<Option<String>>;

    /// Caches artist art. Returns the image reference, which is the existing
    /// one if the artist is already cached.
    async fn insert_artist_art(
        &self,
        name: &str,
        image_url: Option<&str>,
        info_url: Option<&str>,
    ) -> ArtworkResult<Option<String>>;

    async fn delete_album_art(&self, tag: u64) -> ArtworkResult<()>;

    async fn delete_artist_art(&self, name: &str) -> ArtworkResult<()>;

    /// Returns the client-facing path of a cached image.
    fn cache_path(&self, image_ref: &str) -> String;

    /// Returns the source URL behind a cached image reference.
    async fn image_source(&self, image_ref: &str) -> ArtworkResult<Option<String>>;
}
