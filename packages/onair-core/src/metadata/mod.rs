//! Third-party music catalog used to resolve artwork.
//!
//! The provider is rate-limited by contract, so callers keep its traffic
//! serialized; see [`ImageQueue`](crate::services::ImageQueue).

use async_trait::async_trait;
use thiserror::Error;

mod discogs;

pub use discogs::{DiscogsClient, DiscogsConfig};

/// Errors raised by a [`MetadataProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport failure, including timeouts.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("HTTP error {0}")]
    Status(u16),

    /// Provider refused the request because of its rate limit.
    #[error("rate limited by provider")]
    RateLimited,

    /// Response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Returns `true` if the same request could succeed later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status(code) => *code >= 500,
            Self::RateLimited => true,
            Self::Malformed(_) => false,
        }
    }
}

/// Convenient Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Whether a release search targets individual pressings or the canonical
/// ("master") release grouping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    Release,
    Master,
}

/// Parameters of an artist + album search.
#[derive(Debug, Clone)]
pub struct ReleaseQuery<'a> {
    pub artist: &'a str,
    pub album: &'a str,
    pub kind: ReleaseKind,
    /// Number of leading candidates to skip.
    pub skip: usize,
}

impl<'a> ReleaseQuery<'a> {
    /// Query for the first matching pressing.
    pub fn new(artist: &'a str, album: &'a str) -> Self {
        Self {
            artist,
            album,
            kind: ReleaseKind::Release,
            skip: 0,
        }
    }
}

/// A release search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseMatch {
    pub id: u64,
    pub kind: ReleaseKind,
    pub image_url: Option<String>,
    pub info_url: Option<String>,
}

/// An artist as known to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistMatch {
    pub id: u64,
    pub name: String,
    pub image_url: Option<String>,
    pub info_url: Option<String>,
}

/// An artist credited on a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistCredit {
    pub id: u64,
    pub name: String,
}

/// Release detail needed to confirm an artist match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDetail {
    pub id: u64,
    pub artists: Vec<ArtistCredit>,
}

/// Search interface of the external catalog.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Finds the best artist match for a name.
    async fn search_artist(&self, name: &str) -> ProviderResult<Option<ArtistMatch>>;

    /// Finds a release by artist and album title.
    async fn search_release(&self, query: &ReleaseQuery<'_>)
        -> ProviderResult<Option<ReleaseMatch>>;

    /// Fetches a release's credits.
    async fn release_detail(&self, id: u64, kind: ReleaseKind) -> ProviderResult<ReleaseDetail>;

    /// Fetches an artist's profile, including the primary image.
    async fn artist_detail(&self, id: u64) -> ProviderResult<ArtistMatch>;
}

/// Strips provider decorations from a credited name so it compares equal to
/// the name as entered at the station.
///
/// Removes a trailing numeric disambiguator (`"Wire (2)"`) and the
/// name-variation asterisk (`"Wire*"`).
#[must_use]
pub fn normalize_credit_name(name: &str) -> String {
    let name = name.trim().trim_end_matches('*');
    let name = match name.rsplit_once(" (") {
        Some((base, suffix))
            if suffix.ends_with(')')
                && suffix.len() > 1
                && suffix[..suffix.len() - 1].bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    };
    name.trim().to_lowercase()
}
