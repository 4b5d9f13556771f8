//! Discogs database API client.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{
    ArtistCredit, ArtistMatch, MetadataProvider, ProviderError, ProviderResult, ReleaseDetail,
    ReleaseKind, ReleaseMatch, ReleaseQuery,
};

/// Public site used to build human-facing info links.
const DISCOGS_SITE: &str = "https://www.discogs.com";

/// Discogs serves this image when a release has no artwork.
const SPACER_IMAGE: &str = "spacer.gif";

/// Largest `per_page` the search endpoint honours.
const MAX_PER_PAGE: usize = 100;

/// Connection settings for [`DiscogsClient`].
#[derive(Debug, Clone)]
pub struct DiscogsConfig {
    pub base_url: String,
    /// Personal access token.
    pub token: String,
    pub user_agent: String,
}

/// [`MetadataProvider`] backed by the Discogs REST API.
///
/// The shared `reqwest` client is expected to carry the request timeout.
pub struct DiscogsClient {
    client: Client,
    config: DiscogsConfig,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    cover_image: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Deserialize)]
struct ReleaseResponse {
    id: u64,
    #[serde(default)]
    artists: Vec<CreditResponse>,
}

#[derive(Deserialize)]
struct CreditResponse {
    id: u64,
    name: String,
}

#[derive(Deserialize)]
struct ArtistResponse {
    id: u64,
    name: String,
    #[serde(default)]
    images: Vec<ImageResponse>,
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(rename = "type", default)]
    kind: String,
    uri: String,
}

/// Drops empty and placeholder image URLs.
fn usable_image(url: Option<String>) -> Option<String> {
    url.filter(|u| !u.is_empty() && !u.ends_with(SPACER_IMAGE))
}

/// Turns a site-relative URI into an absolute link.
fn info_link(uri: Option<String>) -> Option<String> {
    uri.filter(|u| !u.is_empty()).map(|u| {
        if u.starts_with("http") {
            u
        } else {
            format!("{}{}", DISCOGS_SITE, u)
        }
    })
}

fn kind_param(kind: ReleaseKind) -> &'static str {
    match kind {
        ReleaseKind::Release => "release",
        ReleaseKind::Master => "master",
    }
}

impl DiscogsClient {
    /// Creates a client sharing the given HTTP connection pool.
    pub fn new(client: Client, config: DiscogsConfig) -> Self {
        Self { client, config }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<T> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Discogs token={}", self.config.token),
            )
            .query(query)
            .send()
            .await?;

        let response = Self::check_status(response)?;
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    fn check_status(response: Response) -> ProviderResult<Response> {
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
            status if status.is_success() => Ok(response),
            status => Err(ProviderError::Status(status.as_u16())),
        }
    }

    async fn search(
        &self,
        query: &[(&str, String)],
        skip: usize,
    ) -> ProviderResult<Option<SearchResult>> {
        let (page, per_page, index) = search_page(skip);
        let mut params = query.to_vec();
        params.push(("page", page.to_string()));
        params.push(("per_page", per_page.to_string()));
        let response: SearchResponse = self.get_json("/database/search", &params).await?;
        Ok(response.results.into_iter().nth(index))
    }
}

#[async_trait]
impl MetadataProvider for DiscogsClient {
    async fn search_artist(&self, name: &str) -> ProviderResult<Option<ArtistMatch>> {
        let hit = self
            .search(&[("type", "artist".into()), ("q", name.to_string())], 0)
            .await?;

        Ok(hit.map(|result| ArtistMatch {
            id: result.id,
            name: result.title,
            image_url: usable_image(result.cover_image),
            info_url: info_link(result.uri),
        }))
    }

    async fn search_release(
        &self,
        query: &ReleaseQuery<'_>,
    ) -> ProviderResult<Option<ReleaseMatch>> {
        let hit = self
            .search(
                &[
                    ("type", kind_param(query.kind).into()),
                    ("artist", query.artist.to_string()),
                    ("release_title", query.album.to_string()),
                ],
                query.skip,
            )
            .await?;

        Ok(hit.map(|result| ReleaseMatch {
            id: result.id,
            kind: query.kind,
            image_url: usable_image(result.cover_image),
            info_url: info_link(result.uri),
        }))
    }

    async fn release_detail(&self, id: u64, kind: ReleaseKind) -> ProviderResult<ReleaseDetail> {
        let path = match kind {
            ReleaseKind::Release => format!("/releases/{}", id),
            ReleaseKind::Master => format!("/masters/{}", id),
        };
        let response: ReleaseResponse = self.get_json(&path, &[]).await?;

        Ok(ReleaseDetail {
            id: response.id,
            artists: response
                .artists
                .into_iter()
                .map(|credit| ArtistCredit {
                    id: credit.id,
                    name: credit.name,
                })
                .collect(),
        })
    }

    async fn artist_detail(&self, id: u64) -> ProviderResult<ArtistMatch> {
        let response: ArtistResponse = self.get_json(&format!("/artists/{}", id), &[]).await?;

        let image = response
            .images
            .iter()
            .find(|image| image.kind == "primary")
            .or_else(|| response.images.first())
            .map(|image| image.uri.clone());

        Ok(ArtistMatch {
            id: response.id,
            name: response.name,
            image_url: usable_image(image),
            info_url: info_link(response.uri),
        })
    }
}

/// Maps a result offset to `(page, per_page, index within the page)`.
///
/// Small offsets fit in one page sized to reach them; larger ones walk
/// full pages.
fn search_page(skip: usize) -> (usize, usize, usize) {
    let per_page = (skip + 1).min(MAX_PER_PAGE);
    (skip / per_page + 1, per_page, skip % per_page)
}
