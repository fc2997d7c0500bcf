//! TMDB-shaped metadata client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use super::{MetadataError, MetadataSource};
use crate::context::RequestContext;
use crate::http::{FetchClient, FetchError};
use crate::provider::{ContentKind, EpisodeLink, Info, Post, SeasonLink};

/// Default TMDB API root.
pub const DEFAULT_TMDB_API_BASE: &str = "https://api.themoviedb.org/3";

/// Default TMDB poster root.
pub const DEFAULT_TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

const SOURCE_ID: &str = "tmdb";
const MAX_CAST: usize = 15;

#[derive(Debug, Deserialize)]
struct PagedResults {
    #[serde(default)]
    results: Vec<TmdbItem>,
}

#[derive(Debug, Deserialize)]
struct TmdbItem {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    vote_average: Option<f32>,
    media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeason {
    season_number: u32,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbDetails {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f32>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    #[serde(default)]
    genres: Vec<Named>,
    #[serde(default)]
    credits: Credits,
    #[serde(default)]
    seasons: Vec<TmdbSeason>,
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    episode_number: u32,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeasonDetails {
    #[serde(default)]
    episodes: Vec<TmdbEpisode>,
}

/// Client for a TMDB-compatible API.
#[derive(Clone)]
pub struct TmdbClient {
    client: FetchClient,
    api_key: String,
    api_base: String,
    image_base: String,
}

impl std::fmt::Debug for TmdbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TmdbClient")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl TmdbClient {
    /// Creates a client against the public TMDB API.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::MissingApiKey`] when `api_key` is blank.
    pub fn new(client: FetchClient, api_key: impl Into<String>) -> Result<Self, MetadataError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(MetadataError::MissingApiKey);
        }
        Ok(Self {
            client,
            api_key,
            api_base: DEFAULT_TMDB_API_BASE.to_string(),
            image_base: DEFAULT_TMDB_IMAGE_BASE.to_string(),
        })
    }

    /// Points the client at another API root.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the image root prefixed to poster and backdrop paths.
    #[must_use]
    pub fn with_image_base(mut self, image_base: impl Into<String>) -> Self {
        self.image_base = image_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<String, MetadataError> {
        let raw = format!("{}/{}", self.api_base, path.trim_start_matches('/'));
        let mut url = Url::parse(&raw).map_err(|_| FetchError::invalid_url(&raw))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", &self.api_key);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    async fn fetch_list(
        &self,
        path: &str,
        params: &[(&str, &str)],
        default_kind: Option<ContentKind>,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, MetadataError> {
        let url = self.endpoint(path, params)?;
        let page: PagedResults = self.client.get_json(&url, ctx).await?;
        Ok(page
            .results
            .into_iter()
            .filter_map(|item| self.item_to_post(item, default_kind))
            .collect())
    }

    fn image(&self, path: Option<String>) -> Option<String> {
        path.filter(|p| !p.is_empty())
            .map(|p| format!("{}{p}", self.image_base))
    }

    fn item_to_post(&self, item: TmdbItem, default_kind: Option<ContentKind>) -> Option<Post> {
        let kind = match item.media_type.as_deref() {
            Some("movie") => ContentKind::Movie,
            Some("tv") => ContentKind::Tv,
            Some(_) => return None,
            None => default_kind?,
        };
        let title = item.title.or(item.name).filter(|t| !t.trim().is_empty())?;
        let year = year_of(item.release_date.or(item.first_air_date));
        Some(Post {
            id: item.id.to_string(),
            title,
            image_url: self.image(item.poster_path).unwrap_or_default(),
            detail_link: format!("{kind}/{}", item.id),
            kind,
            year,
            rating: item.vote_average.filter(|r| *r > 0.0),
            source_provider_id: SOURCE_ID.to_string(),
        })
    }

    fn details_to_info(&self, details: TmdbDetails) -> Info {
        let title = details.title.or(details.name).unwrap_or_default();
        let year = year_of(details.release_date.or(details.first_air_date));
        let season_links = details
            .seasons
            .into_iter()
            .filter(|s| s.season_number > 0)
            .map(|s| SeasonLink {
                title: s
                    .name
                    .unwrap_or_else(|| format!("Season {}", s.season_number)),
                link: format!("tv/{}/{}", details.id, s.season_number),
            })
            .collect();
        Info {
            title,
            synopsis: details.overview.unwrap_or_default(),
            image_url: self.image(details.poster_path).unwrap_or_default(),
            backdrop_url: self.image(details.backdrop_path),
            rating: details.vote_average.filter(|r| *r > 0.0),
            year,
            genres: details.genres.into_iter().map(|g| g.name).collect(),
            cast: details
                .credits
                .cast
                .into_iter()
                .take(MAX_CAST)
                .map(|c| c.name)
                .collect(),
            season_links,
            source_provider_id: SOURCE_ID.to_string(),
        }
    }
}

fn year_of(date: Option<String>) -> Option<String> {
    date.and_then(|d| d.get(..4).map(str::to_string))
        .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
}

fn validate_id(id: &str) -> Result<(), MetadataError> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(MetadataError::InvalidId { id: id.to_string() })
    }
}

#[async_trait]
impl MetadataSource for TmdbClient {
    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn get_trending(
        &self,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, MetadataError> {
        let page = page.max(1).to_string();
        self.fetch_list("trending/all/week", &[("page", page.as_str())], None, ctx)
            .await
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn get_popular(
        &self,
        kind: ContentKind,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, MetadataError> {
        let page = page.max(1).to_string();
        self.fetch_list(
            &format!("{kind}/popular"),
            &[("page", page.as_str())],
            Some(kind),
            ctx,
        )
        .await
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn get_details(
        &self,
        id: &str,
        kind: ContentKind,
        ctx: &RequestContext,
    ) -> Result<Info, MetadataError> {
        validate_id(id)?;
        let url = self.endpoint(
            &format!("{kind}/{id}"),
            &[("append_to_response", "credits")],
        )?;
        let details: TmdbDetails = self.client.get_json(&url, ctx).await?;
        Ok(self.details_to_info(details))
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn search(
        &self,
        query: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, MetadataError> {
        let page = page.max(1).to_string();
        self.fetch_list(
            "search/multi",
            &[("query", query.trim()), ("page", page.as_str())],
            None,
            ctx,
        )
        .await
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn get_season_episodes(
        &self,
        id: &str,
        season: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<EpisodeLink>, MetadataError> {
        validate_id(id)?;
        let url = self.endpoint(&format!("tv/{id}/season/{season}"), &[])?;
        let details: SeasonDetails = self.client.get_json(&url, ctx).await?;
        Ok(details
            .episodes
            .into_iter()
            .map(|ep| EpisodeLink {
                title: match ep.name.filter(|n| !n.is_empty()) {
                    Some(name) => format!("E{}: {name}", ep.episode_number),
                    None => format!("Episode {}", ep.episode_number),
                },
                link: format!("tv/{id}/{season}/{}", ep.episode_number),
            })
            .collect())
    }
}
