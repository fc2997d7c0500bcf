//! Metadata source collaborator: an external movie/TV database consumed
//! read-only by API-backed providers.

mod tmdb;

pub use tmdb::{DEFAULT_TMDB_API_BASE, DEFAULT_TMDB_IMAGE_BASE, TmdbClient};

use async_trait::async_trait;
use thiserror::Error;

use crate::context::RequestContext;
use crate::http::FetchError;
use crate::provider::{ContentKind, EpisodeLink, Info, Post};

/// Errors from a metadata source.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// No API key was configured.
    #[error("metadata API key is not configured\n  Suggestion: set TMDB_API_KEY or tmdb_api_key in the config file")]
    MissingApiKey,

    /// The request failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The id is not something the source understands.
    #[error("invalid metadata id '{id}'")]
    InvalidId {
        /// The offending id.
        id: String,
    },

    /// The source does not offer this lookup.
    #[error("metadata source does not support {operation}")]
    Unsupported {
        /// Operation name.
        operation: &'static str,
    },
}

/// Read-only movie/TV database.
///
/// Implementations adapt the database's own JSON into [`Post`]/[`Info`];
/// posts and info come back stamped with the source's id, which providers
/// overwrite with their own.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Trending titles of every kind.
    async fn get_trending(&self, page: u32, ctx: &RequestContext)
    -> Result<Vec<Post>, MetadataError>;

    /// Popular titles of one kind.
    async fn get_popular(
        &self,
        kind: ContentKind,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, MetadataError>;

    /// Full details for one title.
    async fn get_details(
        &self,
        id: &str,
        kind: ContentKind,
        ctx: &RequestContext,
    ) -> Result<Info, MetadataError>;

    /// Free-text search across kinds.
    async fn search(
        &self,
        query: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, MetadataError>;

    /// Episodes of one season.
    async fn get_season_episodes(
        &self,
        _id: &str,
        _season: u32,
        _ctx: &RequestContext,
    ) -> Result<Vec<EpisodeLink>, MetadataError> {
        Err(MetadataError::Unsupported {
            operation: "season episodes",
        })
    }
}
