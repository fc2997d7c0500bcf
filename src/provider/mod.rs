//! Providers, the unit of pluggability, and the manager that aggregates them.
//!
//! # Architecture
//!
//! - [`Provider`] - Async trait with the core capability set
//! - [`Capabilities`] - Which optional capabilities a provider offers
//! - [`ProviderManager`] - Registry plus fan-out and fallback operations
//! - [`ApiProvider`] - Metadata-source listings with embed or token-exchange streams
//! - [`ScraperProvider`] - CSS-selector scraping with an extractor for streams
//! - [`EmbedProvider`] - Streams only, from URL templates
//! - [`build_default_provider_manager`] - Built-in catalog wired from an [`EngineConfig`](crate::EngineConfig)
//!
//! # Example
//!
//! ```no_run
//! use mediahub_core::{EngineConfig, RequestContext, build_default_provider_manager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = build_default_provider_manager(&EngineConfig::default())?;
//! let ctx = RequestContext::new();
//! let streams = manager
//!     .get_streams_from_all("movie/27205", mediahub_core::ContentKind::Movie, &ctx)
//!     .await?;
//! println!("{} candidate streams", streams.len());
//! # Ok(())
//! # }
//! ```

mod api;
mod embed;
mod error;
mod manager;
mod outcome;
mod registry;
mod scraped;
mod types;

pub use api::{ApiProvider, StreamStrategy, TRENDING_FILTER};
pub use embed::EmbedProvider;
pub use error::{ManagerError, ProviderError};
pub use manager::{DEFAULT_PROVIDER_TIMEOUT, ProviderManager, ProviderStats, ProviderSummary};
pub use outcome::{FailureReason, FanOutReport, Outcome, ProviderFailure};
pub use registry::build_default_provider_manager;
pub use scraped::{ScrapeProfile, ScraperProvider};
pub use types::{
    CatalogFilter, ContentKind, EpisodeLink, Info, Post, ProviderConfig, SeasonLink, Stream,
    StreamKind, Subtitle,
};

use async_trait::async_trait;
use serde::Serialize;

use crate::context::RequestContext;

/// Capability set of a provider beyond the required core
/// (`get_posts`, `get_meta`, `get_stream`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capabilities {
    /// Core only.
    Core,
    /// Core plus search.
    CoreSearch,
    /// Core plus episode listing.
    CoreEpisodes,
    /// Core plus search and episode listing.
    Full,
}

impl Capabilities {
    /// Builds the variant from individual flags.
    #[must_use]
    pub fn from_flags(search: bool, episodes: bool) -> Self {
        match (search, episodes) {
            (false, false) => Self::Core,
            (true, false) => Self::CoreSearch,
            (false, true) => Self::CoreEpisodes,
            (true, true) => Self::Full,
        }
    }

    /// Returns true when `search` is implemented.
    #[must_use]
    pub fn supports_search(self) -> bool {
        matches!(self, Self::CoreSearch | Self::Full)
    }

    /// Returns true when `get_episodes` is implemented.
    #[must_use]
    pub fn supports_episodes(self) -> bool {
        matches!(self, Self::CoreEpisodes | Self::Full)
    }
}

/// Trait that every content source implements.
///
/// # Object Safety
///
/// This trait uses `async_trait` so the manager can hold `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Static configuration.
    fn config(&self) -> &ProviderConfig;

    /// Provider id (shorthand for `config().id`).
    fn id(&self) -> &str {
        &self.config().id
    }

    /// Optional capabilities this provider implements.
    fn capabilities(&self) -> Capabilities;

    /// Lists one page of a catalog filter.
    async fn get_posts(
        &self,
        filter: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, ProviderError>;

    /// Fetches metadata for a detail link.
    async fn get_meta(&self, link: &str, ctx: &RequestContext) -> Result<Info, ProviderError>;

    /// Resolves a link into playable streams.
    async fn get_stream(
        &self,
        link: &str,
        kind: ContentKind,
        ctx: &RequestContext,
    ) -> Result<Vec<Stream>, ProviderError>;

    /// Searches the provider's catalog.
    async fn search(
        &self,
        _query: &str,
        _page: u32,
        _ctx: &RequestContext,
    ) -> Result<Vec<Post>, ProviderError> {
        Err(ProviderError::unsupported(self.id(), "search"))
    }

    /// Lists episodes behind a season link.
    async fn get_episodes(
        &self,
        _url: &str,
        _ctx: &RequestContext,
    ) -> Result<Vec<EpisodeLink>, ProviderError> {
        Err(ProviderError::unsupported(self.id(), "episodes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_flags_round_trip() {
        for (search, episodes) in [(false, false), (true, false), (false, true), (true, true)] {
            let caps = Capabilities::from_flags(search, episodes);
            assert_eq!(caps.supports_search(), search);
            assert_eq!(caps.supports_episodes(), episodes);
        }
        assert_eq!(Capabilities::from_flags(true, true), Capabilities::Full);
    }
}
