//! API-backed providers: listings and metadata from a shared metadata
//! source, streams from embed templates or a token-exchange API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use super::error::ProviderError;
use super::types::{ContentKind, EpisodeLink, Info, Post, ProviderConfig, Stream};
use super::{Capabilities, Provider};
use crate::context::RequestContext;
use crate::extractor::{ContentRef, EmbedTemplate, TokenExchangeExtractor, embed_streams};
use crate::metadata::MetadataSource;

/// Catalog token served by the metadata source's trending list.
pub const TRENDING_FILTER: &str = "trending";

/// How an [`ApiProvider`] turns a content link into streams.
#[derive(Debug, Clone)]
pub enum StreamStrategy {
    /// Substitute the id into URL templates; no network call.
    Embed(Vec<EmbedTemplate>),
    /// Two-step token exchange against the provider's API.
    TokenExchange(TokenExchangeExtractor),
}

/// Provider whose listings, search and metadata come from a [`MetadataSource`];
/// only the stream strategy differs between instances.
pub struct ApiProvider {
    config: ProviderConfig,
    metadata: Arc<dyn MetadataSource>,
    strategy: StreamStrategy,
}

impl ApiProvider {
    /// Creates an API-backed provider.
    #[must_use]
    pub fn new(
        config: ProviderConfig,
        metadata: Arc<dyn MetadataSource>,
        strategy: StreamStrategy,
    ) -> Self {
        Self {
            config,
            metadata,
            strategy,
        }
    }

    fn content_ref(&self, link: &str, kind: ContentKind) -> Result<ContentRef, ProviderError> {
        ContentRef::parse(link, kind).ok_or_else(|| ProviderError::invalid_link(&self.config.id, link))
    }

    /// Stamps posts with this provider's id and drops kinds it does not carry.
    fn adopt(&self, posts: Vec<Post>) -> Vec<Post> {
        posts
            .into_iter()
            .filter(|post| self.config.content_kinds.contains(&post.kind))
            .map(|mut post| {
                post.source_provider_id.clone_from(&self.config.id);
                post
            })
            .collect()
    }
}

#[async_trait]
impl Provider for ApiProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::Full
    }

    #[instrument(skip(self, ctx), fields(provider = %self.config.id))]
    async fn get_posts(
        &self,
        filter: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, ProviderError> {
        let posts = match self.config.catalog_filter(filter) {
            Some(entry) if entry.filter != TRENDING_FILTER => {
                self.metadata.get_popular(entry.kind, page, ctx).await?
            }
            _ => self.metadata.get_trending(page, ctx).await?,
        };
        Ok(self.adopt(posts))
    }

    #[instrument(skip(self, ctx), fields(provider = %self.config.id))]
    async fn get_meta(&self, link: &str, ctx: &RequestContext) -> Result<Info, ProviderError> {
        let content = self.content_ref(link, ContentKind::Movie)?;
        let mut info = self
            .metadata
            .get_details(&content.id, content.kind, ctx)
            .await?;
        info.source_provider_id.clone_from(&self.config.id);
        Ok(info)
    }

    #[instrument(skip(self, ctx), fields(provider = %self.config.id))]
    async fn get_stream(
        &self,
        link: &str,
        kind: ContentKind,
        ctx: &RequestContext,
    ) -> Result<Vec<Stream>, ProviderError> {
        match &self.strategy {
            StreamStrategy::Embed(templates) => Ok(embed_streams(templates, link, kind)),
            StreamStrategy::TokenExchange(extractor) => {
                Ok(extractor.streams_for_link(link, kind, ctx).await?)
            }
        }
    }

    async fn search(
        &self,
        query: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, ProviderError> {
        let posts = self.metadata.search(query, page, ctx).await?;
        Ok(self.adopt(posts))
    }

    /// `url` is a season link (`tv/<id>/<season>`); a missing season means 1.
    async fn get_episodes(
        &self,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<EpisodeLink>, ProviderError> {
        let content = self.content_ref(url, ContentKind::Tv)?;
        if content.kind != ContentKind::Tv {
            return Err(ProviderError::invalid_link(&self.config.id, url));
        }
        let season = content.season.unwrap_or(1);
        Ok(self
            .metadata
            .get_season_episodes(&content.id, season, ctx)
            .await?)
    }
}

impl std::fmt::Debug for ApiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiProvider")
            .field("id", &self.config.id)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::metadata::MetadataError;
    use crate::provider::{CatalogFilter, StreamKind};
    use std::sync::Mutex;

    /// Records which listing was asked for.
    #[derive(Default)]
    struct FakeSource {
        calls: Mutex<Vec<String>>,
    }

    fn post(title: &str, kind: ContentKind) -> Post {
        Post {
            id: title.to_lowercase(),
            title: title.to_string(),
            image_url: String::new(),
            detail_link: format!("{kind}/1"),
            kind,
            year: Some("2020".into()),
            rating: None,
            source_provider_id: "tmdb".into(),
        }
    }

    #[async_trait]
    impl MetadataSource for FakeSource {
        async fn get_trending(
            &self,
            page: u32,
            _ctx: &RequestContext,
        ) -> Result<Vec<Post>, MetadataError> {
            self.calls.lock().unwrap().push(format!("trending:{page}"));
            Ok(vec![post("Movie", ContentKind::Movie), post("Show", ContentKind::Tv)])
        }

        async fn get_popular(
            &self,
            kind: ContentKind,
            page: u32,
            _ctx: &RequestContext,
        ) -> Result<Vec<Post>, MetadataError> {
            self.calls.lock().unwrap().push(format!("popular:{kind}:{page}"));
            Ok(vec![post("Popular", kind)])
        }

        async fn get_details(
            &self,
            id: &str,
            kind: ContentKind,
            _ctx: &RequestContext,
        ) -> Result<Info, MetadataError> {
            Ok(Info {
                title: format!("{kind}:{id}"),
                source_provider_id: "tmdb".into(),
                ..Info::default()
            })
        }

        async fn search(
            &self,
            query: &str,
            _page: u32,
            _ctx: &RequestContext,
        ) -> Result<Vec<Post>, MetadataError> {
            Ok(vec![post(query, ContentKind::Movie)])
        }

        async fn get_season_episodes(
            &self,
            id: &str,
            season: u32,
            _ctx: &RequestContext,
        ) -> Result<Vec<EpisodeLink>, MetadataError> {
            Ok(vec![EpisodeLink {
                title: "E1".into(),
                link: format!("tv/{id}/{season}/1"),
            }])
        }
    }

    fn provider(strategy: StreamStrategy) -> (ApiProvider, Arc<FakeSource>) {
        let source = Arc::new(FakeSource::default());
        let config = ProviderConfig::new("autoembed", "AutoEmbed", 10)
            .with_filter(CatalogFilter::new("Trending", TRENDING_FILTER, ContentKind::Movie))
            .with_filter(CatalogFilter::new("Popular Series", "popular_tv", ContentKind::Tv));
        (ApiProvider::new(config, source.clone(), strategy), source)
    }

    fn templates() -> Vec<EmbedTemplate> {
        vec![EmbedTemplate::new(
            "Auto",
            Some("https://player.example/movie/{id}"),
            Some("https://player.example/tv/{id}/{season}/{episode}"),
        )]
    }

    #[tokio::test]
    async fn test_get_posts_routes_filter_tokens() {
        let (provider, source) = provider(StreamStrategy::Embed(templates()));
        let ctx = RequestContext::new();

        let trending = provider.get_posts("trending", 1, &ctx).await.unwrap();
        assert_eq!(trending.len(), 2);
        assert!(trending.iter().all(|p| p.source_provider_id == "autoembed"));

        let popular = provider.get_posts("popular_tv", 2, &ctx).await.unwrap();
        assert_eq!(popular[0].kind, ContentKind::Tv);

        // Unknown tokens use the first catalog entry.
        provider.get_posts("nonsense", 3, &ctx).await.unwrap();
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec!["trending:1", "popular:tv:2", "trending:3"]
        );
    }

    #[tokio::test]
    async fn test_get_posts_drops_kinds_not_carried() {
        let source = Arc::new(FakeSource::default());
        let config = ProviderConfig::new("movies-only", "Movies", 1)
            .with_content_kinds([ContentKind::Movie]);
        let provider = ApiProvider::new(config, source, StreamStrategy::Embed(templates()));
        let posts = provider
            .get_posts("", 1, &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Movie");
    }

    #[tokio::test]
    async fn test_get_meta_parses_link_and_stamps_provider() {
        let (provider, _) = provider(StreamStrategy::Embed(templates()));
        let ctx = RequestContext::new();
        let info = provider.get_meta("tv/1399", &ctx).await.unwrap();
        assert_eq!(info.title, "tv:1399");
        assert_eq!(info.source_provider_id, "autoembed");

        let error = provider.get_meta("not-a-link", &ctx).await.unwrap_err();
        assert!(matches!(error, ProviderError::InvalidLink { .. }));
    }

    #[tokio::test]
    async fn test_get_stream_embed_strategy() {
        let (provider, _) = provider(StreamStrategy::Embed(templates()));
        let ctx = RequestContext::new();
        let streams = provider
            .get_stream("tv/1399/2/5", ContentKind::Tv, &ctx)
            .await
            .unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].url, "https://player.example/tv/1399/2/5");
        assert_eq!(streams[0].kind, StreamKind::Iframe);

        let none = provider
            .get_stream("garbage", ContentKind::Movie, &ctx)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_get_episodes_defaults_to_first_season() {
        let (provider, _) = provider(StreamStrategy::Embed(templates()));
        let ctx = RequestContext::new();
        let episodes = provider.get_episodes("tv/1399", &ctx).await.unwrap();
        assert_eq!(episodes[0].link, "tv/1399/1/1");
        let episodes = provider.get_episodes("tv/1399/3", &ctx).await.unwrap();
        assert_eq!(episodes[0].link, "tv/1399/3/1");
        assert!(provider.get_episodes("movie/550", &ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_search_stamps_provider() {
        let (provider, _) = provider(StreamStrategy::Embed(templates()));
        let posts = provider
            .search("Dune", 1, &RequestContext::new())
            .await
            .unwrap();
        assert_eq!(posts[0].title, "Dune");
        assert_eq!(posts[0].source_provider_id, "autoembed");
        assert_eq!(provider.capabilities(), Capabilities::Full);
    }
}
