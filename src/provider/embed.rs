//! Embed-only providers: streams from URL templates, nothing else.

use async_trait::async_trait;

use super::error::ProviderError;
use super::types::{ContentKind, Info, Post, ProviderConfig, Stream};
use super::{Capabilities, Provider};
use crate::context::RequestContext;
use crate::extractor::{EmbedTemplate, embed_streams};

/// A provider with no catalog: `get_posts` is empty and `get_meta` is
/// unsupported, `get_stream` renders its templates without touching the network.
#[derive(Debug, Clone)]
pub struct EmbedProvider {
    config: ProviderConfig,
    templates: Vec<EmbedTemplate>,
}

impl EmbedProvider {
    /// Creates an embed provider.
    #[must_use]
    pub fn new(config: ProviderConfig, templates: Vec<EmbedTemplate>) -> Self {
        Self { config, templates }
    }
}

#[async_trait]
impl Provider for EmbedProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::Core
    }

    async fn get_posts(
        &self,
        _filter: &str,
        _page: u32,
        _ctx: &RequestContext,
    ) -> Result<Vec<Post>, ProviderError> {
        Ok(Vec::new())
    }

    async fn get_meta(&self, _link: &str, _ctx: &RequestContext) -> Result<Info, ProviderError> {
        Err(ProviderError::unsupported(&self.config.id, "metadata"))
    }

    async fn get_stream(
        &self,
        link: &str,
        kind: ContentKind,
        _ctx: &RequestContext,
    ) -> Result<Vec<Stream>, ProviderError> {
        Ok(embed_streams(&self.templates, link, kind))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn vidsrc() -> EmbedProvider {
        EmbedProvider::new(
            ProviderConfig::new("vidsrc", "VidSrc", 40),
            vec![
                EmbedTemplate::new(
                    "VidSrc",
                    Some("https://vidsrc.example/embed/movie/{id}"),
                    Some("https://vidsrc.example/embed/tv/{id}/{season}-{episode}"),
                ),
                EmbedTemplate::new("MovieOnly", Some("https://m.example/{id}"), None),
            ],
        )
    }

    #[tokio::test]
    async fn test_streams_without_network() {
        let provider = vidsrc();
        let ctx = RequestContext::new();
        let movie = provider
            .get_stream("https://site.example/movie/550-fight-club", ContentKind::Movie, &ctx)
            .await
            .unwrap();
        assert_eq!(movie.len(), 2);
        assert_eq!(movie[0].url, "https://vidsrc.example/embed/movie/550");

        let episode = provider
            .get_stream("tv/1399/1/3", ContentKind::Tv, &ctx)
            .await
            .unwrap();
        assert_eq!(episode.len(), 1);
        assert_eq!(episode[0].url, "https://vidsrc.example/embed/tv/1399/1-3");
    }

    #[tokio::test]
    async fn test_catalog_operations() {
        let provider = vidsrc();
        let ctx = RequestContext::new();
        assert!(provider.get_posts("any", 1, &ctx).await.unwrap().is_empty());
        assert!(matches!(
            provider.get_meta("movie/1", &ctx).await,
            Err(ProviderError::Unsupported { .. })
        ));
        assert!(provider.search("x", 1, &ctx).await.is_err());
        assert_eq!(provider.capabilities(), Capabilities::Core);
    }
}
