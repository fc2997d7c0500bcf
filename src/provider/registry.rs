//! Built-in provider catalog.

use std::sync::Arc;

use tracing::{info, warn};

use super::api::{ApiProvider, StreamStrategy, TRENDING_FILTER};
use super::embed::EmbedProvider;
use super::error::ManagerError;
use super::manager::ProviderManager;
use super::scraped::{ScrapeProfile, ScraperProvider};
use super::types::{CatalogFilter, ContentKind, ProviderConfig};
use super::Provider;
use crate::base_url::BaseUrlResolver;
use crate::config::EngineConfig;
use crate::extractor::{
    EmbedTemplate, GenericExtractor, RedirectChainExtractor, StreamExtractor, TokenEndpoints,
    TokenExchangeExtractor,
};
use crate::http::FetchClient;
use crate::metadata::{MetadataSource, TmdbClient};

/// WordPress-style listing shared by the redirect-chain sites.
const VEGA_PROFILE: ScrapeProfile = ScrapeProfile {
    listing_path: "{base}/{filter}/page/{page}/",
    search_path: "{base}/page/{page}/?s={query}",
    post: "article.post-item, .blog-items article",
    post_title: Some("h3, h2"),
    post_link: "a[href]",
    post_image: "img",
    title: "h1.post-title, h1.entry-title, h1",
    synopsis: "#summary, .entry-content > p",
    image: ".entry-content img, .post-thumbnail img",
    genres: Some("a[rel='category tag']"),
    season_links: "a.maxbutton, .entry-content a[href*='/links/'], p > a.btn",
    episodes: "h3 > a, h4 > a, .entry-content a[href*='episode']",
};

const MOVIESMOD_PROFILE: ScrapeProfile = ScrapeProfile {
    listing_path: "{base}/{filter}/page/{page}/",
    search_path: "{base}/search/{query}/page/{page}/",
    post: "article.latestPost",
    post_title: Some("h2 a, .title a"),
    post_link: "a[href]",
    post_image: "img",
    title: "h1.entry-title, .imdbwp__title",
    synopsis: ".imdbwp__teaser, .thecontent p",
    image: ".imdbwp__thumb img, .thecontent img",
    genres: Some(".thecategory a"),
    season_links: "a.maxbutton-download-links, a.maxbutton-episode-links, a.maxbutton",
    episodes: "h3 > a, .entry-content a.maxbutton-1",
};

const HDHUB_PROFILE: ScrapeProfile = ScrapeProfile {
    listing_path: "{base}/{filter}/page/{page}/",
    search_path: "{base}/page/{page}/?s={query}",
    post: ".recent-movies > li, li.thumb",
    post_title: Some("figcaption p, figcaption"),
    post_link: "a[href]",
    post_image: "img",
    title: "h1.page-title, .page-body h2, h1",
    synopsis: ".kno-rdesc .kno-rdesc, .page-body p",
    image: ".page-body img, .aligncenter img",
    genres: None,
    season_links: "h3 > a, h4 > a, .page-body a[href*='drive']",
    episodes: "h4 > a, h3 > a",
};

/// One built-in scraped site.
struct ScraperSite {
    id: &'static str,
    name: &'static str,
    priority: i32,
    profile: ScrapeProfile,
    /// `(label, filter token, kind)` catalog entries.
    catalog: &'static [(&'static str, &'static str, ContentKind)],
    extractor: ExtractorKind,
}

#[derive(Debug, Clone, Copy)]
enum ExtractorKind {
    Generic,
    RedirectChain,
}

const SCRAPER_SITES: [ScraperSite; 3] = [
    ScraperSite {
        id: "vega",
        name: "VegaMovies",
        priority: 30,
        profile: VEGA_PROFILE,
        catalog: &[
            ("Latest", "category/movies", ContentKind::Movie),
            ("Web Series", "category/web-series", ContentKind::Tv),
        ],
        extractor: ExtractorKind::RedirectChain,
    },
    ScraperSite {
        id: "moviesmod",
        name: "MoviesMod",
        priority: 31,
        profile: MOVIESMOD_PROFILE,
        catalog: &[
            ("Latest", "movies/latest", ContentKind::Movie),
            ("Web Series", "web-series", ContentKind::Tv),
        ],
        extractor: ExtractorKind::RedirectChain,
    },
    ScraperSite {
        id: "hdhub",
        name: "HDHub4u",
        priority: 32,
        profile: HDHUB_PROFILE,
        catalog: &[
            ("Latest", "category/movies", ContentKind::Movie),
            ("Series", "category/web-series", ContentKind::Tv),
        ],
        extractor: ExtractorKind::Generic,
    },
];

impl ScraperSite {
    fn config(&self) -> ProviderConfig {
        self.catalog.iter().fold(
            ProviderConfig::new(self.id, self.name, self.priority),
            |config, (label, filter, kind)| {
                config.with_filter(CatalogFilter::new(*label, *filter, *kind))
            },
        )
    }
}

/// Embed-only sites: id, display name, priority, templates.
fn embed_catalog() -> [(&'static str, &'static str, i32, EmbedTemplate); 3] {
    [
        (
            "vidsrc",
            "VidSrc",
            40,
            EmbedTemplate::new(
                "VidSrc",
                Some("https://vidsrc.xyz/embed/movie/{id}"),
                Some("https://vidsrc.xyz/embed/tv/{id}/{season}-{episode}"),
            ),
        ),
        (
            "twoembed",
            "2Embed",
            41,
            EmbedTemplate::new(
                "2Embed",
                Some("https://www.2embed.cc/embed/{id}"),
                Some("https://www.2embed.cc/embedtv/{id}&s={season}&e={episode}"),
            ),
        ),
        (
            "superembed",
            "SuperEmbed",
            42,
            EmbedTemplate::new(
                "SuperEmbed",
                Some("https://multiembed.mov/?video_id={id}&tmdb=1"),
                Some("https://multiembed.mov/?video_id={id}&tmdb=1&s={season}&e={episode}"),
            ),
        ),
    ]
}

fn api_catalog(config: ProviderConfig) -> ProviderConfig {
    config
        .with_filter(CatalogFilter::new("Trending", TRENDING_FILTER, ContentKind::Movie))
        .with_filter(CatalogFilter::new("Popular Movies", "popular_movie", ContentKind::Movie))
        .with_filter(CatalogFilter::new("Popular Series", "popular_tv", ContentKind::Tv))
}

/// Builds a manager with every built-in provider registered.
///
/// Providers that cannot be constructed are skipped with a warning; API-backed
/// providers are skipped when no metadata API key is configured. Ids listed in
/// `config.disabled_providers` are registered disabled.
///
/// # Errors
///
/// Returns [`ManagerError::Setup`] if the shared HTTP client cannot be built.
pub fn build_default_provider_manager(
    config: &EngineConfig,
) -> Result<ProviderManager, ManagerError> {
    let client = FetchClient::with_settings(&config.fetch_settings())?;
    let resolver = Arc::new(
        BaseUrlResolver::new(client.clone(), config.config_url.clone())
            .with_ttl(config.base_url_ttl)
            .with_failure_cooldown(config.failure_cooldown),
    );
    let manager = ProviderManager::new().with_call_timeout(config.provider_timeout);
    let enabled = |id: &str| !config.disabled_providers.contains(id);

    match config.tmdb_api_key().map(|key| TmdbClient::new(client.clone(), key)) {
        Some(Ok(tmdb)) => {
            let metadata: Arc<dyn MetadataSource> = Arc::new(tmdb);
            let autoembed = ApiProvider::new(
                api_catalog(ProviderConfig::new("autoembed", "AutoEmbed", 10))
                    .with_enabled(enabled("autoembed")),
                Arc::clone(&metadata),
                StreamStrategy::Embed(vec![EmbedTemplate::new(
                    "AutoEmbed",
                    Some("https://player.autoembed.cc/embed/movie/{id}"),
                    Some("https://player.autoembed.cc/embed/tv/{id}/{season}/{episode}"),
                )]),
            );
            register_or_warn(&manager, Arc::new(autoembed));

            let vidlink = ApiProvider::new(
                api_catalog(ProviderConfig::new("vidlink", "VidLink", 20))
                    .with_enabled(enabled("vidlink")),
                metadata,
                StreamStrategy::TokenExchange(TokenExchangeExtractor::new(
                    client.clone(),
                    TokenEndpoints {
                        token_url: "https://vidlink.pro/api/token/{kind}/{id}?s={season}&e={episode}"
                            .to_string(),
                        stream_url: "https://vidlink.pro/api/stream?token={token}".to_string(),
                        referer: Some("https://vidlink.pro/".to_string()),
                    },
                    "VidLink",
                )),
            );
            register_or_warn(&manager, Arc::new(vidlink));
        }
        Some(Err(error)) => warn!(
            error = %error,
            "Metadata source unavailable; continuing without API-backed providers"
        ),
        None => info!("No metadata API key configured; API-backed providers are not registered"),
    }

    for site in &SCRAPER_SITES {
        let extractor: Arc<dyn StreamExtractor> = match site.extractor {
            ExtractorKind::Generic => Arc::new(GenericExtractor::new(client.clone())),
            ExtractorKind::RedirectChain => Arc::new(RedirectChainExtractor::new(client.clone())),
        };
        match ScraperProvider::new(
            site.config().with_enabled(enabled(site.id)),
            site.profile,
            client.clone(),
            Arc::clone(&resolver),
            extractor,
        ) {
            Ok(provider) => register_or_warn(&manager, Arc::new(provider)),
            Err(error) => warn!(
                provider = site.id,
                error = %error,
                "Scraper provider unavailable; continuing with remaining providers"
            ),
        }
    }

    for (id, name, priority, template) in embed_catalog() {
        let provider = EmbedProvider::new(
            ProviderConfig::new(id, name, priority).with_enabled(enabled(id)),
            vec![template],
        );
        register_or_warn(&manager, Arc::new(provider));
    }

    for id in &config.disabled_providers {
        if manager.get(id).is_none() {
            warn!(provider = %id, "Disabled provider id is not registered");
        }
    }
    info!(
        registered = manager.len(),
        enabled = manager.enabled_ids().len(),
        "Provider manager ready"
    );
    Ok(manager)
}

fn register_or_warn(manager: &ProviderManager, provider: Arc<dyn Provider>) {
    let id = provider.id().to_string();
    if let Err(error) = manager.register(provider) {
        warn!(
            provider = %id,
            error = %error,
            "Provider registration failed; continuing with remaining providers"
        );
    }
}
