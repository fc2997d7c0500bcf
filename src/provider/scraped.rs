//! Scraper-backed providers.
//!
//! Every scraped site is the same machine fed a different [`ScrapeProfile`]:
//! URL templates for listing and search pages plus CSS selectors for posts,
//! detail pages and episode lists. The site's root comes from the base-URL
//! resolver at call time; stream resolution is handed to a [`StreamExtractor`].

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::error::ProviderError;
use super::types::{ContentKind, EpisodeLink, Info, Post, ProviderConfig, SeasonLink, Stream};
use super::{Capabilities, Provider};
use crate::base_url::BaseUrlResolver;
use crate::context::RequestContext;
use crate::extractor::StreamExtractor;
use crate::extractor::utils::{absolutize_url, clean_text, extract_year_from_str};
use crate::http::FetchClient;

/// URL templates and selectors describing one scraped site.
///
/// Templates see `{base}`, `{filter}`, `{page}` and (search only) `{query}`,
/// which is URL-encoded. Post sub-selectors are matched inside each post
/// element; a missing title selector falls back to the image `alt` text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeProfile {
    /// Listing page template.
    pub listing_path: &'static str,
    /// Search page template.
    pub search_path: &'static str,
    /// One element per post on listing and search pages.
    pub post: &'static str,
    /// Post title, inside the post element.
    pub post_title: Option<&'static str>,
    /// Post anchor, inside the post element.
    pub post_link: &'static str,
    /// Post poster, inside the post element.
    pub post_image: &'static str,
    /// Detail page title.
    pub title: &'static str,
    /// Detail page synopsis.
    pub synopsis: &'static str,
    /// Detail page poster.
    pub image: &'static str,
    /// Detail page genre links.
    pub genres: Option<&'static str>,
    /// Anchors on the detail page leading to seasons, qualities or downloads.
    pub season_links: &'static str,
    /// Anchors on a season page leading to episodes.
    pub episodes: &'static str,
}

struct CompiledProfile {
    post: Selector,
    post_title: Option<Selector>,
    post_link: Selector,
    post_image: Selector,
    title: Selector,
    synopsis: Selector,
    image: Selector,
    genres: Option<Selector>,
    season_links: Selector,
    episodes: Selector,
}

impl CompiledProfile {
    fn compile(provider_id: &str, profile: &ScrapeProfile) -> Result<Self, ProviderError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| ProviderError::InvalidSelector {
                provider_id: provider_id.to_string(),
                selector: css.to_string(),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            post: parse(profile.post)?,
            post_title: profile.post_title.map(parse).transpose()?,
            post_link: parse(profile.post_link)?,
            post_image: parse(profile.post_image)?,
            title: parse(profile.title)?,
            synopsis: parse(profile.synopsis)?,
            image: parse(profile.image)?,
            genres: profile.genres.map(parse).transpose()?,
            season_links: parse(profile.season_links)?,
            episodes: parse(profile.episodes)?,
        })
    }
}

/// HTML-scraping provider.
pub struct ScraperProvider {
    config: ProviderConfig,
    profile: ScrapeProfile,
    selectors: CompiledProfile,
    client: FetchClient,
    resolver: Arc<BaseUrlResolver>,
    extractor: Arc<dyn StreamExtractor>,
}

impl ScraperProvider {
    /// Creates a scraper provider, compiling the profile's selectors.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidSelector`] if any selector fails to parse.
    pub fn new(
        config: ProviderConfig,
        profile: ScrapeProfile,
        client: FetchClient,
        resolver: Arc<BaseUrlResolver>,
        extractor: Arc<dyn StreamExtractor>,
    ) -> Result<Self, ProviderError> {
        let selectors = CompiledProfile::compile(&config.id, &profile)?;
        Ok(Self {
            config,
            profile,
            selectors,
            client,
            resolver,
            extractor,
        })
    }

    /// Current site root: the resolver's entry, else the configured fallback.
    async fn base_url(&self, ctx: &RequestContext) -> Result<String, ProviderError> {
        let resolved = self.resolver.resolve(&self.config.id, ctx).await;
        let base = if resolved.is_empty() {
            self.config.base_url.trim_end_matches('/').to_string()
        } else {
            resolved
        };
        if base.is_empty() {
            return Err(ProviderError::base_url_unavailable(&self.config.id));
        }
        Ok(base)
    }

    /// Turns a possibly relative link into an absolute URL on this site.
    async fn absolute(&self, link: &str, ctx: &RequestContext) -> Result<String, ProviderError> {
        if link.starts_with("http://") || link.starts_with("https://") {
            return Ok(link.to_string());
        }
        let base = self.base_url(ctx).await?;
        Url::parse(&format!("{base}/"))
            .ok()
            .and_then(|root| absolutize_url(link, &root))
            .ok_or_else(|| ProviderError::invalid_link(&self.config.id, link))
    }

    async fn fetch_listing(
        &self,
        url: &str,
        kind: ContentKind,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, ProviderError> {
        let page = self.client.get_page(url, ctx).await?;
        let posts = self.parse_listing(&page.body, &page.final_url, kind);
        debug!(url, count = posts.len(), "Parsed listing page");
        Ok(posts)
    }

    fn parse_listing(&self, html: &str, page_url: &str, kind: ContentKind) -> Vec<Post> {
        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };
        let document = Html::parse_document(html);
        document
            .select(&self.selectors.post)
            .filter_map(|element| self.parse_post(element, &base, kind))
            .collect()
    }

    fn parse_post(&self, element: ElementRef<'_>, base: &Url, kind: ContentKind) -> Option<Post> {
        let anchor = element.select(&self.selectors.post_link).next()?;
        let detail_link = absolutize_url(anchor.value().attr("href")?, base)?;
        let image = element.select(&self.selectors.post_image).next();

        let title = self
            .selectors
            .post_title
            .as_ref()
            .and_then(|sel| element.select(sel).next())
            .map(|node| clean_text(&node.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .or_else(|| image.and_then(|img| img.value().attr("alt")).map(clean_text))
            .or_else(|| anchor.value().attr("title").map(clean_text))
            .filter(|t| !t.is_empty())?;
        let image_url = image
            .and_then(image_src)
            .and_then(|src| absolutize_url(src, base))
            .unwrap_or_default();

        Some(Post {
            id: slug(&detail_link),
            year: extract_year_from_str(&title),
            kind: guess_kind(&title, kind),
            title,
            image_url,
            detail_link,
            rating: None,
            source_provider_id: self.config.id.clone(),
        })
    }

    fn parse_detail(&self, html: &str, page_url: &str) -> Result<Info, ProviderError> {
        let base = Url::parse(page_url)
            .map_err(|_| ProviderError::invalid_link(&self.config.id, page_url))?;
        let document = Html::parse_document(html);
        let text_of = |selector: &Selector| {
            document
                .select(selector)
                .next()
                .map(|node| clean_text(&node.text().collect::<String>()))
                .unwrap_or_default()
        };

        let title = text_of(&self.selectors.title);
        if title.is_empty() {
            return Err(ProviderError::parse(
                &self.config.id,
                page_url,
                format!("no title matched '{}'", self.profile.title),
            ));
        }
        let synopsis = text_of(&self.selectors.synopsis);
        let image_url = document
            .select(&self.selectors.image)
            .next()
            .and_then(image_src)
            .and_then(|src| absolutize_url(src, &base))
            .unwrap_or_default();
        let genres = self
            .selectors
            .genres
            .as_ref()
            .map(|sel| {
                document
                    .select(sel)
                    .map(|node| clean_text(&node.text().collect::<String>()))
                    .filter(|g| !g.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let season_links = anchors(&document, &self.selectors.season_links, &base)
            .map(|(title, link)| SeasonLink { title, link })
            .collect();

        Ok(Info {
            year: extract_year_from_str(&title).or_else(|| extract_year_from_str(&synopsis)),
            title,
            synopsis,
            image_url,
            genres,
            season_links,
            source_provider_id: self.config.id.clone(),
            ..Info::default()
        })
    }

    fn parse_episodes(&self, html: &str, page_url: &str) -> Vec<EpisodeLink> {
        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };
        let document = Html::parse_document(html);
        anchors(&document, &self.selectors.episodes, &base)
            .map(|(title, link)| EpisodeLink { title, link })
            .collect()
    }
}

/// `(text, absolute href)` for every matching anchor, skipping duplicates
/// and anchors without a usable href.
fn anchors<'a>(
    document: &'a Html,
    selector: &'a Selector,
    base: &'a Url,
) -> impl Iterator<Item = (String, String)> + 'a {
    let mut seen = std::collections::HashSet::new();
    document.select(selector).filter_map(move |anchor| {
        let link = absolutize_url(anchor.value().attr("href")?, base)?;
        if !seen.insert(link.clone()) {
            return None;
        }
        let text = clean_text(&anchor.text().collect::<String>());
        let title = if text.is_empty() { link.clone() } else { text };
        Some((title, link))
    })
}

/// Lazy-loading themes keep the real poster in `data-src`.
fn image_src<'a>(image: ElementRef<'a>) -> Option<&'a str> {
    let value = image.value();
    value
        .attr("data-src")
        .or_else(|| value.attr("data-lazy-src"))
        .or_else(|| value.attr("src"))
        .filter(|src| !src.starts_with("data:"))
}

/// Last non-empty path segment of a detail link.
fn slug(link: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .unwrap_or_else(|| link.to_string())
}

/// Search pages mix kinds; titles naming a season are series.
fn guess_kind(title: &str, listed: ContentKind) -> ContentKind {
    let lower = title.to_ascii_lowercase();
    if lower.contains("season") || lower.contains("series") {
        ContentKind::Tv
    } else {
        listed
    }
}

#[async_trait]
impl Provider for ScraperProvider {
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
        let (token, kind) = self
            .config
            .catalog_filter(filter)
            .map_or((filter, ContentKind::Movie), |entry| {
                (entry.filter.as_str(), entry.kind)
            });
        let base = self.base_url(ctx).await?;
        let url = self
            .profile
            .listing_path
            .replace("{base}", &base)
            .replace("{filter}", token.trim_matches('/'))
            .replace("{page}", &page.max(1).to_string());
        self.fetch_listing(&url, kind, ctx).await
    }

    #[instrument(skip(self, ctx), fields(provider = %self.config.id))]
    async fn get_meta(&self, link: &str, ctx: &RequestContext) -> Result<Info, ProviderError> {
        let url = self.absolute(link, ctx).await?;
        let page = self.client.get_page(&url, ctx).await?;
        self.parse_detail(&page.body, &page.final_url)
    }

    #[instrument(skip(self, ctx), fields(provider = %self.config.id))]
    async fn get_stream(
        &self,
        link: &str,
        _kind: ContentKind,
        ctx: &RequestContext,
    ) -> Result<Vec<Stream>, ProviderError> {
        let url = self.absolute(link, ctx).await?;
        Ok(self.extractor.extract(&url, ctx).await?)
    }

    #[instrument(skip(self, ctx), fields(provider = %self.config.id))]
    async fn search(
        &self,
        query: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, ProviderError> {
        let base = self.base_url(ctx).await?;
        let url = self
            .profile
            .search_path
            .replace("{base}", &base)
            .replace("{query}", &urlencoding::encode(query.trim()))
            .replace("{page}", &page.max(1).to_string());
        self.fetch_listing(&url, ContentKind::Movie, ctx).await
    }

    async fn get_episodes(
        &self,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<EpisodeLink>, ProviderError> {
        let url = self.absolute(url, ctx).await?;
        let page = self.client.get_page(&url, ctx).await?;
        Ok(self.parse_episodes(&page.body, &page.final_url))
    }
}

impl std::fmt::Debug for ScraperProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperProvider")
            .field("id", &self.config.id)
            .field("extractor", &self.extractor.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extractor::GenericExtractor;

    const PROFILE: ScrapeProfile = ScrapeProfile {
        listing_path: "{base}/{filter}/page/{page}/",
        search_path: "{base}/page/{page}/?s={query}",
        post: "article.post",
        post_title: Some("h2"),
        post_link: "a",
        post_image: "img",
        title: "h1.entry-title",
        synopsis: "div.summary",
        image: "div.poster img",
        genres: Some("span.genres a"),
        season_links: "a.maxbutton",
        episodes: "h4 a",
    };

    fn provider(profile: ScrapeProfile) -> Result<ScraperProvider, ProviderError> {
        let client = FetchClient::new().unwrap();
        let resolver = Arc::new(BaseUrlResolver::new(client.clone(), "not a url"));
        ScraperProvider::new(
            ProviderConfig::new("vega", "VegaMovies", 1).with_base_url("https://vega.example/"),
            profile,
            client.clone(),
            resolver,
            Arc::new(GenericExtractor::new(client)),
        )
    }

    #[test]
    fn test_invalid_selector_rejected_at_construction() {
        let broken = ScrapeProfile {
            post: "article[",
            ..PROFILE
        };
        assert!(matches!(
            provider(broken),
            Err(ProviderError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_parse_listing() {
        let provider = provider(PROFILE).unwrap();
        let html = r#"
            <article class="post">
              <a href="/dune-part-two-2024/"><img data-src="/img/dune.jpg" src="data:image/gif;base64,R0"></a>
              <h2> Dune: Part Two (2024) 1080p </h2>
            </article>
            <article class="post">
              <a href="https://vega.example/the-bear-season-2/"><img src="https://cdn.example/bear.jpg" alt="The Bear Season 2"></a>
            </article>
            <article class="post"><h2>No link here</h2></article>
        "#;
        let posts = provider.parse_listing(html, "https://vega.example/movies/page/1/", ContentKind::Movie);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "Dune: Part Two (2024) 1080p");
        assert_eq!(posts[0].detail_link, "https://vega.example/dune-part-two-2024/");
        assert_eq!(posts[0].image_url, "https://vega.example/img/dune.jpg");
        assert_eq!(posts[0].year.as_deref(), Some("2024"));
        assert_eq!(posts[0].id, "dune-part-two-2024");
        assert_eq!(posts[1].title, "The Bear Season 2");
        assert_eq!(posts[1].kind, ContentKind::Tv);
        assert_eq!(posts[1].source_provider_id, "vega");
    }

    #[test]
    fn test_parse_detail() {
        let provider = provider(PROFILE).unwrap();
        let html = r#"
            <h1 class="entry-title">Oppenheimer (2023)</h1>
            <div class="poster"><img src="/p.jpg"></div>
            <div class="summary">The story of the bomb.</div>
            <span class="genres"><a>Drama</a><a>History</a></span>
            <a class="maxbutton" href="/links/1080p">Download 1080p</a>
            <a class="maxbutton" href="/links/1080p">Download 1080p</a>
            <a class="maxbutton" href="/links/720p"></a>
        "#;
        let info = provider.parse_detail(html, "https://vega.example/oppenheimer/").unwrap();
        assert_eq!(info.title, "Oppenheimer (2023)");
        assert_eq!(info.year.as_deref(), Some("2023"));
        assert_eq!(info.synopsis, "The story of the bomb.");
        assert_eq!(info.image_url, "https://vega.example/p.jpg");
        assert_eq!(info.genres, vec!["Drama", "History"]);
        assert_eq!(info.season_links.len(), 2);
        assert_eq!(info.season_links[0].title, "Download 1080p");
        assert_eq!(info.season_links[1].title, "https://vega.example/links/720p");
    }

    #[test]
    fn test_parse_detail_without_title_is_parse_error() {
        let provider = provider(PROFILE).unwrap();
        let result = provider.parse_detail("<p>moved</p>", "https://vega.example/x/");
        assert!(matches!(result, Err(ProviderError::Parse { .. })));
    }

    #[test]
    fn test_parse_episodes() {
        let provider = provider(PROFILE).unwrap();
        let html = r#"<h4><a href="https://files.example/e1">Episode 1</a></h4>
                      <h4><a href="https://files.example/e2">Episode 2</a></h4>"#;
        let episodes = provider.parse_episodes(html, "https://vega.example/season-1/");
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[1].title, "Episode 2");
    }

    #[tokio::test]
    async fn test_base_url_falls_back_to_config() {
        let provider = provider(PROFILE).unwrap();
        let ctx = RequestContext::new();
        assert_eq!(provider.base_url(&ctx).await.unwrap(), "https://vega.example");
        assert_eq!(
            provider.absolute("/movie-x/", &ctx).await.unwrap(),
            "https://vega.example/movie-x/"
        );
    }

    #[tokio::test]
    async fn test_missing_base_url_is_unavailable() {
        let client = FetchClient::new().unwrap();
        let resolver = Arc::new(BaseUrlResolver::new(client.clone(), "not a url"));
        let provider = ScraperProvider::new(
            ProviderConfig::new("ghost", "Ghost", 1),
            PROFILE,
            client.clone(),
            resolver,
            Arc::new(GenericExtractor::new(client)),
        )
        .unwrap();
        let result = provider.get_posts("movies", 1, &RequestContext::new()).await;
        assert!(matches!(
            result,
            Err(ProviderError::BaseUrlUnavailable { .. })
        ));
    }

    #[test]
    fn test_slug_and_kind_guess() {
        assert_eq!(slug("https://a.example/x/y-z/"), "y-z");
        assert_eq!(guess_kind("Loki Season 1", ContentKind::Movie), ContentKind::Tv);
        assert_eq!(guess_kind("Heat", ContentKind::Movie), ContentKind::Movie);
    }
}
