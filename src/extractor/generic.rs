//! Generic extractor for landing pages that embed their media directly.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::utils::{absolutize_url, compile_static_regex, extract_quality, host_label};
use super::{ExtractError, StreamExtractor};
use crate::context::RequestContext;
use crate::http::FetchClient;
use crate::provider::{Stream, Subtitle};

/// Iframe hosts are only taken when their URL carries one of these.
const IFRAME_CDN_KEYWORDS: &[&str] = &["embed", "player", "stream", "cdn", "vid"];

static MEDIA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?i)https?://[^\s"'<>\\]+?\.(?:m3u8|mp4)(?:\?[^\s"'<>\\]*)?"#)
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid static selector '{css}': {e}"))
}

static VIDEO_SEL: LazyLock<Selector> = LazyLock::new(|| selector("video[src]"));
static SOURCE_SEL: LazyLock<Selector> = LazyLock::new(|| selector("source[src]"));
static IFRAME_SEL: LazyLock<Selector> = LazyLock::new(|| selector("iframe[src]"));
static TRACK_SEL: LazyLock<Selector> = LazyLock::new(|| selector("track[src]"));

/// Fetches a landing page once and collects every media URL it exposes.
#[derive(Debug, Clone)]
pub struct GenericExtractor {
    client: FetchClient,
}

impl GenericExtractor {
    /// Creates an extractor using the shared fetch client.
    #[must_use]
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamExtractor for GenericExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    #[instrument(skip(self, ctx), fields(extractor = "generic"))]
    async fn extract(&self, url: &str, ctx: &RequestContext) -> Result<Vec<Stream>, ExtractError> {
        let page = self.client.get_page(url, ctx).await?;
        let streams = scan_page(&page.body, &page.final_url);
        debug!(count = streams.len(), "Generic extraction finished");
        Ok(streams)
    }
}

/// Scans an HTML document for `<video>`/`<source>` tags, CDN iframes and
/// inline `.m3u8`/`.mp4` URLs. Deduplicates by exact URL in document order.
#[must_use]
pub fn scan_page(html: &str, page_url: &str) -> Vec<Stream> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut streams = Vec::new();
    let mut push = |stream: Stream| {
        if seen.insert(stream.url.clone()) {
            streams.push(stream);
        }
    };

    for element in document.select(&VIDEO_SEL).chain(document.select(&SOURCE_SEL)) {
        let Some(src) = element
            .value()
            .attr("src")
            .and_then(|src| absolutize_url(src, &base))
        else {
            continue;
        };
        let label = element
            .value()
            .attr("label")
            .or_else(|| element.value().attr("title"))
            .map_or_else(|| host_label(&src), str::to_string);
        let quality = element
            .value()
            .attr("size")
            .map(|size| format!("{size}p"))
            .or_else(|| extract_quality(&label))
            .or_else(|| extract_quality(&src));
        push(Stream::media(label, src).with_quality(quality));
    }

    for element in document.select(&IFRAME_SEL) {
        let Some(src) = element
            .value()
            .attr("src")
            .and_then(|src| absolutize_url(src, &base))
        else {
            continue;
        };
        let lower = src.to_ascii_lowercase();
        if !IFRAME_CDN_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            continue;
        }
        push(Stream::iframe(host_label(&src), src));
    }

    // Inline players often JSON-escape their slashes.
    let unescaped = html.replace("\\/", "/");
    for found in MEDIA_URL_RE.find_iter(&unescaped) {
        let src = found.as_str().to_string();
        let quality = extract_quality(&src);
        push(Stream::media(host_label(&src), src).with_quality(quality));
    }

    let subtitles = scan_subtitles(&document, &base);
    if !subtitles.is_empty() {
        for stream in &mut streams {
            stream.subtitles.clone_from(&subtitles);
        }
    }
    streams
}

fn scan_subtitles(document: &Html, base: &Url) -> Vec<Subtitle> {
    document
        .select(&TRACK_SEL)
        .filter(|track| {
            track
                .value()
                .attr("kind")
                .is_none_or(|kind| matches!(kind.to_ascii_lowercase().as_str(), "subtitles" | "captions"))
        })
        .filter_map(|track| {
            let url = absolutize_url(track.value().attr("src")?, base)?;
            let language = track.value().attr("srclang").map(str::to_string);
            let label = track
                .value()
                .attr("label")
                .map(str::to_string)
                .or_else(|| language.clone())
                .unwrap_or_else(|| "Subtitle".to_string());
            Some(Subtitle {
                label,
                language,
                url,
            })
        })
        .collect()
}
