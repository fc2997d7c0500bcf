//! Redirect-chain extractor for hosts that funnel through an intermediate
//! "cloud" page before the real CDN.
//!
//! The chain is: landing page -> redirect target (inline `var url` or a
//! download anchor) -> page of download buttons -> per-button classification
//! via [`LINK_RULES`]. Steps run in order; the per-button resolutions run
//! concurrently and each one is best-effort.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures_util::future::join_all;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::utils::{absolutize_url, clean_text, compile_static_regex, extract_quality, host_label};
use super::{ExtractError, StreamExtractor};
use crate::context::RequestContext;
use crate::http::{FetchClient, FetchError};
use crate::provider::{Stream, StreamKind};

static VAR_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"var\s+url\s*=\s*['"]([^'"]+)['"]"#));

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href]").unwrap_or_else(|e| panic!("invalid static selector: {e}"))
});

/// Hosts that may sit behind one more redirect after an aggregator hop.
const CLOUD_STORAGE_MARKERS: &[&str] = &[
    "cloudflarestorage",
    "googleusercontent",
    "storage.googleapis",
    "r2.dev",
    "blob.core.windows",
];

/// How a classified link becomes a final URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkResolution {
    /// The link already is the media URL.
    AsIs,
    /// Content-addressed storage link rewritten to its API download URL.
    ApiDownload,
    /// One `HEAD` hop without redirects, plus one more if it lands on cloud storage.
    HeadHop,
}

/// Where a classified link's server label comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLabel {
    /// A fixed server name.
    Fixed(&'static str),
    /// The final URL's host.
    Hostname,
}

/// One entry of the ordered classification table.
#[derive(Debug, Clone, Copy)]
pub struct LinkRule {
    /// Rule name used in logs.
    pub name: &'static str,
    /// Returns true for links this rule handles.
    pub matches: fn(&str) -> bool,
    /// Label of produced streams.
    pub label: LinkLabel,
    /// How the link is resolved.
    pub resolution: LinkResolution,
}

fn is_worker(url: &str) -> bool {
    url.contains(".workers.dev")
}

fn is_object_storage(url: &str) -> bool {
    url.contains("cloudflarestorage")
}

fn is_pixeldrain(url: &str) -> bool {
    url.contains("pixeldrain")
}

fn is_aggregator(url: &str) -> bool {
    url.contains("hubcloud") || url.contains("gdflix") || url.contains("/?id=")
}

fn is_media_file(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.ends_with(".mkv") || path.ends_with(".mp4")
}

/// Classification rules, evaluated top to bottom; the first match wins.
pub const LINK_RULES: &[LinkRule] = &[
    LinkRule {
        name: "worker",
        matches: is_worker,
        label: LinkLabel::Fixed("CF Worker"),
        resolution: LinkResolution::AsIs,
    },
    LinkRule {
        name: "object-storage",
        matches: is_object_storage,
        label: LinkLabel::Fixed("CF Storage"),
        resolution: LinkResolution::AsIs,
    },
    LinkRule {
        name: "pixeldrain",
        matches: is_pixeldrain,
        label: LinkLabel::Fixed("Pixeldrain"),
        resolution: LinkResolution::ApiDownload,
    },
    LinkRule {
        name: "aggregator",
        matches: is_aggregator,
        label: LinkLabel::Fixed("HubCloud"),
        resolution: LinkResolution::HeadHop,
    },
    LinkRule {
        name: "media-file",
        matches: is_media_file,
        label: LinkLabel::Hostname,
        resolution: LinkResolution::AsIs,
    },
];

/// Returns the first rule in [`LINK_RULES`] matching `url`.
#[must_use]
pub fn classify_link(url: &str) -> Option<&'static LinkRule> {
    let lower = url.to_ascii_lowercase();
    LINK_RULES.iter().find(|rule| (rule.matches)(&lower))
}

/// A download button found on the chain's final page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    /// Absolute link target.
    pub url: String,
    /// Visible link text.
    pub text: String,
}

/// Walks landing-page redirect chains down to direct media links.
#[derive(Debug, Clone)]
pub struct RedirectChainExtractor {
    client: FetchClient,
}

impl RedirectChainExtractor {
    /// Creates an extractor using the shared fetch client.
    #[must_use]
    pub fn new(client: FetchClient) -> Self {
        Self { client }
    }

    async fn resolve_candidate(
        &self,
        candidate: CandidateLink,
        ctx: &RequestContext,
    ) -> Option<Stream> {
        let rule = classify_link(&candidate.url)?;
        let resolved = match rule.resolution {
            LinkResolution::AsIs => Some(candidate.url.clone()),
            LinkResolution::ApiDownload => api_download_url(&candidate.url),
            LinkResolution::HeadHop => self.head_hop(&candidate.url, ctx).await,
        };
        let Some(url) = resolved else {
            debug!(rule = rule.name, url = %candidate.url, "Dropping unresolvable download link");
            return None;
        };
        let label = match rule.label {
            LinkLabel::Fixed(label) => label.to_string(),
            LinkLabel::Hostname => host_label(&url),
        };
        let quality = extract_quality(&candidate.text).or_else(|| extract_quality(&url));
        Some(Stream::new(label, url, StreamKind::Direct).with_quality(quality))
    }

    async fn head_hop(&self, url: &str, ctx: &RequestContext) -> Option<String> {
        let location = match self.client.head_location(url, ctx).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                debug!(url, "Aggregator link did not redirect");
                return None;
            }
            Err(error) => {
                debug!(url, error = %error, "Aggregator HEAD hop failed");
                return None;
            }
        };
        let location = unwrap_link_param(&location).unwrap_or(location);

        let lower = location.to_ascii_lowercase();
        if !CLOUD_STORAGE_MARKERS.iter().any(|m| lower.contains(m)) {
            return Some(location);
        }
        match self.client.head_location(&location, ctx).await {
            Ok(Some(next)) => Some(next),
            Ok(None) => Some(location),
            Err(error) => {
                debug!(url = %location, error = %error, "Cloud-storage hop failed");
                None
            }
        }
    }
}

#[async_trait]
impl StreamExtractor for RedirectChainExtractor {
    fn name(&self) -> &'static str {
        "redirect-chain"
    }

    #[instrument(skip(self, ctx), fields(extractor = "redirect-chain"))]
    async fn extract(&self, url: &str, ctx: &RequestContext) -> Result<Vec<Stream>, ExtractError> {
        let landing = self.client.get_page(url, ctx).await?;
        let Some(target) = find_redirect_target(&landing.body, &landing.final_url) else {
            debug!(url, "Landing page has no redirect target");
            return Ok(Vec::new());
        };
        debug!(target = %target, "Following redirect target");

        let chain = self.client.get_page(&target, ctx).await?;
        let candidates = collect_candidates(&chain.body, &chain.final_url);
        debug!(count = candidates.len(), "Classifying download links");

        let streams: Vec<Stream> = join_all(
            candidates
                .into_iter()
                .map(|candidate| self.resolve_candidate(candidate, ctx)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        if ctx.is_cancelled() {
            return Err(FetchError::cancelled(url).into());
        }
        Ok(streams)
    }
}

/// Finds the landing page's redirect target: an inline `var url = '...'`
/// (plain or base64) or the first anchor labelled as a download.
#[must_use]
pub fn find_redirect_target(html: &str, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;

    if let Some(raw) = VAR_URL_RE.captures(html).map(|caps| caps[1].trim().to_string()) {
        let value = decode_maybe_base64(&raw).unwrap_or(raw);
        if let Some(target) = absolutize_url(&value, &base) {
            return Some(target);
        }
    }

    let document = Html::parse_document(html);
    document.select(&ANCHOR_SEL).find_map(|anchor| {
        let text = anchor.text().collect::<String>().to_ascii_lowercase();
        let class = anchor.value().attr("class").unwrap_or_default();
        let id = anchor.value().attr("id").unwrap_or_default();
        let is_download = text.contains("download")
            || class.to_ascii_lowercase().contains("download")
            || id.to_ascii_lowercase().contains("download");
        if !is_download {
            return None;
        }
        absolutize_url(anchor.value().attr("href")?, &base)
    })
}

/// Collects every anchor on the chain's final page that a rule classifies.
#[must_use]
pub fn collect_candidates(html: &str, page_url: &str) -> Vec<CandidateLink> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    document
        .select(&ANCHOR_SEL)
        .filter_map(|anchor| {
            let url = absolutize_url(anchor.value().attr("href")?, &base)?;
            if classify_link(&url).is_none() || !seen.insert(url.clone()) {
                return None;
            }
            Some(CandidateLink {
                url,
                text: clean_text(&anchor.text().collect::<String>()),
            })
        })
        .collect()
}

/// Rewrites `https://<host>/u/<id>` into `https://<host>/api/file/<id>?download`.
#[must_use]
pub fn api_download_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if parsed.path().starts_with("/api/file/") {
        return Some(url.to_string());
    }
    let id = parsed
        .path_segments()?
        .rfind(|segment| !segment.is_empty())?;
    let host = parsed.host_str()?;
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    Some(format!(
        "{}://{host}{port}/api/file/{id}?download",
        parsed.scheme()
    ))
}

fn decode_maybe_base64(value: &str) -> Option<String> {
    if value.starts_with("http") || value.starts_with('/') {
        return None;
    }
    let bytes = STANDARD.decode(value).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let decoded = decoded.trim();
    (decoded.starts_with("http") || decoded.starts_with('/')).then(|| decoded.to_string())
}

/// Some aggregators redirect to `...?link=<encoded final url>`.
fn unwrap_link_param(location: &str) -> Option<String> {
    let parsed = Url::parse(location).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "link")
        .map(|(_, value)| value.into_owned())
        .filter(|value| value.starts_with("http"))
}
