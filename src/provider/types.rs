//! Plain data exchanged between providers, the manager and callers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of catalog content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Single feature.
    #[default]
    Movie,
    /// Series with seasons and episodes.
    Tv,
}

impl ContentKind {
    /// Lowercase token used in links and URL templates.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" => Ok(Self::Movie),
            "tv" | "series" | "show" => Ok(Self::Tv),
            other => Err(format!("unknown content kind '{other}' (expected movie or tv)")),
        }
    }
}

/// One entry of a provider's catalog menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    /// Human-readable label ("Trending", "Latest Series").
    pub label: String,
    /// Provider-specific token passed back into `get_posts`.
    pub filter: String,
    /// Kind of content the filter lists.
    pub kind: ContentKind,
}

impl CatalogFilter {
    /// Creates a catalog filter.
    #[must_use]
    pub fn new(label: impl Into<String>, filter: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            label: label.into(),
            filter: filter.into(),
            kind,
        }
    }
}

/// Static description of a provider.
///
/// `id` is the only stable identity. `base_url` is a fallback used when the
/// base-URL resolver has no entry for this provider; it may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider id.
    pub id: String,
    /// Name shown to users.
    pub display_name: String,
    /// Fallback root URL.
    pub base_url: String,
    /// Whether the provider starts enabled.
    pub enabled: bool,
    /// Lower values are tried first in fallback chains.
    pub priority: i32,
    /// Kinds of content this provider carries.
    pub content_kinds: BTreeSet<ContentKind>,
    /// Ordered catalog menu.
    pub catalog: Vec<CatalogFilter>,
}

impl ProviderConfig {
    /// Creates an enabled config with no catalog.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            base_url: String::new(),
            enabled: true,
            priority,
            content_kinds: BTreeSet::from([ContentKind::Movie, ContentKind::Tv]),
            catalog: Vec::new(),
        }
    }

    /// Sets the fallback base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the content kinds.
    #[must_use]
    pub fn with_content_kinds(mut self, kinds: impl IntoIterator<Item = ContentKind>) -> Self {
        self.content_kinds = kinds.into_iter().collect();
        self
    }

    /// Appends a catalog filter.
    #[must_use]
    pub fn with_filter(mut self, filter: CatalogFilter) -> Self {
        self.catalog.push(filter);
        self
    }

    /// Sets whether the provider starts enabled.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Finds the catalog entry for `token`, falling back to the first entry.
    #[must_use]
    pub fn catalog_filter(&self, token: &str) -> Option<&CatalogFilter> {
        self.catalog
            .iter()
            .find(|f| f.filter == token)
            .or_else(|| self.catalog.first())
    }
}

/// A lightweight catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Provider-scoped identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Poster image URL.
    pub image_url: String,
    /// Link passed back into `get_meta`.
    pub detail_link: String,
    /// Kind of content.
    pub kind: ContentKind,
    /// Release year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// Rating on a 0-10 scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    /// Provider that produced this post.
    pub source_provider_id: String,
}

impl Post {
    /// Case-insensitive `(title, year)` key used for cross-provider dedup.
    #[must_use]
    pub fn dedup_key(&self) -> (String, Option<String>) {
        (
            self.title.trim().to_lowercase(),
            self.year.as_ref().map(|y| y.trim().to_string()),
        )
    }
}

/// A link to one season's (or quality group's) episode list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonLink {
    /// Label such as "Season 1" or "1080p".
    pub title: String,
    /// Link passed into `get_episodes`.
    pub link: String,
}

/// Detailed metadata for one title.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Info {
    /// Display title.
    pub title: String,
    /// Plot summary.
    pub synopsis: String,
    /// Poster image URL.
    pub image_url: String,
    /// Backdrop image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_url: Option<String>,
    /// Rating on a 0-10 scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    /// Release year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// Genre names.
    pub genres: Vec<String>,
    /// Cast member names.
    pub cast: Vec<String>,
    /// Season or quality links, empty for single-file titles.
    pub season_links: Vec<SeasonLink>,
    /// Provider that produced this metadata.
    pub source_provider_id: String,
}

/// One playable episode entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeLink {
    /// Label such as "Episode 3".
    pub title: String,
    /// Link passed into `get_stream`.
    pub link: String,
}

/// How a stream URL is meant to be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Embeddable player page.
    Iframe,
    /// Progressive media file.
    Direct,
    /// HLS/DASH playlist.
    Segmented,
}

/// A subtitle track attached to a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    /// Track label.
    pub label: String,
    /// Language code when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Subtitle file URL.
    pub url: String,
}

/// A resolved, directly usable playback reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Server name shown to users.
    pub server_label: String,
    /// Embed URL or final media URL; never a landing page.
    pub url: String,
    /// Playback kind.
    pub kind: StreamKind,
    /// Quality token such as "1080p".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Headers the player must send.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub headers: BTreeMap<String, String>,
    /// Subtitle tracks.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub subtitles: Vec<Subtitle>,
}

impl Stream {
    /// Creates a stream of an explicit kind.
    #[must_use]
    pub fn new(server_label: impl Into<String>, url: impl Into<String>, kind: StreamKind) -> Self {
        Self {
            server_label: server_label.into(),
            url: url.into(),
            kind,
            quality: None,
            headers: BTreeMap::new(),
            subtitles: Vec::new(),
        }
    }

    /// Creates an iframe stream.
    #[must_use]
    pub fn iframe(server_label: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(server_label, url, StreamKind::Iframe)
    }

    /// Creates a media stream, typed segmented for playlists and direct otherwise.
    #[must_use]
    pub fn media(server_label: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = if url.to_ascii_lowercase().contains(".m3u8") {
            StreamKind::Segmented
        } else {
            StreamKind::Direct
        };
        Self::new(server_label, url, kind)
    }

    /// Sets the quality token.
    #[must_use]
    pub fn with_quality(mut self, quality: Option<String>) -> Self {
        self.quality = quality;
        self
    }

    /// Adds a header the player must send.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the subtitle tracks.
    #[must_use]
    pub fn with_subtitles(mut self, subtitles: Vec<Subtitle>) -> Self {
        self.subtitles = subtitles;
        self
    }
}
