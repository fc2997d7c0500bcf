//! Content references and embed URL templates.
//!
//! Embed hosts need no extraction: the content id is lifted from the link and
//! substituted into a URL template, with no network call.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::utils::compile_static_regex;
use crate::provider::{ContentKind, Stream};

/// `movie/<id>`, `tv/<id>`, `tv/<id>/<season>` or `tv/<id>/<season>/<episode>`
/// anywhere in the link.
static KIND_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)(?:^|/)(movie|tv)/(\d+)(?:[^/\d][^/]*)?(?:/(\d+)(?:/(\d+))?)?")
});

static BARE_ID_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"^\s*(\d+)\s*$"));

/// A content id lifted from a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    /// Kind of content.
    pub kind: ContentKind,
    /// Numeric content id.
    pub id: String,
    /// Season number for series links.
    pub season: Option<u32>,
    /// Episode number for series links.
    pub episode: Option<u32>,
}

impl ContentRef {
    /// Creates a movie reference.
    #[must_use]
    pub fn movie(id: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Movie,
            id: id.into(),
            season: None,
            episode: None,
        }
    }

    /// Creates a series episode reference.
    #[must_use]
    pub fn episode(id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            kind: ContentKind::Tv,
            id: id.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    /// Parses a link of the form `movie/<id>`, `tv/<id>[/<season>[/<episode>]]`
    /// or a bare numeric id (typed `default_kind`).
    ///
    /// Returns `None` for anything else.
    #[must_use]
    pub fn parse(link: &str, default_kind: ContentKind) -> Option<Self> {
        if let Some(caps) = KIND_ID_RE.captures(link) {
            let kind = if caps[1].eq_ignore_ascii_case("tv") {
                ContentKind::Tv
            } else {
                ContentKind::Movie
            };
            let number = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u32>().ok());
            let (season, episode) = match kind {
                ContentKind::Tv => (number(3), number(4)),
                ContentKind::Movie => (None, None),
            };
            return Some(Self {
                kind,
                id: caps[2].to_string(),
                season,
                episode,
            });
        }

        BARE_ID_RE.captures(link).map(|caps| Self {
            kind: default_kind,
            id: caps[1].to_string(),
            season: None,
            episode: None,
        })
    }

    /// Canonical link form (`movie/550`, `tv/1399/1/2`).
    #[must_use]
    pub fn to_link(&self) -> String {
        match (self.season, self.episode) {
            (Some(season), Some(episode)) => {
                format!("{}/{}/{season}/{episode}", self.kind, self.id)
            }
            (Some(season), None) => format!("{}/{}/{season}", self.kind, self.id),
            _ => format!("{}/{}", self.kind, self.id),
        }
    }

    /// Substitutes `{id}`, `{kind}`, `{season}` and `{episode}` into `template`.
    ///
    /// Series links without season or episode numbers use 1.
    #[must_use]
    pub fn fill(&self, template: &str) -> String {
        template
            .replace("{id}", &self.id)
            .replace("{kind}", self.kind.as_str())
            .replace("{season}", &self.season.unwrap_or(1).to_string())
            .replace("{episode}", &self.episode.unwrap_or(1).to_string())
    }
}

/// Embed URL templates for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedTemplate {
    /// Server label for produced streams.
    pub label: String,
    /// Template for movies.
    pub movie: Option<String>,
    /// Template for series episodes.
    pub tv: Option<String>,
}

impl EmbedTemplate {
    /// Creates a template pair. Pass `None` for a kind the server lacks.
    #[must_use]
    pub fn new(label: impl Into<String>, movie: Option<&str>, tv: Option<&str>) -> Self {
        Self {
            label: label.into(),
            movie: movie.map(str::to_string),
            tv: tv.map(str::to_string),
        }
    }

    /// Renders the template matching the reference's kind.
    #[must_use]
    pub fn render(&self, content: &ContentRef) -> Option<String> {
        let template = match content.kind {
            ContentKind::Movie => self.movie.as_deref(),
            ContentKind::Tv => self.tv.as_deref(),
        }?;
        Some(content.fill(template))
    }
}

/// Renders one iframe stream per template for `link`.
///
/// Unparseable links yield no streams.
#[must_use]
pub fn embed_streams(templates: &[EmbedTemplate], link: &str, kind: ContentKind) -> Vec<Stream> {
    let Some(content) = ContentRef::parse(link, kind) else {
        tracing::debug!(link, "No content id in link; no embed streams");
        return Vec::new();
    };
    templates
        .iter()
        .filter_map(|template| {
            template
                .render(&content)
                .map(|url| Stream::iframe(template.label.clone(), url))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::StreamKind;

    #[test]
    fn test_parse_movie_and_tv_links() {
        assert_eq!(
            ContentRef::parse("movie/550", ContentKind::Tv).unwrap(),
            ContentRef::movie("550")
        );
        assert_eq!(
            ContentRef::parse("https://site.example/tv/1399/2/5", ContentKind::Movie).unwrap(),
            ContentRef::episode("1399", 2, 5)
        );
        let season = ContentRef::parse("tv/1399/3", ContentKind::Movie).unwrap();
        assert_eq!(season.season, Some(3));
        assert_eq!(season.episode, None);
    }

    #[test]
    fn test_parse_slugged_movie_link() {
        let parsed = ContentRef::parse("https://db.example/movie/550-fight-club", ContentKind::Tv);
        assert_eq!(parsed.unwrap(), ContentRef::movie("550"));
    }

    #[test]
    fn test_parse_bare_numeric_uses_default_kind() {
        let parsed = ContentRef::parse(" 1399 ", ContentKind::Tv).unwrap();
        assert_eq!(parsed.kind, ContentKind::Tv);
        assert_eq!(parsed.id, "1399");
    }

    #[test]
    fn test_parse_rejects_unrecognized_links() {
        assert!(ContentRef::parse("https://example.com/watch?v=abc", ContentKind::Movie).is_none());
        assert!(ContentRef::parse("", ContentKind::Movie).is_none());
        assert!(ContentRef::parse("movie/", ContentKind::Movie).is_none());
    }

    #[test]
    fn test_to_link_round_trips_canonical_forms() {
        assert_eq!(ContentRef::episode("1", 2, 3).to_link(), "tv/1/2/3");
        assert_eq!(ContentRef::movie("9").to_link(), "movie/9");
    }

    #[test]
    fn test_fill_defaults_missing_episode_numbers() {
        let content = ContentRef::parse("tv/77", ContentKind::Movie).unwrap();
        assert_eq!(
            content.fill("https://e.example/tv/{id}/{season}-{episode}"),
            "https://e.example/tv/77/1-1"
        );
    }

    #[test]
    fn test_embed_streams_one_per_template_and_kind() {
        let templates = vec![
            EmbedTemplate::new(
                "One",
                Some("https://one.example/movie/{id}"),
                Some("https://one.example/tv/{id}/{season}/{episode}"),
            ),
            EmbedTemplate::new("MoviesOnly", Some("https://two.example/{id}"), None),
        ];

        let movie = embed_streams(&templates, "movie/550", ContentKind::Movie);
        assert_eq!(movie.len(), 2);
        assert!(movie.iter().all(|s| s.kind == StreamKind::Iframe));
        assert_eq!(movie[1].url, "https://two.example/550");

        let tv = embed_streams(&templates, "tv/1399/1/2", ContentKind::Tv);
        assert_eq!(tv.len(), 1);
        assert_eq!(tv[0].url, "https://one.example/tv/1399/1/2");

        assert!(embed_streams(&templates, "garbage", ContentKind::Movie).is_empty());
    }
}
