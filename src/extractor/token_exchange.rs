//! Two-step token-exchange extractor.
//!
//! Step one asks the provider's API for an opaque token for a content id;
//! step two trades the token for a stream list. Any non-success answer at
//! either step ends this extraction path with no stream.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde_json::Value;
use tracing::{debug, instrument};

use super::embed::ContentRef;
use super::{ExtractError, StreamExtractor};
use crate::context::RequestContext;
use crate::http::FetchClient;
use crate::provider::{ContentKind, Stream};

/// URL templates for both exchange steps.
///
/// `token_url` sees `{id}`, `{kind}`, `{season}`, `{episode}`; `stream_url`
/// additionally sees `{token}` (URL-encoded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEndpoints {
    /// Step-one template.
    pub token_url: String,
    /// Step-two template.
    pub stream_url: String,
    /// `Referer`/`Origin` sent with both steps and attached to the stream.
    pub referer: Option<String>,
}

/// Resolves a content reference through a token-exchange API.
#[derive(Debug, Clone)]
pub struct TokenExchangeExtractor {
    client: FetchClient,
    endpoints: TokenEndpoints,
    label: String,
}

impl TokenExchangeExtractor {
    /// Creates an extractor for one API.
    #[must_use]
    pub fn new(client: FetchClient, endpoints: TokenEndpoints, label: impl Into<String>) -> Self {
        Self {
            client,
            endpoints,
            label: label.into(),
        }
    }

    /// Runs both steps for `content`, returning the first stream URL.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] on transport failure, a non-success status
    /// flag, or a response missing its token or stream list.
    pub async fn exchange(
        &self,
        content: &ContentRef,
        ctx: &RequestContext,
    ) -> Result<Stream, ExtractError> {
        let headers = self.request_headers();

        let token_url = content.fill(&self.endpoints.token_url);
        let body: Value = self
            .client
            .get_json_with_headers(&token_url, &headers, ctx)
            .await?;
        if !is_success(&body) {
            return Err(ExtractError::rejected(&token_url, status_summary(&body)));
        }
        let token = body
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExtractError::malformed(&token_url, "missing token"))?;

        let stream_url = content
            .fill(&self.endpoints.stream_url)
            .replace("{token}", &urlencoding::encode(token));
        let body: Value = self
            .client
            .get_json_with_headers(&stream_url, &headers, ctx)
            .await?;
        if !is_success(&body) {
            return Err(ExtractError::rejected(&stream_url, status_summary(&body)));
        }
        let url = first_stream_url(&body)
            .ok_or_else(|| ExtractError::malformed(&stream_url, "no stream URL in response"))?;

        let mut stream = Stream::media(self.label.clone(), url);
        if let Some(referer) = &self.endpoints.referer {
            stream = stream.with_header("Referer", referer.clone());
        }
        Ok(stream)
    }

    /// Parses `link` (bare ids take `kind`) and runs the exchange.
    ///
    /// # Errors
    ///
    /// Only cancellation is returned as an error; every other failure
    /// yields an empty list.
    pub async fn streams_for_link(
        &self,
        link: &str,
        kind: ContentKind,
        ctx: &RequestContext,
    ) -> Result<Vec<Stream>, ExtractError> {
        let Some(content) = ContentRef::parse(link, kind) else {
            debug!(link, "No content id in link");
            return Ok(Vec::new());
        };
        match self.exchange(&content, ctx).await {
            Ok(stream) => Ok(vec![stream]),
            Err(error) if error.is_cancelled() => Err(error),
            Err(error) => {
                debug!(error = %error, "Token exchange produced no stream");
                Ok(Vec::new())
            }
        }
    }

    fn request_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self
            .endpoints
            .referer
            .as_deref()
            .and_then(|r| HeaderValue::from_str(r).ok())
        {
            headers.insert(REFERER, value.clone());
            headers.insert(ORIGIN, value);
        }
        headers
    }
}

#[async_trait]
impl StreamExtractor for TokenExchangeExtractor {
    fn name(&self) -> &'static str {
        "token-exchange"
    }

    /// Treats `url` as a content link (`movie/<id>`, `tv/<id>/<s>/<e>`).
    /// Every failure short of cancellation yields an empty list.
    #[instrument(skip(self, ctx), fields(extractor = "token-exchange"))]
    async fn extract(&self, url: &str, ctx: &RequestContext) -> Result<Vec<Stream>, ExtractError> {
        self.streams_for_link(url, ContentKind::Movie, ctx).await
    }
}

/// Accepts `success: true` or a `status` of `true`, `"ok"`, `"success"` or 200.
/// A body with neither flag counts as success.
fn is_success(body: &Value) -> bool {
    if let Some(flag) = body.get("success") {
        return flag.as_bool().unwrap_or(false);
    }
    match body.get("status") {
        None => true,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(code)) => code.as_u64() == Some(200),
        Some(Value::String(status)) => {
            matches!(status.to_ascii_lowercase().as_str(), "ok" | "success")
        }
        Some(_) => false,
    }
}

fn status_summary(body: &Value) -> String {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map_or_else(|| "non-success status".to_string(), str::to_string)
}

/// First URL in `streams`, `data` or `urls`; entries may be strings or
/// objects carrying `url`, `file` or `link`.
fn first_stream_url(body: &Value) -> Option<String> {
    ["streams", "data", "urls"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(|entry| match entry {
            Value::String(url) => Some(url.clone()),
            Value::Object(fields) => ["url", "file", "link"]
                .iter()
                .find_map(|k| fields.get(*k).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        })
        .filter(|url| url.starts_with("http"))
}
