//! Fetch client shared by the resolver, providers and extractors.
//!
//! Wraps two reqwest clients (one following redirects, one not) behind a
//! retry loop, a fixed browser header set, and an optional short-TTL cache
//! of GET bodies.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, Proxy, Response, redirect};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::error::{FetchError, redact_url};
use super::retry::{RetryDecision, RetryPolicy, classify_error, retry_delay_for};
use crate::context::RequestContext;
use crate::user_agent::{BROWSER_USER_AGENT, browser_headers};

/// Default connect timeout for upstream hosts.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default whole-request timeout for upstream hosts.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default TTL of cached GET bodies.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default number of cached GET bodies.
pub const DEFAULT_CACHE_CAPACITY: u64 = 256;

/// Construction settings for [`FetchClient`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
    /// Retry policy applied to every request.
    pub retry: RetryPolicy,
    /// TTL of cached GET bodies; zero disables the cache.
    pub cache_ttl: Duration,
    /// Maximum number of cached GET bodies.
    pub cache_capacity: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            retry: RetryPolicy::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// A fetched HTML/text document and the URL it was finally served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL after following HTTP redirects.
    pub final_url: String,
    /// Response body as text.
    pub body: String,
}

/// HTTP client with retry-with-backoff, browser headers and a response cache.
///
/// Create once and share (it is cheap to clone); connection pools and the
/// cache are shared between clones.
#[derive(Clone)]
pub struct FetchClient {
    client: Client,
    no_redirect: Client,
    retry: RetryPolicy,
    cache: Option<Cache<String, FetchedPage>>,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("retry", &self.retry)
            .field("cache_enabled", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    /// Creates a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_settings(&FetchSettings::default())
    }

    /// Creates a client with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the underlying HTTP client cannot be built.
    pub fn with_settings(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = build_client(settings, true)?;
        let no_redirect = build_client(settings, false)?;
        let cache = (!settings.cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(settings.cache_capacity)
                .time_to_live(settings.cache_ttl)
                .build()
        });
        Ok(Self {
            client,
            no_redirect,
            retry: settings.retry.clone(),
            cache,
        })
    }

    /// Fetches a URL as text, serving from the response cache when possible.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] after retries are exhausted, on a permanent
    /// failure, or when the context is cancelled.
    pub async fn get_text(&self, url: &str, ctx: &RequestContext) -> Result<String, FetchError> {
        Ok(self.get_page(url, ctx).await?.body)
    }

    /// Fetches a URL following redirects and reports where it ended up.
    ///
    /// # Errors
    ///
    /// Same as [`get_text`](Self::get_text).
    #[instrument(level = "debug", skip(self, url, ctx), fields(url = %redact_url(url)))]
    pub async fn get_page(&self, url: &str, ctx: &RequestContext) -> Result<FetchedPage, FetchError> {
        validate_url(url)?;

        if let Some(cache) = &self.cache
            && let Some(page) = cache.get(url).await
        {
            debug!("response cache hit");
            return Ok(page);
        }

        let page = self
            .with_retry(url, ctx, move || self.fetch_page_once(url, None))
            .await?;

        if let Some(cache) = &self.cache {
            cache.insert(url.to_string(), page.clone()).await;
        }
        Ok(page)
    }

    /// Fetches a URL and decodes the body as JSON. Never cached.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Decode`] when the body is not the expected shape.
    #[instrument(level = "debug", skip(self, url, ctx), fields(url = %redact_url(url)))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<T, FetchError> {
        self.get_json_with_headers(url, &HeaderMap::new(), ctx).await
    }

    /// Like [`get_json`](Self::get_json) with extra request headers such as
    /// `Referer` or `Origin` layered over the browser defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Decode`] when the body is not the expected shape.
    #[instrument(level = "debug", skip(self, url, headers, ctx), fields(url = %redact_url(url)))]
    pub async fn get_json_with_headers<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &HeaderMap,
        ctx: &RequestContext,
    ) -> Result<T, FetchError> {
        validate_url(url)?;
        let page = self
            .with_retry(url, ctx, move || self.fetch_page_once(url, Some(headers)))
            .await?;
        serde_json::from_str(&page.body).map_err(|e| FetchError::decode(url, e.to_string()))
    }

    /// Issues a `HEAD` request with redirects disabled and returns the
    /// absolute `Location` target, or `None` when the server did not redirect.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure or a non-2xx, non-3xx status.
    #[instrument(level = "debug", skip(self, url, ctx), fields(url = %redact_url(url)))]
    pub async fn head_location(
        &self,
        url: &str,
        ctx: &RequestContext,
    ) -> Result<Option<String>, FetchError> {
        let base = validate_url(url)?;
        let base = &base;
        self.with_retry(url, ctx, move || async move {
            let response = self
                .no_redirect
                .head(url)
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(url, e))?;
            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| base.join(v.trim()).ok())
                    .map(String::from);
                return Ok(location);
            }
            check_status(url, response).map(|_| None)
        })
        .await
    }

    async fn fetch_page_once(
        &self,
        url: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<FetchedPage, FetchError> {
        let mut request = self.client.get(url);
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let response = check_status(url, response)?;
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        Ok(FetchedPage { final_url, body })
    }

    async fn with_retry<T, F, Fut>(
        &self,
        url: &str,
        ctx: &RequestContext,
        mut operation: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            let result = tokio::select! {
                biased;
                () = ctx.cancelled() => return Err(FetchError::cancelled(url)),
                result = operation() => result,
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.retry.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    let delay = retry_delay_for(&error, delay, self.retry.max_delay());
                    debug!(
                        url = %redact_url(url),
                        error = %error,
                        delay_ms = delay.as_millis(),
                        next_attempt,
                        "retrying fetch"
                    );
                    tokio::select! {
                        biased;
                        () = ctx.cancelled() => return Err(FetchError::cancelled(url)),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt = next_attempt;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %redact_url(url), error = %error, reason, "giving up on fetch");
                    return Err(error);
                }
            }
        }
    }
}

fn validate_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
    if matches!(parsed.scheme(), "http" | "https") {
        Ok(parsed)
    } else {
        Err(FetchError::invalid_url(url))
    }
}

fn check_status(url: &str, response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(std::string::ToString::to_string);
    Err(FetchError::http_status_with_retry_after(
        url,
        status.as_u16(),
        retry_after,
    ))
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn build_client(settings: &FetchSettings, follow_redirects: bool) -> Result<Client, FetchError> {
    match try_build_client(settings, follow_redirects, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; env proxies still apply on the fallback path.
            warn!("HTTP client builder panicked loading system proxy settings; using env-proxy fallback");
            match try_build_client(settings, follow_redirects, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(FetchError::client_build(
                    "HTTP client construction panicked while applying env-proxy fallback",
                )),
                Err(BuildClientFailure::Build(error)) => {
                    Err(FetchError::client_build(error.to_string()))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(FetchError::client_build(error.to_string())),
    }
}

fn try_build_client(
    settings: &FetchSettings,
    follow_redirects: bool,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let connect_timeout = settings.connect_timeout;
    let read_timeout = settings.read_timeout;
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(browser_headers())
            .cookie_store(true)
            .gzip(true);
        if !follow_redirects {
            builder = builder.redirect(redirect::Policy::none());
        }
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    for (scheme, names) in [
        ("https", ["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        ("http", ["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
    ] {
        let Some(proxy) = names.iter().find_map(|name| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        }) else {
            continue;
        };
        let resolved = if scheme == "https" {
            Proxy::https(&proxy)
        } else {
            Proxy::http(&proxy)
        };
        if let Ok(resolved) = resolved {
            builder = builder.proxy(resolved);
        }
    }
    builder
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_rejects_non_http_schemes() {
        assert!(validate_url("https://example.com/a").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(matches!(
            validate_url("ftp://example.com/file"),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            validate_url("movie/550"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_client_builds_with_cache_disabled() {
        let settings = FetchSettings {
            cache_ttl: Duration::ZERO,
            ..FetchSettings::default()
        };
        let client = FetchClient::with_settings(&settings).unwrap();
        assert!(client.cache.is_none());
        assert!(format!("{client:?}").contains("cache_enabled: false"));
    }

    #[tokio::test]
    async fn test_get_text_invalid_url_fails_without_network() {
        let client = FetchClient::new().unwrap();
        let result = client.get_text("not a url", &RequestContext::new()).await;
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_context_short_circuits() {
        let client = FetchClient::new().unwrap();
        let ctx = RequestContext::new();
        ctx.cancel();
        let result = client.get_text("https://example.invalid/", &ctx).await;
        assert!(matches!(result, Err(FetchError::Cancelled { .. })));
    }
}
