//! Cached resolver for provider base URLs.
//!
//! Scraped hosts rename their domains often, so each provider's current root
//! URL comes from a remote JSON document shaped
//! `{ "<providerId>": { "name": "...", "url": "..." } }`. The whole document
//! is cached for a TTL window; readers always see either the previous or the
//! next complete map.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::context::RequestContext;
use crate::http::{FetchClient, FetchError};

/// Default location of the base-URL configuration document.
pub const DEFAULT_CONFIG_URL: &str = "https://himanshu8443.github.io/providers/modflix.json";

/// Default lifetime of a fetched configuration document.
pub const DEFAULT_BASE_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Default wait before retrying after a failed refresh.
pub const DEFAULT_FAILURE_COOLDOWN: Duration = Duration::from_secs(30);

/// Refresh failures. Logged and swallowed; never returned from [`BaseUrlResolver::resolve`].
#[derive(Debug, Error)]
pub enum BaseUrlError {
    /// The configuration document could not be fetched or decoded.
    #[error("could not fetch base-URL config: {0}")]
    Fetch(#[from] FetchError),

    /// The document parsed as JSON but is not an object of provider entries.
    #[error("base-URL config at {url} is not a JSON object")]
    NotAnObject {
        /// Config document URL.
        url: String,
    },
}

/// One provider's entry as it appears in the configuration document.
#[derive(Debug, Clone, Deserialize)]
struct ConfigEntry {
    #[serde(default)]
    name: String,
    url: String,
}

/// A cached base URL and when it was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseUrlEntry {
    /// Display name from the configuration document.
    pub name: String,
    /// Current root URL, without a trailing slash.
    pub base_url: String,
    /// When the document carrying this entry was fetched.
    pub resolved_at: SystemTime,
}

#[derive(Debug, Clone)]
struct CacheState {
    urls: Arc<HashMap<String, BaseUrlEntry>>,
    expires_at: Instant,
}

/// TTL-cached `{providerId -> baseUrl}` map backed by a remote JSON document.
///
/// Concurrent cache misses are coalesced into one fetch. A failed refresh
/// keeps the previous map (or installs an empty one if nothing was ever
/// fetched) and is retried after the failure cooldown.
pub struct BaseUrlResolver {
    client: FetchClient,
    config_url: String,
    ttl: Duration,
    failure_cooldown: Duration,
    state: RwLock<Option<CacheState>>,
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for BaseUrlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseUrlResolver")
            .field("config_url", &self.config_url)
            .field("ttl", &self.ttl)
            .field("failure_cooldown", &self.failure_cooldown)
            .field("cached", &self.is_cached())
            .finish_non_exhaustive()
    }
}

impl BaseUrlResolver {
    /// Creates a resolver with the default TTL and failure cooldown.
    #[must_use]
    pub fn new(client: FetchClient, config_url: impl Into<String>) -> Self {
        Self {
            client,
            config_url: config_url.into(),
            ttl: DEFAULT_BASE_URL_TTL,
            failure_cooldown: DEFAULT_FAILURE_COOLDOWN,
            state: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Sets how long a fetched document stays fresh.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets how long to wait before retrying after a failed refresh.
    #[must_use]
    pub fn with_failure_cooldown(mut self, cooldown: Duration) -> Self {
        self.failure_cooldown = cooldown;
        self
    }

    /// Returns the configuration document URL.
    #[must_use]
    pub fn config_url(&self) -> &str {
        &self.config_url
    }

    /// Returns the current base URL for `provider_id`, refreshing the cache
    /// when it is absent or stale.
    ///
    /// An unknown provider or an unreachable configuration document yields
    /// an empty string.
    #[instrument(skip(self, ctx), fields(provider = %provider_id))]
    pub async fn resolve(&self, provider_id: &str, ctx: &RequestContext) -> String {
        let urls = self.current_map(ctx).await;
        if let Some(entry) = urls.get(provider_id) {
            return entry.base_url.clone();
        }
        warn!(
            provider = %provider_id,
            config_url = %self.config_url,
            "No base URL configured for provider; it is unavailable this cycle"
        );
        String::new()
    }

    /// Returns every known `{providerId -> baseUrl}` pair, refreshing if stale.
    pub async fn resolve_all(&self, ctx: &RequestContext) -> HashMap<String, String> {
        self.current_map(ctx)
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), entry.base_url.clone()))
            .collect()
    }

    /// Drops the cached map so the next call fetches again.
    pub fn invalidate(&self) {
        debug!("Invalidating base-URL cache");
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Returns the cached entries without touching the network.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, BaseUrlEntry> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|state| {
                state
                    .urls
                    .iter()
                    .map(|(id, entry)| (id.clone(), entry.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns true when a map (possibly empty) is cached.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn fresh_map(&self) -> Option<Arc<HashMap<String, BaseUrlEntry>>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .as_ref()
            .filter(|state| Instant::now() < state.expires_at)
            .map(|state| Arc::clone(&state.urls))
    }

    fn cached_or_empty(&self) -> Arc<HashMap<String, BaseUrlEntry>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or_else(|| Arc::new(HashMap::new()), |state| Arc::clone(&state.urls))
    }

    async fn current_map(&self, ctx: &RequestContext) -> Arc<HashMap<String, BaseUrlEntry>> {
        if let Some(urls) = self.fresh_map() {
            return urls;
        }

        let _guard = tokio::select! {
            biased;
            () = ctx.cancelled() => return self.cached_or_empty(),
            guard = self.refresh_lock.lock() => guard,
        };

        // Another caller may have refreshed while we waited for the lock.
        if let Some(urls) = self.fresh_map() {
            return urls;
        }

        match self.fetch_document(ctx).await {
            Ok(urls) => {
                info!(
                    config_url = %self.config_url,
                    providers = urls.len(),
                    "Refreshed base-URL config"
                );
                let urls = Arc::new(urls);
                *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(CacheState {
                    urls: Arc::clone(&urls),
                    expires_at: Instant::now() + self.ttl,
                });
                urls
            }
            Err(BaseUrlError::Fetch(error)) if error.is_cancelled() => {
                debug!("Base-URL refresh cancelled");
                self.cached_or_empty()
            }
            Err(error) => {
                warn!(
                    config_url = %self.config_url,
                    error = %error,
                    retry_in_secs = self.failure_cooldown.as_secs(),
                    "Base-URL refresh failed; keeping previous map"
                );
                let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                let urls = state
                    .as_ref()
                    .map_or_else(|| Arc::new(HashMap::new()), |s| Arc::clone(&s.urls));
                *state = Some(CacheState {
                    urls: Arc::clone(&urls),
                    expires_at: Instant::now() + self.failure_cooldown,
                });
                urls
            }
        }
    }

    async fn fetch_document(
        &self,
        ctx: &RequestContext,
    ) -> Result<HashMap<String, BaseUrlEntry>, BaseUrlError> {
        let document: serde_json::Value = self.client.get_json(&self.config_url, ctx).await?;
        parse_document(&self.config_url, document, SystemTime::now())
    }
}

fn parse_document(
    config_url: &str,
    document: serde_json::Value,
    resolved_at: SystemTime,
) -> Result<HashMap<String, BaseUrlEntry>, BaseUrlError> {
    let serde_json::Value::Object(entries) = document else {
        return Err(BaseUrlError::NotAnObject {
            url: config_url.to_string(),
        });
    };

    let mut urls = HashMap::with_capacity(entries.len());
    for (id, value) in entries {
        let entry = match serde_json::from_value::<ConfigEntry>(value) {
            Ok(entry) => entry,
            Err(error) => {
                debug!(provider = %id, error = %error, "Skipping malformed base-URL entry");
                continue;
            }
        };
        let base_url = entry.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            continue;
        }
        urls.insert(
            id,
            BaseUrlEntry {
                name: entry.name,
                base_url,
                resolved_at,
            },
        );
    }
    Ok(urls)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_document_reads_entries_and_trims_slash() {
        let doc = json!({
            "vega": {"name": "VegaMovies", "url": "https://vegamovies.example/"},
            "hdhub": {"name": "HdHub", "url": " https://hdhub.example "}
        });
        let urls = parse_document("cfg", doc, SystemTime::UNIX_EPOCH).unwrap();
        assert_eq!(urls["vega"].base_url, "https://vegamovies.example");
        assert_eq!(urls["vega"].name, "VegaMovies");
        assert_eq!(urls["hdhub"].base_url, "https://hdhub.example");
    }

    #[test]
    fn test_parse_document_skips_malformed_and_empty_entries() {
        let doc = json!({
            "good": {"name": "Good", "url": "https://good.example"},
            "no_url": {"name": "Broken"},
            "empty": {"name": "Empty", "url": ""},
            "wrong_type": 42
        });
        let urls = parse_document("cfg", doc, SystemTime::UNIX_EPOCH).unwrap();
        assert_eq!(urls.len(), 1);
        assert!(urls.contains_key("good"));
    }

    #[test]
    fn test_parse_document_rejects_non_object() {
        let result = parse_document("cfg", json!(["a", "b"]), SystemTime::UNIX_EPOCH);
        assert!(matches!(result, Err(BaseUrlError::NotAnObject { .. })));
    }

    #[tokio::test]
    async fn test_first_failure_installs_empty_map() {
        let resolver = BaseUrlResolver::new(FetchClient::new().unwrap(), "not a url");
        assert!(!resolver.is_cached());

        let url = resolver.resolve("vega", &RequestContext::new()).await;

        assert_eq!(url, "");
        assert!(resolver.is_cached());
        assert!(resolver.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_clears_cache() {
        let resolver = BaseUrlResolver::new(FetchClient::new().unwrap(), "not a url");
        let _ = resolver.resolve_all(&RequestContext::new()).await;
        assert!(resolver.is_cached());
        resolver.invalidate();
        assert!(!resolver.is_cached());
    }

    #[test]
    fn test_builder_overrides_durations() {
        let resolver = BaseUrlResolver::new(FetchClient::new().unwrap(), "https://cfg.example")
            .with_ttl(Duration::from_secs(5))
            .with_failure_cooldown(Duration::from_secs(1));
        let debug = format!("{resolver:?}");
        assert!(debug.contains("cfg.example"));
        assert!(debug.contains("cached: false"));
    }
}
