//! Engine configuration shared by the library and the CLI.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::base_url::{DEFAULT_BASE_URL_TTL, DEFAULT_CONFIG_URL, DEFAULT_FAILURE_COOLDOWN};
use crate::http::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RETRIES,
    DEFAULT_READ_TIMEOUT, FetchSettings, RetryPolicy,
};
use crate::provider::DEFAULT_PROVIDER_TIMEOUT;

/// Everything [`build_default_provider_manager`](crate::build_default_provider_manager)
/// needs to wire the engine.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// URL of the `{providerId: {name, url}}` configuration document.
    pub config_url: String,
    /// How long a fetched base-URL map stays fresh.
    pub base_url_ttl: Duration,
    /// Wait before retrying a failed base-URL refresh.
    pub failure_cooldown: Duration,
    /// Ceiling on one provider call inside an aggregate operation.
    pub provider_timeout: Duration,
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// HTTP whole-request timeout.
    pub read_timeout: Duration,
    /// Attempts per request, including the first.
    pub max_retries: u32,
    /// TTL of cached GET bodies; zero disables the cache.
    pub response_cache_ttl: Duration,
    /// Maximum number of cached GET bodies.
    pub response_cache_capacity: u64,
    /// Metadata source API key. API-backed providers are skipped without one.
    pub tmdb_api_key: Option<String>,
    /// Provider ids registered but disabled at startup.
    pub disabled_providers: BTreeSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_url: DEFAULT_CONFIG_URL.to_string(),
            base_url_ttl: DEFAULT_BASE_URL_TTL,
            failure_cooldown: DEFAULT_FAILURE_COOLDOWN,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            response_cache_ttl: DEFAULT_CACHE_TTL,
            response_cache_capacity: DEFAULT_CACHE_CAPACITY,
            tmdb_api_key: None,
            disabled_providers: BTreeSet::new(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("config_url", &self.config_url)
            .field("base_url_ttl", &self.base_url_ttl)
            .field("failure_cooldown", &self.failure_cooldown)
            .field("provider_timeout", &self.provider_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_retries", &self.max_retries)
            .field("response_cache_ttl", &self.response_cache_ttl)
            .field("response_cache_capacity", &self.response_cache_capacity)
            .field("tmdb_api_key", &self.tmdb_api_key.as_ref().map(|_| "<redacted>"))
            .field("disabled_providers", &self.disabled_providers)
            .finish()
    }
}

impl EngineConfig {
    /// Fetch client settings derived from this config.
    #[must_use]
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            retry: RetryPolicy::with_max_attempts(self.max_retries),
            cache_ttl: self.response_cache_ttl,
            cache_capacity: self.response_cache_capacity,
        }
    }

    /// Returns the API key if one is set and non-blank.
    #[must_use]
    pub fn tmdb_api_key(&self) -> Option<&str> {
        self.tmdb_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
