//! Provider manager: registry plus fan-out and fallback operations.
//!
//! Fan-out operations ask every enabled provider concurrently, give each call
//! its own timeout, and keep whatever succeeded. Fallback operations walk the
//! priority-sorted list one provider at a time and stop at the first success.
//! Neither mode retries a provider; retries live in the fetch layer.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::error::{ManagerError, ProviderError};
use super::outcome::{FailureReason, FanOutReport, Outcome, ProviderFailure};
use super::types::{ContentKind, EpisodeLink, Info, Post, Stream};
use super::{Capabilities, Provider};
use crate::context::RequestContext;

/// Default ceiling for one provider call inside an aggregate operation.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

struct Entry {
    provider: Arc<dyn Provider>,
    enabled: bool,
}

#[derive(Default)]
struct Registry {
    /// Registration order.
    entries: Vec<Entry>,
    /// Enabled providers sorted by priority, ties in registration order.
    enabled_sorted: Vec<Arc<dyn Provider>>,
}

impl Registry {
    fn recompute(&mut self) {
        let mut enabled: Vec<Arc<dyn Provider>> = self
            .entries
            .iter()
            .filter(|e| e.enabled)
            .map(|e| Arc::clone(&e.provider))
            .collect();
        enabled.sort_by_key(|p| p.config().priority);
        self.enabled_sorted = enabled;
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.provider.id() == id)
    }
}

/// Per-provider line of [`ProviderStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSummary {
    /// Provider id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Whether the provider takes part in aggregate operations.
    pub enabled: bool,
    /// Fallback priority (lower first).
    pub priority: i32,
    /// Optional capabilities.
    pub capabilities: Capabilities,
    /// Content kinds carried.
    pub content_kinds: BTreeSet<ContentKind>,
}

/// Registry counts and per-provider summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStats {
    /// Registered providers.
    pub total_count: usize,
    /// Enabled providers.
    pub enabled_count: usize,
    /// Disabled providers.
    pub disabled_count: usize,
    /// One entry per provider, in priority order.
    pub providers: Vec<ProviderSummary>,
}

/// Holds every registered provider and aggregates calls across them.
///
/// Constructed once at startup and shared by reference (or `Arc`); the
/// registry lock is held only for mutation and for copying out the enabled
/// list, never across an await.
pub struct ProviderManager {
    registry: RwLock<Registry>,
    call_timeout: Duration,
}

impl ProviderManager {
    /// Creates an empty manager with the default per-call timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            call_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Sets the per-provider call timeout used by every aggregate operation.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Returns the per-provider call timeout.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Registers a provider, enabled according to its config.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidProvider`] for an empty id or display
    /// name and [`ManagerError::DuplicateProvider`] for a reused id.
    #[instrument(skip(self, provider), fields(provider_id))]
    pub fn register(&self, provider: Arc<dyn Provider>) -> Result<(), ManagerError> {
        let config = provider.config();
        tracing::Span::current().record("provider_id", config.id.as_str());
        if config.id.trim().is_empty() {
            return Err(ManagerError::invalid_provider("provider id is empty"));
        }
        if config.display_name.trim().is_empty() {
            return Err(ManagerError::invalid_provider(format!(
                "provider '{}' has an empty display name",
                config.id
            )));
        }

        let mut registry = self.write();
        if registry.position(&config.id).is_some() {
            return Err(ManagerError::duplicate(&config.id));
        }
        debug!(
            id = %config.id,
            priority = config.priority,
            enabled = config.enabled,
            capabilities = ?provider.capabilities(),
            "Registering provider"
        );
        let enabled = config.enabled;
        registry.entries.push(Entry { provider, enabled });
        registry.recompute();
        Ok(())
    }

    /// Removes a provider and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownProvider`] when nothing is registered under `id`.
    pub fn unregister(&self, id: &str) -> Result<Arc<dyn Provider>, ManagerError> {
        let mut registry = self.write();
        let index = registry
            .position(id)
            .ok_or_else(|| ManagerError::unknown(id))?;
        let entry = registry.entries.remove(index);
        registry.recompute();
        debug!(id, "Unregistered provider");
        Ok(entry.provider)
    }

    /// Enables or disables a provider.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownProvider`] when nothing is registered under `id`.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), ManagerError> {
        let mut registry = self.write();
        let index = registry
            .position(id)
            .ok_or_else(|| ManagerError::unknown(id))?;
        registry.entries[index].enabled = enabled;
        registry.recompute();
        info!(id, enabled, "Provider toggled");
        Ok(())
    }

    /// Returns a registered provider by id, enabled or not.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        let registry = self.read();
        registry
            .position(id)
            .map(|index| Arc::clone(&registry.entries[index].provider))
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Returns true if no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// Ids of enabled providers in priority order.
    #[must_use]
    pub fn enabled_ids(&self) -> Vec<String> {
        self.read()
            .enabled_sorted
            .iter()
            .map(|p| p.id().to_string())
            .collect()
    }

    /// Registry counts and summaries. Pure read.
    #[must_use]
    pub fn get_stats(&self) -> ProviderStats {
        let registry = self.read();
        let mut providers: Vec<ProviderSummary> = registry
            .entries
            .iter()
            .map(|entry| {
                let config = entry.provider.config();
                ProviderSummary {
                    id: config.id.clone(),
                    display_name: config.display_name.clone(),
                    enabled: entry.enabled,
                    priority: config.priority,
                    capabilities: entry.provider.capabilities(),
                    content_kinds: config.content_kinds.clone(),
                }
            })
            .collect();
        providers.sort_by_key(|p| p.priority);
        let enabled_count = registry.enabled_sorted.len();
        ProviderStats {
            total_count: registry.entries.len(),
            enabled_count,
            disabled_count: registry.entries.len() - enabled_count,
            providers,
        }
    }

    /// Lists posts from every enabled provider.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoProvidersEnabled`] only; provider failures
    /// are logged and dropped.
    pub async fn list_all_posts(
        &self,
        filter: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, ManagerError> {
        Ok(self
            .list_all_posts_report(filter, page, ctx)
            .await?
            .into_flat())
    }

    /// [`list_all_posts`](Self::list_all_posts) with every per-provider outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoProvidersEnabled`] when nothing is enabled.
    #[instrument(skip(self, ctx))]
    pub async fn list_all_posts_report(
        &self,
        filter: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<FanOutReport<Vec<Post>>, ManagerError> {
        let candidates = self.enabled_candidates()?;
        Ok(self
            .fan_out("list_posts", candidates, ctx, |provider| async move {
                provider.get_posts(filter, page, ctx).await
            })
            .await)
    }

    /// Searches every enabled provider that supports search and merges the
    /// results in priority order, dropping later duplicates by
    /// case-insensitive `(title, year)`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoProvidersEnabled`] when nothing is enabled.
    pub async fn search_all(
        &self,
        query: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<Vec<Post>, ManagerError> {
        let report = self.search_all_report(query, page, ctx).await?;
        let mut seen = HashSet::new();
        Ok(report
            .into_flat()
            .into_iter()
            .filter(|post| seen.insert(post.dedup_key()))
            .collect())
    }

    /// Search fan-out with every per-provider outcome, before dedup.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoProvidersEnabled`] when nothing is enabled.
    #[instrument(skip(self, ctx))]
    pub async fn search_all_report(
        &self,
        query: &str,
        page: u32,
        ctx: &RequestContext,
    ) -> Result<FanOutReport<Vec<Post>>, ManagerError> {
        let candidates: Vec<_> = self
            .enabled_candidates()?
            .into_iter()
            .filter(|p| p.capabilities().supports_search())
            .collect();
        Ok(self
            .fan_out("search", candidates, ctx, |provider| async move {
                provider.search(query, page, ctx).await
            })
            .await)
    }

    /// Collects streams for `link` from every enabled provider, unranked.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoProvidersEnabled`] when nothing is enabled.
    pub async fn get_streams_from_all(
        &self,
        link: &str,
        kind: ContentKind,
        ctx: &RequestContext,
    ) -> Result<Vec<Stream>, ManagerError> {
        Ok(self
            .get_streams_from_all_report(link, kind, ctx)
            .await?
            .into_flat())
    }

    /// Stream fan-out with every per-provider outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoProvidersEnabled`] when nothing is enabled.
    #[instrument(skip(self, ctx))]
    pub async fn get_streams_from_all_report(
        &self,
        link: &str,
        kind: ContentKind,
        ctx: &RequestContext,
    ) -> Result<FanOutReport<Vec<Stream>>, ManagerError> {
        let candidates = self.enabled_candidates()?;
        Ok(self
            .fan_out("streams", candidates, ctx, |provider| async move {
                provider.get_stream(link, kind, ctx).await
            })
            .await)
    }

    /// Tries the preferred provider, then every enabled provider in priority
    /// order, one at a time; returns the first metadata obtained.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoProvidersEnabled`] when there is nobody to ask.
    #[instrument(skip(self, ctx))]
    pub async fn get_metadata_with_fallback(
        &self,
        link: &str,
        preferred: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<Option<Info>, ManagerError> {
        let candidates = self.fallback_candidates(preferred, |_| true)?;
        Ok(self
            .first_success(
                "metadata",
                candidates,
                ctx,
                |provider| async move { provider.get_meta(link, ctx).await },
                |_| true,
            )
            .await)
    }

    /// Same chain as [`get_metadata_with_fallback`](Self::get_metadata_with_fallback)
    /// over providers that list episodes. An empty list counts as a miss.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::NoProvidersEnabled`] when there is nobody to ask.
    #[instrument(skip(self, ctx))]
    pub async fn get_episodes_with_fallback(
        &self,
        url: &str,
        preferred: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<Vec<EpisodeLink>, ManagerError> {
        let candidates =
            self.fallback_candidates(preferred, |p| p.capabilities().supports_episodes())?;
        Ok(self
            .first_success(
                "episodes",
                candidates,
                ctx,
                |provider| async move { provider.get_episodes(url, ctx).await },
                |episodes: &Vec<EpisodeLink>| !episodes.is_empty(),
            )
            .await
            .unwrap_or_default())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn enabled_candidates(&self) -> Result<Vec<Arc<dyn Provider>>, ManagerError> {
        let candidates = self.read().enabled_sorted.clone();
        if candidates.is_empty() {
            return Err(ManagerError::NoProvidersEnabled);
        }
        Ok(candidates)
    }

    /// Preferred provider (if registered) first, then the enabled list
    /// without it, keeping only providers that pass `filter`.
    fn fallback_candidates(
        &self,
        preferred: Option<&str>,
        filter: impl Fn(&Arc<dyn Provider>) -> bool,
    ) -> Result<Vec<Arc<dyn Provider>>, ManagerError> {
        let mut candidates = self.enabled_candidates()?;
        if let Some(id) = preferred {
            match self.get(id) {
                Some(provider) => {
                    candidates.retain(|p| p.id() != id);
                    candidates.insert(0, provider);
                }
                None => debug!(preferred = id, "Preferred provider is not registered; ignoring"),
            }
        }
        candidates.retain(|p| filter(p));
        Ok(candidates)
    }

    async fn guarded<T, Fut>(&self, provider_id: String, call: Fut, ctx: &RequestContext) -> Outcome<T>
    where
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let reason = tokio::select! {
            biased;
            () = ctx.cancelled() => FailureReason::Cancelled,
            result = tokio::time::timeout(self.call_timeout, call) => match result {
                Ok(Ok(value)) => return Outcome::Success { provider_id, value },
                Ok(Err(error)) if error.is_cancelled() => FailureReason::Cancelled,
                Ok(Err(error)) => FailureReason::Error(error),
                Err(_) => FailureReason::TimedOut(self.call_timeout),
            },
        };
        Outcome::Failure(ProviderFailure {
            provider_id,
            reason,
        })
    }

    async fn fan_out<T, F, Fut>(
        &self,
        operation: &'static str,
        candidates: Vec<Arc<dyn Provider>>,
        ctx: &RequestContext,
        call: F,
    ) -> FanOutReport<T>
    where
        F: Fn(Arc<dyn Provider>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let outcomes = join_all(candidates.into_iter().map(|provider| {
            let provider_id = provider.id().to_string();
            self.guarded(provider_id, call(provider), ctx)
        }))
        .await;
        let report = FanOutReport::from_outcomes(outcomes);
        for failure in &report.failures {
            log_failure(operation, failure);
        }
        debug!(
            operation,
            succeeded = report.successes.len(),
            failed = report.failures.len(),
            "Fan-out finished"
        );
        report
    }

    async fn first_success<T, F, Fut>(
        &self,
        operation: &'static str,
        candidates: Vec<Arc<dyn Provider>>,
        ctx: &RequestContext,
        call: F,
        accept: impl Fn(&T) -> bool,
    ) -> Option<T>
    where
        F: Fn(Arc<dyn Provider>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        for provider in candidates {
            let provider_id = provider.id().to_string();
            match self.guarded(provider_id, call(provider), ctx).await {
                Outcome::Success { provider_id, value } if accept(&value) => {
                    debug!(operation, provider = %provider_id, "Fallback chain succeeded");
                    return Some(value);
                }
                Outcome::Success { provider_id, .. } => {
                    debug!(operation, provider = %provider_id, "Empty answer; trying next provider");
                }
                Outcome::Failure(failure) => {
                    let cancelled = matches!(failure.reason, FailureReason::Cancelled);
                    log_failure(operation, &failure);
                    if cancelled {
                        return None;
                    }
                }
            }
        }
        None
    }
}

fn log_failure(operation: &str, failure: &ProviderFailure) {
    match &failure.reason {
        FailureReason::Cancelled => debug!(
            operation,
            provider = %failure.provider_id,
            "Provider call cancelled"
        ),
        FailureReason::Error(error) if error.is_unsupported() => debug!(
            operation,
            provider = %failure.provider_id,
            "Provider does not support this operation; skipping"
        ),
        reason => warn!(
            operation,
            provider = %failure.provider_id,
            error = %reason,
            "Provider call failed; dropping its results"
        ),
    }
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.read();
        let ids: Vec<&str> = registry.entries.iter().map(|e| e.provider.id()).collect();
        f.debug_struct("ProviderManager")
            .field("provider_count", &registry.entries.len())
            .field("providers", &ids)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}
