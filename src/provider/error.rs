//! Error types for provider calls and registry management.
//!
//! [`ProviderError`] is what a single provider call can fail with; the
//! manager swallows it. [`ManagerError`] covers registry misconfiguration,
//! the one category allowed to reach callers.

use thiserror::Error;

use crate::extractor::ExtractError;
use crate::http::FetchError;
use crate::metadata::MetadataError;

/// Errors from one provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider does not implement this capability.
    #[error("provider '{provider_id}' does not support {operation}")]
    Unsupported {
        /// Provider id.
        provider_id: String,
        /// Capability name.
        operation: &'static str,
    },

    /// No base URL is known for the provider this cycle.
    #[error("provider '{provider_id}' has no base URL")]
    BaseUrlUnavailable {
        /// Provider id.
        provider_id: String,
    },

    /// The link is not something this provider understands.
    #[error("provider '{provider_id}' cannot handle link '{link}'")]
    InvalidLink {
        /// Provider id.
        provider_id: String,
        /// The offending link.
        link: String,
    },

    /// A scraped page did not have the expected structure.
    #[error("provider '{provider_id}' could not parse {url}: {reason}")]
    Parse {
        /// Provider id.
        provider_id: String,
        /// Page URL.
        url: String,
        /// What was missing.
        reason: String,
    },

    /// A CSS selector in the provider's profile is invalid.
    #[error("provider '{provider_id}' has an invalid selector '{selector}': {reason}")]
    InvalidSelector {
        /// Provider id.
        provider_id: String,
        /// The selector text.
        selector: String,
        /// Parser message.
        reason: String,
    },

    /// A fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Stream extraction failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The metadata source failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl ProviderError {
    /// Creates an `Unsupported` error.
    #[must_use]
    pub fn unsupported(provider_id: &str, operation: &'static str) -> Self {
        Self::Unsupported {
            provider_id: provider_id.to_string(),
            operation,
        }
    }

    /// Creates a `BaseUrlUnavailable` error.
    #[must_use]
    pub fn base_url_unavailable(provider_id: &str) -> Self {
        Self::BaseUrlUnavailable {
            provider_id: provider_id.to_string(),
        }
    }

    /// Creates an `InvalidLink` error.
    #[must_use]
    pub fn invalid_link(provider_id: &str, link: &str) -> Self {
        Self::InvalidLink {
            provider_id: provider_id.to_string(),
            link: link.to_string(),
        }
    }

    /// Creates a `Parse` error.
    #[must_use]
    pub fn parse(provider_id: &str, url: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            provider_id: provider_id.to_string(),
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true when the provider does not offer the capability at all.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Returns true when the call stopped because the caller cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Fetch(error) => error.is_cancelled(),
            Self::Extract(error) => error.is_cancelled(),
            Self::Metadata(MetadataError::Fetch(error)) => error.is_cancelled(),
            _ => false,
        }
    }
}

/// Registry misconfiguration and engine setup errors.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The provider's config is malformed.
    #[error("invalid provider config: {reason}\n  Suggestion: {suggestion}")]
    InvalidProvider {
        /// What is wrong.
        reason: String,
        /// How to fix it.
        suggestion: String,
    },

    /// A provider with this id is already registered.
    #[error(
        "provider '{id}' is already registered\n  Suggestion: Unregister it first or pick a unique id"
    )]
    DuplicateProvider {
        /// Provider id.
        id: String,
    },

    /// No provider with this id is registered.
    #[error("unknown provider '{id}'\n  Suggestion: Run `mediahub providers` to list registered ids")]
    UnknownProvider {
        /// Provider id.
        id: String,
    },

    /// Nothing is registered or everything is disabled.
    #[error(
        "no providers are enabled\n  Suggestion: Enable at least one provider or check the disabled_providers setting"
    )]
    NoProvidersEnabled,

    /// The shared HTTP client could not be built.
    #[error("could not set up the engine: {0}")]
    Setup(#[from] FetchError),
}

impl ManagerError {
    /// Creates an `InvalidProvider` error.
    #[must_use]
    pub fn invalid_provider(reason: impl Into<String>) -> Self {
        Self::InvalidProvider {
            reason: reason.into(),
            suggestion: "Give the provider a non-empty id and display name".to_string(),
        }
    }

    /// Creates a `DuplicateProvider` error.
    #[must_use]
    pub fn duplicate(id: &str) -> Self {
        Self::DuplicateProvider { id: id.to_string() }
    }

    /// Creates an `UnknownProvider` error.
    #[must_use]
    pub fn unknown(id: &str) -> Self {
        Self::UnknownProvider { id: id.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_error_messages_carry_suggestions() {
        for error in [
            ManagerError::invalid_provider("empty id"),
            ManagerError::duplicate("vega"),
            ManagerError::unknown("nope"),
            ManagerError::NoProvidersEnabled,
        ] {
            assert!(error.to_string().contains("Suggestion"), "{error}");
        }
        assert!(ManagerError::unknown("nope").to_string().contains("nope"));
    }

    #[test]
    fn test_provider_error_cancellation_detection() {
        let fetch = FetchError::cancelled("https://a.example");
        assert!(ProviderError::from(fetch).is_cancelled());
        let meta = MetadataError::Fetch(FetchError::cancelled("https://a.example"));
        assert!(ProviderError::from(meta).is_cancelled());
        assert!(!ProviderError::unsupported("p", "search").is_cancelled());
    }

    #[test]
    fn test_unsupported_message() {
        let error = ProviderError::unsupported("vidsrc", "metadata");
        assert!(error.is_unsupported());
        let msg = error.to_string();
        assert!(msg.contains("vidsrc"));
        assert!(msg.contains("metadata"));
        assert!(!ProviderError::base_url_unavailable("vega").is_unsupported());
    }
}
