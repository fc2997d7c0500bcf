//! Mediahub Core Library
//!
//! This library aggregates many independent, unreliable content providers
//! behind one manager and resolves opaque landing-page links into playable
//! streams.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`http`] - Fetch client with browser headers, retry-with-backoff and a response cache
//! - [`base_url`] - TTL-cached resolver for provider root URLs
//! - [`extractor`] - Stream extractors (generic page scan, redirect chains, token exchange, embeds)
//! - [`metadata`] - Metadata source collaborator and a TMDB client
//! - [`provider`] - Provider trait, built-in providers and the aggregating manager
//! - [`config`] - Engine configuration
//! - [`context`] - Per-request cancellation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod base_url;
pub mod config;
pub mod context;
pub mod extractor;
pub mod http;
pub mod metadata;
pub mod provider;
mod user_agent;

// Re-export commonly used types
pub use base_url::{BaseUrlEntry, BaseUrlResolver, DEFAULT_CONFIG_URL};
pub use config::EngineConfig;
pub use context::RequestContext;
pub use extractor::{
    ContentRef, ExtractError, GenericExtractor, RedirectChainExtractor, StreamExtractor,
    TokenExchangeExtractor,
};
pub use http::{FetchClient, FetchError, FetchSettings, RetryPolicy};
pub use metadata::{MetadataError, MetadataSource, TmdbClient};
pub use provider::{
    Capabilities, ContentKind, EpisodeLink, FanOutReport, Info, ManagerError, Post, Provider,
    ProviderConfig, ProviderError, ProviderManager, ProviderStats, Stream, StreamKind,
    build_default_provider_manager,
};
