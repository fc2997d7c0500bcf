//! Stream extractors: turn an opaque landing-page link into playable streams.
//!
//! # Architecture
//!
//! - [`StreamExtractor`] - Async trait every extractor implements
//! - [`GenericExtractor`] - `<video>`/iframe/inline-script scan of one page
//! - [`RedirectChainExtractor`] - landing page -> cloud redirector -> classified download links
//! - [`TokenExchangeExtractor`] - two-step token API
//! - [`embed_streams`] - template substitution, no network
//!
//! An extractor returns `Ok(vec![])` when a page carries nothing it
//! recognizes; errors are reserved for fetch failures on the chain itself.

mod embed;
mod error;
mod generic;
mod redirect_chain;
mod token_exchange;
pub(crate) mod utils;

pub use embed::{ContentRef, EmbedTemplate, embed_streams};
pub use error::ExtractError;
pub use generic::{GenericExtractor, scan_page};
pub use redirect_chain::{
    CandidateLink, LINK_RULES, LinkLabel, LinkResolution, LinkRule, RedirectChainExtractor,
    api_download_url, classify_link, collect_candidates, find_redirect_target,
};
pub use token_exchange::{TokenEndpoints, TokenExchangeExtractor};

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::provider::Stream;

/// Trait implemented by every network-backed extractor.
///
/// Uses `async_trait` so providers can hold `Arc<dyn StreamExtractor>`.
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    /// Short name used in logs and on the command line.
    fn name(&self) -> &'static str;

    /// Resolves `url` into zero or more streams.
    async fn extract(&self, url: &str, ctx: &RequestContext) -> Result<Vec<Stream>, ExtractError>;
}
