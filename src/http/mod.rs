//! Shared HTTP fetch layer.
//!
//! Every component that talks to an upstream host goes through
//! [`FetchClient`]: browser-mimicking headers, retry-with-backoff for
//! transient failures, an optional short-TTL GET cache, and prompt abort
//! when the caller's [`RequestContext`](crate::RequestContext) is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use mediahub_core::RequestContext;
//! use mediahub_core::http::FetchClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FetchClient::new()?;
//! let html = client
//!     .get_text("https://example.com/", &RequestContext::new())
//!     .await?;
//! println!("{} bytes", html.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod retry;

pub use client::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
    FetchClient, FetchSettings, FetchedPage,
};
pub use error::{FetchError, redact_url};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after,
};
