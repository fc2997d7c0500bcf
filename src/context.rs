//! Per-request context threaded from every public entry point down to the
//! innermost fetch.

use tokio_util::sync::CancellationToken;

/// Context passed to providers, extractors and the fetch layer.
///
/// Cloning is cheap; clones share the same cancellation token.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
}

impl RequestContext {
    /// Creates a context with a fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context driven by a caller-owned token.
    #[must_use]
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Returns the underlying cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns true once the caller has cancelled the request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the caller cancels.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Cancels every operation sharing this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
