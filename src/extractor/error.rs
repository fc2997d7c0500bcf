//! Error types for stream extraction.

use thiserror::Error;

use crate::http::{FetchError, redact_url};

/// Errors that abort one extraction path.
///
/// Callers treat these as "no streams from this path"; they never fail an
/// aggregate operation.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A fetch in the chain failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A token-exchange endpoint answered with a non-success status.
    #[error("token exchange rejected at {url}: {reason}")]
    Rejected {
        /// Endpoint URL.
        url: String,
        /// What the endpoint reported.
        reason: String,
    },

    /// A response was missing an expected field or had the wrong shape.
    #[error("unexpected response from {url}: {reason}")]
    Malformed {
        /// Response URL.
        url: String,
        /// What was missing.
        reason: String,
    },
}

impl ExtractError {
    /// Creates a `Rejected` error.
    #[must_use]
    pub fn rejected(url: &str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            url: redact_url(url),
            reason: reason.into(),
        }
    }

    /// Creates a `Malformed` error.
    #[must_use]
    pub fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: redact_url(url),
            reason: reason.into(),
        }
    }

    /// Returns true when the extraction stopped because the caller cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(error) if error.is_cancelled())
    }
}
