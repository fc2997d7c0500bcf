//! Per-provider outcomes of aggregate operations.

use std::time::Duration;

use super::error::ProviderError;

/// Why one provider contributed nothing.
#[derive(Debug)]
pub enum FailureReason {
    /// The provider returned an error.
    Error(ProviderError),
    /// The provider exceeded its call timeout.
    TimedOut(Duration),
    /// The caller cancelled before the provider finished.
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(error) => write!(f, "{error}"),
            Self::TimedOut(limit) => write!(f, "timed out after {}ms", limit.as_millis()),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// One provider's failure inside an aggregate operation.
#[derive(Debug)]
pub struct ProviderFailure {
    /// Provider id.
    pub provider_id: String,
    /// What went wrong.
    pub reason: FailureReason,
}

/// Result of one provider call.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The provider answered.
    Success {
        /// Provider id.
        provider_id: String,
        /// The answer.
        value: T,
    },
    /// The provider contributed nothing.
    Failure(ProviderFailure),
}

impl<T> Outcome<T> {
    /// Provider id of either variant.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        match self {
            Self::Success { provider_id, .. } => provider_id,
            Self::Failure(failure) => &failure.provider_id,
        }
    }

    /// Returns true for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Every outcome of a fan-out, in candidate (priority) order.
#[derive(Debug)]
pub struct FanOutReport<T> {
    /// Successful contributions, in priority order.
    pub successes: Vec<(String, T)>,
    /// Providers that contributed nothing.
    pub failures: Vec<ProviderFailure>,
}

impl<T> Default for FanOutReport<T> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> FanOutReport<T> {
    /// Splits outcomes into successes and failures, keeping their order.
    #[must_use]
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = Outcome<T>>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Success { provider_id, value } => {
                    report.successes.push((provider_id, value));
                }
                Outcome::Failure(failure) => report.failures.push(failure),
            }
        }
        report
    }

    /// Number of providers that were asked.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Ids of providers that timed out.
    #[must_use]
    pub fn timed_out(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter(|f| matches!(f.reason, FailureReason::TimedOut(_)))
            .map(|f| f.provider_id.as_str())
            .collect()
    }
}

impl<T> FanOutReport<Vec<T>> {
    /// Concatenates every successful list in priority order.
    #[must_use]
    pub fn into_flat(self) -> Vec<T> {
        self.successes
            .into_iter()
            .flat_map(|(_, items)| items)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(id: &str, items: Vec<u32>) -> Outcome<Vec<u32>> {
        Outcome::Success {
            provider_id: id.to_string(),
            value: items,
        }
    }

    fn failure(id: &str, reason: FailureReason) -> Outcome<Vec<u32>> {
        Outcome::Failure(ProviderFailure {
            provider_id: id.to_string(),
            reason,
        })
    }

    #[test]
    fn test_report_splits_and_flattens_in_order() {
        let report = FanOutReport::from_outcomes(vec![
            success("a", vec![1, 2]),
            failure("b", FailureReason::Cancelled),
            success("c", vec![3]),
            failure("d", FailureReason::TimedOut(Duration::from_secs(2))),
        ]);
        assert_eq!(report.attempted(), 4);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.timed_out(), vec!["d"]);
        assert_eq!(report.into_flat(), vec![1, 2, 3]);
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = success("a", vec![]);
        assert!(ok.is_success());
        assert_eq!(ok.provider_id(), "a");
        let bad = failure("b", FailureReason::Cancelled);
        assert!(!bad.is_success());
        assert_eq!(bad.provider_id(), "b");
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(
            FailureReason::TimedOut(Duration::from_millis(1500)).to_string(),
            "timed out after 1500ms"
        );
        assert_eq!(FailureReason::Cancelled.to_string(), "cancelled");
    }
}
