use thiserror::Error;

/// Error taxonomy for the optimization loop.
///
/// Guardrail rejections are deliberately NOT represented here. A rejected
/// opportunity is an expected business outcome carried as a
/// [`crate::guardrails::Verdict`], counted under `skipped_by_guardrail`.
#[derive(Debug, Error)]
pub enum CycleError {
    /// Fatal. Aborts the run before any side effect.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Recovered. The cycle proceeds with an empty or stale dataset and a
    /// flagged reason. The field is `signal`, not `source`, so thiserror
    /// does not treat it as the error chain's source.
    #[error("signal source '{signal}' unavailable: {reason}")]
    SignalUnavailable { signal: String, reason: String },

    /// Per-item. Recorded on the item, remaining items still attempted.
    #[error("execution of {item} failed: {reason}")]
    ExecutionFailure { item: String, reason: String },

    /// Anything escaping the above, caught at the controller. Triggers a
    /// longer backoff sleep; the loop continues.
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl CycleError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn signal_unavailable(signal: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SignalUnavailable {
            signal: signal.into(),
            reason: reason.into(),
        }
    }

    /// True when the error must abort before side effects.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_is_fatal() {
        let err = CycleError::configuration("bad MIN_MARGIN_PERCENT");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("MIN_MARGIN_PERCENT"));
    }

    #[test]
    fn test_signal_unavailable_is_recoverable() {
        let err = CycleError::signal_unavailable("competitor", "crawl timeout");
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("competitor"));
    }

    #[test]
    fn test_signal_unavailable_display_names_the_signal() {
        let err = CycleError::SignalUnavailable {
            signal: "sales".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "signal source 'sales' unavailable: connection refused"
        );
        // No underlying error in the chain; the signal name is plain data
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_fatal_wraps_anyhow() {
        let err: CycleError = anyhow::anyhow!("collaborator hung").into();
        assert!(err.is_fatal());
    }
}
