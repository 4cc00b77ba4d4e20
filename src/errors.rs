use thiserror::Error;

/// Typed error hierarchy for veribot.
///
/// Use at module boundaries (channel clients, collaborator services, store,
/// pipeline stages). Internal/leaf functions can continue using
/// `anyhow::Result` — the `Internal` variant allows seamless conversion via
/// the `?` operator.
///
/// The variants map directly onto queue behavior: `Validation` is acked and
/// dropped, `Transient` escapes un-acked so the queue redelivers (up to the
/// retry ceiling), `StateConflict` is a lost compare-and-swap race and is
/// swallowed, `Config` aborts startup.
#[derive(Debug, Error)]
pub enum VeribotError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("transient error from {service}: {message}")]
    Transient { service: String, message: String },

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using `VeribotError`.
pub type VeribotResult<T> = std::result::Result<T, VeribotError>;

impl VeribotError {
    pub fn transient(service: impl Into<String>, message: impl std::fmt::Display) -> Self {
        VeribotError::Transient {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Whether redelivery may succeed. Network and timeout failures qualify;
    /// malformed input and lost races never do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VeribotError::Transient { .. } | VeribotError::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = VeribotError::Validation("unknown payload shape".into());
        assert_eq!(err.to_string(), "validation error: unknown payload shape");
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_error_retryable() {
        let err = VeribotError::transient("translator", "connect timeout");
        assert_eq!(
            err.to_string(),
            "transient error from translator: connect timeout"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn state_conflict_not_retryable() {
        let err = VeribotError::StateConflict("record already resolved".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn config_error_not_retryable() {
        let err = VeribotError::Config("missing channel token".into());
        assert!(!err.is_retryable());
    }

    #[test]
    fn internal_from_anyhow() {
        let err: VeribotError = anyhow::anyhow!("something broke").into();
        assert!(matches!(err, VeribotError::Internal(_)));
        assert!(err.is_retryable());
    }
}
