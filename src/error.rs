use thiserror::Error;

/// Failures surfaced by the monitoring core and its service clients.
///
/// Per-tick failures are logged and swallowed by the capture loop; only
/// lifecycle calls (`start`/`stop`) and direct service lookups hand these
/// back to the caller.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Camera denied or no device available.
    #[error("camera unavailable: {0}")]
    MediaAccess(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service responded {status}: {message}")]
    Service { status: u16, message: String },

    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not authorized: {0}")]
    Auth(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl MonitorError {
    /// Whether a retry affordance makes sense for this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MonitorError::Network(_) | MonitorError::Service { .. })
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Network(err.to_string())
    }
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        MonitorError::Storage(format!("{err:#}"))
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(MonitorError::Network("reset".into()).is_retryable());
        assert!(MonitorError::Service {
            status: 502,
            message: "bad gateway".into()
        }
        .is_retryable());
        assert!(!MonitorError::MediaAccess("denied".into()).is_retryable());
        assert!(!MonitorError::NotFound("class".into()).is_retryable());
    }

    #[test]
    fn service_error_renders_status() {
        let err = MonitorError::Service {
            status: 400,
            message: "classId is required".into(),
        };
        assert_eq!(err.to_string(), "service responded 400: classId is required");
    }
}
