use thiserror::Error;

/// Closed set of failure classes. Retry, skip and abort decisions are made
/// over this set rather than over individual error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Stale element references, elements not yet present, wait timeouts.
    TransientDom,
    /// Throttling or server-side failures reported by a remote API.
    TransientRemote,
    /// Transport failures (connect, timeout, body decode).
    Network,
    /// Bad configuration or input contract; the run cannot start.
    FatalConfig,
    /// Anything else.
    Fatal,
}

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Remote API error (status {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Missing column(s) in input sheet: {}", .0.join(", "))]
    MissingColumn(Vec<String>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl SweepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SweepError::StaleElement(_)
            | SweepError::ElementNotFound(_)
            | SweepError::Timeout(_) => ErrorKind::TransientDom,
            SweepError::Remote { status, .. } => match status {
                408 | 429 | 500..=599 => ErrorKind::TransientRemote,
                _ => ErrorKind::Fatal,
            },
            SweepError::HttpError(e) => match e.status() {
                Some(status) if status.as_u16() == 429 || status.is_server_error() => {
                    ErrorKind::TransientRemote
                }
                Some(_) => ErrorKind::Fatal,
                None => ErrorKind::Network,
            },
            SweepError::MissingColumn(_) | SweepError::Config(_) | SweepError::InvalidUrl(_) => {
                ErrorKind::FatalConfig
            }
            SweepError::Browser(_) | SweepError::IoError(_) | SweepError::Other(_) => {
                ErrorKind::Fatal
            }
        }
    }

    pub fn is_transient_dom(&self) -> bool {
        self.kind() == ErrorKind::TransientDom
    }

    /// Errors worth another attempt against a remote API.
    pub fn is_retryable_remote(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientRemote | ErrorKind::Network
        )
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dom_errors_are_transient() {
        assert_eq!(
            SweepError::StaleElement("card".into()).kind(),
            ErrorKind::TransientDom
        );
        assert_eq!(
            SweepError::ElementNotFound("h1".into()).kind(),
            ErrorKind::TransientDom
        );
        assert!(SweepError::Timeout("panel".into()).is_transient_dom());
    }

    #[test]
    fn test_remote_status_classification() {
        let throttled = SweepError::Remote {
            status: 429,
            message: "quota".into(),
        };
        let unavailable = SweepError::Remote {
            status: 503,
            message: "backend".into(),
        };
        let forbidden = SweepError::Remote {
            status: 403,
            message: "no access".into(),
        };

        assert!(throttled.is_retryable_remote());
        assert!(unavailable.is_retryable_remote());
        assert!(!forbidden.is_retryable_remote());
        assert_eq!(forbidden.kind(), ErrorKind::Fatal);
    }

    #[test]
    fn test_missing_column_is_fatal_config() {
        let err = SweepError::MissingColumn(vec!["business_type".into(), "city_name".into()]);
        assert_eq!(err.kind(), ErrorKind::FatalConfig);
        assert_eq!(
            err.to_string(),
            "Missing column(s) in input sheet: business_type, city_name"
        );
    }
}
