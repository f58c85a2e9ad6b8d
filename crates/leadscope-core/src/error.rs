use thiserror::Error;

/// Failure of the fetch boundary. Builders never produce errors; this is the
/// only error that reaches callers.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode leads: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether another attempt may succeed: server errors and rate limiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(e) => !e.is_builder() && !e.is_decode(),
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryability() {
        let status = |status| FetchError::Status {
            status,
            body: String::new(),
        };
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!FetchError::Config("missing url".into()).is_retryable());
    }

    #[test]
    fn test_display_messages() {
        let err = FetchError::Status {
            status: 401,
            body: "Invalid API key".into(),
        };
        assert_eq!(err.to_string(), "backend returned HTTP 401: Invalid API key");

        let decode = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        assert!(FetchError::from(decode)
            .to_string()
            .starts_with("could not decode leads"));
    }
}
