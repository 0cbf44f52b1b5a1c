use thiserror::Error;

/// Failures talking to a third-party data vendor.
///
/// These never reach API callers: clients log them and serve fallback data.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("{provider} is not configured: {detail}")]
    NotConfigured {
        provider: &'static str,
        detail: String,
    },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{provider} rate limited: {message}")]
    RateLimited {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} payload malformed: {detail}")]
    Malformed {
        provider: &'static str,
        detail: String,
    },
}

impl UpstreamError {
    pub fn malformed(provider: &'static str, detail: impl Into<String>) -> Self {
        Self::Malformed {
            provider,
            detail: detail.into(),
        }
    }

    /// Coarse classification used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "not_configured",
            Self::Transport { .. } | Self::Status { .. } | Self::RateLimited { .. } => {
                "upstream_unavailable"
            }
            Self::Malformed { .. } => "malformed_payload",
        }
    }

    /// Transport errors and 5xx responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        let server = UpstreamError::Status {
            provider: "alpha_vantage",
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        let client = UpstreamError::Status {
            provider: "alpha_vantage",
            status: reqwest::StatusCode::FORBIDDEN,
            body: String::new(),
        };
        let limited = UpstreamError::RateLimited {
            provider: "alpha_vantage",
            message: "slow down".to_string(),
        };

        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!limited.is_retryable());
        assert_eq!(limited.kind(), "upstream_unavailable");
        assert_eq!(
            UpstreamError::malformed("alpha_vantage", "missing price").kind(),
            "malformed_payload"
        );
    }
}
