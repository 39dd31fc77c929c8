use thiserror::Error;

/// Outcome taxonomy for every backend-facing operation. Each variant maps to
/// exactly one HTTP response shape at the server boundary; nothing here is
/// retried internally.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required server-held credential is absent. Raised before any
    /// network call is attempted.
    #[error("misconfigured: {0}")]
    Misconfigured(String),
    /// The caller's input is missing or invalid.
    #[error("bad request: {0}")]
    ClientInput(String),
    /// The backend confirmed the document does not exist.
    #[error("not found")]
    NotFound,
    /// The backend was reachable but answered with a non-success status
    /// (revision mismatch, validation failure, rate limit, ...).
    #[error("upstream error ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Upstream { status: u16, detail: Option<String> },
    /// Transport failure or timeout before a backend status was obtained.
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
}

impl ServiceError {
    /// Machine-checkable discriminator carried in every error response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Misconfigured(_) => "misconfigured",
            Self::ClientInput(_) => "bad_request",
            Self::NotFound => "not_found",
            Self::Upstream { .. } => "upstream_error",
            Self::Unreachable(_) => "unreachable",
        }
    }

    pub fn misconfigured(what: &str) -> Self {
        Self::Misconfigured(format!("{what} not configured"))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Unreachable("timed out waiting for backend".into())
        } else {
            Self::Unreachable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ServiceError::NotFound.code(), "not_found");
        assert_eq!(
            ServiceError::Upstream { status: 409, detail: None }.code(),
            "upstream_error"
        );
        assert_eq!(ServiceError::misconfigured("GITHUB_TOKEN").code(), "misconfigured");
    }

    #[test]
    fn upstream_display_includes_status_and_detail() {
        let e = ServiceError::Upstream { status: 422, detail: Some("sha mismatch".into()) };
        let msg = e.to_string();
        assert!(msg.contains("422"));
        assert!(msg.contains("sha mismatch"));
    }
}
