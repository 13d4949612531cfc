use thiserror::Error;

/// Failure of a single API request.
///
/// Clone so cache snapshots can hand the same error to every subscriber.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0} - check your connection and try again")]
    Network(String),

    /// The server answered with `success: false`.
    #[error("{0}")]
    Rejected(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode request body: {0}")]
    Encode(String),

    /// The request succeeded but the session could not be saved locally.
    #[error("Failed to save session: {0}")]
    Session(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Used when neither the envelope nor the body carries a message
const GENERIC_MESSAGE: &str = "Something went wrong";

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Map a non-2xx status to an error, preferring the server-supplied message.
    pub fn from_status(status: u16, server_message: Option<&str>, body: &str) -> Self {
        let message = match server_message {
            Some(m) if !m.trim().is_empty() => m.to_string(),
            _ if !body.trim().is_empty() => Self::truncate_body(body),
            _ => GENERIC_MESSAGE.to_string(),
        };
        match status {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::Server { status, message },
            _ => ApiError::Rejected(message),
        }
    }

    /// Whether the caller should drop the session and ask for a new login.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("request timed out".to_string())
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_prefers_server_message() {
        let err = ApiError::from_status(400, Some("Siz allaqachon ariza topshirgansiz"), "{}");
        assert_eq!(err, ApiError::Rejected("Siz allaqachon ariza topshirgansiz".to_string()));
    }

    #[test]
    fn test_from_status_falls_back_to_body_then_generic() {
        assert_eq!(
            ApiError::from_status(503, None, "upstream down"),
            ApiError::Server { status: 503, message: "upstream down".to_string() }
        );
        assert_eq!(
            ApiError::from_status(404, Some("  "), ""),
            ApiError::NotFound(GENERIC_MESSAGE.to_string())
        );
        assert_eq!(ApiError::from_status(429, None, ""), ApiError::RateLimited);
    }

    #[test]
    fn test_unauthorized_is_auth_failure() {
        assert!(ApiError::from_status(401, Some("Token expired"), "").is_auth_failure());
        assert!(!ApiError::Network("offline".into()).is_auth_failure());
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(600);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(500)));
        assert!(truncated.ends_with("(truncated, 600 total bytes)"));
        assert_eq!(ApiError::truncate_body("short"), "short");
    }
}
