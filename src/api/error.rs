use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Reauthentication required - token rejected or expired")]
    ReauthRequired,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => FetchError::ReauthRequired,
            404 => FetchError::NotFound(truncated),
            429 => FetchError::RateLimited,
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Whether this failure must abort the whole refresh run. Everything
    /// else is transient: the item is skipped and prior data retained.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, FetchError::ReauthRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_maps_to_reauth() {
        let err = FetchError::from_status(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(err.requires_reauth());
    }

    #[test]
    fn status_500_is_transient() {
        let err = FetchError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(!err.requires_reauth());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let err = FetchError::from_status(reqwest::StatusCode::BAD_GATEWAY, &body);
        let msg = err.to_string();
        assert!(msg.len() < 700);
        assert!(msg.contains("truncated"));
    }
}
