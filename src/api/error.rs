use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Fallback description when an error body is absent or unparseable
const DEFAULT_DESCRIPTION: &str = "Request failed";

/// Maximum length for error descriptions surfaced to callers
const MAX_DESCRIPTION_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Request could not be sent or completed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 401/403 response; the stored token, if any, has been invalidated
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Any other non-2xx status
    #[error("Request rejected ({status}): {description}")]
    RequestRejected {
        status: StatusCode,
        description: String,
    },

    /// Success status but the body did not match the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Structured error body the server sends with non-2xx statuses.
/// `description` is preferred; some older handlers use `error`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiError {
    /// Build the error for a non-2xx response from its status and raw body.
    ///
    /// 401 and 403 map to `AuthenticationFailed`; everything else maps to
    /// `RequestRejected`. An unparseable body falls back to a generic
    /// description rather than failing.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let description = description_from_body(body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ApiError::AuthenticationFailed(description)
            }
            _ => ApiError::RequestRejected {
                status,
                description,
            },
        }
    }
}

/// Extract a human-readable description from an error response body.
///
/// Never fails: a body that is not valid JSON, or carries neither field,
/// yields the default description.
pub(crate) fn description_from_body(body: &str) -> String {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let description = parsed
        .and_then(|b| b.description.or(b.error))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
    truncate(description)
}

fn truncate(description: String) -> String {
    if description.len() <= MAX_DESCRIPTION_LENGTH {
        description
    } else {
        let mut cut = MAX_DESCRIPTION_LENGTH;
        while !description.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &description[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_description_over_error_field() {
        let body = r#"{"description": "Invalid credentials", "error": "nope"}"#;
        assert_eq!(description_from_body(body), "Invalid credentials");
    }

    #[test]
    fn falls_back_to_error_field() {
        assert_eq!(
            description_from_body(r#"{"error": "boom"}"#),
            "boom"
        );
    }

    #[test]
    fn malformed_body_yields_default() {
        assert_eq!(description_from_body("<html>502</html>"), DEFAULT_DESCRIPTION);
        assert_eq!(description_from_body(""), DEFAULT_DESCRIPTION);
        assert_eq!(description_from_body("{}"), DEFAULT_DESCRIPTION);
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, ""),
            ApiError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::RequestRejected { .. }
        ));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let body = format!(r#"{{"description": "{}"}}"#, "x".repeat(2000));
        let description = description_from_body(&body);
        assert!(description.len() <= MAX_DESCRIPTION_LENGTH + 3);
        assert!(description.ends_with("..."));
    }
}
