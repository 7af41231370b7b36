use thiserror::Error;

/// Failures talking to the backend API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {message}")]
    Network { message: String },
    #[error("request rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("conflict: {message}")]
    Conflict { message: String },
    #[error("invalid response from backend: {message}")]
    InvalidResponse { message: String },
}

impl ApiError {
    /// Classify an HTTP error response
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_error_message(body);
        if status == 409 {
            ApiError::Conflict { message }
        } else {
            ApiError::Rejected { status, message }
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }

    /// Operator-facing suggestions, printed by the CLI under the error line
    pub fn troubleshooting(&self) -> Vec<&'static str> {
        match self {
            ApiError::Network { .. } => vec![
                "Check that the backend URL in provisioner.toml is reachable",
                "Check proxy settings (HTTPS_PROXY) if running behind a firewall",
            ],
            ApiError::Rejected { status: 401, .. } | ApiError::Rejected { status: 403, .. } => vec![
                "The backend refused the request: check PROVISIONER_BACKEND__API_TOKEN",
                "The provider credentials may lack the required scope",
            ],
            ApiError::Rejected { status: 404, .. } => vec![
                "Workspace or integration not found: check the ids passed on the command line",
            ],
            ApiError::Rejected { .. } => vec![
                "The provider rejected the request: check credentials and selected target",
            ],
            ApiError::Conflict { .. } => vec![
                "An integration for this target already exists: run `provisioner list`",
            ],
            ApiError::InvalidResponse { .. } => vec![
                "The backend answered with an unexpected body: check backend and client versions",
            ],
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::InvalidResponse {
                message: err.to_string(),
            };
        }
        match err.status() {
            Some(status) => ApiError::from_status(status.as_u16(), &err.to_string()),
            None => ApiError::Network {
                message: err.to_string(),
            },
        }
    }
}

/// Pull a human-readable message out of a structured or plain-text error body
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message", "detail"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no details provided".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_error_body() {
        let err = ApiError::from_status(400, r#"{"error": "bad api key"}"#);
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 400,
                message: "bad api key".to_string()
            }
        );
    }

    #[test]
    fn test_conflict_is_classified() {
        let err = ApiError::from_status(409, "duplicate");
        assert!(matches!(err, ApiError::Conflict { .. }));
        assert!(!err.troubleshooting().is_empty());
    }

    #[test]
    fn test_empty_body() {
        let err = ApiError::from_status(500, "  ");
        assert_eq!(err.to_string(), "request rejected with HTTP 500: no details provided");
    }
}
