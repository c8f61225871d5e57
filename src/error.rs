//! Application error types.
//!
//! These errors are serializable so they can be handed to the UI inside a
//! response envelope, and they carry enough context (status code, endpoint)
//! to tell configuration problems, transport failures and API rejections apart.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors returned by services and message handlers.
///
/// All variants serialize to a structured JSON object for frontend consumption.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// GitLab settings are missing or invalid; no API call is attempted.
    #[error("Invalid GitLab configuration: {message}")]
    Configuration {
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },

    /// GitLab API request failed with a non-success status.
    #[error("GitLab API error: {message}")]
    GitLabApi {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        /// The `error` field of the GitLab error body, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },

    /// Network request failed before a response was received.
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Whether the failure was a timeout or connect error.
        #[serde(skip)]
        transient: bool,
    },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Local file or process operation failed.
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    /// Create a configuration error listing every failed validation rule.
    pub fn configuration_with_errors(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            errors,
        }
    }

    /// Create a GitLab API error.
    pub fn gitlab_api(message: impl Into<String>) -> Self {
        Self::GitLabApi {
            message: message.into(),
            status_code: None,
            endpoint: None,
            error_code: None,
        }
    }

    /// Create a GitLab API error with status code and endpoint.
    pub fn gitlab_api_full(
        message: impl Into<String>,
        status_code: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::GitLabApi {
            message: message.into(),
            status_code: Some(status_code),
            endpoint: Some(endpoint.into()),
            error_code: None,
        }
    }

    /// Attach the GitLab `error` code to an API error. Other variants are unchanged.
    pub fn with_error_code(mut self, code: Option<String>) -> Self {
        if let Self::GitLabApi { error_code, .. } = &mut self {
            *error_code = code;
        }
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            transient: false,
        }
    }

    /// Create a network error for a timeout or failed connection.
    pub fn network_transient(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            transient: true,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an IO error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the same request later could succeed.
    ///
    /// Timeouts, refused connections and 5xx/429 responses are transient;
    /// everything else is a terminal answer.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { transient, .. } => *transient,
            Self::GitLabApi {
                status_code: Some(code),
                ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// HTTP status code of an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::GitLabApi { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Check if GitLab answered that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

// Conversions from common error types

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_transient("Request timed out")
        } else if err.is_connect() {
            Self::network_transient("Failed to connect to server")
        } else if err.is_status() {
            Self::gitlab_api(format!("HTTP error: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<notify::Error> for AppError {
    fn from(err: notify::Error) -> Self {
        Self::io(format!("File watcher error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = AppError::configuration("token is missing");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"Configuration\""));
        assert!(json.contains("token is missing"));
    }

    #[test]
    fn test_configuration_errors_serialized() {
        let err = AppError::configuration_with_errors(
            "GitLab access token must not be empty",
            vec!["GitLab access token must not be empty".to_string()],
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["details"]["errors"][0], "GitLab access token must not be empty");

        let json = serde_json::to_string(&AppError::configuration("missing")).unwrap();
        assert!(!json.contains("errors"));
    }

    #[test]
    fn test_gitlab_api_error_full() {
        let err = AppError::gitlab_api_full("Branch already exists", 400, "/projects/1/repository/branches")
            .with_error_code(Some("invalid_request".to_string()));
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"status_code\":400"));
        assert!(json.contains("/projects/1/repository/branches"));
        assert!(json.contains("\"error_code\":\"invalid_request\""));
    }

    #[test]
    fn test_optional_fields_not_serialized() {
        let err = AppError::gitlab_api("boom");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("status_code"));
        assert!(!json.contains("error_code"));

        let err = AppError::network_transient("Request timed out");
        let json = serde_json::to_string(&err).unwrap();
        assert!(!json.contains("transient"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(AppError::network_transient("timeout").is_transient());
        assert!(!AppError::network("dns").is_transient());
        assert!(AppError::gitlab_api_full("oops", 502, "/x").is_transient());
        assert!(AppError::gitlab_api_full("slow down", 429, "/x").is_transient());
        assert!(!AppError::gitlab_api_full("nope", 403, "/x").is_transient());
        assert!(!AppError::configuration("bad").is_transient());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(AppError::gitlab_api_full("404 Project Not Found", 404, "/projects/x").is_not_found());
        assert!(!AppError::gitlab_api_full("denied", 403, "/projects/x").is_not_found());
        assert!(!AppError::network("dns").is_not_found());
    }

    #[test]
    fn test_display_impl() {
        let err = AppError::invalid_input_field("at least one commit is required", "commits");
        assert_eq!(
            format!("{}", err),
            "Invalid input: at least one commit is required"
        );
    }
}
