//! Error types for netfw.
//!
//! This module defines the error types used throughout netfw, covering
//! manifest loading, validation, the remote firewall API, and state handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::validate::ValidationIssue;

/// Result type alias for netfw operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Service error code returned when a rule group does not exist.
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
/// Service error code returned when an update token is stale.
pub const INVALID_TOKEN: &str = "InvalidTokenException";
/// Service error code returned when the caller is throttled.
pub const THROTTLING: &str = "ThrottlingException";
/// Service error code for internal failures.
pub const INTERNAL_SERVER_ERROR: &str = "InternalServerError";
/// Service error code for malformed requests.
pub const INVALID_REQUEST: &str = "InvalidRequestException";

/// The main error type for netfw.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Manifest Errors
    // ========================================================================
    /// Error parsing a manifest file.
    #[error("Failed to parse manifest '{path}': {message}")]
    ManifestParse {
        /// Path to the manifest file
        path: PathBuf,
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Template rendering error.
    #[error("Template rendering failed for '{template}': {message}")]
    TemplateRender {
        /// Template name or path
        template: String,
        /// Error message
        message: String,
    },

    /// A rule group declaration violates schema constraints.
    #[error("Rule group '{resource}' is invalid: {}", format_issues(.issues))]
    Validation {
        /// Resource name or label
        resource: String,
        /// Every violation found
        issues: Vec<ValidationIssue>,
    },

    // ========================================================================
    // Remote API Errors
    // ========================================================================
    /// The firewall service returned an error.
    #[error("{operation} failed ({code}): {message}")]
    Api {
        /// API operation name
        operation: String,
        /// Service error code
        code: String,
        /// Error message
        message: String,
    },

    /// The rule group does not exist remotely.
    #[error("Rule group not found: {0}")]
    NotFound(String),

    /// The update token is stale; the rule group changed since it was read.
    #[error("Update token for '{arn}' is stale")]
    InvalidToken {
        /// Rule group ARN
        arn: String,
    },

    /// Malformed rule group ARN.
    #[error("Invalid rule group ARN: '{0}'")]
    InvalidArn(String),

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Waiting for a remote state transition timed out.
    #[error("Timed out after {timeout_secs}s waiting for {operation} of '{arn}'")]
    Timeout {
        /// What was awaited
        operation: String,
        /// Rule group ARN
        arn: String,
        /// Timeout in seconds
        timeout_secs: u64,
    },

    /// One or more rule groups could not be swept.
    #[error("Failed to sweep {} rule group(s): {}", .failures.len(), format_failures(.failures))]
    Sweep {
        /// ARN and error message for each failure
        failures: Vec<(String, String)>,
    },

    // ========================================================================
    // State Errors
    // ========================================================================
    /// Resource address not present in state.
    #[error("Resource '{0}' not found in state")]
    NotInState(String),

    /// Resource address already managed.
    #[error("Resource '{0}' already exists in state")]
    AlreadyInState(String),

    /// State file problem.
    #[error("State error: {0}")]
    State(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // IO / Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(arn, msg)| format!("{arn}: {msg}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Creates a new manifest parse error.
    pub fn manifest_parse(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ManifestParse {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a new API error.
    pub fn api(
        operation: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Api {
            operation: operation.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a new template render error.
    pub fn template_render(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateRender {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Returns the service error code, if this error came from the service.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Api { code, .. } => Some(code),
            Error::NotFound(_) => Some(RESOURCE_NOT_FOUND),
            Error::InvalidToken { .. } => Some(INVALID_TOKEN),
            _ => None,
        }
    }

    /// Returns true if the rule group does not exist remotely.
    pub fn is_not_found(&self) -> bool {
        self.code() == Some(RESOURCE_NOT_FOUND)
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Api { code, .. } => matches!(
                code.as_str(),
                THROTTLING | INTERNAL_SERVER_ERROR | "ServiceUnavailableException"
            ),
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(Error::NotFound("arn".into()).is_not_found());
        assert!(Error::api("DescribeRuleGroup", RESOURCE_NOT_FOUND, "gone").is_not_found());
        assert!(!Error::api("DescribeRuleGroup", INVALID_REQUEST, "bad").is_not_found());
    }

    #[test]
    fn test_transient_detection() {
        assert!(Error::api("ListRuleGroups", THROTTLING, "slow down").is_transient());
        assert!(Error::api("ListRuleGroups", INTERNAL_SERVER_ERROR, "oops").is_transient());
        assert!(!Error::InvalidToken { arn: "a".into() }.is_transient());
    }

    #[test]
    fn test_validation_message_lists_issues() {
        let err = Error::Validation {
            resource: "test".into(),
            issues: vec![
                ValidationIssue::new("capacity", "must be between 1 and 30000"),
                ValidationIssue::new("name", "must not be empty"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("capacity: must be between 1 and 30000"));
        assert!(msg.contains("name: must not be empty"));
    }

    #[test]
    fn test_sweep_message() {
        let err = Error::Sweep {
            failures: vec![("arn:1".into(), "denied".into())],
        };
        assert_eq!(err.to_string(), "Failed to sweep 1 rule group(s): arn:1: denied");
    }
}
