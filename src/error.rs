//! Error types for the azinspect application.
//!
//! Uses `thiserror` for library-style errors with automatic `Display` and `Error` implementations.

use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// True for errors that must end the run instead of aborting a single
    /// inspection step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Config(_))
    }
}

/// Authentication-related errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Interactive login failed: {0}")]
    LoginFailed(String),

    #[error("No usable account context after login: {0}")]
    AccountUnavailable(String),
}

/// Errors raised by the provider CLI bridge.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider CLI '{0}' not found on PATH")]
    CliNotFound(String),

    #[error("'{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("'{command}' returned malformed JSON: {message}")]
    Json { command: String, message: String },

    #[error("'{context}' response is missing field '{field}'")]
    MissingField { context: String, field: String },

    #[error("unparsable expiry timestamp '{0}'")]
    BadTimestamp(String),

    #[error("'{context}' returned an unexpected shape: {message}")]
    UnexpectedShape { context: String, message: String },
}

impl ProviderError {
    pub fn missing_field(context: &str, field: &str) -> Self {
        Self::MissingField {
            context: context.to_string(),
            field: field.to_string(),
        }
    }

    pub fn unexpected_shape(context: &str, message: impl ToString) -> Self {
        Self::UnexpectedShape {
            context: context.to_string(),
            message: message.to_string(),
        }
    }

    /// True when stderr indicates the CLI has no valid session and a login
    /// is required before retrying.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::CommandFailed { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                stderr.contains("az login")
                    || stderr.contains("aadsts")
                    || stderr.contains("re-authenticate")
                    || stderr.contains("interactive authentication is needed")
                    || stderr.contains("token has expired")
            }
            _ => false,
        }
    }

    /// True when stderr indicates the requested resource does not exist,
    /// as opposed to the call itself failing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::CommandFailed { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                stderr.contains("does not exist")
                    || stderr.contains("resourcenotfound")
                    || stderr.contains("was not found")
                    || stderr.contains("notfound")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> ProviderError {
        ProviderError::CommandFailed {
            command: "account show".into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_auth_error_classification() {
        assert!(failed("ERROR: Please run 'az login' to setup account.").is_auth_error());
        assert!(failed("AADSTS700082: The refresh token has expired").is_auth_error());
        assert!(!failed("ERROR: unrecognized arguments").is_auth_error());
        assert!(!ProviderError::CliNotFound("az".into()).is_auth_error());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(failed(
            "Resource '1234' does not exist or one of its queried reference-property \
             objects are not present."
        )
        .is_not_found());
        assert!(failed("Request_ResourceNotFound").is_not_found());
        assert!(!failed("ERROR: quota exceeded").is_not_found());
    }

    #[test]
    fn test_fatal_errors() {
        assert!(AppError::Auth(AuthError::LoginFailed("denied".into())).is_fatal());
        assert!(AppError::Config("missing resource group".into()).is_fatal());
        assert!(!AppError::Provider(failed("boom")).is_fatal());
    }
}
