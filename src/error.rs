//! Error types shared across the framework.
//!
//! # Responsibilities
//! - Registration errors raised while the app is being built
//! - Per-request errors carrying the status code they map to
//!
//! # Design Decisions
//! - Registration errors are fatal: startup aborts on the first one
//! - Request errors never escape the request cycle; they become responses

use axum::http::StatusCode;
use thiserror::Error;

/// Raised while routes, plugins or patterns are registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("pattern `{pattern}`: `:` must be followed by a parameter name")]
    EmptyParamName { pattern: String },

    #[error("pattern `{pattern}`: parameter `:{name}` must be followed by `/` or end the pattern")]
    UnterminatedParam { pattern: String, name: String },

    #[error("pattern `{pattern}`: parameter `{name}` is bound more than once")]
    RepeatedParam { pattern: String, name: String },

    #[error("pattern `{pattern}`: a wildcard must be the final segment")]
    InteriorWildcard { pattern: String },

    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute { method: String, pattern: String },

    #[error("pattern `{pattern}`: parameter `:{requested}` conflicts with `:{existing}` registered at the same position")]
    ParamConflict {
        pattern: String,
        existing: String,
        requested: String,
    },

    #[error("pattern `{pattern}`: wildcard `*{requested}` conflicts with `*{existing}` registered at the same position")]
    WildcardConflict {
        pattern: String,
        existing: String,
        requested: String,
    },

    #[error("the plugin name \"{0}\" has been declared")]
    DuplicatePlugin(String),

    #[error("the plugin name \"{0}\" is reserved")]
    ReservedPlugin(String),
}

/// A failure while handling one request.
///
/// Equivalent of `ctx.throw(message, status)`: the status defaults to 500
/// and the message becomes the response body unless an error handler
/// replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for HttpError {
    fn from(message: &str) -> Self {
        Self::internal(message)
    }
}

impl From<String> for HttpError {
    fn from(message: String) -> Self {
        Self::internal(message)
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("Invalid JSON body: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message_defaults_to_500() {
        let err = HttpError::from("boom");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_registration_error_messages() {
        let err = RegistrationError::DuplicateRoute {
            method: "GET".into(),
            pattern: "/users/:id".into(),
        };
        assert_eq!(err.to_string(), "duplicate route: GET /users/:id");

        let err = RegistrationError::ReservedPlugin("path".into());
        assert_eq!(err.to_string(), "the plugin name \"path\" is reserved");
    }
}
