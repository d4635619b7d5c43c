//! Error types for registration, reversal and request handling.
//!
//! Registration and reversal problems are ordinary `thiserror` enums reported
//! to the caller. Handler failures travel as `eyre::Report`; the one structured
//! shape the centralized error handler understands is [`HttpError`].
use std::error::Error as StdError;

use http::StatusCode;
use thiserror::Error;

/// Boxed error stored as the internal cause of an [`HttpError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias for route registration.
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors raised synchronously while registering a route.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RouteError {
    #[error("Unknown HTTP method '{method}'")]
    UnknownMethod { method: String },

    #[error("Duplicate parameter name '{name}' in route '{path}'")]
    DuplicateParam { path: String, name: String },

    #[error("Wildcard '*' must be the last character of route '{path}'")]
    WildcardNotLast { path: String },

    #[error("Empty parameter name at byte {position} of route '{path}'")]
    EmptyParamName { path: String, position: usize },

    #[error("Conflicting capture '{name}' at byte {position} of route '{path}'")]
    ConflictingCapture {
        path: String,
        name: String,
        position: usize,
    },
}

/// Errors raised while generating a URL from a route name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReverseError {
    #[error("No route named '{name}'")]
    UnknownRoute { name: String },

    #[error("Route '{name}' needs {expected} parameter(s), got {given}")]
    MissingParams {
        name: String,
        expected: usize,
        given: usize,
    },

    #[error("Route '{name}' takes {expected} parameter(s), got {given}")]
    TooManyParams {
        name: String,
        expected: usize,
        given: usize,
    },
}

/// A handler error that carries the HTTP status and message to render.
///
/// Any other error reaching the centralized error handler is rendered as a
/// generic `500`.
#[derive(Debug, Error)]
#[error("code={}, message={}{}", .code.as_u16(), .message, internal_suffix(.internal))]
pub struct HttpError {
    pub code: StatusCode,
    pub message: String,
    #[source]
    pub internal: Option<BoxError>,
}

impl HttpError {
    /// Error with the canonical reason phrase as message.
    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            message: code.canonical_reason().unwrap_or("Unknown").to_string(),
            internal: None,
        }
    }

    pub fn with_message(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            internal: None,
        }
    }

    /// Attach the underlying cause. It is only exposed in debug mode.
    pub fn with_internal(mut self, err: impl Into<BoxError>) -> Self {
        self.internal = Some(err.into());
        self
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn too_many_requests() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn service_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE)
    }

    /// The innermost structured error: a nested `HttpError` stored as the
    /// internal cause takes precedence over its wrapper.
    pub fn resolve(&self) -> &HttpError {
        match self
            .internal
            .as_deref()
            .and_then(|inner| inner.downcast_ref::<HttpError>())
        {
            Some(inner) => inner.resolve(),
            None => self,
        }
    }
}

fn internal_suffix(internal: &Option<BoxError>) -> String {
    internal
        .as_ref()
        .map(|err| format!(", internal={err}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = HttpError::not_found();
        assert_eq!(err.to_string(), "code=404, message=Not Found");

        let err = HttpError::with_message(StatusCode::BAD_REQUEST, "missing id")
            .with_internal(std::io::Error::other("boom"));
        assert_eq!(
            err.to_string(),
            "code=400, message=missing id, internal=boom"
        );
    }

    #[test]
    fn test_resolve_prefers_nested_http_error() {
        let inner = HttpError::with_message(StatusCode::CONFLICT, "already exists");
        let outer = HttpError::internal().with_internal(inner);
        let resolved = outer.resolve();
        assert_eq!(resolved.code, StatusCode::CONFLICT);
        assert_eq!(resolved.message, "already exists");
    }

    #[test]
    fn test_source_exposes_internal() {
        let err = HttpError::internal().with_internal(std::io::Error::other("disk"));
        assert_eq!(err.source().unwrap().to_string(), "disk");
        assert!(HttpError::not_found().source().is_none());
    }

    #[test]
    fn test_report_chain_walks_into_internal() {
        let report = eyre::Report::new(
            HttpError::with_message(StatusCode::BAD_GATEWAY, "upstream failed")
                .with_internal(std::io::Error::other("connection reset")),
        );
        let chain: Vec<String> = report.chain().map(|err| err.to_string()).collect();
        assert_eq!(
            chain,
            [
                "code=502, message=upstream failed, internal=connection reset",
                "connection reset",
            ]
        );
    }
}
