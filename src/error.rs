//! Error codes shared by every subsystem.
//!
//! DESIGN
//! ======
//! Each subsystem owns a `thiserror` enum. The HTTP layer never inspects
//! variants directly; it asks for a grepable code and a retryable flag and
//! renders both into the same JSON body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Grepable error code and retryable flag for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl ErrorBody {
    /// A plain message without an error code.
    pub fn message(error: impl Into<String>) -> Self {
        Self { error: error.into(), code: None, retryable: false }
    }

    pub fn from_code(err: &impl ErrorCode) -> Self {
        Self { error: err.to_string(), code: Some(err.error_code()), retryable: err.retryable() }
    }
}

/// Build a JSON error response with the given status.
pub fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}
