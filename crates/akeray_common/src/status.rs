//! Status classification and the client-facing error body.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification attached to every normalized error.
///
/// Only one class exists. Every handler failure is reported as a bad
/// request, whatever caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    #[default]
    BadRequest,
}

impl StatusClass {
    /// HTTP status code for this class
    pub const fn code(self) -> u16 {
        match self {
            StatusClass::BadRequest => 400,
        }
    }

    /// Canonical reason phrase
    pub const fn reason(self) -> &'static str {
        match self {
            StatusClass::BadRequest => "Bad Request",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// JSON body of a normalized error response.
///
/// Serializes as `{"statusCode": 400, "error": "Bad Request", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody<E> {
    pub status_code: u16,
    pub error: String,
    pub payload: E,
}

impl<E> ErrorBody<E> {
    pub fn new(class: StatusClass, payload: E) -> Self {
        Self {
            status_code: class.code(),
            error: class.reason().to_string(),
            payload,
        }
    }
}
