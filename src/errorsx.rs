//! Client-facing error catalog.
//!
//! Every HTTP-facing failure is an [`ErrorX`]: an immutable triple of
//! HTTP status code, a short machine-readable reason, and a human message.
//! The catalog below is closed; callers derive a copy with a specific
//! message through [`ErrorX::with_message`] and never edit the constants.

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("error: code = {code} reason = {reason} message = {message}")]
pub struct ErrorX {
    code: u16,
    reason: Cow<'static, str>,
    message: Cow<'static, str>,
}

/// The request succeeded.
pub const OK: ErrorX = ErrorX::new(200, "", "");

/// Any server-side failure that has no better entry.
pub const ERR_INTERNAL: ErrorX = ErrorX::new(500, "InternalError", "Internal server error.");

pub const ERR_NOT_FOUND: ErrorX = ErrorX::new(404, "NotFound", "Resource not found.");

/// The request body could not be bound to the expected shape.
pub const ERR_BIND: ErrorX = ErrorX::new(
    400,
    "BindError",
    "Error occurred while binding the request body to the struct.",
);

pub const ERR_INVALID_ARGUMENT: ErrorX =
    ErrorX::new(400, "InvalidArgument", "Argument verification failed.");

pub const ERR_UNAUTHENTICATED: ErrorX = ErrorX::new(401, "Unauthenticated", "Unauthenticated.");

/// Signing a JSON web token failed.
pub const ERR_SIGN_TOKEN: ErrorX = ErrorX::new(
    401,
    "Unauthenticated.SignToken",
    "Error occurred while signing the JSON web token.",
);

/// The bearer token is missing, malformed, expired or badly signed.
pub const ERR_TOKEN_INVALID: ErrorX =
    ErrorX::new(401, "Unauthenticated.TokenInvalid", "Token was invalid.");

pub const ERR_PERMISSION_DENIED: ErrorX = ErrorX::new(
    403,
    "PermissionDenied",
    "Permission denied. Access to the requested resource is forbidden.",
);

pub const ERR_OPERATION_FAILED: ErrorX = ErrorX::new(
    409,
    "OperationFailed",
    "The requested operation has failed. Please try again later.",
);

impl ErrorX {
    const fn new(code: u16, reason: &'static str, message: &'static str) -> Self {
        Self {
            code,
            reason: Cow::Borrowed(reason),
            message: Cow::Borrowed(message),
        }
    }

    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns a copy with the same code and reason and a freshly
    /// formatted message.
    ///
    /// ```
    /// use groundwork::errorsx::ERR_PERMISSION_DENIED;
    ///
    /// let e = ERR_PERMISSION_DENIED.with_message(format_args!("x={}", 5));
    /// assert_eq!(e.code(), 403);
    /// assert_eq!(e.message(), "x=5");
    /// ```
    #[must_use]
    pub fn with_message(&self, args: fmt::Arguments<'_>) -> Self {
        Self {
            code: self.code,
            reason: self.reason.clone(),
            message: Cow::Owned(args.to_string()),
        }
    }

    /// Two entries match when code and reason agree, whatever the message.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.code == other.code && self.reason == other.reason
    }

    /// Normalizes an arbitrary error for transmission.
    ///
    /// Catalog errors pass through unchanged; anything else becomes
    /// [`ERR_INTERNAL`] so internal detail never reaches the client.
    #[must_use]
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        err.downcast_ref::<Self>()
            .cloned()
            .unwrap_or(ERR_INTERNAL)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorX {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}
