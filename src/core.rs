//! Uniform HTTP response writing.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errorsx::ErrorX;

/// Writes `data` as a 200 JSON body, or the error's wire payload.
pub fn write_response<T: Serialize>(result: Result<T, ErrorX>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Writes any error, normalizing uncatalogued ones to `ERR_INTERNAL`.
pub fn write_error(err: &(dyn std::error::Error + 'static)) -> Response {
    ErrorX::from_error(err).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errorsx::{ERR_INTERNAL, ERR_NOT_FOUND};

    #[test]
    fn ok_result_is_200() {
        let resp = write_response(Ok(serde_json::json!({"id": 1})));
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn catalog_error_keeps_its_status() {
        let resp = write_response::<()>(Err(ERR_NOT_FOUND));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn foreign_error_becomes_internal() {
        let err = std::io::Error::other("disk on fire");
        let resp = write_error(&err);
        assert_eq!(resp.status(), ERR_INTERNAL.status());
    }
}
