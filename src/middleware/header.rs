//! Response header middleware.

use axum::extract::Request;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use uuid::Uuid;

use crate::context;
use crate::model::X_REQUEST_ID;

const NO_CACHE: &str = "no-cache, no-store, max-age=0, must-revalidate";
const EPOCH: &str = "Thu, 01 Jan 1970 00:00:00 GMT";
const CORS_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const CORS_HEADERS: &str = "authorization, origin, content-type, accept";
const ALLOW: &str = "HEAD, GET, POST, PUT, PATCH, DELETE, OPTIONS";
const HSTS: &str = "max-age=31536000";

/// Request extension marking a connection accepted over TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnection;

fn http_date_now() -> HeaderValue {
    let now = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    HeaderValue::from_str(&now).unwrap_or(HeaderValue::from_static(EPOCH))
}

/// Forbids clients and proxies from caching the response.
pub async fn no_cache(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(header::EXPIRES, HeaderValue::from_static(EPOCH));
    headers.insert(header::LAST_MODIFIED, http_date_now());
    response
}

/// Answers `OPTIONS` preflights directly with 200; other methods pass.
pub async fn cors(request: Request, next: Next) -> Response {
    if request.method() != Method::OPTIONS {
        return next.run(request).await;
    }
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_HEADERS),
    );
    headers.insert(header::ALLOW, HeaderValue::from_static(ALLOW));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Sets the browser security headers, plus HSTS on TLS connections.
pub async fn secure(request: Request, next: Next) -> Response {
    let tls = request.extensions().get::<TlsConnection>().is_some()
        || request.uri().scheme_str() == Some("https");

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
    if tls {
        headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    }
    response
}

/// Reuses the incoming `x-request-id` or mints one, stores it in the
/// request extensions and echoes it on the response.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let name = HeaderName::from_static(X_REQUEST_ID);
    let value = request
        .headers()
        .get(&name)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or(HeaderValue::from_static("unknown"))
        });

    if let Ok(id) = value.to_str() {
        context::with_request_id(request.extensions_mut(), id);
    }
    request.headers_mut().insert(name.clone(), value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(name, value);
    response
}
