//! axum middleware for authentication, authorization and response headers.
//!
//! Every function here has the `from_fn` / `from_fn_with_state` shape
//! (`State`, `Request`, `Next`) -> `Response`. Failures are written as
//! [`ErrorX`](crate::errorsx::ErrorX) payloads and stop the chain.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{middleware, routing::get, Router};
//! use groundwork::middleware::{authn, cors, no_cache, request_id, secure, AuthnState};
//!
//! # fn wire(state: AuthnState) -> Router {
//! Router::new()
//!     .route("/v1/users/me", get(|| async { "me" }))
//!     .layer(middleware::from_fn_with_state(state, authn))
//!     .layer(middleware::from_fn(secure))
//!     .layer(middleware::from_fn(cors))
//!     .layer(middleware::from_fn(no_cache))
//!     .layer(middleware::from_fn(request_id))
//! # }
//! ```

mod authn;
mod authz;
mod header;

use async_trait::async_trait;
use axum::http::HeaderMap;

pub use authn::{authn, authn_bypass, AuthnState, DEFAULT_BYPASS_USER_ID};
pub use authz::{authz, AuthzState};
pub use header::{cors, no_cache, request_id, secure, TlsConnection};

use crate::model::UserM;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reads the caller's user ID out of a request.
pub trait TokenParser: Send + Sync {
    fn parse_request(&self, headers: &HeaderMap) -> Result<String, BoxError>;
}

/// Looks a user up by user ID.
#[async_trait]
pub trait UserRetriever: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<UserM, BoxError>;
}

/// Decides whether `subject` may perform `action` on `object`.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, subject: &str, object: &str, action: &str) -> Result<bool, BoxError>;
}
