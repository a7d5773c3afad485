//! Authentication: token → user lookup → request extensions.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::{TokenParser, UserRetriever};
use crate::context;
use crate::errorsx::{ERR_TOKEN_INVALID, ERR_UNAUTHENTICATED};
use crate::log::Logger;
use crate::model::X_USER_ID;

/// Identity injected by [`authn_bypass`] when no `x-user-id` header is sent.
pub const DEFAULT_BYPASS_USER_ID: &str = "user-000001";

#[derive(Clone)]
pub struct AuthnState {
    pub parser: Arc<dyn TokenParser>,
    pub retriever: Arc<dyn UserRetriever>,
    pub logger: Logger,
}

/// Rejects requests without a valid token for an existing user; otherwise
/// records the user's ID and name in the request extensions.
pub async fn authn(State(state): State<AuthnState>, mut request: Request, next: Next) -> Response {
    let user_id = match state.parser.parse_request(request.headers()) {
        Ok(id) => id,
        Err(e) => {
            return ERR_TOKEN_INVALID
                .with_message(format_args!("{e}"))
                .into_response()
        }
    };

    state
        .logger
        .debug_kv("Token parsing successful", &[("userID", json!(user_id))]);

    let user = match state.retriever.get_user(&user_id).await {
        Ok(user) => user,
        Err(e) => {
            return ERR_UNAUTHENTICATED
                .with_message(format_args!("{e}"))
                .into_response()
        }
    };

    let ext = request.extensions_mut();
    context::with_user_id(ext, user.user_id);
    context::with_username(ext, user.username);
    next.run(request).await
}

/// Trusts the `x-user-id` header, or [`DEFAULT_BYPASS_USER_ID`] when absent.
/// Performs no verification and must never face a public listener.
pub async fn authn_bypass(mut request: Request, next: Next) -> Response {
    let user_id = request
        .headers()
        .get(X_USER_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_BYPASS_USER_ID)
        .to_string();

    crate::log::debug_kv(
        "Simulated authentication successful",
        &[("userID", json!(user_id))],
    );

    context::with_user_id(request.extensions_mut(), user_id);
    next.run(request).await
}
