//! Authorization of (subject, object, action) triples.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::Authorizer;
use crate::context;
use crate::errorsx::ERR_PERMISSION_DENIED;
use crate::log::Logger;

#[derive(Clone)]
pub struct AuthzState {
    pub authorizer: Arc<dyn Authorizer>,
    pub logger: Logger,
}

/// Subject is the authenticated user ID (empty when absent), object the
/// request path, action the method.
pub async fn authz(State(state): State<AuthzState>, request: Request, next: Next) -> Response {
    let subject = context::user_id(request.extensions())
        .unwrap_or_default()
        .to_string();
    let object = request.uri().path().to_string();
    let action = request.method().as_str().to_string();

    state.logger.debug_kv(
        "Build authorize context",
        &[
            ("subject", json!(subject)),
            ("object", json!(object)),
            ("action", json!(action)),
        ],
    );

    let reason = match state.authorizer.authorize(&subject, &object, &action) {
        Ok(true) => return next.run(request).await,
        Ok(false) => "denied by policy".to_string(),
        Err(e) => e.to_string(),
    };
    ERR_PERMISSION_DENIED
        .with_message(format_args!(
            "access denied: subject={subject}, object={object}, action={action}, reason={reason}"
        ))
        .into_response()
}
