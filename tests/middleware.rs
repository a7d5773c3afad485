//! End-to-end middleware chains with real tokens.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::{middleware, Router};
use chrono::Utc;
use tower::ServiceExt;

use groundwork::context;
use groundwork::errorsx::{ErrorX, ERR_TOKEN_INVALID, ERR_UNAUTHENTICATED};
use groundwork::log::{LogOptions, Logger};
use groundwork::middleware::{
    authn, cors, no_cache, request_id, secure, AuthnState, BoxError, UserRetriever,
};
use groundwork::model::{UserM, X_REQUEST_ID};
use groundwork::options::JwtOptions;
use groundwork::token::JwtTokens;

const KEY: &str = "Rtg8BPKNEf2mB4mgvKONGPZZQSaJWNLijxR42qRgq0iBb5";

struct Directory;

#[async_trait]
impl UserRetriever for Directory {
    async fn get_user(&self, user_id: &str) -> Result<UserM, BoxError> {
        if user_id != "user-000001" {
            return Err("record not found".into());
        }
        Ok(UserM {
            id: 1,
            user_id: user_id.into(),
            username: "root".into(),
            password: String::new(),
            nickname: "Root".into(),
            email: "root@example.com".into(),
            phone: "18800000000".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }
}

fn tokens() -> JwtTokens {
    JwtTokens::new(&JwtOptions {
        key: KEY.into(),
        ..JwtOptions::default()
    })
}

fn app() -> Router {
    let logger = Logger::new(&LogOptions {
        output_paths: vec!["stderr".into()],
        level: "error".into(),
        ..LogOptions::default()
    })
    .unwrap();
    let state = AuthnState {
        parser: Arc::new(tokens()),
        retriever: Arc::new(Directory),
        logger,
    };
    Router::new()
        .route(
            "/v1/users/me",
            get(|request: Request| async move {
                let ext = request.extensions();
                format!(
                    "{} {}",
                    context::user_id(ext).unwrap_or("-"),
                    context::request_id(ext).unwrap_or("-")
                )
            }),
        )
        .layer(middleware::from_fn_with_state(state, authn))
        .layer(middleware::from_fn(secure))
        .layer(middleware::from_fn(cors))
        .layer(middleware::from_fn(no_cache))
        .layer(middleware::from_fn(request_id))
}

fn me(authorization: &str) -> Request {
    axum::http::Request::get("/v1/users/me")
        .header(header::AUTHORIZATION, authorization)
        .header(X_REQUEST_ID, "req-1")
        .body(Body::empty())
        .unwrap()
}

async fn body(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn signed_token_reaches_the_handler() {
    let (token, _) = tokens().sign("user-000001").unwrap();
    let response = app().oneshot(me(&format!("Bearer {token}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[X_REQUEST_ID], "req-1");
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(body(response).await, b"user-000001 req-1");
}

#[tokio::test]
async fn malformed_token_aborts_the_chain() {
    let response = app().oneshot(me("Bearer not.a.jwt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    // Header middleware wrapping authn still runs on the way out.
    assert!(response.headers().get(header::CACHE_CONTROL).is_some());
    let err: ErrorX = serde_json::from_slice(&body(response).await).unwrap();
    assert!(err.matches(&ERR_TOKEN_INVALID));
}

#[tokio::test]
async fn token_for_an_unknown_user_is_unauthenticated() {
    let (token, _) = tokens().sign("user-999999").unwrap();
    let response = app().oneshot(me(&format!("Bearer {token}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let err: ErrorX = serde_json::from_slice(&body(response).await).unwrap();
    assert!(err.matches(&ERR_UNAUTHENTICATED));
}

#[tokio::test]
async fn preflight_skips_authentication() {
    let request = axum::http::Request::builder()
        .method("OPTIONS")
        .uri("/v1/users/me")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
