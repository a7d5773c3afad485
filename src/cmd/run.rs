//! `groundwork run`: boot the logger, the stores and the HTTP service.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::get;
use axum::{middleware, Router};
use clap::ArgMatches;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::load_options;
use crate::cli::RunArgs;
use crate::context;
use crate::core::write_response;
use crate::db::{self, RecordNotFound, RedisPool, UserStore};
use crate::error::GroundworkError;
use crate::errorsx::{ERR_INTERNAL, ERR_NOT_FOUND};
use crate::log::{self, Logger};
use crate::logging;
use crate::middleware::{
    authn, authn_bypass, cors, no_cache, request_id, secure, AuthnState, UserRetriever,
};
use crate::model::UserM;
use crate::options::Options;
use crate::server::{self, HttpServer};
use crate::token::JwtTokens;

const MAX_BODY: usize = 1_048_576;

#[derive(Clone)]
pub struct AppState {
    pub users: UserStore,
    pub redis: RedisPool,
    pub logger: Logger,
}

pub async fn execute(args: RunArgs, matches: &ArgMatches) -> Result<(), GroundworkError> {
    let opts = load_options(args.config.as_deref(), matches)?;
    opts.validate()
        .map_err(|errors| GroundworkError::OptionsValidation { errors })?;

    let logger = Logger::with_options(&opts.log, log::request_context_extractors())?;
    log::install(logger.clone());
    logging::init(args.trace_level.to_tracing_level(), logger.clone());

    let database = Arc::new(db::new_mysql(&opts.mysql, &logger).await?);
    let redis = db::new_redis(&opts.redis).await?;
    logger.info_kv(
        "Stores connected",
        &[
            ("mysql", json!(opts.mysql.addr)),
            ("redis", json!(opts.redis.addr)),
        ],
    );

    let state = AppState {
        users: UserStore::new(Arc::clone(&database)),
        redis,
        logger: logger.clone(),
    };
    let authentication = if args.authn_bypass {
        logger.warn("Authentication bypass enabled; x-user-id is trusted as-is");
        Authentication::Bypass
    } else {
        Authentication::Token(AuthnState {
            parser: Arc::new(JwtTokens::new(&opts.jwt)),
            retriever: Arc::new(state.users.clone()),
            logger: logger.clone(),
        })
    };
    let router = build_router(state, authentication, MAX_BODY);

    let srv = Arc::new(HttpServer::new(
        opts.http.socket_addr()?,
        router,
        logger.clone(),
    ));
    server::serve(srv, server::shutdown_signal()).await?;

    database.close().await;
    logger.close();
    Ok(())
}

/// How the `/v1` routes identify the caller.
pub enum Authentication {
    Token(AuthnState),
    /// Trusts `x-user-id`; development only.
    Bypass,
}

/// `/healthz` plus the authenticated `/v1` routes. The header middleware
/// wraps every route; tracing and the body limit sit outermost.
pub fn build_router(state: AppState, authentication: Authentication, max_body: usize) -> Router {
    let v1 = Router::new().route("/users/me", get(me));
    let v1 = match authentication {
        Authentication::Token(authn_state) => {
            v1.layer(middleware::from_fn_with_state(authn_state, authn))
        }
        Authentication::Bypass => v1.layer(middleware::from_fn(authn_bypass)),
    };

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", v1)
        .layer(middleware::from_fn(secure))
        .layer(middleware::from_fn(cors))
        .layer(middleware::from_fn(no_cache))
        .layer(middleware::from_fn(request_id))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

/// Pings Redis; MySQL is checked by the pool on checkout.
async fn healthz(State(state): State<AppState>) -> Response {
    let redis = match state.redis.get().await {
        Ok(mut conn) => ::redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .is_ok(),
        Err(_) => false,
    };
    if redis {
        write_response(Ok(json!({ "status": "ok" })))
    } else {
        write_response::<()>(Err(ERR_INTERNAL.with_message(format_args!("redis unreachable"))))
    }
}

async fn me(State(state): State<AppState>, request: Request) -> Response {
    let ext = request.extensions();
    let user_id = context::user_id(ext).unwrap_or_default();
    match state.users.get_user(user_id).await {
        Ok(user) => write_response::<UserM>(Ok(user)),
        Err(e) if e.is::<RecordNotFound>() => write_response::<UserM>(Err(
            ERR_NOT_FOUND.with_message(format_args!("user {user_id} not found")),
        )),
        Err(e) => {
            state
                .logger
                .with_context(ext)
                .error_kv(Some(&*e), "Failed to load user", &[]);
            write_response::<UserM>(Err(ERR_INTERNAL))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Method, StatusCode};
    use sqlx::mysql::MySqlPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::db::{mysql_connect_options, Database, RedisManager};
    use crate::errorsx::{ErrorX, ERR_TOKEN_INVALID};
    use crate::log::SqlLogger;
    use crate::model::X_REQUEST_ID;
    use crate::options::{JwtOptions, MySqlOptions};

    /// Pools that never connect until used, pointed at a closed port.
    fn lazy_state() -> AppState {
        let (logger, _) = crate::log::tests::captured("debug", Vec::new());
        let mysql = MySqlOptions {
            addr: "127.0.0.1:1".into(),
            ..MySqlOptions::default()
        };
        let pool = MySqlPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy_with(mysql_connect_options(&mysql).unwrap());
        let database = Database::new(pool, Box::new(SqlLogger::new(logger.clone())));

        let client = ::redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let redis = bb8::Pool::builder()
            .connection_timeout(Duration::from_millis(200))
            .build_unchecked(RedisManager::new(
                client,
                Duration::from_millis(100),
                Duration::from_millis(100),
            ));

        AppState {
            users: UserStore::new(Arc::new(database)),
            redis,
            logger,
        }
    }

    fn token_router(max_body: usize) -> Router {
        let state = lazy_state();
        let authn_state = AuthnState {
            parser: Arc::new(JwtTokens::new(&JwtOptions {
                key: "Rtg8BPKNEf2mB4mgvKONGPZZQSaJWNLijxR42qRgq0iBb5".into(),
                ..JwtOptions::default()
            })),
            retriever: Arc::new(state.users.clone()),
            logger: state.logger.clone(),
        };
        build_router(state, Authentication::Token(authn_state), max_body)
    }

    async fn error_of(response: Response) -> ErrorX {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_token_is_rejected_with_the_header_middleware_applied() {
        let response = token_router(MAX_BODY)
            .oneshot(
                axum::http::Request::get("/v1/users/me")
                    .header(X_REQUEST_ID, "req-9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let headers = response.headers();
        assert_eq!(headers[X_REQUEST_ID], "req-9");
        assert!(headers.contains_key(header::CACHE_CONTROL));
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert!(error_of(response).await.matches(&ERR_TOKEN_INVALID));
    }

    #[tokio::test]
    async fn preflight_is_answered_before_authentication() {
        let response = token_router(MAX_BODY)
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/v1/users/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn oversized_bodies_are_refused() {
        let response = token_router(16)
            .oneshot(
                axum::http::Request::get("/healthz")
                    .header(header::CONTENT_LENGTH, "64")
                    .body(Body::from(vec![b'x'; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn bypass_reaches_the_store_and_hides_its_failure() {
        let router = build_router(lazy_state(), Authentication::Bypass, MAX_BODY);
        let response = router
            .oneshot(
                axum::http::Request::get("/v1/users/me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_of(response).await.matches(&ERR_INTERNAL));
    }

    #[tokio::test]
    async fn healthz_reports_an_unreachable_redis() {
        let response = token_router(MAX_BODY)
            .oneshot(axum::http::Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_of(response).await.message(), "redis unreachable");
    }
}
