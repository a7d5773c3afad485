//! groundwork is a scaffold for HTTP backend services.
//!
//! It glues existing libraries into one consistent shape: typed options
//! that register their own command-line flags, pooled MySQL and Redis
//! handles, a structured leveled logger, a closed catalog of client-facing
//! errors, axum middleware, and a graceful server runner.
//!
//! # Architecture
//!
//! - [`options`] -- Option structs per concern, validation, prefixed clap
//!   flags, and YAML / JSON / TOML loading via [`ServerOptions`](options::ServerOptions).
//! - [`log`] -- The structured logger: console or JSON records, level-split
//!   rotated files, context-derived child loggers, and the SQL adapter.
//! - [`db`] -- `new_mysql` and `new_redis` connection factories.
//! - [`errorsx`] -- The [`ErrorX`](errorsx::ErrorX) catalog; [`core`] writes
//!   it (or a success payload) as JSON.
//! - [`middleware`] -- Authentication, authorization and response headers.
//! - [`token`] -- HS256 tokens carrying a user ID.
//! - [`server`] -- The [`Server`](server::Server) contract and
//!   [`serve`](server::serve) runner.
//! - [`cli`] / [`cmd`] -- The `groundwork` binary.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML options files _(enabled by default)_ |
//! | `json` | JSON options files |
//! | `toml` | TOML options files |

#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod context;
pub mod core;
pub mod db;
pub mod error;
pub mod errorsx;
pub mod log;
pub mod logging;
pub mod middleware;
pub mod model;
pub mod options;
pub mod server;
pub mod token;
pub mod validator;
