//! Connection factories for the MySQL and Redis stores.
//!
//! Each factory builds a pool from typed options, probes it once, and
//! returns an error instead of a handle when the probe fails. Pool sizing,
//! timeouts and retry counts pass through unchanged. The MySQL idle cap is
//! accepted but has no sqlx setting.

mod redis;
mod user;

use std::error::Error;
use std::time::Instant;

use sqlx::mysql::{
    MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlQueryResult,
    MySqlRow,
};
use sqlx::query::{Query, QueryAs};
use sqlx::{ConnectOptions, Connection, Execute, FromRow};

pub use self::redis::{new_redis, RedisManager, RedisPool};
pub use self::user::{RecordNotFound, UserStore};
use crate::error::GroundworkError;
use crate::log::{Logger, SqlLogger};
use crate::options::MySqlOptions;
use crate::validator;

/// Query log verbosity, numbered 1 (silent) to 4 (info).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlLogLevel {
    Silent,
    Error,
    Warn,
    Info,
    /// Anything above info: keep the logger's own level.
    Debug,
}

impl From<i32> for SqlLogLevel {
    fn from(level: i32) -> Self {
        match level {
            i32::MIN..=1 => Self::Silent,
            2 => Self::Error,
            3 => Self::Warn,
            4 => Self::Info,
            _ => Self::Debug,
        }
    }
}

/// What the store needs from a logger.
pub trait QueryLogger: Send + Sync {
    /// A logger limited to `level`; the receiver is unchanged.
    fn log_mode(&self, level: SqlLogLevel) -> Box<dyn QueryLogger>;

    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);

    /// Logs one executed statement. `statement` yields the SQL text and the
    /// affected row count, or -1 when unknown.
    fn trace(&self, begin: Instant, statement: &dyn Fn() -> (String, i64), err: Option<&dyn Error>);
}

/// A pooled MySQL handle whose statements are traced.
pub struct Database {
    pool: MySqlPool,
    logger: Box<dyn QueryLogger>,
}

impl Database {
    #[must_use]
    pub fn new(pool: MySqlPool, logger: Box<dyn QueryLogger>) -> Self {
        Self { pool, logger }
    }

    #[must_use]
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    #[must_use]
    pub fn logger(&self) -> &dyn QueryLogger {
        &*self.logger
    }

    pub async fn execute<'q>(
        &self,
        query: Query<'q, MySql, MySqlArguments>,
    ) -> Result<MySqlQueryResult, sqlx::Error> {
        let sql = query.sql().to_string();
        let begin = Instant::now();
        let result = query.execute(&self.pool).await;
        let rows = result
            .as_ref()
            .map_or(-1, |r| i64::try_from(r.rows_affected()).unwrap_or(i64::MAX));
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    pub async fn fetch_all<'q, T>(
        &self,
        query: QueryAs<'q, MySql, T, MySqlArguments>,
    ) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let sql = query.sql().to_string();
        let begin = Instant::now();
        let result = query.fetch_all(&self.pool).await;
        let rows = result
            .as_ref()
            .map_or(-1, |r| i64::try_from(r.len()).unwrap_or(i64::MAX));
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    pub async fn fetch_optional<'q, T>(
        &self,
        query: QueryAs<'q, MySql, T, MySqlArguments>,
    ) -> Result<Option<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let sql = query.sql().to_string();
        let begin = Instant::now();
        let result = query.fetch_optional(&self.pool).await;
        let rows = result.as_ref().map_or(-1, |r| i64::from(r.is_some()));
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    fn trace(&self, begin: Instant, sql: String, rows: i64, err: Option<&sqlx::Error>) {
        self.logger.trace(
            begin,
            &|| (sql.clone(), rows),
            err.map(|e| e as &dyn Error),
        );
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Maps options onto the driver's connect options.
pub fn mysql_connect_options(opts: &MySqlOptions) -> Result<MySqlConnectOptions, GroundworkError> {
    let (host, port) = validator::split_host_port(&opts.addr).map_err(|message| {
        GroundworkError::mysql(std::io::Error::new(std::io::ErrorKind::InvalidInput, message))
    })?;
    let mut connect = MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username(&opts.username)
        .charset("utf8")
        .disable_statement_logging();
    if !opts.password.is_empty() {
        connect = connect.password(&opts.password);
    }
    if !opts.database.is_empty() {
        connect = connect.database(&opts.database);
    }
    Ok(connect)
}

/// Pool sizing from options. Connections are opened on demand; the idle
/// cap has no sqlx counterpart and is not turned into a standing floor.
#[must_use]
pub fn mysql_pool_options(opts: &MySqlOptions) -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(opts.max_open_connections)
        .max_lifetime(opts.max_connection_life_time)
}

/// Builds the MySQL pool and pings one connection.
pub async fn new_mysql(opts: &MySqlOptions, logger: &Logger) -> Result<Database, GroundworkError> {
    let connect = mysql_connect_options(opts)?;
    let pool = mysql_pool_options(opts)
        .connect_with(connect)
        .await
        .map_err(GroundworkError::mysql)?;

    let mut conn = pool.acquire().await.map_err(GroundworkError::mysql)?;
    conn.ping().await.map_err(GroundworkError::mysql)?;
    drop(conn);

    let sql = SqlLogger::new(logger.clone());
    let query_logger = sql.log_mode(SqlLogLevel::from(opts.log_level));
    Ok(Database::new(pool, query_logger))
}
