//! Pooled Redis connections.

use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::{
    AsyncConnectionConfig, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError,
};
use async_trait::async_trait;

use crate::error::GroundworkError;
use crate::options::RedisOptions;
use crate::validator;

pub type RedisPool = bb8::Pool<RedisManager>;

/// Opens multiplexed connections with the configured dial and read
/// timeouts, and checks them with `PING`.
#[derive(Debug, Clone)]
pub struct RedisManager {
    client: Client,
    dial_timeout: Duration,
    read_timeout: Duration,
}

impl RedisManager {
    #[must_use]
    pub fn new(client: Client, dial_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            client,
            dial_timeout,
            read_timeout,
        }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl bb8::ManageConnection for RedisManager {
    type Connection = MultiplexedConnection;
    type Error = RedisError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let config = AsyncConnectionConfig::new()
            .set_connection_timeout(self.dial_timeout)
            .set_response_timeout(self.read_timeout);
        self.client
            .get_multiplexed_async_connection_with_config(&config)
            .await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        ::redis::cmd("PING").query_async::<String>(conn).await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Maps options onto the client's connection info.
pub fn redis_connection_info(opts: &RedisOptions) -> Result<ConnectionInfo, GroundworkError> {
    let (host, port) = validator::split_host_port(&opts.addr).map_err(|message| {
        GroundworkError::redis(std::io::Error::new(std::io::ErrorKind::InvalidInput, message))
    })?;
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host.to_string(), port),
        redis: RedisConnectionInfo {
            db: opts.database,
            username: non_empty(&opts.username),
            password: non_empty(&opts.password),
            ..RedisConnectionInfo::default()
        },
    })
}

/// Builds the Redis pool and sends one `PING`.
pub async fn new_redis(opts: &RedisOptions) -> Result<RedisPool, GroundworkError> {
    let client = Client::open(redis_connection_info(opts)?).map_err(GroundworkError::redis)?;
    let manager = RedisManager::new(client, opts.dial_timeout, opts.read_timeout);
    let min_idle = (opts.min_idle_conns > 0).then_some(opts.min_idle_conns);
    let pool = bb8::Pool::builder()
        .max_size(opts.pool_size)
        .min_idle(min_idle)
        .connection_timeout(opts.pool_timeout)
        .retry_connection(opts.max_retries > 0)
        .build(manager)
        .await
        .map_err(GroundworkError::redis)?;

    {
        let mut conn = pool.get().await.map_err(GroundworkError::redis)?;
        ::redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(GroundworkError::redis)?;
    }
    Ok(pool)
}
