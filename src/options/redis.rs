//! Redis store options.

use std::time::Duration;

use clap::{ArgMatches, Command};
use serde::{Deserialize, Serialize};

use super::{flags, Options};
use crate::error::ValidationError;
use crate::validator;

fn default_addr() -> String {
    "127.0.0.1:6379".to_string()
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_dial_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_io_timeout() -> Duration {
    Duration::from_secs(3)
}

const fn default_pool_timeout() -> Duration {
    Duration::from_secs(4)
}

const fn default_pool_size() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RedisOptions {
    #[serde(default = "default_addr")]
    pub addr: String,

    #[serde(default)]
    pub username: String,

    #[serde(default, skip_serializing)]
    pub password: String,

    #[serde(default)]
    pub database: i64,

    /// Zero disables reconnect attempts inside the pool.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub min_idle_conns: u32,

    #[serde(default = "default_dial_timeout", with = "flags::duration_str")]
    pub dial_timeout: Duration,

    /// Bounds each command round trip.
    #[serde(default = "default_io_timeout", with = "flags::duration_str")]
    pub read_timeout: Duration,

    /// Accepted for compatibility; writes share `read_timeout`.
    #[serde(default = "default_io_timeout", with = "flags::duration_str")]
    pub write_timeout: Duration,

    /// How long a caller waits for a pooled connection.
    #[serde(default = "default_pool_timeout", with = "flags::duration_str")]
    pub pool_timeout: Duration,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            username: String::new(),
            password: String::new(),
            database: 0,
            max_retries: default_max_retries(),
            min_idle_conns: 0,
            dial_timeout: default_dial_timeout(),
            read_timeout: default_io_timeout(),
            write_timeout: default_io_timeout(),
            pool_timeout: default_pool_timeout(),
            pool_size: default_pool_size(),
        }
    }
}

impl Options for RedisOptions {
    const PREFIX: &'static str = "redis";

    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(message) = validator::validate_host_port(&self.addr) {
            errors.push(ValidationError::new("redis.addr", message));
        }
        if self.database < 0 {
            errors.push(ValidationError::new("redis.database", "must not be negative"));
        }
        if self.pool_size == 0 {
            errors.push(
                ValidationError::new("redis.pool-size", "must be at least 1")
                    .with_suggestion("the default is 10"),
            );
        }
        if self.min_idle_conns > self.pool_size {
            errors.push(ValidationError::new(
                "redis.min-idle-conns",
                format!(
                    "{} idle connections exceed the pool size of {}",
                    self.min_idle_conns, self.pool_size
                ),
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn add_flags(&self, cmd: Command, prefix: &str) -> Command {
        cmd.arg(flags::string(prefix, "addr", &self.addr, "Redis server address"))
            .arg(flags::string(prefix, "username", &self.username, "Redis ACL username"))
            .arg(flags::secret(prefix, "password", "Password for access to redis"))
            .arg(flags::number(prefix, "database", self.database, "Redis database index"))
            .arg(flags::number(
                prefix,
                "max-retries",
                self.max_retries,
                "Reconnect attempts before giving up; 0 disables",
            ))
            .arg(flags::number(
                prefix,
                "min-idle-conns",
                self.min_idle_conns,
                "Minimum idle connections kept in the pool",
            ))
            .arg(flags::duration(
                prefix,
                "dial-timeout",
                self.dial_timeout,
                "Timeout for establishing new connections",
            ))
            .arg(flags::duration(
                prefix,
                "read-timeout",
                self.read_timeout,
                "Timeout for socket reads",
            ))
            .arg(flags::duration(
                prefix,
                "write-timeout",
                self.write_timeout,
                "Timeout for socket writes",
            ))
            .arg(flags::duration(
                prefix,
                "pool-timeout",
                self.pool_timeout,
                "Time to wait for a pooled connection",
            ))
            .arg(flags::number(prefix, "pool-size", self.pool_size, "Maximum pooled connections"))
    }

    fn apply_matches(&mut self, matches: &ArgMatches, prefix: &str) {
        flags::take(matches, prefix, "addr", &mut self.addr);
        flags::take(matches, prefix, "username", &mut self.username);
        flags::take(matches, prefix, "password", &mut self.password);
        flags::take(matches, prefix, "database", &mut self.database);
        flags::take(matches, prefix, "max-retries", &mut self.max_retries);
        flags::take(matches, prefix, "min-idle-conns", &mut self.min_idle_conns);
        flags::take(matches, prefix, "dial-timeout", &mut self.dial_timeout);
        flags::take(matches, prefix, "read-timeout", &mut self.read_timeout);
        flags::take(matches, prefix, "write-timeout", &mut self.write_timeout);
        flags::take(matches, prefix, "pool-timeout", &mut self.pool_timeout);
        flags::take(matches, prefix, "pool-size", &mut self.pool_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = RedisOptions::default();
        assert_eq!(opts.addr, "127.0.0.1:6379");
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.dial_timeout, Duration::from_secs(5));
        assert_eq!(opts.pool_timeout, Duration::from_secs(4));
        assert_eq!(opts.pool_size, 10);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn idle_connections_cannot_exceed_pool() {
        let opts = RedisOptions {
            min_idle_conns: 20,
            ..RedisOptions::default()
        };
        let errors = opts.validate().unwrap_err();
        assert_eq!(errors[0].field, "redis.min-idle-conns");
    }

    #[test]
    fn durations_come_from_flags() {
        let mut opts = RedisOptions::default();
        let cmd = opts.add_flags(Command::new("t"), "cache");
        let matches = cmd
            .try_get_matches_from(["t", "--cache.read-timeout=250ms", "--cache.database=2"])
            .unwrap();
        opts.apply_matches(&matches, "cache");
        assert_eq!(opts.read_timeout, Duration::from_millis(250));
        assert_eq!(opts.database, 2);
        assert_eq!(opts.write_timeout, Duration::from_secs(3));
    }
}
