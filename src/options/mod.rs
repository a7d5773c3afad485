//! Typed options and their command-line flags.
//!
//! Each options struct is validated on its own and registers its flags
//! under a caller-supplied prefix through the [`Options`] trait.
//! [`ServerOptions`] aggregates them and loads from a YAML, JSON or TOML
//! file chosen by extension; flags then override file values that were
//! given explicitly.

pub mod flags;
mod http;
mod jwt;
mod mysql;
mod redis;

use std::path::Path;

use clap::{ArgMatches, Command};
use serde::{Deserialize, Serialize};

pub use self::http::HttpOptions;
pub use self::jwt::JwtOptions;
pub use self::mysql::MySqlOptions;
pub use self::redis::RedisOptions;
use crate::error::{GroundworkError, ValidationError};
pub use crate::log::LogOptions;

/// Validation plus prefixed flag registration.
pub trait Options {
    /// The prefix used when the caller has no reason to pick another.
    const PREFIX: &'static str;

    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Registers one `--<prefix>.<name>` flag per field, defaulting to the
    /// current values.
    fn add_flags(&self, cmd: Command, prefix: &str) -> Command;

    /// Copies explicitly given flag values into `self`.
    fn apply_matches(&mut self, matches: &ArgMatches, prefix: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ServerOptions {
    #[serde(default)]
    pub http: HttpOptions,

    #[serde(default)]
    pub log: LogOptions,

    #[serde(default)]
    pub mysql: MySqlOptions,

    #[serde(default)]
    pub redis: RedisOptions,

    #[serde(default)]
    pub jwt: JwtOptions,
}

impl ServerOptions {
    /// Reads options from `path`, picking the format from its extension.
    pub fn from_file(path: &Path) -> Result<Self, GroundworkError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GroundworkError::ConfigFileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                GroundworkError::Io(e)
            }
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        parse_options_str(ext, &content, &path.display().to_string())
    }
}

impl Options for ServerOptions {
    const PREFIX: &'static str = "";

    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = [
            self.http.validate(),
            self.log.validate(),
            self.mysql.validate(),
            self.redis.validate(),
            self.jwt.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .flatten()
        .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Registers every section under its default prefix, nested under
    /// `prefix` when one is given.
    fn add_flags(&self, cmd: Command, prefix: &str) -> Command {
        let cmd = self.http.add_flags(cmd, &nested(prefix, HttpOptions::PREFIX));
        let cmd = self.log.add_flags(cmd, &nested(prefix, LogOptions::PREFIX));
        let cmd = self.mysql.add_flags(cmd, &nested(prefix, MySqlOptions::PREFIX));
        let cmd = self.redis.add_flags(cmd, &nested(prefix, RedisOptions::PREFIX));
        self.jwt.add_flags(cmd, &nested(prefix, JwtOptions::PREFIX))
    }

    fn apply_matches(&mut self, matches: &ArgMatches, prefix: &str) {
        self.http
            .apply_matches(matches, &nested(prefix, HttpOptions::PREFIX));
        self.log.apply_matches(matches, &nested(prefix, LogOptions::PREFIX));
        self.mysql
            .apply_matches(matches, &nested(prefix, MySqlOptions::PREFIX));
        self.redis
            .apply_matches(matches, &nested(prefix, RedisOptions::PREFIX));
        self.jwt.apply_matches(matches, &nested(prefix, JwtOptions::PREFIX));
    }
}

fn nested(prefix: &str, section: &str) -> String {
    if prefix.is_empty() {
        section.to_string()
    } else {
        format!("{prefix}.{section}")
    }
}

/// Parses an options document by file extension.
pub fn parse_options_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<ServerOptions, GroundworkError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| GroundworkError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| GroundworkError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| GroundworkError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(GroundworkError::UnsupportedFormat(other.to_string())),
    }
}
