//! Token signing options.

use std::time::Duration;

use clap::{ArgMatches, Command};
use serde::{Deserialize, Serialize};

use super::{flags, Options};
use crate::error::ValidationError;

const fn default_expiration() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct JwtOptions {
    /// HMAC signing key.
    #[serde(default, skip_serializing)]
    pub key: String,

    #[serde(default = "default_expiration", with = "flags::duration_str")]
    pub expiration: Duration,
}

impl Default for JwtOptions {
    fn default() -> Self {
        Self {
            key: String::new(),
            expiration: default_expiration(),
        }
    }
}

impl Options for JwtOptions {
    const PREFIX: &'static str = "jwt";

    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.key.len() < 6 {
            errors.push(
                ValidationError::new("jwt.key", "signing key must be at least 6 characters")
                    .with_suggestion("set --jwt.key or GROUNDWORK_JWT_KEY"),
            );
        }
        if self.expiration.is_zero() {
            errors.push(ValidationError::new("jwt.expiration", "must be positive"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn add_flags(&self, cmd: Command, prefix: &str) -> Command {
        cmd.arg(flags::secret(prefix, "key", "Private key used to sign tokens"))
            .arg(flags::duration(
                prefix,
                "expiration",
                self.expiration,
                "Lifetime of a signed token",
            ))
    }

    fn apply_matches(&mut self, matches: &ArgMatches, prefix: &str) {
        flags::take(matches, prefix, "key", &mut self.key);
        flags::take(matches, prefix, "expiration", &mut self.expiration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_keys_are_rejected() {
        let opts = JwtOptions {
            key: "abc".into(),
            ..JwtOptions::default()
        };
        assert_eq!(opts.validate().unwrap_err()[0].field, "jwt.key");
    }

    #[test]
    fn expiration_defaults_to_two_hours() {
        let opts: JwtOptions = serde_json::from_str(r#"{"key":"Rtg8BPKNEf2mB4mgvKONGPZZQSaJWNLijxR42qRgq0iBb5"}"#).unwrap();
        assert_eq!(opts.expiration, Duration::from_secs(7200));
        assert!(opts.validate().is_ok());
    }
}
