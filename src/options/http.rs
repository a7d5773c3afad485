//! HTTP listener options.

use clap::{ArgMatches, Command};
use serde::{Deserialize, Serialize};

use super::{flags, Options};
use crate::error::ValidationError;
use crate::validator;

fn default_addr() -> String {
    "0.0.0.0:5555".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HttpOptions {
    /// `ip:port` or `:port`.
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

impl HttpOptions {
    /// The socket address to bind; `:port` binds every interface.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        match self.addr.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}").parse(),
            None => self.addr.parse(),
        }
    }
}

impl Options for HttpOptions {
    const PREFIX: &'static str = "http";

    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        validator::validate_address(&self.addr).map_err(|message| {
            vec![ValidationError::new("http.addr", message)
                .with_suggestion("use ip:port or :port, e.g. 0.0.0.0:5555")]
        })
    }

    fn add_flags(&self, cmd: Command, prefix: &str) -> Command {
        cmd.arg(flags::string(prefix, "addr", &self.addr, "HTTP listen address"))
    }

    fn apply_matches(&mut self, matches: &ArgMatches, prefix: &str) {
        flags::take(matches, prefix, "addr", &mut self.addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_only_binds_all_interfaces() {
        let opts = HttpOptions {
            addr: ":8080".into(),
        };
        assert_eq!(opts.socket_addr().unwrap().to_string(), "0.0.0.0:8080");
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn hostnames_are_rejected() {
        let opts = HttpOptions {
            addr: "localhost:80".into(),
        };
        let errors = opts.validate().unwrap_err();
        assert_eq!(errors[0].field, "http.addr");
    }
}
