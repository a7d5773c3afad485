//! Command-line interface.
//!
//! [`Cli`] is declared with clap derive macros. The option flags of
//! [`ServerOptions`] are not derived: they are registered on the `run` and
//! `validate` subcommands at runtime through [`Options::add_flags`], so
//! their names carry each section's prefix (`--mysql.host`,
//! `--log.level`, ...). Use [`command`] to build the full command and
//! [`parse`] to parse it.

use std::path::PathBuf;

use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};

use crate::options::{Options, ServerOptions};

#[derive(Parser)]
#[command(
    name = "groundwork",
    version,
    about = "Backend service scaffold: stores, structured logging, auth middleware",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        groundwork run -c groundwork.yaml                 Start the HTTP service\n  \
        groundwork run --log.level debug --http.addr :8080\n  \
        groundwork validate groundwork.yaml               Check an options file"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service
    Run(RunArgs),

    /// Validate an options file without starting
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Options file path (.yaml, .json, .toml)
    #[arg(short, long, env = "GROUNDWORK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Trust the `x-user-id` header instead of verifying tokens.
    /// Never expose a server started this way.
    #[arg(long, env = "GROUNDWORK_AUTHN_BYPASS")]
    pub authn_bypass: bool,

    /// Library tracing level (axum, sqlx, tower-http)
    #[arg(long, env = "GROUNDWORK_TRACE_LEVEL", default_value = "warn")]
    pub trace_level: TraceLevel,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Options file to validate
    #[arg(default_value = "groundwork.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum TraceLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl TraceLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}

/// Builds the full command, option flags included.
#[must_use]
pub fn command() -> clap::Command {
    let defaults = ServerOptions::default();
    Cli::command()
        .mut_subcommand("run", |cmd| defaults.add_flags(cmd, ""))
        .mut_subcommand("validate", |cmd| defaults.add_flags(cmd, ""))
}

/// A parsed command line: the derived [`Cli`] plus the raw matches of the
/// chosen subcommand, from which option flags are applied.
pub struct Parsed {
    pub cli: Cli,
    pub matches: ArgMatches,
}

impl Parsed {
    /// Matches of the subcommand that was given, if any.
    #[must_use]
    pub fn subcommand_matches(&self) -> Option<&ArgMatches> {
        self.matches.subcommand().map(|(_, m)| m)
    }
}

pub fn try_parse_from<I, T>(args: I) -> Result<Parsed, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    let cli = Cli::from_arg_matches(&matches)?;
    Ok(Parsed { cli, matches })
}

/// Parses `std::env::args`, exiting with usage on error.
#[must_use]
pub fn parse() -> Parsed {
    match try_parse_from(std::env::args_os()) {
        Ok(parsed) => parsed,
        Err(e) => e.exit(),
    }
}
