//! Logger configuration.

use clap::{ArgMatches, Command};
use serde::{Deserialize, Serialize};

use super::encoder::Format;
use super::level::Level;
use crate::error::ValidationError;
use crate::options::{flags, Options};

fn default_level() -> String {
    Level::Info.as_str().to_string()
}

fn default_format() -> String {
    Format::Console.as_str().to_string()
}

fn default_output_paths() -> Vec<String> {
    vec!["stdout".to_string()]
}

fn default_log_dir() -> String {
    "./logs".to_string()
}

const fn default_max_size() -> u64 {
    100
}

const fn default_max_backups() -> u32 {
    5
}

const fn default_max_age() -> u32 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LogOptions {
    /// Omit the `caller` field.
    #[serde(default)]
    pub disable_caller: bool,

    /// Never attach stack traces, even at panic and fatal.
    #[serde(default)]
    pub disable_stacktrace: bool,

    /// Colored level names; only honored by the console format.
    #[serde(default)]
    pub enable_color: bool,

    /// Minimum level. Unknown names degrade to `info` at construction.
    #[serde(default = "default_level")]
    pub level: String,

    /// `console` or `json`.
    #[serde(default = "default_format")]
    pub format: String,

    /// `stdout`, `stderr`, or file paths.
    #[serde(default = "default_output_paths")]
    pub output_paths: Vec<String>,

    /// Also write `info.log` and `error.log` under `log_dir`.
    #[serde(default)]
    pub enable_file: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Megabytes before rotation.
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Rotated files kept. Zero keeps by age instead.
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,

    /// Days a rotated file is kept when `max_backups` is zero.
    #[serde(default = "default_max_age")]
    pub max_age: u32,

    /// Gzip rotated files.
    #[serde(default)]
    pub compress: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            disable_caller: false,
            disable_stacktrace: false,
            enable_color: false,
            level: default_level(),
            format: default_format(),
            output_paths: default_output_paths(),
            enable_file: false,
            log_dir: default_log_dir(),
            max_size: default_max_size(),
            max_backups: default_max_backups(),
            max_age: default_max_age(),
            compress: false,
        }
    }
}

impl LogOptions {
    /// The encoder format; anything unrecognized renders as console.
    #[must_use]
    pub fn parsed_format(&self) -> Format {
        self.format.parse().unwrap_or(Format::Console)
    }
}

impl Options for LogOptions {
    const PREFIX: &'static str = "log";

    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(e) = self.level.parse::<Level>() {
            errors.push(
                ValidationError::new("log.level", e.to_string())
                    .with_suggestion("expected debug, info, warn, error, panic or fatal"),
            );
        }
        if let Err(message) = self.format.parse::<Format>() {
            errors.push(
                ValidationError::new("log.format", message)
                    .with_suggestion("expected 'console' or 'json'"),
            );
        }
        if self.enable_file && self.log_dir.trim().is_empty() {
            errors.push(ValidationError::new(
                "log.dir",
                "log directory cannot be empty when file logging is enabled",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn add_flags(&self, cmd: Command, prefix: &str) -> Command {
        cmd.arg(flags::string(prefix, "level", &self.level, "Minimum log output LEVEL"))
            .arg(flags::boolean(
                prefix,
                "disable-caller",
                self.disable_caller,
                "Disable output of caller information in the log",
            ))
            .arg(flags::boolean(
                prefix,
                "disable-stacktrace",
                self.disable_stacktrace,
                "Disable stack traces at or above panic level",
            ))
            .arg(flags::boolean(
                prefix,
                "enable-color",
                self.enable_color,
                "Enable ANSI colors in console format logs",
            ))
            .arg(flags::string(prefix, "format", &self.format, "Log output FORMAT (console or json)"))
            .arg(flags::list(prefix, "output-paths", &self.output_paths, "Output paths of log"))
            .arg(flags::boolean(prefix, "enable-file", self.enable_file, "Enable file logging"))
            .arg(flags::string(prefix, "dir", &self.log_dir, "Directory to store the logs"))
            .arg(flags::number(
                prefix,
                "max-size",
                self.max_size,
                "Maximum size in megabytes of a log file before it gets rotated",
            ))
            .arg(flags::number(
                prefix,
                "max-backups",
                self.max_backups,
                "Maximum number of old log files to retain",
            ))
            .arg(flags::number(
                prefix,
                "max-age",
                self.max_age,
                "Maximum number of days to retain old log files",
            ))
            .arg(flags::boolean(prefix, "compress", self.compress, "Compress rotated log files"))
    }

    fn apply_matches(&mut self, matches: &ArgMatches, prefix: &str) {
        flags::take(matches, prefix, "level", &mut self.level);
        flags::take(matches, prefix, "disable-caller", &mut self.disable_caller);
        flags::take(matches, prefix, "disable-stacktrace", &mut self.disable_stacktrace);
        flags::take(matches, prefix, "enable-color", &mut self.enable_color);
        flags::take(matches, prefix, "format", &mut self.format);
        flags::take_list(matches, prefix, "output-paths", &mut self.output_paths);
        flags::take(matches, prefix, "enable-file", &mut self.enable_file);
        flags::take(matches, prefix, "dir", &mut self.log_dir);
        flags::take(matches, prefix, "max-size", &mut self.max_size);
        flags::take(matches, prefix, "max-backups", &mut self.max_backups);
        flags::take(matches, prefix, "max-age", &mut self.max_age);
        flags::take(matches, prefix, "compress", &mut self.compress);
    }
}
