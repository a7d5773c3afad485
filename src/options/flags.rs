//! Prefixed clap flag builders shared by every options struct.
//!
//! Flag ids and long names are both `<prefix>.<name>`; the environment
//! variable is `GROUNDWORK_<PREFIX>_<NAME>` upper-cased with separators
//! folded to `_`. Each flag's default is the struct's current value, and a
//! value is only written back when it was given explicitly.

use std::time::Duration;

use clap::builder::{TypedValueParser, ValueParserFactory};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches};

#[must_use]
pub fn flag_name(prefix: &str, name: &str) -> String {
    format!("{prefix}.{name}")
}

#[must_use]
pub fn env_name(prefix: &str, name: &str) -> String {
    format!("GROUNDWORK_{prefix}_{name}")
        .to_ascii_uppercase()
        .replace(['.', '-'], "_")
}

fn base(prefix: &str, name: &str, help: &'static str) -> Arg {
    let id = flag_name(prefix, name);
    Arg::new(id.clone())
        .long(id)
        .env(env_name(prefix, name))
        .help(help)
        .help_heading(prefix.to_string())
}

pub fn string(prefix: &str, name: &str, current: &str, help: &'static str) -> Arg {
    let arg = base(prefix, name, help).action(ArgAction::Set);
    if current.is_empty() {
        arg
    } else {
        arg.default_value(current.to_string())
    }
}

/// A secret: no default is shown in `--help`.
pub fn secret(prefix: &str, name: &str, help: &'static str) -> Arg {
    base(prefix, name, help)
        .action(ArgAction::Set)
        .hide_env_values(true)
}

/// `--x.flag`, `--x.flag=true` and `--x.flag=false` are all accepted.
pub fn boolean(prefix: &str, name: &str, current: bool, help: &'static str) -> Arg {
    base(prefix, name, help)
        .action(ArgAction::Set)
        .value_parser(clap::value_parser!(bool))
        .num_args(0..=1)
        .require_equals(true)
        .default_missing_value("true")
        .default_value(current.to_string())
}

pub fn number<T>(prefix: &str, name: &str, current: T, help: &'static str) -> Arg
where
    T: ValueParserFactory + ToString,
    T::Parser: TypedValueParser + Send + Sync + 'static,
{
    base(prefix, name, help)
        .action(ArgAction::Set)
        .value_parser(T::value_parser())
        .default_value(current.to_string())
}

pub fn list(prefix: &str, name: &str, current: &[String], help: &'static str) -> Arg {
    let arg = base(prefix, name, help)
        .action(ArgAction::Set)
        .value_delimiter(',');
    if current.is_empty() {
        arg
    } else {
        arg.default_values(current.to_vec())
    }
}

pub fn duration(prefix: &str, name: &str, current: Duration, help: &'static str) -> Arg {
    base(prefix, name, help)
        .action(ArgAction::Set)
        .value_parser(parse_duration)
        .default_value(format_duration(current))
}

/// Whether the flag was set on the command line or through its env var.
#[must_use]
pub fn explicit(matches: &ArgMatches, id: &str) -> bool {
    matches!(
        matches.value_source(id),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

/// Overwrites `target` with the flag's value when it was given explicitly.
pub fn take<T>(matches: &ArgMatches, prefix: &str, name: &str, target: &mut T)
where
    T: Clone + Send + Sync + 'static,
{
    let id = flag_name(prefix, name);
    if !explicit(matches, &id) {
        return;
    }
    if let Ok(Some(value)) = matches.try_get_one::<T>(&id) {
        *target = value.clone();
    }
}

pub fn take_list(matches: &ArgMatches, prefix: &str, name: &str, target: &mut Vec<String>) {
    let id = flag_name(prefix, name);
    if !explicit(matches, &id) {
        return;
    }
    if let Ok(Some(values)) = matches.try_get_many::<String>(&id) {
        *target = values.cloned().collect();
    }
}

/// Parses `<n>ms`, `<n>s`, `<n>m` or `<n>h`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 500ms, 10s, 5m, 1h)"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(n)),
        "" | "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 3600)),
        other => Err(format!("unknown duration unit '{other}' in '{s}'")),
    }
}

/// Inverse of [`parse_duration`], picking the largest exact unit.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms % 1000 != 0 {
        return format!("{ms}ms");
    }
    let secs = d.as_secs();
    if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// Serde adapter storing durations in the `10s` form.
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use clap::Command;

    use super::*;

    #[test]
    fn durations_parse_with_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_duration("7"), Ok(Duration::from_secs(7)));
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn durations_format_with_largest_unit() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_secs(10)), "10s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn env_names_fold_separators() {
        assert_eq!(env_name("log", "max-size"), "GROUNDWORK_LOG_MAX_SIZE");
        assert_eq!(env_name("app.mysql", "host"), "GROUNDWORK_APP_MYSQL_HOST");
    }

    #[test]
    fn defaults_are_not_applied_back() {
        let cmd = Command::new("t")
            .arg(string("p", "name", "kept", "name"))
            .arg(boolean("p", "on", false, "on"));
        let matches = cmd.try_get_matches_from(["t"]).unwrap();
        let mut name = "from-file".to_string();
        let mut on = true;
        take(&matches, "p", "name", &mut name);
        take(&matches, "p", "on", &mut on);
        assert_eq!(name, "from-file");
        assert!(on);
    }

    #[test]
    fn explicit_values_override() {
        let cmd = Command::new("t")
            .arg(boolean("p", "on", false, "on"))
            .arg(list("p", "paths", &["stdout".into()], "paths"))
            .arg(number::<u64>("p", "size", 100, "size"))
            .arg(duration("p", "wait", Duration::from_secs(1), "wait"));
        let matches = cmd
            .try_get_matches_from(["t", "--p.on", "--p.paths=a,b", "--p.size=7", "--p.wait=3s"])
            .unwrap();
        let (mut on, mut paths, mut size, mut wait) =
            (false, Vec::new(), 0u64, Duration::ZERO);
        take(&matches, "p", "on", &mut on);
        take_list(&matches, "p", "paths", &mut paths);
        take(&matches, "p", "size", &mut size);
        take(&matches, "p", "wait", &mut wait);
        assert!(on);
        assert_eq!(paths, ["a", "b"]);
        assert_eq!(size, 7);
        assert_eq!(wait, Duration::from_secs(3));
    }
}
