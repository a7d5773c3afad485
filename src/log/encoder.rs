//! Record encoding: one JSON object or one tab-separated console line
//! per entry.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use super::level::Level;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Keys written by the encoder itself. A field reusing one is renamed to
/// `fields.<key>`.
const RESERVED_KEYS: [&str; 5] = ["level", "timestamp", "caller", "message", "stacktrace"];

fn field_key(key: &str) -> Cow<'_, str> {
    if RESERVED_KEYS.contains(&key) {
        Cow::Owned(format!("fields.{key}"))
    } else {
        Cow::Borrowed(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Console,
    Json,
}

impl Format {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            other => Err(format!("invalid log format: {other}")),
        }
    }
}

/// Renders a duration as fractional milliseconds.
#[must_use]
pub fn millis(d: Duration) -> Value {
    #[allow(clippy::cast_precision_loss)]
    let nanos = d.as_nanos() as f64;
    Value::from(nanos / 1e6)
}

pub(crate) struct Record<'a> {
    pub time: DateTime<Local>,
    pub level: Level,
    pub caller: Option<String>,
    pub message: &'a str,
    pub bound: &'a [(String, Value)],
    pub fields: &'a [(&'a str, Value)],
    pub stacktrace: Option<String>,
}

impl Record<'_> {
    fn all_fields(&self) -> impl Iterator<Item = (Cow<'_, str>, &Value)> {
        self.bound
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .chain(self.fields.iter().map(|(k, v)| (*k, v)))
            .map(|(k, v)| (field_key(k), v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Encoder {
    pub format: Format,
    pub color: bool,
}

impl Encoder {
    pub(crate) fn encode(self, record: &Record<'_>) -> Vec<u8> {
        let mut line = match self.format {
            Format::Json => Self::encode_json(record),
            Format::Console => self.encode_console(record),
        };
        line.push('\n');
        line.into_bytes()
    }

    fn encode_json(record: &Record<'_>) -> String {
        let mut obj = Map::new();
        obj.insert("level".into(), Value::from(record.level.as_str()));
        obj.insert(
            "timestamp".into(),
            Value::from(record.time.format(TIME_FORMAT).to_string()),
        );
        if let Some(ref caller) = record.caller {
            obj.insert("caller".into(), Value::from(caller.as_str()));
        }
        obj.insert("message".into(), Value::from(record.message));
        for (key, value) in record.all_fields() {
            obj.insert(key.into_owned(), value.clone());
        }
        if let Some(ref stack) = record.stacktrace {
            obj.insert("stacktrace".into(), Value::from(stack.as_str()));
        }
        Value::Object(obj).to_string()
    }

    fn encode_console(self, record: &Record<'_>) -> String {
        let mut line = record.time.format(TIME_FORMAT).to_string();
        line.push('\t');
        line.push_str(&self.level_name(record.level));
        if let Some(ref caller) = record.caller {
            line.push('\t');
            line.push_str(caller);
        }
        line.push('\t');
        line.push_str(record.message);

        let mut fields = Map::new();
        for (key, value) in record.all_fields() {
            fields.insert(key.into_owned(), value.clone());
        }
        if !fields.is_empty() {
            line.push('\t');
            line.push_str(&Value::Object(fields).to_string());
        }
        if let Some(ref stack) = record.stacktrace {
            line.push('\n');
            line.push_str(stack.trim_end());
        }
        line
    }

    fn level_name(self, level: Level) -> String {
        if !self.color {
            return level.as_str().to_string();
        }
        let styled = console::style(level.as_upper_str()).force_styling(true);
        match level {
            Level::Debug => styled.magenta(),
            Level::Info => styled.blue(),
            Level::Warn => styled.yellow(),
            Level::Error | Level::Panic | Level::Fatal => styled.red(),
        }
        .to_string()
    }
}
