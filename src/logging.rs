//! `tracing` bridge for library output.
//!
//! Application code logs through [`crate::log::Logger`]. axum, tower-http
//! and sqlx emit `tracing` events instead; [`LoggerLayer`] forwards those
//! events into a logger, so they share its level, encoders and sinks
//! (including the rotated `info.log` / `error.log` files). A `Targets`
//! filter in front of the layer drops library chatter below the chosen
//! trace level before it reaches the logger.

use std::fmt;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::log::{Level, Logger};

/// A `tracing` layer writing every event it sees through a [`Logger`].
///
/// The event's `message` becomes the entry message, its target is kept as
/// the `target` field and every other field is carried as a JSON value.
#[derive(Clone)]
pub struct LoggerLayer {
    logger: Logger,
}

impl LoggerLayer {
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

fn level_of(level: tracing::Level) -> Level {
    match level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warn,
        tracing::Level::INFO => Level::Info,
        _ => Level::Debug,
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = level_of(*meta.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let caller = meta
            .file()
            .zip(meta.line())
            .map(|(file, line)| format!("{file}:{line}"));
        let mut fields: Vec<(&str, Value)> = Vec::with_capacity(visitor.fields.len() + 1);
        fields.push(("target", Value::from(meta.target())));
        fields.extend(visitor.fields.iter().map(|(k, v)| (*k, v.clone())));

        self.logger
            .log_at(level, caller, visitor.message.as_deref().unwrap_or_default(), &fields);
    }
}

/// Collects an event's fields as JSON values.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(&'static str, Value)>,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.push((field.name(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::from(format!("{value:?}")));
    }
}

/// Library events at or above `level`, routed into `logger`.
pub fn subscriber(level: tracing::Level, logger: Logger) -> impl Subscriber + Send + Sync {
    let filter = Targets::new().with_default(level);
    tracing_subscriber::registry()
        .with(filter)
        .with(LoggerLayer::new(logger))
}

/// Installs [`subscriber`] globally. Returns `false` when a subscriber was
/// already installed, which is left untouched.
pub fn init(level: tracing::Level, logger: Logger) -> bool {
    subscriber(level, logger).try_init().is_ok()
}
