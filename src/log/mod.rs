//! Structured, leveled logging.
//!
//! A [`Logger`] is a cheap handle onto a shared engine: the sinks, one
//! atomic minimum level, the buffered rotated files and their flush thread,
//! the context extractors, and the escalation hook. Deriving a logger
//! ([`Logger::add_caller_skip`], [`Logger::with_context`],
//! [`Logger::with_fields`]) copies the handle and layers state on the copy;
//! the parent is never touched.
//!
//! Entries are routed by severity. Output paths receive everything at or
//! above the current level. With file logging enabled, `info.log` receives
//! entries below `error` and `error.log` receives `error` and above.
//!
//! ```no_run
//! use groundwork::log::{LogOptions, Logger};
//! use serde_json::json;
//!
//! let logger = Logger::new(&LogOptions::default())?;
//! logger.info(format_args!("listening on {}", "0.0.0.0:5555"));
//! logger.warn_kv("slow upstream", &[("elapsed_ms", json!(812.5))]);
//! logger.sync();
//! # Ok::<(), groundwork::error::GroundworkError>(())
//! ```
//!
//! A process-wide default exists for call sites that cannot be handed a
//! logger ([`init`], [`default`] and the free functions below). Prefer
//! passing a [`Logger`] explicitly.

mod encoder;
mod level;
mod options;
mod sink;
mod sql;

use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::path::Path;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use axum::http::Extensions;
use chrono::Local;
use serde_json::Value;

pub use encoder::{millis, Format};
pub use level::{Level, ParseLevelError};
pub use options::LogOptions;
pub use sink::LogSink;
pub use sql::{SqlLogger, SLOW_THRESHOLD};

use crate::context;
use crate::error::GroundworkError;
use crate::model::X_REQUEST_ID;
use encoder::{Encoder, Record};
use level::{AtomicLevel, Floor};
use sink::{Band, Core, Flusher, FLUSH_INTERVAL};

/// Reads one string out of a request's extensions. An empty result means
/// "absent".
pub type Extractor = Arc<dyn Fn(&Extensions) -> String + Send + Sync>;

/// What a `panic` or `fatal` entry asks the process to do after logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
    Panic(String),
    Exit(i32),
}

/// Carries out an [`Escalation`].
pub trait Escalate: Send + Sync {
    fn escalate(&self, escalation: Escalation);
}

/// Panics the current thread or exits the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEscalator;

impl Escalate for ProcessEscalator {
    fn escalate(&self, escalation: Escalation) {
        match escalation {
            Escalation::Panic(message) => panic!("{message}"),
            Escalation::Exit(code) => std::process::exit(code),
        }
    }
}

/// Construction-time behavior layered onto a new logger.
pub enum LoggerOption {
    /// Adds one field to loggers derived with [`Logger::with_context`].
    ContextExtractor { field: String, extract: Extractor },
    /// Replaces the default [`ProcessEscalator`].
    Escalator(Arc<dyn Escalate>),
    /// An extra destination receiving every enabled entry.
    Sink(Arc<dyn LogSink>),
}

impl LoggerOption {
    pub fn context_extractor<F>(field: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&Extensions) -> String + Send + Sync + 'static,
    {
        Self::ContextExtractor {
            field: field.into(),
            extract: Arc::new(extract),
        }
    }
}

/// Extractors for the request ID and the authenticated user ID.
#[must_use]
pub fn request_context_extractors() -> Vec<LoggerOption> {
    vec![
        LoggerOption::context_extractor(X_REQUEST_ID, |ext| {
            context::request_id(ext).unwrap_or_default().to_string()
        }),
        LoggerOption::context_extractor("userID", |ext| {
            context::user_id(ext).unwrap_or_default().to_string()
        }),
    ]
}

struct Engine {
    options: LogOptions,
    level: AtomicLevel,
    cores: Vec<Core>,
    buffered: Vec<Arc<dyn LogSink>>,
    flusher: Mutex<Option<Flusher>>,
    extractors: Vec<(String, Extractor)>,
    escalator: Arc<dyn Escalate>,
    caller: bool,
    stacktrace: bool,
}

#[derive(Clone)]
pub struct Logger {
    engine: Arc<Engine>,
    fields: Arc<[(String, Value)]>,
    caller_skip: usize,
    floor: Floor,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.engine.level.load())
            .field("fields", &self.fields)
            .field("caller_skip", &self.caller_skip)
            .field("floor", &self.floor)
            .finish_non_exhaustive()
    }
}

fn build_error(source: std::io::Error) -> GroundworkError {
    GroundworkError::LoggerBuild { source }
}

impl Logger {
    /// Builds a logger. Only opening destinations can fail.
    pub fn new(opts: &LogOptions) -> Result<Self, GroundworkError> {
        Self::with_options(opts, [])
    }

    pub fn with_options(
        opts: &LogOptions,
        options: impl IntoIterator<Item = LoggerOption>,
    ) -> Result<Self, GroundworkError> {
        let format = opts.parsed_format();
        let stream = Encoder {
            format,
            color: format == Format::Console && opts.enable_color,
        };
        let file = Encoder {
            format,
            color: false,
        };

        let mut extractors = Vec::new();
        let mut escalator: Arc<dyn Escalate> = Arc::new(ProcessEscalator);
        let mut cores = Vec::new();
        for option in options {
            match option {
                LoggerOption::ContextExtractor { field, extract } => {
                    extractors.push((field, extract));
                }
                LoggerOption::Escalator(e) => escalator = e,
                LoggerOption::Sink(sink) => cores.push(Core {
                    encoder: stream,
                    band: Band::All,
                    sink,
                }),
            }
        }

        for path in &opts.output_paths {
            let encoder = if matches!(path.as_str(), "stdout" | "stderr") {
                stream
            } else {
                file
            };
            cores.push(Core {
                encoder,
                band: Band::All,
                sink: sink::open_output(path).map_err(build_error)?,
            });
        }
        if cores.is_empty() {
            cores.push(Core {
                encoder: stream,
                band: Band::All,
                sink: sink::stdout(),
            });
        }

        let mut buffered = Vec::new();
        if opts.enable_file {
            let info = sink::open_rotated(opts, "info.log").map_err(build_error)?;
            let error = sink::open_rotated(opts, "error.log").map_err(build_error)?;
            cores.push(Core {
                encoder: file,
                band: Band::BelowError,
                sink: info.clone(),
            });
            cores.push(Core {
                encoder: file,
                band: Band::ErrorAndAbove,
                sink: error.clone(),
            });
            buffered = vec![info, error];
        }
        let flusher = if buffered.is_empty() {
            None
        } else {
            Some(Flusher::spawn(buffered.clone(), FLUSH_INTERVAL).map_err(build_error)?)
        };

        Ok(Self::from_engine(Engine {
            options: opts.clone(),
            level: AtomicLevel::new(Level::parse_or_info(&opts.level)),
            cores,
            buffered,
            flusher: Mutex::new(flusher),
            extractors,
            escalator,
            caller: !opts.disable_caller,
            stacktrace: !opts.disable_stacktrace,
        }))
    }

    /// Console logger on stdout at `info`; cannot fail.
    fn stdout() -> Self {
        let opts = LogOptions::default();
        Self::from_engine(Engine {
            level: AtomicLevel::new(Level::Info),
            cores: vec![Core {
                encoder: Encoder {
                    format: Format::Console,
                    color: false,
                },
                band: Band::All,
                sink: sink::stdout(),
            }],
            buffered: Vec::new(),
            flusher: Mutex::new(None),
            extractors: Vec::new(),
            escalator: Arc::new(ProcessEscalator),
            caller: true,
            stacktrace: true,
            options: opts,
        })
    }

    fn from_engine(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            fields: Arc::from(Vec::new()),
            caller_skip: 0,
            floor: Floor::Open,
        }
    }

    /// The options this logger's engine was built from.
    #[must_use]
    pub fn options(&self) -> &LogOptions {
        &self.engine.options
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.engine.level.load()
    }

    /// Swaps the minimum level for every logger sharing this engine.
    /// Unknown names select `info`.
    pub fn set_level(&self, name: &str) {
        self.engine.level.store(Level::parse_or_info(name));
    }

    /// Whether an entry at `level` would be written anywhere.
    #[must_use]
    pub fn enabled(&self, level: Level) -> bool {
        self.floor.allows(level) && level >= self.engine.level.load()
    }

    /// A logger whose reported caller is `skip` frames further up.
    #[must_use]
    pub fn add_caller_skip(&self, skip: usize) -> Self {
        Self {
            caller_skip: self.caller_skip + skip,
            ..self.clone()
        }
    }

    /// A logger carrying one field per registered extractor that yields a
    /// non-empty value for these extensions.
    #[must_use]
    pub fn with_context(&self, ext: &Extensions) -> Self {
        let added: Vec<(String, Value)> = self
            .engine
            .extractors
            .iter()
            .filter_map(|(field, extract)| {
                let value = extract(ext);
                (!value.is_empty()).then(|| (field.clone(), Value::from(value)))
            })
            .collect();
        self.extend_fields(added)
    }

    #[must_use]
    pub fn with_fields(&self, fields: &[(&str, Value)]) -> Self {
        self.extend_fields(
            fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        )
    }

    fn extend_fields(&self, added: Vec<(String, Value)>) -> Self {
        if added.is_empty() {
            return self.clone();
        }
        let fields: Vec<(String, Value)> = self.fields.iter().cloned().chain(added).collect();
        Self {
            fields: Arc::from(fields),
            ..self.clone()
        }
    }

    pub(crate) fn with_floor(&self, floor: Floor) -> Self {
        Self {
            floor: self.floor.raise(floor),
            ..self.clone()
        }
    }

    /// Flushes every destination, including the buffered files.
    pub fn sync(&self) {
        for core in &self.engine.cores {
            let _ = core.sink.flush();
        }
    }

    /// Stops the flush thread after a final flush. Later entries still
    /// reach the files, but only when the buffers fill or on [`sync`].
    ///
    /// [`sync`]: Logger::sync
    pub fn close(&self) {
        let mut flusher = self
            .engine
            .flusher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(mut f) = flusher.take() {
            f.stop();
        }
        for sink in &self.engine.buffered {
            let _ = sink.flush();
        }
    }

    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, &message.to_string(), &[]);
    }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, &message.to_string(), &[]);
    }

    #[track_caller]
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Level::Warn, &message.to_string(), &[]);
    }

    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, &message.to_string(), &[]);
    }

    /// Logs, then escalates with [`Escalation::Panic`].
    #[track_caller]
    pub fn panic(&self, message: impl fmt::Display) {
        self.log(Level::Panic, &message.to_string(), &[]);
    }

    /// Logs, then escalates with [`Escalation::Exit`].
    #[track_caller]
    pub fn fatal(&self, message: impl fmt::Display) {
        self.log(Level::Fatal, &message.to_string(), &[]);
    }

    #[track_caller]
    pub fn debug_kv(&self, message: &str, fields: &[(&str, Value)]) {
        self.log(Level::Debug, message, fields);
    }

    #[track_caller]
    pub fn info_kv(&self, message: &str, fields: &[(&str, Value)]) {
        self.log(Level::Info, message, fields);
    }

    #[track_caller]
    pub fn warn_kv(&self, message: &str, fields: &[(&str, Value)]) {
        self.log(Level::Warn, message, fields);
    }

    /// Logs at error with `err` appended as the `err` field.
    #[track_caller]
    pub fn error_kv(&self, err: Option<&dyn Error>, message: &str, fields: &[(&str, Value)]) {
        match err {
            Some(err) => {
                let mut all = fields.to_vec();
                all.push(("err", Value::from(err.to_string())));
                self.log(Level::Error, message, &all);
            }
            None => self.log(Level::Error, message, fields),
        }
    }

    #[track_caller]
    pub fn panic_kv(&self, message: &str, fields: &[(&str, Value)]) {
        self.log(Level::Panic, message, fields);
    }

    #[track_caller]
    pub fn fatal_kv(&self, message: &str, fields: &[(&str, Value)]) {
        self.log(Level::Fatal, message, fields);
    }

    #[track_caller]
    fn log(&self, level: Level, message: &str, fields: &[(&str, Value)]) {
        let location = Location::caller();
        self.emit(level, || Some(self.caller(location)), message, fields);
    }

    /// Writes an entry whose caller was resolved elsewhere, such as the
    /// source location of a `tracing` event.
    pub(crate) fn log_at(
        &self,
        level: Level,
        caller: Option<String>,
        message: &str,
        fields: &[(&str, Value)],
    ) {
        self.emit(level, || caller, message, fields);
    }

    fn emit(
        &self,
        level: Level,
        caller: impl FnOnce() -> Option<String>,
        message: &str,
        fields: &[(&str, Value)],
    ) {
        let engine = &self.engine;
        if self.enabled(level) {
            let caller = engine.caller.then(caller).flatten();
            let stacktrace = (engine.stacktrace && level >= Level::Panic)
                .then(|| std::backtrace::Backtrace::force_capture().to_string());
            let record = Record {
                time: Local::now(),
                level,
                caller,
                message,
                bound: &self.fields,
                fields,
                stacktrace,
            };

            let mut encoded: Vec<(Encoder, Vec<u8>)> = Vec::with_capacity(2);
            for core in engine.cores.iter().filter(|c| c.band.contains(level)) {
                let idx = match encoded.iter().position(|(e, _)| *e == core.encoder) {
                    Some(idx) => idx,
                    None => {
                        encoded.push((core.encoder, core.encoder.encode(&record)));
                        encoded.len() - 1
                    }
                };
                // A failing destination must not take the others down.
                let _ = core.sink.write_all(&encoded[idx].1);
            }
        }

        match level {
            Level::Panic => {
                self.sync();
                engine
                    .escalator
                    .escalate(Escalation::Panic(message.to_string()));
            }
            Level::Fatal => {
                self.sync();
                engine.escalator.escalate(Escalation::Exit(1));
            }
            _ => {}
        }
    }

    fn caller(&self, location: &Location<'_>) -> String {
        if self.caller_skip > 0 {
            if let Some(frame) = skipped_frame(location, self.caller_skip) {
                return frame;
            }
        }
        format!("{}:{}", location.file(), location.line())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for core in &self.cores {
            let _ = core.sink.flush();
        }
    }
}

/// Finds `location` in the current stack and returns the frame `skip`
/// levels above it. Frames are resolved one at a time and the walk stops
/// as soon as the wanted frame is known.
fn skipped_frame(location: &Location<'_>, skip: usize) -> Option<String> {
    let mut frames: Vec<(String, u32)> = Vec::new();
    let mut at = None;
    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |sym| {
            if let (Some(file), Some(line)) = (sym.filename(), sym.lineno()) {
                frames.push((file.display().to_string(), line));
            }
        });
        if at.is_none() {
            at = frames.iter().position(|(file, line)| {
                *line == location.line() && file.ends_with(location.file())
            });
        }
        !matches!(at, Some(at) if frames.len() > at + skip)
    });
    let (file, line) = frames.get(at? + skip)?;
    let cwd = std::env::current_dir().ok();
    let shown = cwd
        .as_deref()
        .and_then(|dir| Path::new(file).strip_prefix(dir).ok())
        .map_or_else(|| file.clone(), |p| p.display().to_string());
    Some(format!("{shown}:{line}"))
}

static DEFAULT: LazyLock<Mutex<Logger>> = LazyLock::new(|| Mutex::new(Logger::stdout()));

/// Replaces the process-wide logger.
pub fn init(opts: &LogOptions) -> Result<(), GroundworkError> {
    init_with(opts, [])
}

pub fn init_with(
    opts: &LogOptions,
    options: impl IntoIterator<Item = LoggerOption>,
) -> Result<(), GroundworkError> {
    let logger = Logger::with_options(opts, options)?;
    install(logger);
    Ok(())
}

/// Installs an already built logger as the process-wide default.
pub fn install(logger: Logger) {
    *DEFAULT.lock().unwrap_or_else(PoisonError::into_inner) = logger;
}

/// A handle to the process-wide logger.
#[must_use]
pub fn default() -> Logger {
    DEFAULT
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

pub fn set_level(name: &str) {
    default().set_level(name);
}

pub fn sync() {
    default().sync();
}

#[track_caller]
pub fn add_caller_skip(skip: usize) -> Logger {
    default().add_caller_skip(skip)
}

#[must_use]
pub fn with_context(ext: &Extensions) -> Logger {
    default().with_context(ext)
}

#[track_caller]
pub fn debug(message: impl fmt::Display) {
    default().debug(message);
}

#[track_caller]
pub fn info(message: impl fmt::Display) {
    default().info(message);
}

#[track_caller]
pub fn warn(message: impl fmt::Display) {
    default().warn(message);
}

#[track_caller]
pub fn error(message: impl fmt::Display) {
    default().error(message);
}

#[track_caller]
pub fn panic(message: impl fmt::Display) {
    default().panic(message);
}

#[track_caller]
pub fn fatal(message: impl fmt::Display) {
    default().fatal(message);
}

#[track_caller]
pub fn debug_kv(message: &str, fields: &[(&str, Value)]) {
    default().debug_kv(message, fields);
}

#[track_caller]
pub fn info_kv(message: &str, fields: &[(&str, Value)]) {
    default().info_kv(message, fields);
}

#[track_caller]
pub fn warn_kv(message: &str, fields: &[(&str, Value)]) {
    default().warn_kv(message, fields);
}

#[track_caller]
pub fn error_kv(err: Option<&dyn Error>, message: &str, fields: &[(&str, Value)]) {
    default().error_kv(err, message, fields);
}

#[track_caller]
pub fn panic_kv(message: &str, fields: &[(&str, Value)]) {
    default().panic_kv(message, fields);
}

#[track_caller]
pub fn fatal_kv(message: &str, fields: &[(&str, Value)]) {
    default().fatal_kv(message, fields);
}
