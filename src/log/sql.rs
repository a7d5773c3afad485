//! Query logging adapter for the MySQL store.

use std::error::Error;
use std::time::{Duration, Instant};

use super::encoder::millis;
use super::level::{Floor, Level};
use super::Logger;
use crate::db::{QueryLogger, SqlLogLevel};

/// Statements slower than this are logged at warn.
pub const SLOW_THRESHOLD: Duration = Duration::from_millis(200);

/// Routes store messages and per-statement traces into a [`Logger`].
#[derive(Clone)]
pub struct SqlLogger {
    logger: Logger,
}

impl SqlLogger {
    #[must_use]
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

fn rows_text(rows: i64) -> String {
    if rows == -1 {
        "-".to_string()
    } else {
        rows.to_string()
    }
}

impl QueryLogger for SqlLogger {
    fn log_mode(&self, level: SqlLogLevel) -> Box<dyn QueryLogger> {
        let floor = match level {
            SqlLogLevel::Silent => Floor::Silent,
            SqlLogLevel::Error => Floor::At(Level::Error),
            SqlLogLevel::Warn => Floor::At(Level::Warn),
            SqlLogLevel::Info => Floor::At(Level::Info),
            SqlLogLevel::Debug => Floor::Open,
        };
        Box::new(Self {
            logger: self.logger.with_floor(floor),
        })
    }

    fn info(&self, message: &str) {
        self.logger.info(format_args!("[info] {message}"));
    }

    fn warn(&self, message: &str) {
        self.logger.warn(format_args!("[warn] {message}"));
    }

    fn error(&self, message: &str) {
        self.logger.error(format_args!("[error] {message}"));
    }

    fn trace(
        &self,
        begin: Instant,
        statement: &dyn Fn() -> (String, i64),
        err: Option<&dyn Error>,
    ) {
        let elapsed = begin.elapsed();
        let elapsed_ms = millis(elapsed);
        let ms = elapsed_ms.as_f64().unwrap_or_default();
        let (sql, rows) = statement();
        let rows = rows_text(rows);
        let logger = self.logger.add_caller_skip(1);
        let fields = [("elapsed_ms", elapsed_ms)];

        if let Some(err) = err {
            logger.error_kv(None, &format!("{err} [{ms:.3}ms] [rows:{rows}] {sql}"), &fields);
        } else if elapsed > SLOW_THRESHOLD {
            logger.warn_kv(
                &format!(
                    "SLOW SQL >= {}ms [{ms:.3}ms] [rows:{rows}] {sql}",
                    SLOW_THRESHOLD.as_millis()
                ),
                &fields,
            );
        } else {
            logger.info_kv(&format!("[{ms:.3}ms] [rows:{rows}] {sql}"), &fields);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use super::*;
    use crate::log::tests::Capture;
    use crate::log::{LogOptions, LoggerOption};

    fn sql_logger(level: &str) -> (SqlLogger, Arc<Capture>) {
        let capture = Arc::new(Capture::default());
        let opts = LogOptions {
            level: level.into(),
            format: "json".into(),
            output_paths: Vec::new(),
            ..LogOptions::default()
        };
        let logger =
            Logger::with_options(&opts, [LoggerOption::Sink(capture.clone())]).unwrap();
        (SqlLogger::new(logger), capture)
    }

    fn earlier(ms: u64) -> Instant {
        Instant::now()
            .checked_sub(Duration::from_millis(ms))
            .unwrap_or_else(Instant::now)
    }

    #[test]
    fn fast_statement_is_info_with_rows() {
        let (sql, capture) = sql_logger("debug");
        sql.trace(earlier(50), &|| (String::from("SELECT 1"), 3), None);
        let lines = capture.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "info");
        let message = lines[0]["message"].as_str().unwrap();
        assert!(message.contains("[rows:3] SELECT 1"), "{message}");
        assert!(lines[0]["elapsed_ms"].as_f64().unwrap() >= 50.0);
    }

    #[test]
    fn unknown_row_count_renders_as_dash() {
        let (sql, capture) = sql_logger("debug");
        sql.trace(earlier(50), &|| (String::from("UPDATE t"), -1), None);
        let message = capture.json_lines()[0]["message"].as_str().unwrap().to_string();
        assert!(message.contains("[rows:-]"), "{message}");
    }

    #[test]
    fn slow_statement_is_warn() {
        let (sql, capture) = sql_logger("debug");
        sql.trace(earlier(250), &|| (String::from("SELECT sleep(1)"), 1), None);
        let lines = capture.json_lines();
        assert_eq!(lines[0]["level"], "warn");
        assert!(lines[0]["message"]
            .as_str()
            .unwrap()
            .starts_with("SLOW SQL >= 200ms"));
    }

    #[test]
    fn failed_statement_is_error_regardless_of_elapsed() {
        let (sql, capture) = sql_logger("debug");
        let err = io::Error::other("duplicate key");
        sql.trace(earlier(1), &|| (String::from("INSERT"), 0), Some(&err));
        sql.trace(earlier(300), &|| (String::from("INSERT"), 0), Some(&err));
        let lines = capture.json_lines();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert_eq!(line["level"], "error");
            assert!(line["message"].as_str().unwrap().starts_with("duplicate key"));
        }
    }

    #[test]
    fn silent_mode_suppresses_everything_and_leaves_receiver_alone() {
        let (sql, capture) = sql_logger("debug");
        let silent = sql.log_mode(SqlLogLevel::Silent);
        let err = io::Error::other("boom");
        silent.trace(earlier(1), &|| (String::from("SELECT"), 1), Some(&err));
        silent.error("hidden");
        assert!(capture.json_lines().is_empty());

        sql.info("visible");
        let lines = capture.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "[info] visible");
    }

    #[test]
    fn warn_mode_raises_floor() {
        let (sql, capture) = sql_logger("debug");
        let warn = sql.log_mode(SqlLogLevel::from(3));
        warn.trace(earlier(1), &|| (String::from("SELECT"), 1), None);
        warn.warn("kept");
        let lines = capture.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "[warn] kept");
    }

    #[test]
    fn error_mode_keeps_only_failures() {
        let (sql, capture) = sql_logger("debug");
        let errors = sql.log_mode(SqlLogLevel::from(2));
        let err = io::Error::other("deadlock");
        errors.trace(earlier(1), &|| (String::from("SELECT"), 1), None);
        errors.trace(earlier(250), &|| (String::from("SELECT"), 1), None);
        errors.warn("dropped");
        errors.trace(earlier(1), &|| (String::from("UPDATE t"), 0), Some(&err));
        let lines = capture.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["level"], "error");
        assert!(lines[0]["message"].as_str().unwrap().starts_with("deadlock"));
    }

    #[test]
    fn info_mode_keeps_statements_but_not_debug() {
        let (sql, capture) = sql_logger("debug");
        let info = sql.log_mode(SqlLogLevel::from(4));
        info.trace(earlier(1), &|| (String::from("SELECT 1"), 1), None);
        info.info("kept");
        sql.logger().with_floor(Floor::At(Level::Info)).debug("dropped");
        let lines = capture.json_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "info");
        assert_eq!(lines[1]["message"], "[info] kept");
    }

    #[test]
    fn debug_mode_keeps_engine_level() {
        let (sql, capture) = sql_logger("warn");
        let debug = sql.log_mode(SqlLogLevel::Debug);
        debug.info("dropped by the engine level");
        assert!(capture.json_lines().is_empty());
    }
}
