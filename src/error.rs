//! Unified error types for groundwork.
//!
//! Defines [`GroundworkError`] (the main crate error enum) and
//! [`ValidationError`] for option validation failures. Both use
//! `thiserror` for `Display` and `Error` derives. HTTP-facing failures
//! are not modeled here; they use [`ErrorX`](crate::errorsx::ErrorX).

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GroundworkError {
    #[error("Options file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Options parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Options validation failed:\n{}", format_errors(.errors))]
    OptionsValidation { errors: Vec<ValidationError> },

    #[error("Unsupported options format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Database error ({backend}): {source}")]
    Database {
        backend: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to build logger: {source}")]
    LoggerBuild {
        #[source]
        source: std::io::Error,
    },
}

impl GroundworkError {
    pub(crate) fn mysql(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Database {
            backend: "mysql",
            source: Box::new(source),
        }
    }

    pub(crate) fn redis(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Database {
            backend: "redis",
            source: Box::new(source),
        }
    }
}
