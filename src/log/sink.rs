//! Log destinations and the background flusher.
//!
//! Output paths (`stdout`, `stderr`, plain files) are written through
//! immediately. The two rotated files are buffered (256 KiB each) and
//! flushed by a dedicated thread once per second; the thread exits after a
//! final flush when its [`Flusher`] is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use file_rotate::compression::Compression;
use file_rotate::suffix::{AppendTimestamp, FileLimit};
use file_rotate::{ContentLimit, FileRotate};

use super::encoder::Encoder;
use super::level::Level;
use super::options::LogOptions;

pub(crate) const FILE_BUFFER_SIZE: usize = 256 * 1024;
pub(crate) const FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_SIZE_MB: u64 = 100;

/// A destination for encoded log lines.
pub trait LogSink: Send + Sync {
    fn write_all(&self, line: &[u8]) -> io::Result<()>;
    fn flush(&self) -> io::Result<()>;
}

struct Stdout;

impl LogSink for Stdout {
    fn write_all(&self, line: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(line)
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

struct Stderr;

impl LogSink for Stderr {
    fn write_all(&self, line: &[u8]) -> io::Result<()> {
        io::stderr().lock().write_all(line)
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().lock().flush()
    }
}

struct AppendFile(Mutex<File>);

impl LogSink for AppendFile {
    fn write_all(&self, line: &[u8]) -> io::Result<()> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_all(line)
    }

    fn flush(&self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).sync_data()
    }
}

/// A writer behind a fixed-size buffer; writes reach the inner writer
/// when the buffer fills or on [`LogSink::flush`].
pub(crate) struct Buffered<W: Write + Send>(Mutex<BufWriter<W>>);

impl<W: Write + Send> Buffered<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self(Mutex::new(BufWriter::with_capacity(FILE_BUFFER_SIZE, inner)))
    }
}

impl<W: Write + Send> LogSink for Buffered<W> {
    fn write_all(&self, line: &[u8]) -> io::Result<()> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_all(line)
    }

    fn flush(&self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

/// Opens one configured output path.
pub(crate) fn open_output(path: &str) -> io::Result<Arc<dyn LogSink>> {
    Ok(match path {
        "stdout" => Arc::new(Stdout),
        "stderr" => Arc::new(Stderr),
        file => {
            let f = OpenOptions::new().create(true).append(true).open(file)?;
            Arc::new(AppendFile(Mutex::new(f)))
        }
    })
}

pub(crate) fn stdout() -> Arc<dyn LogSink> {
    Arc::new(Stdout)
}

/// Opens a size-rotated, buffered file under `opts.log_dir`.
pub(crate) fn open_rotated(opts: &LogOptions, file_name: &str) -> io::Result<Arc<dyn LogSink>> {
    let dir = Path::new(&opts.log_dir);
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name);

    // Surface permission problems now rather than on the first write.
    drop(OpenOptions::new().create(true).append(true).open(&path)?);

    let max_mb = if opts.max_size == 0 {
        DEFAULT_MAX_SIZE_MB
    } else {
        opts.max_size
    };
    let max_bytes = usize::try_from(max_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX);

    let file_limit = if opts.max_backups == 0 && opts.max_age > 0 {
        FileLimit::Age(chrono::Duration::days(i64::from(opts.max_age)))
    } else if opts.max_backups == 0 {
        FileLimit::Unlimited
    } else {
        FileLimit::MaxFiles(opts.max_backups as usize)
    };

    let compression = if opts.compress {
        Compression::OnRotate(0)
    } else {
        Compression::None
    };

    let rotate = FileRotate::new(
        path,
        AppendTimestamp::default(file_limit),
        ContentLimit::BytesSurpassed(max_bytes),
        compression,
        #[cfg(unix)]
        None,
    );
    Ok(Arc::new(Buffered::new(rotate)))
}

/// Which severities a core accepts, on top of the shared minimum level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Band {
    All,
    BelowError,
    ErrorAndAbove,
}

impl Band {
    pub(crate) fn contains(self, level: Level) -> bool {
        match self {
            Self::All => true,
            Self::BelowError => level < Level::Error,
            Self::ErrorAndAbove => level >= Level::Error,
        }
    }
}

pub(crate) struct Core {
    pub encoder: Encoder,
    pub band: Band,
    pub sink: Arc<dyn LogSink>,
}

/// Periodic flush of the buffered file sinks.
pub(crate) struct Flusher {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Flusher {
    pub(crate) fn spawn(targets: Vec<Arc<dyn LogSink>>, every: Duration) -> io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("log-flush".into())
            .spawn(move || loop {
                match stopped.recv_timeout(every) {
                    Err(RecvTimeoutError::Timeout) => {
                        for target in &targets {
                            let _ = target.flush();
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        for target in &targets {
                            let _ = target.flush();
                        }
                        return;
                    }
                }
            })?;
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub(crate) fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingFlush(std::sync::atomic::AtomicUsize);

    impl LogSink for CountingFlush {
        fn write_all(&self, _line: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn flush(&self) -> io::Result<()> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn bands_split_at_error() {
        assert!(Band::BelowError.contains(Level::Warn));
        assert!(!Band::BelowError.contains(Level::Error));
        assert!(Band::ErrorAndAbove.contains(Level::Error));
        assert!(Band::ErrorAndAbove.contains(Level::Fatal));
        assert!(!Band::ErrorAndAbove.contains(Level::Info));
    }

    #[test]
    fn buffered_sink_holds_lines_until_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffered.log");
        let file = File::create(&path).unwrap();
        let sink = Buffered::new(file);
        sink.write_all(b"hello\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        sink.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn flusher_ticks_and_flushes_on_stop() {
        let counter = Arc::new(CountingFlush::default());
        let mut flusher =
            Flusher::spawn(vec![counter.clone()], Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(50));
        flusher.stop();
        assert!(!flusher.is_running());
        let after_stop = counter.0.load(std::sync::atomic::Ordering::SeqCst);
        assert!(after_stop >= 2, "expected ticks plus a final flush, got {after_stop}");
        thread::sleep(Duration::from_millis(30));
        assert_eq!(
            counter.0.load(std::sync::atomic::Ordering::SeqCst),
            after_stop
        );
    }

    #[test]
    fn rotated_file_is_created_under_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let opts = LogOptions {
            log_dir: dir.path().join("nested").display().to_string(),
            ..LogOptions::default()
        };
        let sink = open_rotated(&opts, "info.log").unwrap();
        sink.write_all(b"line\n").unwrap();
        sink.flush().unwrap();
        let content = fs::read_to_string(dir.path().join("nested/info.log")).unwrap();
        assert_eq!(content, "line\n");
    }
}
