//! Server lifecycle: the [`Server`] contract, the [`serve`] runner and an
//! axum-backed [`HttpServer`].
//!
//! [`serve`] starts a server in the background, waits for a shutdown
//! future (usually [`shutdown_signal`]) and then gives the server
//! [`SHUTDOWN_TIMEOUT`] to drain before returning.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::GroundworkError;
use crate::log::{self, Logger};

/// Budget granted to [`Server::graceful_stop`].
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Server: Send + Sync + 'static {
    /// Runs until stopped. A server that cannot start escalates through
    /// its logger's fatal path instead of returning an error.
    async fn run_or_die(&self);

    /// Stops accepting work and drains what is in flight, giving up at
    /// `deadline`.
    async fn graceful_stop(&self, deadline: Instant);
}

/// Runs `srv` until `shutdown` resolves, then stops it within
/// [`SHUTDOWN_TIMEOUT`]. A stop that overruns the budget is logged and
/// abandoned; it is not an error.
pub async fn serve<S, F>(srv: Arc<S>, shutdown: F) -> Result<(), GroundworkError>
where
    S: Server,
    F: Future<Output = ()> + Send,
{
    let runner = Arc::clone(&srv);
    tokio::spawn(async move { runner.run_or_die().await });

    shutdown.await;
    log::info("Shutting down server...");

    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    match tokio::time::timeout_at(deadline, srv.graceful_stop(deadline)).await {
        Ok(()) => log::info("Server exited successfully."),
        Err(_) => log::warn_kv(
            "Server did not stop before the shutdown deadline",
            &[("timeout", json!(format!("{}s", SHUTDOWN_TIMEOUT.as_secs())))],
        ),
    }
    Ok(())
}

/// An axum [`Router`] bound to one TCP address.
pub struct HttpServer {
    addr: SocketAddr,
    router: Router,
    logger: Logger,
    local_addr: OnceLock<SocketAddr>,
    stop: watch::Sender<bool>,
    stopped: watch::Sender<bool>,
}

impl HttpServer {
    #[must_use]
    pub fn new(addr: SocketAddr, router: Router, logger: Logger) -> Self {
        Self {
            addr,
            router,
            logger,
            local_addr: OnceLock::new(),
            stop: watch::Sender::new(false),
            stopped: watch::Sender::new(false),
        }
    }

    /// The bound address, once the listener is up. Differs from the
    /// configured address when that used port 0.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }
}

#[async_trait]
impl Server for HttpServer {
    async fn run_or_die(&self) {
        let listener = match TcpListener::bind(self.addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.logger
                    .fatal(format_args!("failed to listen on {}: {e}", self.addr));
                return;
            }
        };
        let bound = listener.local_addr().unwrap_or(self.addr);
        let _ = self.local_addr.set(bound);
        self.logger
            .info_kv("HTTP server listening", &[("addr", json!(bound.to_string()))]);

        let mut stop = self.stop.subscribe();
        let result = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                let _ = stop.wait_for(|stop| *stop).await;
            })
            .await;
        if let Err(e) = result {
            self.logger.error_kv(Some(&e), "HTTP server failed", &[]);
        }
        self.stopped.send_replace(true);
    }

    async fn graceful_stop(&self, deadline: Instant) {
        self.stop.send_replace(true);
        let mut stopped = self.stopped.subscribe();
        if tokio::time::timeout_at(deadline, stopped.wait_for(|done| *done))
            .await
            .is_err()
        {
            self.logger.warn("HTTP server still draining at the deadline");
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error_kv(Some(&e), "failed to install Ctrl+C handler", &[]);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error_kv(Some(&e), "failed to install SIGTERM handler", &[]);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => log::info("received Ctrl+C"),
        () = terminate => log::info("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Default)]
    struct Stubborn {
        started: AtomicBool,
        stop_called: AtomicBool,
    }

    #[async_trait]
    impl Server for Stubborn {
        async fn run_or_die(&self) {
            self.started.store(true, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }

        async fn graceful_stop(&self, _deadline: Instant) {
            self.stop_called.store(true, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_stop_is_abandoned_at_the_deadline() {
        let srv = Arc::new(Stubborn::default());
        let started = Instant::now();
        serve(Arc::clone(&srv), async {}).await.unwrap();
        assert!(srv.stop_called.load(Ordering::SeqCst));
        assert!(srv.started.load(Ordering::SeqCst));
        let elapsed = started.elapsed();
        assert!(elapsed >= SHUTDOWN_TIMEOUT);
        assert!(elapsed < SHUTDOWN_TIMEOUT + Duration::from_secs(1));
    }
}
