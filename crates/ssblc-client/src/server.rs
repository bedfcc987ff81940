use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

use axum::Router;
use ssblc_core::error::AppError;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Router serving the files under `dir`.
///
/// Directory requests fall back to their `index.html`, unknown paths
/// answer 404.
pub fn router(dir: impl AsRef<Path>) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(dir.as_ref()))
        .layer(TraceLayer::new_for_http())
}

/// Static file server for the site under test, running on background tasks.
///
/// The server listens on both loopback addresses so `localhost` reaches it
/// whichever family it resolves to. It is ready to accept connections as
/// soon as [`start`](Self::start) returns and keeps running until
/// [`shutdown`](Self::shutdown).
pub struct StaticServer {
    port: u16,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<Result<(), std::io::Error>>>,
}

impl StaticServer {
    /// Bind `127.0.0.1:<port>` and `[::1]:<port>` and start serving `dir`.
    ///
    /// A port that is already bound on either address yields
    /// [`AppError::PortInUse`]. Hosts without IPv6 are served on IPv4 only.
    pub async fn start(dir: impl AsRef<Path>, port: u16) -> Result<Self, AppError> {
        let v4 = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|e| bind_error(port, e))?;
        let port = v4
            .local_addr()
            .map_err(|e| AppError::ServerError(e.to_string()))?
            .port();

        let mut listeners = vec![v4];
        match TcpListener::bind((Ipv6Addr::LOCALHOST, port)).await {
            Ok(v6) => listeners.push(v6),
            Err(e) if e.kind() == ErrorKind::AddrInUse => return Err(AppError::PortInUse(port)),
            Err(e) => tracing::debug!("IPv6 loopback unavailable, serving IPv4 only: {e}"),
        }

        let cancel = CancellationToken::new();
        let app = router(dir);

        let handles = listeners
            .into_iter()
            .map(|listener| {
                let shutdown = cancel.clone();
                let app = app.clone();
                tokio::spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move { shutdown.cancelled().await })
                        .await
                })
            })
            .collect();

        tracing::info!("Running at {} ...", base_url(port));

        Ok(Self {
            port,
            cancel,
            handles,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://localhost:<port>`, without trailing slash.
    pub fn base_url(&self) -> String {
        base_url(self.port)
    }

    /// Stop accepting connections and wait for the server tasks to finish.
    pub async fn shutdown(self) -> Result<(), AppError> {
        self.cancel.cancel();
        for handle in self.handles {
            match handle.await {
                Ok(result) => result.map_err(|e| AppError::ServerError(e.to_string()))?,
                Err(e) => return Err(AppError::ServerError(format!("Server task failed: {e}"))),
            }
        }
        Ok(())
    }
}

fn bind_error(port: u16, e: std::io::Error) -> AppError {
    match e.kind() {
        ErrorKind::AddrInUse => AppError::PortInUse(port),
        _ => AppError::ServerError(format!("Failed to bind port {port}: {e}")),
    }
}

fn base_url(port: u16) -> String {
    format!("http://localhost:{port}")
}
