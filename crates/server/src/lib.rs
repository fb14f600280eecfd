#![forbid(unsafe_code)]

//! HTTP service exposing a [`LinkStore`] under `/api/versioneditem/{parentId}`.

mod auth;
mod http;
mod routes;

pub use auth::{AuthError, BearerAuth, sign_hs256};

use http::{ReadOutcome, read_request, write_api_error, write_response};
use routes::Router;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use vil_storage::LinkStore;

pub const DEFAULT_PORT: u16 = 7314;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub jwt_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            jwt_secret: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub struct LinkServer {
    listener: TcpListener,
    router: Arc<Router>,
}

impl LinkServer {
    pub fn bind(config: &ServerConfig, store: Arc<dyn LinkStore>) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", config.bind, config.port);
        let listener = TcpListener::bind(addr.as_str())
            .map_err(|source| ServerError::Bind { addr, source })?;
        let auth = BearerAuth::new(config.jwt_secret.as_deref());
        Ok(Self {
            listener,
            router: Arc::new(Router::new(store, auth)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` is set; each connection is served on its own thread.
    pub fn run(self, shutdown: Arc<AtomicBool>) -> Result<(), ServerError> {
        self.listener.set_nonblocking(true)?;
        while !shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let router = Arc::clone(&self.router);
                    std::thread::spawn(move || {
                        if let Err(err) = handle_connection(stream, &router) {
                            tracing::debug!(%peer, error = %err, "connection dropped");
                        }
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(25));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                }
            }
        }
        Ok(())
    }

    /// Runs the accept loop on a background thread.
    pub fn spawn(self) -> Result<ServerHandle, ServerError> {
        let addr = self.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let thread = std::thread::spawn(move || self.run(flag));
        Ok(ServerHandle {
            addr,
            shutdown,
            thread: Some(thread),
        })
    }
}

pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), ServerError>>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn shutdown(mut self) -> Result<(), ServerError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), ServerError> {
        self.shutdown.store(true, Ordering::Relaxed);
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or(Ok(())),
            None => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, router: &Router) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let started = Instant::now();
    let request = match read_request(&mut stream)? {
        ReadOutcome::Request(request) => request,
        ReadOutcome::TooLarge => {
            tracing::info!(status = 413, "request body too large");
            return write_api_error(
                &mut stream,
                "413 Payload Too Large",
                "PAYLOAD_TOO_LARGE",
                "Request body exceeds 64 KiB.",
            );
        }
        ReadOutcome::Incomplete { expected, received } => {
            tracing::info!(status = 400, expected, received, "request body truncated");
            return write_api_error(
                &mut stream,
                "400 Bad Request",
                "INCOMPLETE_BODY",
                "Request body is shorter than Content-Length.",
            );
        }
        ReadOutcome::Closed => return Ok(()),
    };

    let response = router.handle(&request);
    tracing::info!(
        method = %request.method,
        path = %http::normalize_path(&request.target),
        status = response.status_code(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    write_response(
        &mut stream,
        response.status,
        response.content_type,
        &response.body,
    )
}
