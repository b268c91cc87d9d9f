//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and hands HTTP/1.1 requests to a handler function.
//! Connections are persistent (keep-alive) unless the client asks otherwise.
//! [`Server::serve`] runs an [`Engine`] and serves its static files.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::engine::{Engine, NOT_FOUND_BODY, Reply};
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The FastTrack HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use fasttrack::config::Config;
/// use fasttrack::engine::Engine;
/// use fasttrack::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::load("fasttrack.toml".as_ref())?;
///     let bind_address = config.server.bind_address.clone();
///     let engine = Engine::builder(config).build()?;
///
///     Server::bind(&bind_address).await?.serve(Arc::new(engine)).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
            addr: addr.to_owned(),
            source: e,
        })?;
        let local_addr = listener.local_addr()?;
        Ok(Self { listener, local_addr })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run `engine` until the process is terminated.
    ///
    /// Each request is dispatched on Tokio's blocking pool, since controllers
    /// and the file system template loader do synchronous work.
    /// [`Reply::StaticFile`] outcomes are read from disk here, with a content
    /// type guessed from the file extension.
    pub async fn serve(self, engine: Arc<Engine>) -> Result<(), ServerError> {
        self.run(move |request: Request| {
            let engine = Arc::clone(&engine);
            async move {
                // Controllers and template reads block; keep them off the reactor.
                let reply = tokio::task::spawn_blocking(move || engine.handle(&request)).await;
                match reply {
                    Ok(Reply::Response(response)) => response,
                    Ok(Reply::StaticFile(file)) => static_file(&file).await,
                    Err(e) => {
                        error!(error = %e, "request handler panicked");
                        Response::text(StatusCode::InternalServerError, StatusCode::InternalServerError.canonical_reason())
                    }
                }
            }
        })
        .await
    }

    /// Starts accepting connections and passing requests to `handler`.
    ///
    /// The handler is shared across all spawned Tokio tasks, so it must be
    /// `Send + Sync + 'static`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "fasttrack listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Serves requests from one connection until the peer closes it or a
/// request asks for `Connection: close`.
async fn handle_connection<H, F>(mut stream: TcpStream, peer_addr: SocketAddr, handler: Arc<H>) -> io::Result<()>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Pipelined requests may already be buffered; only read when the
        // buffer does not hold a complete one.
        let parsed = if buf.is_empty() {
            Err(RequestError::Incomplete)
        } else {
            Request::parse(&buf)
        };

        let (request, body_offset) = match parsed {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => {
                if buf.len() > MAX_REQUEST_SIZE {
                    return reject(&mut stream, peer_addr, StatusCode::PayloadTooLarge, "Request entity too large").await;
                }
                if stream.read_buf(&mut buf).await? == 0 {
                    debug!(peer = %peer_addr, "connection closed by peer");
                    return Ok(());
                }
                continue;
            }
            Err(RequestError::BodyTooLarge { .. }) => {
                return reject(&mut stream, peer_addr, StatusCode::PayloadTooLarge, "Request entity too large").await;
            }
            Err(e) => {
                return reject(&mut stream, peer_addr, StatusCode::BadRequest, &format!("Bad Request: {e}")).await;
            }
        };

        let total_needed = body_offset
            .checked_add(request.content_length().unwrap_or(0))
            .unwrap_or(usize::MAX);
        if total_needed > MAX_REQUEST_SIZE {
            return reject(&mut stream, peer_addr, StatusCode::PayloadTooLarge, "Request entity too large").await;
        }
        if buf.len() < total_needed {
            if stream.read_buf(&mut buf).await? == 0 {
                debug!(peer = %peer_addr, "connection closed mid-body");
                return Ok(());
            }
            continue;
        }

        let keep_alive = request.is_keep_alive();
        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "handling request"
        );

        let response = handler(request).await.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        let _ = buf.split_to(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close, shutting down");
            return Ok(());
        }
    }
}

async fn reject(stream: &mut TcpStream, peer_addr: SocketAddr, status: StatusCode, message: &str) -> io::Result<()> {
    warn!(peer = %peer_addr, %status, reason = message, "rejecting request");
    let response = Response::text(status, message).keep_alive(false);
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await
}

async fn static_file(file: &Path) -> Response {
    match tokio::fs::read(file).await {
        Ok(bytes) => Response::new(StatusCode::Ok)
            .header("Content-Type", content_type(file))
            .body_bytes(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(file = %file.display(), "static file vanished");
            Response::text(StatusCode::NotFound, NOT_FOUND_BODY)
        }
        Err(e) => {
            error!(file = %file.display(), error = %e, "failed to read static file");
            Response::text(StatusCode::InternalServerError, StatusCode::InternalServerError.canonical_reason())
        }
    }
}

/// Guess a content type from the file extension.
fn content_type(file: &Path) -> &'static str {
    let extension = file
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
