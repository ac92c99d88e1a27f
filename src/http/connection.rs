use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use tracing::{debug, info};

use crate::error::HttpError;
use crate::http::parser::{ParseError, ParseStatus, ParserLimits, Phase, RequestParser};
use crate::http::request::{Method, Request, Version};
use crate::http::response::{Response, StatusCode};
use crate::http::stream::{self, ByteStream, ReadOutcome};
use crate::http::writer::{ResponseWriter, WriteOptions};
use crate::router::normalize_path;
use crate::server::shutdown::ShutdownListener;
use crate::server::ServerContext;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
const SERVER_METHODS: &str = "GET, HEAD, POST, PUT, DELETE, OPTIONS";

/// Per-connection bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub parser: ParserLimits,
    /// How long a read or write may stall before the connection is dropped.
    pub idle_timeout: Duration,
    pub max_requests: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            parser: ParserLimits::default(),
            idle_timeout: Duration::from_secs(30),
            max_requests: 1000,
        }
    }
}

pub enum ConnectionState {
    /// Nothing of the next request has arrived yet.
    AwaitingRequest,
    ParsingHeaders,
    ParsingBody,
    Dispatching(Request),
    WritingResponse(PendingResponse),
    Closing,
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::AwaitingRequest => "AwaitingRequest",
            ConnectionState::ParsingHeaders => "ParsingHeaders",
            ConnectionState::ParsingBody => "ParsingBody",
            ConnectionState::Dispatching(_) => "Dispatching",
            ConnectionState::WritingResponse(_) => "WritingResponse",
            ConnectionState::Closing => "Closing",
        };
        f.write_str(name)
    }
}

/// A response waiting to be written, with what the log line needs.
pub struct PendingResponse {
    response: Response,
    version: Version,
    head_only: bool,
    keep_alive: bool,
    method: String,
    path: String,
    started: Instant,
}

/// Drives one client connection until it closes.
///
/// Requests on a connection are handled strictly one at a time, so
/// pipelined requests are answered in the order they arrived.
pub struct Connection<S> {
    stream: S,
    peer: String,
    buffer: BytesMut,
    parser: RequestParser,
    state: ConnectionState,
    ctx: Arc<ServerContext>,
    shutdown: ShutdownListener,
    idle_deadline: Instant,
    requests_served: usize,
    keep_alive: bool,
}

impl<S: ByteStream> Connection<S> {
    pub fn new(stream: S, peer: impl Into<String>, ctx: Arc<ServerContext>, shutdown: ShutdownListener) -> Self {
        let limits = ctx.limits;
        Self {
            stream,
            peer: peer.into(),
            buffer: BytesMut::with_capacity(4096),
            parser: RequestParser::new(limits.parser),
            state: ConnectionState::AwaitingRequest,
            ctx,
            shutdown,
            idle_deadline: Instant::now() + limits.idle_timeout,
            requests_served: 0,
            keep_alive: true,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn requests_served(&self) -> usize {
        self.requests_served
    }

    /// Runs the state machine. Transport failures end the connection with
    /// an error; protocol failures are answered and end it cleanly.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closing);
            self.state = match state {
                ConnectionState::AwaitingRequest
                | ConnectionState::ParsingHeaders
                | ConnectionState::ParsingBody => self.read_request().await?,
                ConnectionState::Dispatching(request) => self.dispatch(request).await,
                ConnectionState::WritingResponse(pending) => self.write_response(pending).await?,
                ConnectionState::Closing => break,
            };
        }

        debug!(client = %self.peer, requests = self.requests_served, "closing connection");
        stream::close(&mut self.stream, CLOSE_TIMEOUT).await;
        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<ConnectionState> {
        loop {
            if !self.buffer.is_empty() {
                match self.parser.parse(&self.buffer) {
                    Ok(ParseStatus::Complete { request, consumed }) => {
                        self.buffer.advance(consumed);
                        return Ok(ConnectionState::Dispatching(request));
                    }
                    Ok(ParseStatus::Partial) => {}
                    Err(ParseError::UnsupportedMethod { method, consumed, keep_alive }) => {
                        // The message was fully framed, so the stream stays usable.
                        self.buffer.advance(consumed);
                        self.requests_served += 1;
                        let error = HttpError::UnsupportedMethod(method.clone());
                        return Ok(ConnectionState::WritingResponse(self.error_response(
                            error,
                            keep_alive,
                            method,
                            Instant::now(),
                        )));
                    }
                    Err(e) => {
                        debug!(client = %self.peer, error = %e, "rejecting malformed request");
                        self.parser.reset();
                        self.buffer.clear();
                        return Ok(ConnectionState::WritingResponse(self.error_response(
                            e.into(),
                            false,
                            "-".to_string(),
                            Instant::now(),
                        )));
                    }
                }
            }

            // Blank lines ahead of a request line do not start a request.
            let fresh = self.buffer.iter().all(|b| matches!(b, b'\r' | b'\n'));
            let waiting = if fresh {
                ConnectionState::AwaitingRequest
            } else {
                match self.parser.phase() {
                    Phase::Head => ConnectionState::ParsingHeaders,
                    Phase::Body => ConnectionState::ParsingBody,
                }
            };
            tracing::trace!(client = %self.peer, state = ?waiting, buffered = self.buffer.len(), "waiting for data");

            let remaining = self.idle_deadline.saturating_duration_since(Instant::now());
            let read = stream::read_with_timeout(&mut self.stream, &mut self.buffer, remaining);
            let outcome = if fresh {
                // Between requests a drain closes the connection right away.
                tokio::select! {
                    outcome = read => outcome?,
                    _ = self.shutdown.wait() => {
                        debug!(client = %self.peer, "closing idle connection for shutdown");
                        return Ok(ConnectionState::Closing);
                    }
                }
            } else {
                read.await?
            };

            match outcome {
                ReadOutcome::Data(_) => self.touch(),
                ReadOutcome::Closed => {
                    if !fresh {
                        debug!(client = %self.peer, buffered = self.buffer.len(), "client closed mid-request");
                    }
                    return Ok(ConnectionState::Closing);
                }
                ReadOutcome::TimedOut if fresh => {
                    debug!(client = %self.peer, "idle timeout");
                    return Ok(ConnectionState::Closing);
                }
                ReadOutcome::TimedOut => {
                    debug!(client = %self.peer, "timed out waiting for the rest of a request");
                    self.buffer.clear();
                    self.parser.reset();
                    return Ok(ConnectionState::WritingResponse(self.error_response(
                        HttpError::IdleTimeout,
                        false,
                        "-".to_string(),
                        Instant::now(),
                    )));
                }
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> ConnectionState {
        let started = Instant::now();
        self.requests_served += 1;

        let ctx = Arc::clone(&self.ctx);
        let result = match normalize_path(&request.path) {
            // OPTIONS * asks about the server as a whole.
            Ok(path) if path == "*" => Ok(Response::builder(StatusCode::Ok)
                .header("Allow", SERVER_METHODS)
                .build()),
            Ok(path) => {
                let (handler, route) = ctx.router.resolve(request.method, &path);
                handler.call(&request, &route).await
            }
            Err(e) => Err(e.into()),
        };

        let (response, error_closes) = match result {
            Ok(response) => (response, false),
            Err(e) => {
                if e.status() == StatusCode::InternalServerError {
                    tracing::error!(client = %self.peer, path = %request.path, error = %e, "handler failed");
                } else {
                    debug!(client = %self.peer, path = %request.path, error = %e, "request rejected");
                }
                (e.to_response(), e.closes_connection())
            }
        };

        let keep_alive = request.keep_alive() && !response.close && !error_closes && self.may_continue();
        ConnectionState::WritingResponse(PendingResponse {
            response,
            version: request.version,
            head_only: request.method == Method::HEAD,
            keep_alive,
            method: request.method.as_str().to_string(),
            path: request.path,
            started,
        })
    }

    async fn write_response(&mut self, pending: PendingResponse) -> anyhow::Result<ConnectionState> {
        let PendingResponse {
            response,
            version,
            head_only,
            keep_alive,
            method,
            path,
            started,
        } = pending;
        let status = response.status;

        let mut writer = ResponseWriter::new(response, WriteOptions { keep_alive, head_only, version });
        let idle = Some(self.ctx.limits.idle_timeout);
        let written = match writer.write_with_idle_timeout(&mut self.stream, idle).await {
            Ok(written) => written,
            Err(e) => {
                debug!(client = %self.peer, status = status.as_u16(), error = %e, "failed to write response");
                return Err(e);
            }
        };
        self.touch();

        info!(
            client = %self.peer,
            method = %method,
            path = %path,
            status = status.as_u16(),
            bytes = written,
            duration_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );

        self.keep_alive = writer.keep_alive();
        Ok(if self.keep_alive {
            ConnectionState::AwaitingRequest
        } else {
            ConnectionState::Closing
        })
    }

    fn error_response(&self, error: HttpError, keep_alive: bool, method: String, started: Instant) -> PendingResponse {
        let keep_alive = keep_alive && !error.closes_connection() && self.may_continue();
        PendingResponse {
            response: error.to_response(),
            version: Version::Http11,
            head_only: false,
            keep_alive,
            method,
            path: "-".to_string(),
            started,
        }
    }

    fn may_continue(&self) -> bool {
        self.requests_served < self.ctx.limits.max_requests && !self.shutdown.is_triggered()
    }

    fn touch(&mut self) {
        self.idle_deadline = Instant::now() + self.ctx.limits.idle_timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{handler_fn, Router};
    use crate::server::shutdown::Shutdown;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn context(limits: ConnectionLimits) -> Arc<ServerContext> {
        let router = Router::new().get("/", handler_fn(|_, _| Ok(Response::ok("root"))));
        Arc::new(ServerContext::new(router, limits))
    }

    #[tokio::test]
    async fn http10_without_keep_alive_closes() {
        let (mut client, server) = tokio::io::duplex(4096);
        let shutdown = Shutdown::new();
        let mut conn = Connection::new(server, "test", context(ConnectionLimits::default()), shutdown.subscribe());
        let task = tokio::spawn(async move { conn.run().await });

        client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("root"));
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn request_cap_closes_after_last_allowed() {
        let limits = ConnectionLimits {
            max_requests: 2,
            ..ConnectionLimits::default()
        };
        let (mut client, server) = tokio::io::duplex(4096);
        let shutdown = Shutdown::new();
        let mut conn = Connection::new(server, "test", context(limits), shutdown.subscribe());
        let task = tokio::spawn(async move { conn.run().await });

        client
            .write_all(b"GET / HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("HTTP/1.1 200 OK").count(), 2);
        assert!(text.contains("Connection: close\r\n"));
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn tracks_requests_and_ends_in_closing() {
        let (mut client, server) = tokio::io::duplex(4096);
        let shutdown = Shutdown::new();
        let mut conn = Connection::new(server, "test", context(ConnectionLimits::default()), shutdown.subscribe());
        assert!(matches!(conn.state(), ConnectionState::AwaitingRequest));

        client
            .write_all(b"GET / HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut out = Vec::new();
        let (result, read) = tokio::join!(conn.run(), client.read_to_end(&mut out));
        result.unwrap();
        read.unwrap();

        assert_eq!(conn.requests_served(), 2);
        assert!(matches!(conn.state(), ConnectionState::Closing));
        assert_eq!(String::from_utf8(out).unwrap().matches("HTTP/1.1 200 OK").count(), 2);
    }
}
