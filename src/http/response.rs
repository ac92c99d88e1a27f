use std::collections::VecDeque;
use std::fmt;
use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::http::headers::Headers;

/// HTTP status codes produced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 408 Request Timeout
    RequestTimeout,
    /// 411 Length Required
    LengthRequired,
    /// 413 Payload Too Large
    PayloadTooLarge,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// 505 HTTP Version Not Supported
    HttpVersionNotSupported,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RequestTimeout => 408,
            StatusCode::LengthRequired => 411,
            StatusCode::PayloadTooLarge => 413,
            StatusCode::InternalServerError => 500,
            StatusCode::NotImplemented => 501,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::HttpVersionNotSupported => 505,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::LengthRequired => "Length Required",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::HttpVersionNotSupported => "HTTP Version Not Supported",
        }
    }

    /// Statuses that never carry a message body.
    pub fn is_bodiless(&self) -> bool {
        matches!(self, StatusCode::NoContent | StatusCode::NotModified)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

/// Producer of body chunks for streamed responses.
pub enum ChunkSource {
    /// Chunks already in memory.
    Chunks(VecDeque<Bytes>),
    /// Anything readable, e.g. an open file.
    Reader {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        chunk_size: usize,
    },
    /// Chunks pushed by another task.
    Channel(mpsc::Receiver<io::Result<Bytes>>),
}

impl ChunkSource {
    pub fn from_chunks(chunks: impl IntoIterator<Item = Bytes>) -> Self {
        ChunkSource::Chunks(chunks.into_iter().collect())
    }

    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static, chunk_size: usize) -> Self {
        ChunkSource::Reader {
            reader: Box::new(reader),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Returns a source fed by the returned sender. The body ends when the
    /// sender is dropped.
    pub fn channel(capacity: usize) -> (mpsc::Sender<io::Result<Bytes>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, ChunkSource::Channel(rx))
    }

    /// Next chunk, or `None` once the source is exhausted.
    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        match self {
            ChunkSource::Chunks(chunks) => chunks.pop_front().map(Ok),
            ChunkSource::Reader { reader, chunk_size } => {
                let mut buf = BytesMut::with_capacity(*chunk_size);
                match reader.read_buf(&mut buf).await {
                    Ok(0) => None,
                    Ok(_) => Some(Ok(buf.freeze())),
                    Err(e) => Some(Err(e)),
                }
            }
            ChunkSource::Channel(rx) => rx.recv().await,
        }
    }
}

impl fmt::Debug for ChunkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkSource::Chunks(chunks) => f.debug_tuple("Chunks").field(&chunks.len()).finish(),
            ChunkSource::Reader { chunk_size, .. } => {
                f.debug_struct("Reader").field("chunk_size", chunk_size).finish()
            }
            ChunkSource::Channel(_) => f.write_str("Channel"),
        }
    }
}

/// Where a response body comes from.
#[derive(Debug, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Full(Bytes),
    /// Streamed body. With a `length` the writer emits `Content-Length` and
    /// checks the byte count; without one the body is sent chunked.
    Stream {
        length: Option<u64>,
        source: ChunkSource,
    },
}

impl ResponseBody {
    /// Declared body length, if known up front.
    pub fn length(&self) -> Option<u64> {
        match self {
            ResponseBody::Empty => Some(0),
            ResponseBody::Full(bytes) => Some(bytes.len() as u64),
            ResponseBody::Stream { length, .. } => *length,
        }
    }

    /// In-memory bytes of a `Full` body, empty otherwise.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResponseBody::Full(bytes) => &bytes[..],
            _ => &[],
        }
    }
}

/// Represents a complete HTTP response ready to be sent to a client.
///
/// Framing headers (`Content-Length`, `Transfer-Encoding`, `Connection`)
/// are decided by the writer; values set here for them are replaced.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: ResponseBody,
    /// Set by handlers that want the connection closed after this response.
    pub close: bool,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use lantern::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// assert_eq!(response.body.length(), Some(2));
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Headers,
    body: ResponseBody,
    close: bool,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: ResponseBody::Empty,
            close: false,
        }
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Sets an in-memory body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body = if body.is_empty() { ResponseBody::Empty } else { ResponseBody::Full(body) };
        self
    }

    /// Sets a streamed body of known or unknown length.
    pub fn stream(mut self, length: Option<u64>, source: ChunkSource) -> Self {
        self.body = ResponseBody::Stream { length, source };
        self
    }

    /// Asks for the connection to be closed once this response is written.
    pub fn close(mut self) -> Self {
        self.close = true;
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
            close: self.close,
        }
    }
}

impl Response {
    pub fn builder(status: StatusCode) -> ResponseBuilder {
        ResponseBuilder::new(status)
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    /// Creates a plain-text response whose body is the status line text.
    pub fn plain(status: StatusCode) -> Self {
        let body = if status.is_bodiless() { String::new() } else { format!("{}\n", status) };
        ResponseBuilder::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .build()
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::plain(StatusCode::NotFound)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::plain(StatusCode::InternalServerError)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }
}
