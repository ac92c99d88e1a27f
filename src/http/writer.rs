use std::future::Future;
use std::time::{Duration, SystemTime};

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::chunked::{encode_chunk, encode_last_chunk};
use crate::http::headers::Headers;
use crate::http::request::Version;
use crate::http::response::{Response, ResponseBody, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";
const SERVER_NAME: &str = concat!("lantern/", env!("CARGO_PKG_VERSION"));

/// Headers the writer owns; handler-provided values are dropped.
const FRAMING_HEADERS: [&str; 4] = ["Content-Length", "Transfer-Encoding", "Connection", "Keep-Alive"];

/// Per-response facts decided by the connection.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Whether the connection intends to stay open afterwards.
    pub keep_alive: bool,
    /// Response to a HEAD request: headers only.
    pub head_only: bool,
    /// Version of the request being answered.
    pub version: Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// 1xx/204/304: no body, no length.
    None,
    Length(u64),
    Chunked,
    /// HTTP/1.0 peer and unknown length: body ends when the connection does.
    CloseDelimited,
}

/// Serializes the status line and header block.
pub fn serialize_head(status: StatusCode, headers: &Headers, framing_header: Option<(&str, String)>, keep_alive: bool) -> BytesMut {
    let mut buf = BytesMut::with_capacity(256);

    buf.put_slice(
        format!("{} {} {}\r\n", HTTP_VERSION, status.as_u16(), status.reason_phrase()).as_bytes(),
    );

    if !headers.contains("Date") {
        put_header(&mut buf, "Date", &httpdate::fmt_http_date(SystemTime::now()));
    }
    if !headers.contains("Server") {
        put_header(&mut buf, "Server", SERVER_NAME);
    }
    for (k, v) in headers.iter() {
        if FRAMING_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(k)) {
            continue;
        }
        put_header(&mut buf, k, v);
    }
    if let Some((name, value)) = framing_header {
        put_header(&mut buf, name, &value);
    }
    put_header(&mut buf, "Connection", if keep_alive { "keep-alive" } else { "close" });

    // Header/body separator
    buf.put_slice(b"\r\n");
    buf
}

fn put_header(buf: &mut BytesMut, name: &str, value: &str) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_slice(b"\r\n");
}

/// Writes one response onto a byte stream.
///
/// Any failure leaves the stream in an unknown state; the caller must close
/// the connection instead of trying to recover.
pub struct ResponseWriter {
    head: BytesMut,
    body: ResponseBody,
    framing: Framing,
    head_only: bool,
    keep_alive: bool,
}

impl ResponseWriter {
    pub fn new(response: Response, opts: WriteOptions) -> Self {
        let Response { status, headers, body, .. } = response;

        let framing = if status.is_bodiless() {
            Framing::None
        } else {
            match body.length() {
                Some(len) => Framing::Length(len),
                None if opts.version == Version::Http10 => Framing::CloseDelimited,
                None => Framing::Chunked,
            }
        };
        // A close-delimited body only ends when we hang up.
        let keep_alive = opts.keep_alive && framing != Framing::CloseDelimited;

        let framing_header = match framing {
            Framing::Length(len) => Some(("Content-Length", len.to_string())),
            Framing::Chunked => Some(("Transfer-Encoding", "chunked".to_string())),
            Framing::None | Framing::CloseDelimited => None,
        };

        Self {
            head: serialize_head(status, &headers, framing_header, keep_alive),
            body,
            framing,
            head_only: opts.head_only,
            keep_alive,
        }
    }

    /// The keep-alive decision announced in the `Connection` header.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Writes the whole response and returns the number of body bytes sent.
    pub async fn write_to_stream<W: AsyncWrite + Unpin>(&mut self, stream: &mut W) -> anyhow::Result<u64> {
        self.write_with_idle_timeout(stream, None).await
    }

    /// Like [`write_to_stream`](Self::write_to_stream), but every single write
    /// and every wait for the next body chunk must finish within `idle`.
    /// Progress resets the clock, so a slow body is fine as long as it moves.
    pub async fn write_with_idle_timeout<W: AsyncWrite + Unpin>(
        &mut self,
        stream: &mut W,
        idle: Option<Duration>,
    ) -> anyhow::Result<u64> {
        within(idle, "writing response head", stream.write_all(&self.head)).await??;

        let body = std::mem::take(&mut self.body);
        let written = if self.head_only || self.framing == Framing::None {
            0
        } else {
            match body {
                ResponseBody::Empty => 0,
                ResponseBody::Full(bytes) => {
                    within(idle, "writing response body", stream.write_all(&bytes)).await??;
                    bytes.len() as u64
                }
                ResponseBody::Stream { mut source, .. } => {
                    let mut written = 0u64;
                    let mut frame = BytesMut::new();
                    while let Some(chunk) = within(idle, "waiting for body data", source.next_chunk()).await? {
                        let chunk = chunk?;
                        written += chunk.len() as u64;
                        match self.framing {
                            Framing::Chunked => {
                                frame.clear();
                                encode_chunk(&chunk, &mut frame);
                                within(idle, "writing response body", stream.write_all(&frame)).await??;
                            }
                            Framing::Length(len) if written > len => {
                                anyhow::bail!("stream produced more than the declared {} bytes", len);
                            }
                            _ => within(idle, "writing response body", stream.write_all(&chunk)).await??,
                        }
                    }
                    match self.framing {
                        Framing::Chunked => {
                            frame.clear();
                            encode_last_chunk(&mut frame);
                            within(idle, "writing response body", stream.write_all(&frame)).await??;
                        }
                        Framing::Length(len) if written != len => {
                            anyhow::bail!("stream ended after {} of {} declared bytes", written, len);
                        }
                        _ => {}
                    }
                    written
                }
            }
        };

        within(idle, "flushing response", stream.flush()).await??;
        Ok(written)
    }
}

async fn within<T>(idle: Option<Duration>, what: &str, step: impl Future<Output = T>) -> anyhow::Result<T> {
    match idle {
        Some(limit) => tokio::time::timeout(limit, step)
            .await
            .map_err(|_| anyhow::anyhow!("timed out {}", what)),
        None => Ok(step.await),
    }
}
