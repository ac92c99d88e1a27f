//! Byte stream boundary.
//!
//! The connection handler only needs ordered reads and writes, so any
//! `AsyncRead + AsyncWrite` type works: a TCP socket, a TLS session wrapped
//! around one, or an in-memory duplex pipe in tests.

use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads below this spare capacity grow the buffer first.
const READ_RESERVE: usize = 4096;

pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were appended to the buffer.
    Data(usize),
    /// The peer closed its sending side.
    Closed,
    TimedOut,
}

/// Appends whatever is available to `buf`, waiting at most `timeout`.
pub async fn read_with_timeout<S: ByteStream + ?Sized>(
    stream: &mut S,
    buf: &mut BytesMut,
    timeout: Duration,
) -> io::Result<ReadOutcome> {
    buf.reserve(READ_RESERVE);
    match tokio::time::timeout(timeout, stream.read_buf(buf)).await {
        Err(_) => Ok(ReadOutcome::TimedOut),
        Ok(Ok(0)) => Ok(ReadOutcome::Closed),
        Ok(Ok(n)) => Ok(ReadOutcome::Data(n)),
        Ok(Err(e)) => Err(e),
    }
}

/// Shuts down the write side, giving up after `timeout`.
pub async fn close<S: ByteStream + ?Sized>(stream: &mut S, timeout: Duration) {
    let _ = tokio::time::timeout(timeout, stream.shutdown()).await;
}
