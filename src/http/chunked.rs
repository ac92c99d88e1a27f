//! Chunked transfer coding.
//!
//! [`ChunkedDecoder`] is resumable: it is fed the whole body region seen so
//! far on every call and remembers how much of it has already been decoded,
//! so a body split across any number of reads decodes to the same chunks.

use bytes::{BufMut, Bytes, BytesMut};

use crate::http::headers::Headers;
use crate::http::parser::{parse_header_line, ParseError};

/// Longest accepted chunk-size line, extensions included.
const MAX_CHUNK_LINE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data { size: usize },
    Trailer,
    Done,
}

#[derive(Debug, Clone)]
pub struct ChunkedDecoder {
    state: ChunkState,
    pos: usize,
    chunks: Vec<Bytes>,
    total: usize,
    trailers: Headers,
    trailer_bytes: usize,
    max_body: usize,
    max_trailer: usize,
}

impl ChunkedDecoder {
    pub fn new(max_body: usize, max_trailer: usize) -> Self {
        Self {
            state: ChunkState::Size,
            pos: 0,
            chunks: Vec::new(),
            total: 0,
            trailers: Headers::new(),
            trailer_bytes: 0,
            max_body,
            max_trailer,
        }
    }

    /// Bytes of the body region decoded so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn is_done(&self) -> bool {
        self.state == ChunkState::Done
    }

    /// Decodes as far as `buf` allows. `buf` must start at the first byte of
    /// the chunked body and only ever grow between calls.
    ///
    /// Returns `Ok(true)` once the terminating chunk and trailers are read.
    pub fn decode(&mut self, buf: &[u8]) -> Result<bool, ParseError> {
        loop {
            match self.state {
                ChunkState::Size => {
                    let Some(line_len) = find_crlf(&buf[self.pos..]) else {
                        if buf.len() - self.pos > MAX_CHUNK_LINE {
                            return Err(ParseError::InvalidChunk);
                        }
                        return Ok(false);
                    };
                    if line_len > MAX_CHUNK_LINE {
                        return Err(ParseError::InvalidChunk);
                    }
                    let size = parse_chunk_size(&buf[self.pos..self.pos + line_len])?;
                    self.pos += line_len + 2;
                    if size == 0 {
                        self.state = ChunkState::Trailer;
                    } else {
                        match self.total.checked_add(size) {
                            Some(total) if total <= self.max_body => self.total = total,
                            _ => return Err(ParseError::BodyTooLarge),
                        }
                        self.state = ChunkState::Data { size };
                    }
                }
                ChunkState::Data { size } => {
                    let end = self.pos + size;
                    if buf.len() < end + 2 {
                        return Ok(false);
                    }
                    if &buf[end..end + 2] != b"\r\n" {
                        return Err(ParseError::InvalidChunk);
                    }
                    self.chunks.push(Bytes::copy_from_slice(&buf[self.pos..end]));
                    self.pos = end + 2;
                    self.state = ChunkState::Size;
                }
                ChunkState::Trailer => {
                    let Some(line_len) = find_crlf(&buf[self.pos..]) else {
                        if self.trailer_bytes + (buf.len() - self.pos) > self.max_trailer {
                            return Err(ParseError::HeadersTooLarge);
                        }
                        return Ok(false);
                    };
                    self.trailer_bytes += line_len + 2;
                    if self.trailer_bytes > self.max_trailer {
                        return Err(ParseError::HeadersTooLarge);
                    }
                    let line = &buf[self.pos..self.pos + line_len];
                    self.pos += line_len + 2;
                    if line.is_empty() {
                        self.state = ChunkState::Done;
                    } else {
                        let (name, value) = parse_header_line(line)?;
                        self.trailers.append(name, value);
                    }
                }
                ChunkState::Done => return Ok(true),
            }
        }
    }

    /// Consumes the decoder, yielding the data chunks and trailer fields.
    pub fn finish(self) -> (Vec<Bytes>, Headers) {
        (self.chunks, self.trailers)
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, ParseError> {
    let digits = match line.iter().position(|&b| b == b';') {
        Some(ext) => &line[..ext],
        None => line,
    };
    let digits = digits.trim_ascii();
    if digits.is_empty() {
        return Err(ParseError::InvalidChunk);
    }
    let mut size: usize = 0;
    for &b in digits {
        let digit = (b as char).to_digit(16).ok_or(ParseError::InvalidChunk)? as usize;
        size = size
            .checked_mul(16)
            .and_then(|s| s.checked_add(digit))
            .ok_or(ParseError::InvalidChunk)?;
    }
    Ok(size)
}

/// Appends one data chunk in wire form. Empty input writes nothing, since a
/// zero-size chunk would end the body.
pub fn encode_chunk(data: &[u8], dst: &mut BytesMut) {
    if data.is_empty() {
        return;
    }
    dst.reserve(data.len() + 20);
    dst.put_slice(format!("{:x}\r\n", data.len()).as_bytes());
    dst.put_slice(data);
    dst.put_slice(b"\r\n");
}

/// Appends the terminating zero-size chunk with an empty trailer section.
pub fn encode_last_chunk(dst: &mut BytesMut) {
    dst.put_slice(b"0\r\n\r\n");
}
