use bytes::Bytes;

use crate::http::chunked::ChunkedDecoder;
use crate::http::headers::Headers;
use crate::http::request::{wants_keep_alive, Body, Method, Request, Version};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequestLine,
    #[error("invalid request target")]
    InvalidTarget,
    #[error("malformed HTTP version")]
    InvalidVersion,
    #[error("unsupported HTTP version {0}")]
    UnsupportedVersion(String),
    #[error("malformed header line")]
    InvalidHeader,
    #[error("request line exceeds the configured maximum")]
    RequestLineTooLong,
    #[error("header block exceeds the configured maximum")]
    HeadersTooLarge,
    #[error("header count exceeds the configured maximum")]
    TooManyHeaders,
    #[error("invalid Content-Length value")]
    InvalidContentLength,
    #[error("request carries both Content-Length and Transfer-Encoding")]
    ConflictingFraming,
    #[error("unsupported transfer coding {0}")]
    UnsupportedTransferEncoding(String),
    #[error("request body requires a length")]
    LengthRequired,
    #[error("request body exceeds the configured maximum")]
    BodyTooLarge,
    #[error("malformed chunked body")]
    InvalidChunk,
    /// The message was framed completely but names a method the server does
    /// not implement. `consumed` bytes belong to it and can be discarded;
    /// `keep_alive` is what the client asked for.
    #[error("unsupported method {method}")]
    UnsupportedMethod {
        method: String,
        consumed: usize,
        keep_alive: bool,
    },
}

/// Size guards applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    pub max_request_line: usize,
    /// Upper bound on the header block, and separately on chunk trailers.
    pub max_header_size: usize,
    pub max_headers: usize,
    pub max_body_size: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_request_line: 8 * 1024,
            max_header_size: 16 * 1024,
            max_headers: 100,
            max_body_size: 1024 * 1024,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseStatus {
    /// A full request; the first `consumed` bytes of the buffer belong to it.
    Complete { request: Request, consumed: usize },
    /// More bytes are needed. Call again with the same buffer extended.
    Partial,
}

/// Which part of a message the parser is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Head,
    Body,
}

#[derive(Debug)]
enum MethodToken {
    Known(Method),
    Unknown(String),
}

#[derive(Debug)]
struct RequestHead {
    method: MethodToken,
    path: String,
    query: Option<String>,
    version: Version,
    headers: Headers,
}

#[derive(Debug)]
enum Framing {
    Length(usize),
    Chunked(ChunkedDecoder),
}

#[derive(Debug)]
enum State {
    /// `scanned` marks where the search for the end of the head resumes.
    Head { scanned: usize },
    Body { head: RequestHead, body_start: usize, framing: Framing },
}

enum HeadOutcome {
    Partial { scanned: usize },
    Complete { head: RequestHead, body_start: usize },
}

/// Incremental HTTP/1.x request parser.
///
/// The caller keeps one buffer per connection, appends to it after every
/// read and passes the whole of it to [`RequestParser::parse`]. Nothing may
/// be removed from the front of the buffer until a request completes; then
/// exactly `consumed` bytes are drained and parsing restarts on the rest.
#[derive(Debug)]
pub struct RequestParser {
    limits: ParserLimits,
    state: State,
}

impl RequestParser {
    pub fn new(limits: ParserLimits) -> Self {
        Self {
            limits,
            state: State::Head { scanned: 0 },
        }
    }

    pub fn limits(&self) -> &ParserLimits {
        &self.limits
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Head { .. } => Phase::Head,
            State::Body { .. } => Phase::Body,
        }
    }

    /// Drops any partially parsed message.
    pub fn reset(&mut self) {
        self.state = State::Head { scanned: 0 };
    }

    pub fn parse(&mut self, buf: &[u8]) -> Result<ParseStatus, ParseError> {
        if let State::Head { scanned } = self.state {
            match parse_head(buf, scanned, &self.limits)? {
                HeadOutcome::Partial { scanned } => {
                    self.state = State::Head { scanned };
                    return Ok(ParseStatus::Partial);
                }
                HeadOutcome::Complete { head, body_start } => {
                    let framing = body_framing(&head, &self.limits)?;
                    self.state = State::Body { head, body_start, framing };
                }
            }
        }

        let consumed = match &mut self.state {
            State::Head { .. } => return Ok(ParseStatus::Partial),
            State::Body { body_start, framing, .. } => {
                let body_buf = &buf[*body_start..];
                match framing {
                    Framing::Length(len) if body_buf.len() >= *len => *body_start + *len,
                    Framing::Length(_) => return Ok(ParseStatus::Partial),
                    Framing::Chunked(decoder) => {
                        if !decoder.decode(body_buf)? {
                            return Ok(ParseStatus::Partial);
                        }
                        *body_start + decoder.consumed()
                    }
                }
            }
        };

        let State::Body { head, body_start, framing } =
            std::mem::replace(&mut self.state, State::Head { scanned: 0 })
        else {
            return Ok(ParseStatus::Partial);
        };

        let (body, trailers) = match framing {
            Framing::Length(0) => (Body::Empty, Headers::new()),
            Framing::Length(len) => (
                Body::Fixed(Bytes::copy_from_slice(&buf[body_start..body_start + len])),
                Headers::new(),
            ),
            Framing::Chunked(decoder) => {
                let (chunks, trailers) = decoder.finish();
                (Body::Chunked(chunks), trailers)
            }
        };

        let method = match head.method {
            MethodToken::Known(method) => method,
            MethodToken::Unknown(method) => {
                let keep_alive = wants_keep_alive(head.version, &head.headers);
                return Err(ParseError::UnsupportedMethod { method, consumed, keep_alive });
            }
        };

        let request = Request {
            method,
            path: head.path,
            query: head.query,
            version: head.version,
            headers: head.headers,
            body,
            trailers,
        };
        Ok(ParseStatus::Complete { request, consumed })
    }
}

/// Parses one request from `buf` with default limits.
pub fn parse_http_request(buf: &[u8]) -> Result<ParseStatus, ParseError> {
    RequestParser::new(ParserLimits::default()).parse(buf)
}

fn parse_head(buf: &[u8], scanned: usize, limits: &ParserLimits) -> Result<HeadOutcome, ParseError> {
    // Empty lines ahead of a request line are tolerated.
    let mut start = 0;
    while buf[start..].starts_with(b"\r\n") {
        start += 2;
        if start > limits.max_request_line {
            return Err(ParseError::RequestLineTooLong);
        }
    }

    let Some(line_len) = find_crlf(&buf[start..]) else {
        if buf.len() - start > limits.max_request_line {
            return Err(ParseError::RequestLineTooLong);
        }
        return Ok(HeadOutcome::Partial { scanned: 0 });
    };
    if line_len > limits.max_request_line {
        return Err(ParseError::RequestLineTooLong);
    }
    let line_end = start + line_len;

    let search_from = scanned.max(line_end);
    let head_end = match find_headers_end(&buf[search_from..]) {
        Some(offset) => search_from + offset,
        None => {
            if buf.len() - line_end > limits.max_header_size + 4 {
                return Err(ParseError::HeadersTooLarge);
            }
            let scanned = buf.len().saturating_sub(3).max(line_end);
            return Ok(HeadOutcome::Partial { scanned });
        }
    };
    if head_end - line_end > limits.max_header_size {
        return Err(ParseError::HeadersTooLarge);
    }

    let line = std::str::from_utf8(&buf[start..line_end]).map_err(|_| ParseError::InvalidRequestLine)?;
    let (method, path, query, version) = parse_request_line(line)?;

    let mut headers = Headers::new();
    let mut pos = line_end + 2;
    while pos < head_end + 2 {
        let len = find_crlf(&buf[pos..]).ok_or(ParseError::InvalidHeader)?;
        let (name, value) = parse_header_line(&buf[pos..pos + len])?;
        headers.append(name, value);
        if headers.len() > limits.max_headers {
            return Err(ParseError::TooManyHeaders);
        }
        pos += len + 2;
    }

    Ok(HeadOutcome::Complete {
        head: RequestHead { method, path, query, version, headers },
        body_start: head_end + 4,
    })
}

fn parse_request_line(line: &str) -> Result<(MethodToken, String, Option<String>, Version), ParseError> {
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    if method.is_empty() || !method.bytes().all(is_tchar) {
        return Err(ParseError::InvalidRequestLine);
    }
    let version = parse_version(version)?;
    let (path, query) = parse_target(target)?;
    let method = match Method::from_str(method) {
        Some(m) => MethodToken::Known(m),
        None => MethodToken::Unknown(method.to_string()),
    };
    // The asterisk form only means something to OPTIONS.
    if path == "*" && !matches!(method, MethodToken::Known(Method::OPTIONS)) {
        return Err(ParseError::InvalidTarget);
    }
    Ok((method, path, query, version))
}

fn parse_version(version: &str) -> Result<Version, ParseError> {
    match version {
        "HTTP/1.1" => Ok(Version::Http11),
        "HTTP/1.0" => Ok(Version::Http10),
        other => match other.strip_prefix("HTTP/").map(str::as_bytes) {
            Some([major, b'.', minor]) if major.is_ascii_digit() && minor.is_ascii_digit() => {
                Err(ParseError::UnsupportedVersion(other.to_string()))
            }
            _ => Err(ParseError::InvalidVersion),
        },
    }
}

fn parse_target(target: &str) -> Result<(String, Option<String>), ParseError> {
    if target.is_empty() || target.bytes().any(|b| b <= b' ' || b == 0x7f) {
        return Err(ParseError::InvalidTarget);
    }
    let target = target.split('#').next().unwrap_or(target);

    if target == "*" {
        return Ok(("*".to_string(), None));
    }
    if target.starts_with('/') {
        return Ok(match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        });
    }

    // Absolute-form, as sent to proxies.
    let lower = target.get(..8).unwrap_or(target).to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        let url = url::Url::parse(target).map_err(|_| ParseError::InvalidTarget)?;
        return Ok((url.path().to_string(), url.query().map(str::to_string)));
    }
    Err(ParseError::InvalidTarget)
}

/// Splits one `name: value` line. Shared with chunk trailers.
pub(crate) fn parse_header_line(line: &[u8]) -> Result<(String, String), ParseError> {
    if line.first().is_some_and(|b| *b == b' ' || *b == b'\t') {
        // obs-fold
        return Err(ParseError::InvalidHeader);
    }
    if line.iter().any(|&b| b == b'\r' || b == b'\n' || b == 0) {
        return Err(ParseError::InvalidHeader);
    }
    let colon = line.iter().position(|&b| b == b':').ok_or(ParseError::InvalidHeader)?;
    let name = line[..colon].trim_ascii();
    if name.is_empty() || !name.iter().copied().all(is_tchar) {
        return Err(ParseError::InvalidHeader);
    }
    let value = line[colon + 1..].trim_ascii();

    let name = String::from_utf8_lossy(name).into_owned();
    let value = String::from_utf8_lossy(value).into_owned();
    Ok((name, value))
}

fn body_framing(head: &RequestHead, limits: &ParserLimits) -> Result<Framing, ParseError> {
    let has_te = head.headers.contains("Transfer-Encoding");
    let has_cl = head.headers.contains("Content-Length");

    if has_te && has_cl {
        return Err(ParseError::ConflictingFraming);
    }

    if has_te {
        let codings: Vec<String> = head
            .headers
            .get_all("Transfer-Encoding")
            .flat_map(|v| v.split(','))
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        let chunked = codings.iter().filter(|c| *c == "chunked").count();
        let last_is_chunked = codings.last().is_some_and(|c| c == "chunked");

        if chunked > 1 || (chunked == 1 && !last_is_chunked) || codings.is_empty() {
            return Err(ParseError::InvalidHeader);
        }
        if codings.len() == 1 && last_is_chunked {
            return Ok(Framing::Chunked(ChunkedDecoder::new(
                limits.max_body_size,
                limits.max_header_size,
            )));
        }
        let unsupported = codings
            .into_iter()
            .find(|c| c != "chunked")
            .unwrap_or_default();
        return Err(ParseError::UnsupportedTransferEncoding(unsupported));
    }

    if has_cl {
        let mut length: Option<usize> = None;
        for value in head.headers.get_all("Content-Length").flat_map(|v| v.split(',')) {
            let n = parse_content_length(value.trim(), limits.max_body_size)?;
            if length.is_some_and(|l| l != n) {
                return Err(ParseError::InvalidContentLength);
            }
            length = Some(n);
        }
        return Ok(Framing::Length(length.unwrap_or(0)));
    }

    match head.method {
        MethodToken::Known(method) if method.expects_body() => Err(ParseError::LengthRequired),
        _ => Ok(Framing::Length(0)),
    }
}

/// Strict decimal parse: digits only, no sign, bounded by `max`.
fn parse_content_length(value: &str, max: usize) -> Result<usize, ParseError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidContentLength);
    }
    let mut n: usize = 0;
    for b in value.bytes() {
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_add(usize::from(b - b'0')))
            .ok_or(ParseError::BodyTooLarge)?;
    }
    if n > max {
        return Err(ParseError::BodyTooLarge);
    }
    Ok(n)
}

fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(buf: &[u8]) -> (Request, usize) {
        match parse_http_request(buf).unwrap() {
            ParseStatus::Complete { request, consumed } => (request, consumed),
            ParseStatus::Partial => panic!("expected a complete request"),
        }
    }

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = complete(req);

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn resumes_after_partial_head() {
        let full = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\n";
        let mut parser = RequestParser::new(ParserLimits::default());
        assert!(matches!(parser.parse(&full[..20]).unwrap(), ParseStatus::Partial));
        assert_eq!(parser.phase(), Phase::Head);
        match parser.parse(full).unwrap() {
            ParseStatus::Complete { request, consumed } => {
                assert_eq!(request.path, "/a");
                assert_eq!(consumed, full.len());
            }
            ParseStatus::Partial => panic!("expected a complete request"),
        }
    }

    #[test]
    fn content_length_rejects_signs_and_overflow() {
        assert_eq!(parse_content_length("+5", 100), Err(ParseError::InvalidContentLength));
        assert_eq!(parse_content_length("-1", 100), Err(ParseError::InvalidContentLength));
        assert_eq!(parse_content_length("", 100), Err(ParseError::InvalidContentLength));
        assert_eq!(parse_content_length("101", 100), Err(ParseError::BodyTooLarge));
        assert_eq!(
            parse_content_length("99999999999999999999999999", usize::MAX),
            Err(ParseError::BodyTooLarge)
        );
        assert_eq!(parse_content_length("0042", 100), Ok(42));
    }

    #[test]
    fn version_classification() {
        assert_eq!(parse_version("HTTP/1.0"), Ok(Version::Http10));
        assert_eq!(
            parse_version("HTTP/2.0"),
            Err(ParseError::UnsupportedVersion("HTTP/2.0".to_string()))
        );
        assert_eq!(parse_version("HTTX/1.1"), Err(ParseError::InvalidVersion));
    }
}
