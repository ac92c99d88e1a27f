//! Request-level error taxonomy.
//!
//! Every failure a request can run into ends up as an [`HttpError`], which
//! knows its status code and whether the connection can survive it. The
//! connection handler turns these into responses; none of them is fatal to
//! the process.

use std::io;

use crate::files::FileError;
use crate::http::parser::ParseError;
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::router::PathError;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("request too large: {0}")]
    RequestTooLarge(String),
    #[error("request line too long")]
    RequestLineTooLong,
    #[error("length required")]
    LengthRequired,
    #[error("unsupported method {0}")]
    UnsupportedMethod(String),
    #[error("unsupported transfer coding {0}")]
    UnsupportedTransferCoding(String),
    #[error("unsupported HTTP version {0}")]
    VersionNotSupported(String),
    #[error("no route for {0}")]
    RouteNotFound(String),
    #[error("method not allowed")]
    MethodNotAllowed { allow: &'static str },
    #[error("resource not found")]
    ResourceNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("idle timeout")]
    IdleTimeout,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::MalformedRequest(_) | HttpError::RequestLineTooLong => StatusCode::BadRequest,
            HttpError::RequestTooLarge(_) => StatusCode::PayloadTooLarge,
            HttpError::LengthRequired => StatusCode::LengthRequired,
            HttpError::UnsupportedMethod(_) | HttpError::UnsupportedTransferCoding(_) => {
                StatusCode::NotImplemented
            }
            HttpError::VersionNotSupported(_) => StatusCode::HttpVersionNotSupported,
            HttpError::RouteNotFound(_) | HttpError::ResourceNotFound => StatusCode::NotFound,
            HttpError::MethodNotAllowed { .. } => StatusCode::MethodNotAllowed,
            HttpError::PermissionDenied => StatusCode::Forbidden,
            HttpError::IdleTimeout => StatusCode::RequestTimeout,
            HttpError::Io(_) | HttpError::Internal(_) => StatusCode::InternalServerError,
        }
    }

    /// Whether the connection must be closed after reporting this error.
    ///
    /// Errors raised while reading the message leave the byte stream out of
    /// sync, so they always close. Errors raised after a message was framed
    /// completely leave it usable.
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            HttpError::MalformedRequest(_)
                | HttpError::RequestTooLarge(_)
                | HttpError::RequestLineTooLong
                | HttpError::LengthRequired
                | HttpError::UnsupportedTransferCoding(_)
                | HttpError::VersionNotSupported(_)
                | HttpError::IdleTimeout
        )
    }

    /// Minimal plain-text response describing the error.
    pub fn to_response(&self) -> Response {
        let status = self.status();
        let mut builder = ResponseBuilder::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(format!("{}\n", status));
        if let HttpError::MethodNotAllowed { allow } = self {
            builder = builder.header("Allow", *allow);
        }
        if self.closes_connection() {
            builder = builder.close();
        }
        builder.build()
    }
}

impl From<ParseError> for HttpError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::RequestLineTooLong => HttpError::RequestLineTooLong,
            ParseError::HeadersTooLarge | ParseError::TooManyHeaders | ParseError::BodyTooLarge => {
                HttpError::RequestTooLarge(err.to_string())
            }
            ParseError::LengthRequired => HttpError::LengthRequired,
            ParseError::UnsupportedMethod { method, .. } => HttpError::UnsupportedMethod(method),
            ParseError::UnsupportedTransferEncoding(coding) => HttpError::UnsupportedTransferCoding(coding),
            ParseError::UnsupportedVersion(version) => HttpError::VersionNotSupported(version),
            other => HttpError::MalformedRequest(other.to_string()),
        }
    }
}

impl From<FileError> for HttpError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound | FileError::IsDirectory => HttpError::ResourceNotFound,
            FileError::PermissionDenied | FileError::Forbidden => HttpError::PermissionDenied,
            FileError::Io(e) => HttpError::Io(e),
        }
    }
}

impl From<PathError> for HttpError {
    fn from(err: PathError) -> Self {
        HttpError::MalformedRequest(err.to_string())
    }
}
