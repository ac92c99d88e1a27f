//! Static file serving
//!
//! This module maps request paths onto a document root, reads files
//! through a shared validated cache, and turns the result into responses.

pub mod cache;
pub mod resolver;

use std::io;

pub use cache::{FileCache, FileCacheEntry};
pub use resolver::{FileContent, ResolvedFile, StaticFiles};

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("file not found")]
    NotFound,
    #[error("path is a directory")]
    IsDirectory,
    #[error("permission denied")]
    PermissionDenied,
    /// The path leaves the document root, directly or through a symlink.
    #[error("path outside the document root")]
    Forbidden,
    #[error("io error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for FileError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => FileError::NotFound,
            io::ErrorKind::PermissionDenied => FileError::PermissionDenied,
            _ => FileError::Io(err),
        }
    }
}
