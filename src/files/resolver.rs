use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::HttpError;
use crate::files::{FileCache, FileCacheEntry, FileError};
use crate::http::mime;
use crate::http::request::{Method, Request};
use crate::http::response::{ChunkSource, Response, ResponseBuilder, StatusCode};
use crate::router::{Handler, HandlerFuture, RouteMatch};

const STREAM_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug)]
pub enum FileContent {
    /// Whole file in memory, possibly shared with the cache.
    Bytes(Bytes),
    /// Open handle for files too large to cache.
    Stream(fs::File),
}

#[derive(Debug)]
pub struct ResolvedFile {
    /// Canonical location on disk.
    pub path: PathBuf,
    pub content: FileContent,
    pub content_type: &'static str,
    pub last_modified: SystemTime,
    pub size: u64,
}

/// Serves files below a document root.
#[derive(Debug)]
pub struct StaticFiles {
    root: PathBuf,
    index: Option<String>,
    cache: Arc<FileCache>,
}

impl StaticFiles {
    /// Creates a handler for `root`, which must exist.
    pub fn new(root: impl AsRef<Path>, cache: Arc<FileCache>) -> io::Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("document root {} is not a directory", root.display()),
            ));
        }
        Ok(Self {
            root,
            index: Some("index.html".to_string()),
            cache,
        })
    }

    /// File served for directory requests; `None` makes directories 404.
    pub fn with_index(mut self, index: Option<String>) -> Self {
        self.index = index;
        self
    }

    /// Maps a normalized path below the root to file content.
    pub async fn resolve(&self, normalized_path: &str) -> Result<ResolvedFile, FileError> {
        let mut candidate = self.root.clone();
        for segment in normalized_path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." || segment.contains(&['\\', '\0'][..]) {
                return Err(FileError::Forbidden);
            }
            candidate.push(segment);
        }

        let mut meta = fs::metadata(&candidate).await?;
        if meta.is_dir() {
            let Some(index) = &self.index else {
                return Err(FileError::IsDirectory);
            };
            candidate.push(index);
            meta = match fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => return Err(FileError::IsDirectory),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(FileError::IsDirectory),
                Err(e) => return Err(e.into()),
            };
        }

        let canonical = fs::canonicalize(&candidate).await?;
        if !canonical.starts_with(&self.root) {
            tracing::warn!(path = %canonical.display(), "refusing file outside the document root");
            return Err(FileError::Forbidden);
        }
        if !meta.is_file() {
            return Err(FileError::NotFound);
        }

        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        let content_type = mime::from_path(&canonical);

        if self.cache.accepts(meta.len()) {
            if let Some(entry) = self.cache.get(&canonical, modified, meta.len()) {
                tracing::trace!(path = %canonical.display(), "file cache hit");
                return Ok(ResolvedFile {
                    path: canonical,
                    content: FileContent::Bytes(entry.content.clone()),
                    content_type,
                    last_modified: modified,
                    size: entry.size,
                });
            }
            let content = Bytes::from(fs::read(&canonical).await?);
            let entry = self
                .cache
                .insert(FileCacheEntry::new(canonical.clone(), modified, content, content_type));
            return Ok(ResolvedFile {
                path: canonical,
                content: FileContent::Bytes(entry.content.clone()),
                content_type,
                last_modified: modified,
                size: entry.size,
            });
        }

        let file = fs::File::open(&canonical).await?;
        let size = file.metadata().await?.len();
        Ok(ResolvedFile {
            path: canonical,
            content: FileContent::Stream(file),
            content_type,
            last_modified: modified,
            size,
        })
    }

    async fn serve(&self, request: &Request, route: &RouteMatch) -> Result<Response, HttpError> {
        if !matches!(request.method, Method::GET | Method::HEAD) {
            return Err(HttpError::MethodNotAllowed { allow: "GET, HEAD" });
        }

        let file = self.resolve(&route.remainder).await?;
        let last_modified = httpdate::fmt_http_date(file.last_modified);

        let since = request
            .header("If-Modified-Since")
            .and_then(|v| httpdate::parse_http_date(v).ok());
        if let Some(since) = since {
            if !modified_after(file.last_modified, since) {
                return Ok(ResponseBuilder::new(StatusCode::NotModified)
                    .header("Last-Modified", last_modified)
                    .build());
            }
        }

        let builder = ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", file.content_type)
            .header("Last-Modified", last_modified);
        let response = match file.content {
            FileContent::Bytes(bytes) => builder.body(bytes).build(),
            FileContent::Stream(handle) => {
                // Never send more than the length we announce.
                let reader = handle.take(file.size);
                builder
                    .stream(Some(file.size), ChunkSource::from_reader(reader, STREAM_CHUNK_SIZE))
                    .build()
            }
        };
        Ok(response)
    }
}

impl Handler for StaticFiles {
    fn call<'a>(&'a self, request: &'a Request, route: &'a RouteMatch) -> HandlerFuture<'a> {
        Box::pin(self.serve(request, route))
    }
}

/// Compares at the one-second resolution of HTTP dates.
fn modified_after(modified: SystemTime, since: SystemTime) -> bool {
    let secs = |t: SystemTime| t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    secs(modified) > secs(since)
}
