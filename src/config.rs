//! Server configuration.
//!
//! Settings start from built-in defaults, are overlaid by a YAML file named
//! in `LANTERN_CONFIG` (missing keys keep their defaults), and finally by
//! the `LISTEN`, `DOC_ROOT` and `WORKERS` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::http::connection::ConnectionLimits;
use crate::http::parser::ParserLimits;

pub const CONFIG_ENV: &str = "LANTERN_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub static_files: StaticConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub workers: usize,
    /// Accepted connections allowed to wait for a free worker.
    pub queue_depth: usize,
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            workers: 64,
            queue_depth: 128,
            shutdown_grace_ms: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_request_line: usize,
    pub max_header_size: usize,
    pub max_headers: usize,
    pub max_body_size: usize,
    pub idle_timeout_ms: u64,
    pub max_requests_per_connection: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let parser = ParserLimits::default();
        Self {
            max_request_line: parser.max_request_line,
            max_header_size: parser.max_header_size,
            max_headers: parser.max_headers,
            max_body_size: parser.max_body_size,
            idle_timeout_ms: 30_000,
            max_requests_per_connection: 1000,
        }
    }
}

impl LimitsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub root: PathBuf,
    /// URL prefix the document root is served under.
    pub mount: String,
    /// Served for directory requests; `null` disables it.
    pub index: Option<String>,
    pub cache_enabled: bool,
    pub cache_max_entries: usize,
    pub cache_max_file_size: u64,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./public"),
            mount: "/".to_string(),
            index: Some("index.html".to_string()),
            cache_enabled: true,
            cache_max_entries: 256,
            cache_max_file_size: 1024 * 1024,
        }
    }
}

impl Config {
    /// Loads defaults, the optional YAML file, then environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(addr) = std::env::var("LISTEN") {
            self.server.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("DOC_ROOT") {
            self.static_files.root = PathBuf::from(root);
        }
        if let Ok(workers) = std::env::var("WORKERS") {
            self.server.workers = workers
                .parse()
                .with_context(|| format!("invalid WORKERS value {:?}", workers))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.workers == 0 {
            bail!("server.workers must be at least 1");
        }
        if self.server.queue_depth == 0 {
            bail!("server.queue_depth must be at least 1");
        }
        if self.limits.idle_timeout_ms == 0 {
            bail!("limits.idle_timeout_ms must be positive");
        }
        if self.limits.max_requests_per_connection == 0 {
            bail!("limits.max_requests_per_connection must be at least 1");
        }
        if self.limits.max_request_line == 0 || self.limits.max_header_size == 0 {
            bail!("request line and header limits must be positive");
        }
        if !self.static_files.mount.starts_with('/') {
            bail!("static_files.mount must start with '/'");
        }
        Ok(())
    }

    pub fn parser_limits(&self) -> ParserLimits {
        ParserLimits {
            max_request_line: self.limits.max_request_line,
            max_header_size: self.limits.max_header_size,
            max_headers: self.limits.max_headers,
            max_body_size: self.limits.max_body_size,
        }
    }

    pub fn connection_limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            parser: self.parser_limits(),
            idle_timeout: self.limits.idle_timeout(),
            max_requests: self.limits.max_requests_per_connection,
        }
    }
}
