//! TCP front end: binds the listener, owns the worker pool, and runs the
//! graceful drain.

pub mod listener;
pub mod pool;
pub mod shutdown;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::files::{FileCache, StaticFiles};
use crate::http::connection::ConnectionLimits;
use crate::http::response::Response;
use crate::router::{handler_fn, Router};

use self::pool::WorkerPool;
use self::shutdown::Shutdown;

/// Everything a connection needs, shared read-only by all workers.
#[derive(Debug)]
pub struct ServerContext {
    pub router: Router,
    pub limits: ConnectionLimits,
}

impl ServerContext {
    pub fn new(router: Router, limits: ConnectionLimits) -> Self {
        Self { router, limits }
    }
}

pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
    workers: usize,
    queue_depth: usize,
    shutdown_grace: Duration,
}

impl Server {
    /// Binds the configured address and serves `router`.
    pub async fn bind(config: &Config, router: Router) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&config.server.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;

        Ok(Self {
            listener,
            ctx: Arc::new(ServerContext::new(router, config.connection_limits())),
            workers: config.server.workers,
            queue_depth: config.server.queue_depth,
            shutdown_grace: config.server.shutdown_grace(),
        })
    }

    /// Binds and serves the standard routes: `GET /health` and the static
    /// file tree at the configured mount point.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let router = default_router(config)?;
        Self::bind(config, router).await
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until `signal` resolves, then drains.
    ///
    /// Draining stops accepting, closes idle connections, lets in-flight
    /// requests finish with `Connection: close`, and aborts whatever is
    /// still running after the grace period.
    pub async fn run_until(self, signal: impl Future<Output = ()>) -> anyhow::Result<()> {
        let Server {
            listener: tcp,
            ctx,
            workers,
            queue_depth,
            shutdown_grace,
        } = self;

        let shutdown = Shutdown::new();
        let pool = WorkerPool::start(workers, queue_depth, ctx, shutdown.subscribe());
        let addr = tcp.local_addr()?;
        info!(workers, queue_depth, "Listening on {}", addr);

        tokio::select! {
            _ = listener::accept_loop(&tcp, &pool) => {}
            _ = signal => info!("Shutdown signal received, draining connections"),
        }
        drop(tcp);

        shutdown.trigger();
        let stats = pool.shutdown(shutdown_grace).await;
        if stats.aborted > 0 {
            tracing::warn!(aborted = stats.aborted, "aborted workers still busy after the grace period");
        }
        info!(workers = stats.workers, "Server stopped");
        Ok(())
    }
}

/// Health check plus the static file mount described by `config`.
pub fn default_router(config: &Config) -> anyhow::Result<Router> {
    let settings = &config.static_files;
    let cache = Arc::new(if settings.cache_enabled {
        FileCache::new(settings.cache_max_entries, settings.cache_max_file_size)
    } else {
        FileCache::disabled()
    });
    let files = StaticFiles::new(&settings.root, cache)
        .with_context(|| format!("invalid document root {}", settings.root.display()))?
        .with_index(settings.index.clone());

    Ok(Router::new()
        .get("/health", handler_fn(|_, _| Ok(Response::ok("ok\n"))))
        .mount(settings.mount.clone(), files))
}
