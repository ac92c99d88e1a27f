//! Fixed pool of connection workers fed by a bounded queue.
//!
//! The listener hands accepted connections to [`WorkerPool::try_submit`],
//! which never waits: when every worker is busy and the queue is full the
//! connection comes straight back so the caller can turn it away.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tracing::debug;

use crate::http::connection::Connection;
use crate::http::stream::ByteStream;
use crate::server::shutdown::ShutdownListener;
use crate::server::ServerContext;

/// An accepted connection waiting for a worker.
#[derive(Debug)]
pub struct Accepted<S> {
    pub stream: S,
    pub peer: String,
}

#[derive(Debug)]
pub enum SubmitError<S> {
    /// Every worker is busy and the queue is at capacity.
    Full(Accepted<S>),
    /// The pool is shutting down.
    Closed(Accepted<S>),
}

impl<S> SubmitError<S> {
    pub fn into_inner(self) -> Accepted<S> {
        match self {
            SubmitError::Full(conn) | SubmitError::Closed(conn) => conn,
        }
    }
}

/// Outcome of [`WorkerPool::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub workers: usize,
    /// Workers still busy at the deadline and aborted.
    pub aborted: usize,
}

pub struct WorkerPool<S> {
    sender: mpsc::Sender<Accepted<S>>,
    workers: JoinSet<()>,
}

impl<S: ByteStream + 'static> WorkerPool<S> {
    /// Spawns `workers` tasks sharing a queue of `queue_depth` slots.
    pub fn start(workers: usize, queue_depth: usize, ctx: Arc<ServerContext>, shutdown: ShutdownListener) -> Self {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let mut set = JoinSet::new();
        for id in 0..workers.max(1) {
            set.spawn(worker_loop(
                id,
                Arc::clone(&receiver),
                Arc::clone(&ctx),
                shutdown.clone(),
            ));
        }

        Self { sender, workers: set }
    }

    pub fn try_submit(&self, conn: Accepted<S>) -> Result<(), SubmitError<S>> {
        self.sender.try_send(conn).map_err(|e| match e {
            TrySendError::Full(conn) => SubmitError::Full(conn),
            TrySendError::Closed(conn) => SubmitError::Closed(conn),
        })
    }

    /// Connections accepted but not yet picked up by a worker.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Closes the queue and waits up to `grace` for workers to finish.
    ///
    /// Trigger the shutdown signal first: workers then drop queued
    /// connections and in-flight ones stop after their current response.
    pub async fn shutdown(self, grace: Duration) -> DrainStats {
        let WorkerPool { sender, mut workers } = self;
        drop(sender);

        let total = workers.len();
        let drained = tokio::time::timeout(grace, async {
            while workers.join_next().await.is_some() {}
        })
        .await;

        let aborted = match drained {
            Ok(()) => 0,
            Err(_) => {
                let remaining = workers.len();
                workers.shutdown().await;
                remaining
            }
        };
        DrainStats { workers: total, aborted }
    }
}

async fn worker_loop<S: ByteStream + 'static>(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Accepted<S>>>>,
    ctx: Arc<ServerContext>,
    shutdown: ShutdownListener,
) {
    debug!(worker = id, "worker started");
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(Accepted { stream, peer }) = next else {
            break;
        };
        if shutdown.is_triggered() {
            debug!(worker = id, client = %peer, "dropping queued connection during shutdown");
            continue;
        }

        // A panicking handler ends its own task, not the worker.
        let client = peer.clone();
        let mut conn = Connection::new(stream, peer, Arc::clone(&ctx), shutdown.clone());
        let mut task = AbortOnDrop(tokio::spawn(async move { conn.run().await }));
        match (&mut task.0).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(worker = id, client = %client, error = %e, "connection ended with error"),
            Err(e) if e.is_panic() => {
                tracing::error!(worker = id, client = %client, "connection handler panicked")
            }
            Err(e) => debug!(worker = id, client = %client, error = %e, "connection task cancelled"),
        }
    }
    debug!(worker = id, "worker stopped");
}

/// Aborts the connection task when the worker awaiting it is itself aborted.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
