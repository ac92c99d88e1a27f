use std::sync::Arc;
use std::time::Duration;

use lantern::error::HttpError;
use lantern::http::connection::ConnectionLimits;
use lantern::http::request::Request;
use lantern::http::response::Response;
use lantern::router::{handler_fn, Handler, HandlerFuture, RouteMatch, Router};
use lantern::server::pool::{Accepted, SubmitError, WorkerPool};
use lantern::server::shutdown::Shutdown;
use lantern::server::ServerContext;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

struct Sleepy(Duration);

impl Handler for Sleepy {
    fn call<'a>(&'a self, _request: &'a Request, _route: &'a RouteMatch) -> HandlerFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(self.0).await;
            Ok::<_, HttpError>(Response::ok("done"))
        })
    }
}

fn context() -> Arc<ServerContext> {
    let router = Router::new()
        .get("/", handler_fn(|_, _| Ok(Response::ok("ok"))))
        .get("/sleep", Sleepy(Duration::from_secs(30)))
        .get("/boom", handler_fn(|_, _| panic!("handler blew up")));
    Arc::new(ServerContext::new(router, ConnectionLimits::default()))
}

fn connection(peer: &str) -> (DuplexStream, Accepted<DuplexStream>) {
    let (client, server) = tokio::io::duplex(4096);
    (
        client,
        Accepted {
            stream: server,
            peer: peer.to_string(),
        },
    )
}

async fn wait_until_picked_up(pool: &WorkerPool<DuplexStream>) {
    for _ in 0..100 {
        if pool.queued() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("worker never picked up the connection");
}

#[tokio::test]
async fn test_pool_serves_submitted_connection() {
    let shutdown = Shutdown::new();
    let pool = WorkerPool::start(2, 4, context(), shutdown.subscribe());
    assert_eq!(pool.workers(), 2);

    let (mut client, accepted) = connection("a");
    pool.try_submit(accepted).unwrap();
    client.write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
    let mut out = String::new();
    client.read_to_string(&mut out).await.unwrap();
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.ends_with("ok"));

    shutdown.trigger();
    let stats = pool.shutdown(Duration::from_secs(1)).await;
    assert_eq!(stats.workers, 2);
    assert_eq!(stats.aborted, 0);
}

#[tokio::test]
async fn test_worker_survives_panicking_handler() {
    let shutdown = Shutdown::new();
    let pool = WorkerPool::start(1, 2, context(), shutdown.subscribe());

    let (mut first, accepted) = connection("first");
    pool.try_submit(accepted).unwrap();
    first.write_all(b"GET /boom HTTP/1.1\r\n\r\n").await.unwrap();
    let mut out = Vec::new();
    first.read_to_end(&mut out).await.unwrap();
    assert!(out.is_empty());

    // The same single worker still serves the next connection.
    let (mut second, accepted) = connection("second");
    pool.try_submit(accepted).unwrap();
    second.write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
    let mut out = String::new();
    second.read_to_string(&mut out).await.unwrap();
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));

    shutdown.trigger();
    let stats = pool.shutdown(Duration::from_secs(1)).await;
    assert_eq!(stats.aborted, 0);
}

#[tokio::test]
async fn test_full_queue_rejects_immediately() {
    let shutdown = Shutdown::new();
    let pool = WorkerPool::start(1, 1, context(), shutdown.subscribe());

    // Occupies the only worker.
    let (_busy_client, busy) = connection("busy");
    pool.try_submit(busy).unwrap();
    wait_until_picked_up(&pool).await;

    // Fills the only queue slot.
    let (_queued_client, queued) = connection("queued");
    pool.try_submit(queued).unwrap();
    assert_eq!(pool.queued(), 1);

    let (_rejected_client, rejected) = connection("rejected");
    match pool.try_submit(rejected) {
        Err(SubmitError::Full(conn)) => assert_eq!(conn.peer, "rejected"),
        other => panic!("expected a full queue, got {:?}", other.map_err(|e| e.into_inner().peer)),
    }

    // The idle connection closes on shutdown and the queued one is dropped.
    shutdown.trigger();
    let stats = pool.shutdown(Duration::from_secs(1)).await;
    assert_eq!(stats.aborted, 0);
}

#[tokio::test]
async fn test_shutdown_aborts_workers_after_grace() {
    let shutdown = Shutdown::new();
    let pool = WorkerPool::start(1, 1, context(), shutdown.subscribe());

    let (mut client, accepted) = connection("slow");
    pool.try_submit(accepted).unwrap();
    client.write_all(b"GET /sleep HTTP/1.1\r\n\r\n").await.unwrap();
    wait_until_picked_up(&pool).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    shutdown.trigger();
    let stats = pool.shutdown(Duration::from_millis(100)).await;
    assert_eq!(stats.workers, 1);
    assert_eq!(stats.aborted, 1);

    // The aborted connection is gone without a response.
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    assert!(out.is_empty());
}
