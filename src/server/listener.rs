use std::time::Duration;

use bytes::BytesMut;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};

use crate::http::headers::Headers;
use crate::http::response::StatusCode;
use crate::http::writer::serialize_head;
use crate::server::pool::{Accepted, SubmitError, WorkerPool};

const MIN_BACKOFF: Duration = Duration::from_millis(5);
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Accepts connections and queues them for the worker pool.
///
/// Returns only once the pool stops taking connections; the caller stops
/// it by dropping the future.
pub async fn accept_loop(listener: &TcpListener, pool: &WorkerPool<TcpStream>) {
    let rejection = rejection_response();
    let mut backoff = MIN_BACKOFF;

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                backoff = MIN_BACKOFF;
                if let Err(e) = socket.set_nodelay(true) {
                    debug!(client = %peer, error = %e, "failed to set TCP_NODELAY");
                }
                debug!("Accepted connection from {}", peer);

                let accepted = Accepted {
                    stream: socket,
                    peer: peer.to_string(),
                };
                match pool.try_submit(accepted) {
                    Ok(()) => {}
                    Err(SubmitError::Full(rejected)) => {
                        warn!(client = %rejected.peer, "connection queue full, rejecting with 503");
                        // Best effort; the socket is closed when dropped.
                        let _ = rejected.stream.try_write(&rejection);
                    }
                    Err(SubmitError::Closed(_)) => {
                        debug!("worker pool closed, stopping accept loop");
                        return;
                    }
                }
            }
            Err(e) => {
                // Usually descriptor exhaustion; retrying at once would spin.
                error!(error = %e, backoff_ms = backoff.as_millis() as u64, "accept failed");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

fn rejection_response() -> BytesMut {
    let status = StatusCode::ServiceUnavailable;
    let body = format!("{}\n", status);
    let mut headers = Headers::new();
    headers.insert("Content-Type", "text/plain; charset=utf-8");

    let mut buf = serialize_head(status, &headers, Some(("Content-Length", body.len().to_string())), false);
    buf.extend_from_slice(body.as_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_a_complete_503() {
        let text = String::from_utf8(rejection_response().to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(text.contains("Content-Length: 24\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\n503 Service Unavailable\n"));
    }
}
