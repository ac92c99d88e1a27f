//! HTTP/1.1 protocol layer.
//!
//! Everything between raw bytes on a stream and a routed [`request::Request`]
//! and back: incremental parsing, chunked coding, response framing, and the
//! per-connection state machine.
//!
//! # Architecture
//!
//! - **`connection`**: the per-connection state machine (keep-alive, pipelining, timeouts)
//! - **`parser`**: resumable request parser with size limits
//! - **`chunked`**: chunked transfer coding, decode and encode
//! - **`headers`**: ordered, case-insensitive header collection
//! - **`request`** / **`response`**: message types and builders
//! - **`writer`**: chooses body framing and serializes responses
//! - **`stream`**: the byte stream boundary the connection runs on
//! - **`mime`**: content types by file extension
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitingRequest  │ ← idle; a drain or idle timeout closes silently
//!        └──────┬───────────┘
//!               │ first bytes
//!               ▼
//!        ┌──────────────────┐
//!        │ ParsingHeaders   │ ← timeout here answers 408
//!        └──────┬───────────┘
//!               │ header block complete
//!               ▼
//!        ┌──────────────────┐
//!        │ ParsingBody      │ ← Content-Length or chunked
//!        └──────┬───────────┘
//!               │ message complete
//!               ▼
//!        ┌──────────────────┐
//!        │ Dispatching      │ ← normalize path, route, run handler
//!        └──────┬───────────┘
//!               │ response ready
//!               ▼
//!        ┌──────────────────┐
//!        │ WritingResponse  │
//!        └──────┬───────────┘
//!               ├─ keep-alive → AwaitingRequest (buffered bytes parsed first)
//!               └─ close      → Closing
//! ```
//!
//! Parse errors skip straight to `WritingResponse` with an error response
//! and then close.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lantern::http::connection::{Connection, ConnectionLimits};
//! use lantern::router::Router;
//! use lantern::server::{shutdown::Shutdown, ServerContext};
//!
//! let ctx = Arc::new(ServerContext::new(Router::new(), ConnectionLimits::default()));
//! let shutdown = Shutdown::new();
//! let (socket, peer) = listener.accept().await?;
//! Connection::new(socket, peer.to_string(), ctx, shutdown.subscribe()).run().await?;
//! ```

pub mod chunked;
pub mod connection;
pub mod headers;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod stream;
pub mod writer;
