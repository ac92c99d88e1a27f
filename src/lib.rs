//! Lantern - HTTP/1.1 static file server
//!
//! Core library: request parsing, routing, static files, and the
//! connection and worker-pool runtime.

pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod router;
pub mod server;
