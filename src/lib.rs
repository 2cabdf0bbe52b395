//! # maxage
//!
//! `Cache-Control` annotation middleware for async HTTP/1.1 services.
//!
//! The crate centers on [`cache::CacheControlMiddleware`]: a response-phase
//! middleware that stamps the `Cache-Control` header according to an ordered
//! rule table keyed on path substrings and the caller's authentication state
//! ([`context::AuthState`]), with last-match-wins precedence. Around it sit
//! the host pieces the middleware composes with: HTTP primitives, a
//! per-request context, the middleware pipeline, and a small Tokio-based
//! HTTP/1.1 server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use maxage::http::{Response, StatusCode};
//! use maxage::cache::CacheControlMiddleware;
//! use maxage::middleware::from_middleware;
//! use maxage::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:8080")
//!         .await?
//!         .layer(from_middleware(Arc::new(CacheControlMiddleware::new())));
//!     server.run(|_ctx| async {
//!         Response::new(StatusCode::Ok).body("Hello, World!")
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheControlMiddleware, CachePolicy, CacheRule};
pub use context::{AuthState, Context};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
