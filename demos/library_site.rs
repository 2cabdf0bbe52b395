//! A toy library site showing `Cache-Control` annotation end to end.
//!
//! The chain is: request logging → auth-state identification (from a session
//! cookie — stands in for a real authentication layer) → cache annotation →
//! the page handler.
//!
//! ```text
//! cargo run --example library_site
//! curl -i http://127.0.0.1:8080/catalog/
//! curl -i http://127.0.0.1:8080/catalog/books/
//! curl -i -H 'Cookie: sessionid=abc' http://127.0.0.1:8080/mybooks/
//! ```

use std::sync::Arc;

use maxage::cache::CacheControlMiddleware;
use maxage::context::{AuthState, Context};
use maxage::http::{Response, StatusCode};
use maxage::middleware::{LoggerMiddleware, MiddlewareHandler, Next, from_middleware};
use maxage::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Stand-in for a real authentication layer: a session cookie means the
    // reader is logged in, anything else is an anonymous visitor.
    let identify: MiddlewareHandler = Arc::new(|mut ctx: Context, next: Next| {
        Box::pin(async move {
            let logged_in = ctx
                .request()
                .headers()
                .get("cookie")
                .is_some_and(|c| c.contains("sessionid="));
            ctx.extensions_mut().insert(if logged_in {
                AuthState::Authenticated
            } else {
                AuthState::Anonymous
            });
            next.run(ctx).await
        })
    });

    let server = Server::bind("127.0.0.1:8080")
        .await?
        .layer(from_middleware(Arc::new(LoggerMiddleware)))
        .layer(identify)
        .layer(from_middleware(Arc::new(CacheControlMiddleware::new())));

    server
        .run(|ctx: Context| async move {
            let path = ctx.request().path();
            if path.contains("mybooks") {
                Response::new(StatusCode::Ok).body("Your borrowed books")
            } else if path.contains("books") {
                Response::new(StatusCode::Ok).body("All books")
            } else if path.contains("authors") {
                Response::new(StatusCode::Ok).body("All authors")
            } else if path.contains("login") {
                Response::new(StatusCode::Ok).body("Log in")
            } else if path.contains("catalog") {
                Response::new(StatusCode::Ok).body("Library catalog")
            } else if path == "/" {
                Response::new(StatusCode::Ok).body("Welcome to the library")
            } else {
                Response::new(StatusCode::NotFound).body("Not Found")
            }
        })
        .await?;

    Ok(())
}
