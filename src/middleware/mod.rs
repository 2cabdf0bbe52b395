//! Middleware pipeline — composable before/after request handler logic.
//!
//! This module defines the core types for building an ordered middleware
//! stack. Each middleware wraps the next layer, enabling request inspection,
//! short-circuit responses, and response decoration without coupling handlers
//! to infrastructure concerns.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`]
//!   to advance to the next layer.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] — converts a [`Middleware`] trait object into a
//!   [`MiddlewareHandler`].
//! - [`LoggerMiddleware`] — built-in request/response logger.
//!
//! The stack is response-phase friendly: a middleware that calls
//! `next.run(ctx).await` receives the downstream [`Response`] by value and may
//! decorate it before returning — the pattern
//! [`CacheControlMiddleware`](crate::cache::CacheControlMiddleware) uses to
//! annotate `Cache-Control`.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Response, context::Context};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] advances the cursor by one position and invokes the
/// next middleware (or returns a fallback `500` response when the chain is
/// exhausted without any middleware generating a response).
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be
/// called more than once per middleware invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use std::pin::Pin;
/// use maxage::{Response, context::Context, middleware::{Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(
///         &self,
///         ctx: Context,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Response> + Send>> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
///
/// Construct one with [`from_middleware`] or by wrapping a closure directly:
///
/// ```rust,no_run
/// use std::{pin::Pin, sync::Arc};
/// use maxage::{Response, context::Context, middleware::{MiddlewareHandler, Next}};
///
/// let handler: MiddlewareHandler = Arc::new(|ctx: Context, next: Next| {
///     Box::pin(async move { next.run(ctx).await })
/// });
/// ```
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use maxage::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// Advances the internal cursor by one, clones the handler at the current
    /// position, and awaits it. If no handler remains (i.e. the chain is
    /// exhausted without producing a response), a `500 Internal Server Error`
    /// response is returned as a safe fallback.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            Response::new(crate::StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }
}

/// The core trait for all middleware in this crate.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(ctx).await`, inspect the response, and
///   return a modified copy.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared
///   across Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future so it can be awaited
///   across `.await` points in multi-threaded runtimes.
/// - Failures from downstream layers propagate untouched: `Next::run` yields
///   whatever the downstream future yields, and a panic unwinds through the
///   caller's task as usual.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Built-in middleware that logs each request's method, path, status, and duration.
///
/// Emits a single `tracing::info!` line after the downstream handler completes,
/// in the format:
///
/// ```text
/// METHOD /path - STATUS (duration)
/// ```
///
/// `LoggerMiddleware` does not short-circuit; it always delegates to the next
/// middleware and decorates the response timing after the fact.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_string();
            let path = ctx.request().path().to_string();

            let response = next.run(ctx).await;

            let duration = start.elapsed();
            let status = response.status().as_u16();

            tracing::info!("{} {} - {} ({:?})", method, path, status, duration);

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, StatusCode};

    fn context_for(raw: &[u8]) -> Context {
        let (request, _) = Request::parse(raw).unwrap();
        Context::new(request)
    }

    /// Terminal handler that answers 200 with the given body.
    fn terminal(body: &'static str) -> MiddlewareHandler {
        Arc::new(move |_ctx, _next| {
            Box::pin(async move { Response::new(StatusCode::Ok).body(body) })
        })
    }

    /// Appends `tag` to the `X-Trace` response header on the way out.
    fn tagger(tag: &'static str) -> MiddlewareHandler {
        Arc::new(move |ctx, next| {
            Box::pin(async move {
                let mut response = next.run(ctx).await;
                response.add_header("X-Trace", tag);
                response
            })
        })
    }

    #[tokio::test]
    async fn exhausted_chain_falls_back_to_500() {
        let ctx = context_for(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        let response = Next::new(vec![]).run(ctx).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn chain_runs_in_registration_order() {
        let ctx = context_for(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        let chain = vec![tagger("outer"), tagger("inner"), terminal("ok")];
        let response = Next::new(chain).run(ctx).await;

        assert_eq!(response.status(), StatusCode::Ok);
        // Response decoration happens on the way back out: innermost first.
        let tags: Vec<_> = response.headers().get_all("x-trace").collect();
        assert_eq!(tags, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_downstream() {
        let ctx = context_for(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        let deny: MiddlewareHandler = Arc::new(|_ctx, _next| {
            Box::pin(async { Response::new(StatusCode::Forbidden) })
        });
        let chain = vec![deny, terminal("unreachable")];
        let response = Next::new(chain).run(ctx).await;
        assert_eq!(response.status(), StatusCode::Forbidden);
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let ctx = context_for(b"GET /catalog/ HTTP/1.1\r\nHost: x\r\n\r\n");
        let chain = vec![
            from_middleware(Arc::new(LoggerMiddleware)),
            terminal("hello"),
        ];
        let response = Next::new(chain).run(ctx).await;
        assert_eq!(response.status(), StatusCode::Ok);
    }
}
