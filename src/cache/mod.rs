//! Cache-Control response annotation.
//!
//! This module is the heart of the crate: a response-phase middleware that
//! stamps the `Cache-Control` header on outgoing responses according to an
//! ordered rule table keyed on path substrings and the caller's
//! authentication state.
//!
//! ## Core types
//!
//! - [`CacheRule`] — one (path substrings, optional auth requirement,
//!   directive) tuple.
//! - [`CachePolicy`] — an ordered, immutable-at-runtime list of rules with
//!   last-match-wins evaluation.
//! - [`CacheControlMiddleware`] — the [`Middleware`] that applies a policy to
//!   each response after the downstream handler has produced it.
//!
//! ## Evaluation semantics
//!
//! Every rule in the table is evaluated against every request, front to back,
//! and each matching rule conceptually overwrites the directive chosen so
//! far. There is no early exit: the directive written to the response is the
//! one of the **last** matching rule. A request matching no rule leaves the
//! response exactly as the downstream handler built it, including any
//! `Cache-Control` the handler set itself.
//!
//! Path matching is substring containment on the raw request path — no
//! segment or prefix semantics. `/catalog-archive/` matches a `catalog`
//! rule just as `/catalog/` does.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{
    Response,
    context::{AuthState, Context},
    middleware::{Middleware, Next},
};

/// The response header this module writes.
pub const CACHE_CONTROL: &str = "Cache-Control";

/// A single cache-annotation rule.
///
/// A rule matches when the request path contains **any** of its substrings
/// and, if an authentication requirement was set with
/// [`for_auth`](Self::for_auth), the request's [`AuthState`] equals it.
/// Rules without a requirement apply to every caller.
///
/// # Examples
///
/// ```
/// use maxage::cache::CacheRule;
/// use maxage::context::AuthState;
///
/// let rule = CacheRule::new(["books", "book"], "private, no-transform, max-age=600")
///     .for_auth(AuthState::Authenticated);
///
/// assert!(rule.matches(Some("/catalog/books/"), AuthState::Authenticated));
/// assert!(!rule.matches(Some("/catalog/books/"), AuthState::Anonymous));
/// assert!(!rule.matches(None, AuthState::Authenticated));
/// ```
#[derive(Debug, Clone)]
pub struct CacheRule {
    substrings: Vec<String>,
    auth: Option<AuthState>,
    directive: String,
}

impl CacheRule {
    /// Creates a rule matching any of `substrings`, for every caller.
    pub fn new(
        substrings: impl IntoIterator<Item = impl Into<String>>,
        directive: impl Into<String>,
    ) -> Self {
        Self {
            substrings: substrings.into_iter().map(Into::into).collect(),
            auth: None,
            directive: directive.into(),
        }
    }

    /// Restricts the rule to requests whose [`AuthState`] equals `auth`.
    #[must_use]
    pub fn for_auth(mut self, auth: AuthState) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Returns the `Cache-Control` value this rule assigns.
    pub fn directive(&self) -> &str {
        &self.directive
    }

    /// Returns `true` if this rule applies to the given path and auth state.
    ///
    /// A request without a path (`None`) matches no rule: path-based
    /// annotation is simply skipped for such requests.
    pub fn matches(&self, path: Option<&str>, auth: AuthState) -> bool {
        let auth_ok = self.auth.is_none_or(|required| required == auth);
        let path_ok = path.is_some_and(|p| self.substrings.iter().any(|s| p.contains(s.as_str())));
        auth_ok && path_ok
    }
}

/// An ordered cache-annotation rule table.
///
/// The table is built once and read-only afterwards; evaluation walks the
/// whole table and the last matching rule wins.
///
/// # Examples
///
/// ```
/// use maxage::cache::{CachePolicy, CacheRule};
/// use maxage::context::AuthState;
///
/// let policy = CachePolicy::new(vec![
///     CacheRule::new(["assets"], "public, max-age=86400"),
///     CacheRule::new(["assets/private"], "no-store"),
/// ]);
///
/// // Both rules match; the later one wins.
/// assert_eq!(
///     policy.evaluate(Some("/assets/private/report.pdf"), AuthState::Unknown),
///     Some("no-store"),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct CachePolicy {
    rules: Vec<CacheRule>,
}

impl CachePolicy {
    /// Creates a policy from an ordered list of rules.
    pub fn new(rules: Vec<CacheRule>) -> Self {
        Self { rules }
    }

    /// The default rule table for a library-style site.
    ///
    /// Catalog and login pages are never stored; book and author pages are
    /// cached for ten minutes, privately for logged-in readers and publicly
    /// for anonymous ones; a reader's personal loan list additionally
    /// requires revalidation.
    ///
    /// | substrings          | auth          | directive                                |
    /// |---------------------|---------------|------------------------------------------|
    /// | `catalog`           | any           | `no-store, no-cache, must-revalidate`    |
    /// | `login`             | any           | `no-store`                               |
    /// | `books`, `book`     | authenticated | `private, no-transform, max-age=600`     |
    /// | `authors`, `author` | authenticated | `private, max-age=600`                   |
    /// | `mybooks`           | authenticated | `private, must-revalidate, max-age=600`  |
    /// | `books`, `book`     | anonymous     | `no-transform, public, max-age=600`      |
    /// | `authors`, `author` | anonymous     | `public, max-age=600`                    |
    pub fn library_defaults() -> Self {
        Self::new(vec![
            CacheRule::new(["catalog"], "no-store, no-cache, must-revalidate"),
            CacheRule::new(["login"], "no-store"),
            CacheRule::new(["books", "book"], "private, no-transform, max-age=600")
                .for_auth(AuthState::Authenticated),
            CacheRule::new(["authors", "author"], "private, max-age=600")
                .for_auth(AuthState::Authenticated),
            CacheRule::new(["mybooks"], "private, must-revalidate, max-age=600")
                .for_auth(AuthState::Authenticated),
            CacheRule::new(["books", "book"], "no-transform, public, max-age=600")
                .for_auth(AuthState::Anonymous),
            CacheRule::new(["authors", "author"], "public, max-age=600")
                .for_auth(AuthState::Anonymous),
        ])
    }

    /// Appends a rule at the end of the table, where it takes the highest
    /// precedence under last-match-wins evaluation.
    pub fn push(&mut self, rule: CacheRule) {
        self.rules.push(rule);
    }

    /// Returns the directive of the last rule matching `(path, auth)`, if any.
    pub fn evaluate(&self, path: Option<&str>, auth: AuthState) -> Option<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(path, auth))
            .next_back()
            .map(CacheRule::directive)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::library_defaults()
    }
}

/// Response-phase middleware that annotates `Cache-Control`.
///
/// On each request the middleware snapshots the path and the
/// [`AuthState`](crate::context::AuthState) recorded in the context, lets the
/// rest of the chain produce the response, and then — if any rule of its
/// [`CachePolicy`] matched — **sets** the `Cache-Control` header to the
/// winning directive, replacing whatever the downstream handler put there.
/// Responses matching no rule pass through untouched.
///
/// The middleware performs no I/O and introduces no failure modes; whatever
/// the downstream future does (including panicking) propagates unchanged.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use maxage::cache::CacheControlMiddleware;
/// use maxage::middleware::from_middleware;
///
/// let annotate = from_middleware(Arc::new(CacheControlMiddleware::new()));
/// ```
pub struct CacheControlMiddleware {
    policy: Arc<CachePolicy>,
}

impl CacheControlMiddleware {
    /// Creates the middleware with [`CachePolicy::library_defaults`].
    pub fn new() -> Self {
        Self::with_policy(CachePolicy::library_defaults())
    }

    /// Creates the middleware with a custom rule table.
    pub fn with_policy(policy: CachePolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }
}

impl Default for CacheControlMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for CacheControlMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let policy = Arc::clone(&self.policy);

        Box::pin(async move {
            // Snapshot before the chain consumes the context.
            let path = ctx.request().path().to_owned();
            let auth = ctx.auth_state();

            let mut response = next.run(ctx).await;

            if let Some(directive) = policy.evaluate(Some(&path), auth) {
                response.set_header(CACHE_CONTROL, directive);
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, StatusCode};
    use crate::middleware::{MiddlewareHandler, from_middleware};

    // ── CachePolicy ───────────────────────────────────────────────────────────

    fn defaults() -> CachePolicy {
        CachePolicy::library_defaults()
    }

    #[test]
    fn catalog_is_never_stored() {
        assert_eq!(
            defaults().evaluate(Some("/catalog/"), AuthState::Unknown),
            Some("no-store, no-cache, must-revalidate"),
        );
    }

    #[test]
    fn substring_not_prefix_matching() {
        assert_eq!(
            defaults().evaluate(Some("/catalog-archive/"), AuthState::Unknown),
            Some("no-store, no-cache, must-revalidate"),
        );
    }

    #[test]
    fn login_wins_over_catalog() {
        assert_eq!(
            defaults().evaluate(Some("/catalog/login/"), AuthState::Authenticated),
            Some("no-store"),
        );
    }

    #[test]
    fn login_applies_to_every_auth_state() {
        for auth in [
            AuthState::Authenticated,
            AuthState::Anonymous,
            AuthState::Unknown,
        ] {
            assert_eq!(defaults().evaluate(Some("/login/"), auth), Some("no-store"));
        }
    }

    #[test]
    fn authenticated_books_are_private() {
        assert_eq!(
            defaults().evaluate(Some("/books/42/"), AuthState::Authenticated),
            Some("private, no-transform, max-age=600"),
        );
    }

    #[test]
    fn authenticated_authors_are_private() {
        assert_eq!(
            defaults().evaluate(Some("/author/7/"), AuthState::Authenticated),
            Some("private, max-age=600"),
        );
    }

    #[test]
    fn mybooks_overrides_books_for_authenticated() {
        // "mybooks" contains "books", so the earlier books rule matches too;
        // the later, more specific rule must win.
        assert_eq!(
            defaults().evaluate(Some("/mybooks/"), AuthState::Authenticated),
            Some("private, must-revalidate, max-age=600"),
        );
    }

    #[test]
    fn anonymous_books_are_public() {
        assert_eq!(
            defaults().evaluate(Some("/books/42/"), AuthState::Anonymous),
            Some("no-transform, public, max-age=600"),
        );
    }

    #[test]
    fn anonymous_author_is_public() {
        assert_eq!(
            defaults().evaluate(Some("/author/7/"), AuthState::Anonymous),
            Some("public, max-age=600"),
        );
    }

    #[test]
    fn anonymous_books_override_catalog() {
        // The catalog rule matches first, then the anonymous books rule
        // overwrites it.
        assert_eq!(
            defaults().evaluate(Some("/catalog/books/"), AuthState::Anonymous),
            Some("no-transform, public, max-age=600"),
        );
    }

    #[test]
    fn catalog_sticks_when_auth_state_is_unknown() {
        // No auth-constrained rule can match Unknown, so the catalog
        // directive survives.
        assert_eq!(
            defaults().evaluate(Some("/catalog/books/"), AuthState::Unknown),
            Some("no-store, no-cache, must-revalidate"),
        );
    }

    #[test]
    fn unmatched_path_yields_nothing() {
        assert_eq!(defaults().evaluate(Some("/static/style.css"), AuthState::Anonymous), None);
        assert_eq!(defaults().evaluate(Some("/books/"), AuthState::Unknown), None);
    }

    #[test]
    fn absent_path_skips_all_rules() {
        for auth in [
            AuthState::Authenticated,
            AuthState::Anonymous,
            AuthState::Unknown,
        ] {
            assert_eq!(defaults().evaluate(None, auth), None);
        }
    }

    #[test]
    fn pushed_rule_takes_precedence() {
        let mut policy = defaults();
        policy.push(CacheRule::new(["catalog"], "no-cache"));
        assert_eq!(
            policy.evaluate(Some("/catalog/"), AuthState::Unknown),
            Some("no-cache"),
        );
    }

    // ── CacheControlMiddleware ────────────────────────────────────────────────

    fn context_for(raw: &[u8], auth: Option<AuthState>) -> Context {
        let (request, _) = Request::parse(raw).unwrap();
        let mut ctx = Context::new(request);
        if let Some(auth) = auth {
            ctx.extensions_mut().insert(auth);
        }
        ctx
    }

    /// Terminal handler that may preset a Cache-Control of its own.
    fn terminal(preset: Option<&'static str>) -> MiddlewareHandler {
        Arc::new(move |_ctx, _next| {
            Box::pin(async move {
                let mut response = Response::new(StatusCode::Ok).body("page");
                if let Some(value) = preset {
                    response.add_header(CACHE_CONTROL, value);
                }
                response
            })
        })
    }

    async fn annotated(raw: &[u8], auth: Option<AuthState>, preset: Option<&'static str>) -> Response {
        let chain = vec![
            from_middleware(Arc::new(CacheControlMiddleware::new())),
            terminal(preset),
        ];
        Next::new(chain).run(context_for(raw, auth)).await
    }

    #[tokio::test]
    async fn middleware_overwrites_downstream_header() {
        let response = annotated(
            b"GET /catalog/ HTTP/1.1\r\nHost: x\r\n\r\n",
            None,
            Some("public, max-age=31536000"),
        )
        .await;
        let values: Vec<_> = response.headers().get_all("cache-control").collect();
        assert_eq!(values, vec!["no-store, no-cache, must-revalidate"]);
    }

    #[tokio::test]
    async fn middleware_leaves_unmatched_response_untouched() {
        let response = annotated(
            b"GET /static/logo.png HTTP/1.1\r\nHost: x\r\n\r\n",
            Some(AuthState::Anonymous),
            Some("public, max-age=31536000"),
        )
        .await;
        assert_eq!(
            response.headers().get("cache-control"),
            Some("public, max-age=31536000"),
        );
    }

    #[tokio::test]
    async fn middleware_reads_auth_state_from_context() {
        let raw = b"GET /catalog/books/3/ HTTP/1.1\r\nHost: x\r\n\r\n";

        let authed = annotated(raw, Some(AuthState::Authenticated), None).await;
        assert_eq!(
            authed.headers().get("cache-control"),
            Some("private, no-transform, max-age=600"),
        );

        let anon = annotated(raw, Some(AuthState::Anonymous), None).await;
        assert_eq!(
            anon.headers().get("cache-control"),
            Some("no-transform, public, max-age=600"),
        );
    }

    #[tokio::test]
    async fn login_page_is_never_stored_end_to_end() {
        let response = annotated(
            b"GET /accounts/login/ HTTP/1.1\r\nHost: x\r\n\r\n",
            Some(AuthState::Anonymous),
            None,
        )
        .await;
        assert_eq!(response.headers().get("cache-control"), Some("no-store"));
    }

    #[tokio::test]
    async fn custom_policy_is_honored() {
        let policy = CachePolicy::new(vec![CacheRule::new(["assets"], "public, max-age=86400")]);
        let chain = vec![
            from_middleware(Arc::new(CacheControlMiddleware::with_policy(policy))),
            terminal(None),
        ];
        let ctx = context_for(b"GET /assets/app.js HTTP/1.1\r\nHost: x\r\n\r\n", None);
        let response = Next::new(chain).run(ctx).await;
        assert_eq!(
            response.headers().get("cache-control"),
            Some("public, max-age=86400"),
        );
    }
}
