//! Request routing: map URL patterns and HTTP methods to handler functions.
//!
//! This module provides [`Router`], which dispatches incoming HTTP requests to handler
//! functions based on the request method and URL path. Two pattern styles are supported:
//!
//! | Pattern              | Example match              | Captured params              |
//! |----------------------|----------------------------|------------------------------|
//! | `/api/queue`         | `/api/queue`               | *(none)*                     |
//! | `/api/retry/:id`     | `/api/retry/job%201`       | `id → "job 1"`               |
//!
//! Trailing slashes are normalized on both patterns and incoming paths, so `/api/queue/` and
//! `/api/queue` are treated as equivalent.
//!
//! Routes are matched in registration order; the first route whose method and pattern both
//! match the incoming request wins. A path that matches only under other methods is answered
//! with `405 Method Not Allowed` and an `Allow` header.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::http::request::percent_decode;
use crate::{Method, Request, Response, StatusCode};

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared across
/// threads without copying the underlying closure. In practice you never construct this
/// type directly; use [`Router::get`] and [`Router::post`] instead.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below. Router methods accept `impl IntoHandler` so the two-type-parameter where-bound
/// does not need to be repeated at every call site.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    // Matches one exact path string, e.g. `/api/queue`.
    Exact(String),
    // Matches a fixed number of segments where some may be named captures, e.g. `/api/retry/:id`.
    Parameterized { segments: Vec<Segment> },
}

impl Pattern {
    /// Parse a route pattern string into a `Pattern`.
    ///
    /// A pattern containing `:` becomes [`Pattern::Parameterized`]; anything else is
    /// an [`Pattern::Exact`] literal. A trailing slash (other than on the root `/`)
    /// is stripped first.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_owned()),
                    None => Segment::Static(s.to_owned()),
                })
                .collect();

            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_owned())
    }

    // Try to match `path` against this pattern, returning extracted [`PathParams`] on success.
    //
    // Segments are split on the raw path, so an escaped `%2F` stays inside one
    // capture. Captured values are percent-decoded.
    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if s == path_seg => {}
                        Segment::Static(_) => return None,
                        Segment::Parameter(name) => {
                            params.insert(name.clone(), percent_decode(path_seg));
                        }
                    }
                }
                Some(params)
            }
        }
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

// A single registered route binding a method + pattern to a handler.
struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

impl Route {
    fn new(method: Method, pattern: &str, handler: Handler) -> Self {
        Self {
            method,
            pattern: Pattern::parse(pattern),
            handler,
        }
    }
}

/// HTTP request router that dispatches requests to registered handler functions.
///
/// Routes are evaluated in registration order; the first route whose HTTP method and path
/// pattern both match the incoming request is used. When the path matches only routes
/// registered under other methods, the `method_not_allowed` handler runs and the response
/// gets an `Allow` header. When nothing matches, the `not_found` handler runs. Both
/// default to bare status responses.
///
/// # Examples
///
/// ```rust,no_run
/// use taskq::{Router, Response, StatusCode};
/// use taskq::context::Context;
///
/// let mut router = Router::new();
///
/// router.get("/api/healthz", |_ctx| async { Response::new(StatusCode::Ok) });
///
/// router.post("/api/retry/:id", |ctx: Context| async move {
///     let id = ctx.params().get("id").unwrap_or("unknown").to_owned();
///     Response::new(StatusCode::Ok).body(id)
/// });
/// ```
pub struct Router {
    routes: Vec<Route>,
    not_found: Option<Handler>,
    method_not_allowed: Option<Handler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            not_found: None,
            method_not_allowed: None,
        }
    }

    /// Register a handler for `GET` requests matching `path`.
    ///
    /// # Arguments
    ///
    /// - `path`: URL pattern string (e.g. `"/api/queue"` or `"/api/retry/:id"`).
    /// - `handler`: Async function that receives a [`Context`] and returns a [`Response`].
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    /// Replace the response produced when no route matches the path.
    pub fn not_found(&mut self, handler: impl IntoHandler) {
        self.not_found = Some(erase(handler));
    }

    /// Replace the response produced when the path matches under other methods only.
    ///
    /// The router appends the `Allow` header to whatever this handler returns.
    pub fn method_not_allowed(&mut self, handler: impl IntoHandler) {
        self.method_not_allowed = Some(erase(handler));
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        self.routes.push(Route::new(method, path, erase(handler)));
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` to the first matching route and return its response.
    ///
    /// # Returns
    ///
    /// The [`Response`] produced by the matching handler; otherwise the
    /// `method_not_allowed` response (with `Allow`) if the path is known under other
    /// methods, or the `not_found` response.
    pub async fn route(&self, request: Request) -> Response {
        let mut allowed: Vec<&str> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(request.path()) else {
                continue;
            };
            if &route.method == request.method() {
                let ctx = Context::with_params(request, params);
                return (route.handler)(ctx).await;
            }
            if !allowed.contains(&route.method.as_str()) {
                allowed.push(route.method.as_str());
            }
        }

        if !allowed.is_empty() {
            let allow = allowed.join(", ");
            let mut response = match &self.method_not_allowed {
                Some(handler) => handler(Context::new(request)).await,
                None => Response::new(StatusCode::MethodNotAllowed),
            };
            response.add_header("Allow", allow);
            return response;
        }

        match &self.not_found {
            Some(handler) => handler(Context::new(request)).await,
            None => Response::new(StatusCode::NotFound),
        }
    }
}

// Erase the concrete handler type and store it as a `Handler` trait object.
fn erase(handler: impl IntoHandler) -> Handler {
    Arc::new(move |ctx| handler.call(ctx))
}
