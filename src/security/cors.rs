//! Cross-Origin Resource Sharing.

use std::{future::Future, pin::Pin};

use crate::{
    Method, Response, StatusCode,
    context::Context,
    middleware::{Middleware, Next},
};

/// How long browsers may cache a preflight answer, in seconds.
const PREFLIGHT_MAX_AGE: &str = "3600";

/// CORS middleware: validates the `Origin` header, answers preflight requests,
/// and adds `Access-Control-*` headers to actual responses.
///
/// # Behavior
///
/// - Without an `Origin` header, or with an origin outside the allow-list, the
///   request passes through untouched.
/// - `OPTIONS` with an accepted origin is answered with `204 No Content`; the
///   router never sees it.
/// - Any other request runs normally and gets the CORS headers appended.
/// - `Vary: Origin` is added only when a specific origin is echoed back.
///
/// # Examples
///
/// ```rust
/// use taskq::security::CorsMiddleware;
///
/// let cors = CorsMiddleware::restricted(["http://localhost:5173"]);
/// ```
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsMiddleware {
    /// Creates a policy that fits the task API:
    ///
    /// | Setting          | Default value                |
    /// |------------------|------------------------------|
    /// | Allowed origins  | `*`                          |
    /// | Allowed methods  | `GET`, `POST`, `OPTIONS`     |
    /// | Allowed headers  | `Content-Type`               |
    pub fn new() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: vec!["GET".to_owned(), "POST".to_owned(), "OPTIONS".to_owned()],
            allowed_headers: vec!["Content-Type".to_owned()],
        }
    }

    /// Creates a policy that accepts only the listed origins.
    ///
    /// An entry of `"*"` accepts every origin, which makes this equal to
    /// [`new`](Self::new).
    pub fn restricted<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_origins: origins.into_iter().map(Into::into).collect(),
            ..Self::new()
        }
    }

    // Returns the value for `Access-Control-Allow-Origin`, or `None` to reject.
    fn resolve_origin(&self, origin: &str) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            Some("*".to_owned())
        } else if self.allowed_origins.iter().any(|o| o == origin) {
            Some(origin.to_owned())
        } else {
            None
        }
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let allow_origin = ctx
            .request()
            .headers()
            .get("origin")
            .and_then(|origin| self.resolve_origin(origin));
        let methods = self.allowed_methods.join(", ");
        let headers = self.allowed_headers.join(", ");

        Box::pin(async move {
            let Some(allow_origin) = allow_origin else {
                return next.run(ctx).await;
            };
            let is_wildcard = allow_origin == "*";

            let mut resp = if ctx.request().method() == &Method::Options {
                Response::new(StatusCode::NoContent)
                    .header("Access-Control-Max-Age", PREFLIGHT_MAX_AGE)
            } else {
                next.run(ctx).await
            };

            resp.add_header("Access-Control-Allow-Origin", allow_origin);
            resp.add_header("Access-Control-Allow-Methods", methods);
            resp.add_header("Access-Control-Allow-Headers", headers);
            if !is_wildcard {
                resp.add_header("Vary", "Origin");
            }
            resp
        })
    }
}
