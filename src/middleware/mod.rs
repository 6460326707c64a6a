//! Middleware pipeline: composable before/after request handler logic.
//!
//! Each middleware wraps the next layer, enabling request inspection, short-circuit
//! responses, and response decoration without coupling handlers to infrastructure
//! concerns.
//!
//! ## Core types
//!
//! - [`Middleware`]: trait implemented by all middleware.
//! - [`Next`]: cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`]: type-erased, cheaply-cloneable middleware function.
//! - [`Pipeline`]: an ordered middleware stack terminating in a [`Router`].
//! - [`LoggerMiddleware`]: built-in request/response logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Request, Response, Router, StatusCode, context::Context};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] advances the cursor by one position and invokes the next
/// middleware (or returns a fallback `500` response when the chain is exhausted
/// without any middleware generating a response).
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    pub fn new(middlewares: Arc<[MiddlewareHandler]>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// If no handler remains (i.e. the chain is exhausted without producing a
    /// response), a `500 Internal Server Error` response is returned.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = Arc::clone(&self.middlewares[self.index]);
            self.index += 1;
            handler(ctx, self).await
        } else {
            Response::new(StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through**: call `next.run(ctx).await` without modification.
/// - **Short-circuit**: return a [`Response`] directly without calling `next`.
/// - **Decorate**: call `next.run(ctx).await`, inspect the response, and return
///   a modified copy.
///
/// Implementations must be `Send + Sync` because middleware is shared across
/// Tokio tasks, and should not hold locks across an `.await` point.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// An ordered middleware stack whose innermost layer dispatches to a [`Router`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use taskq::{Response, Router, StatusCode};
/// use taskq::middleware::{LoggerMiddleware, Pipeline};
///
/// let mut router = Router::new();
/// router.get("/api/healthz", |_ctx| async { Response::new(StatusCode::Ok) });
///
/// let pipeline = Pipeline::new(router).with(Arc::new(LoggerMiddleware));
/// ```
pub struct Pipeline {
    layers: Vec<MiddlewareHandler>,
    router: Arc<Router>,
    chain: Arc<[MiddlewareHandler]>,
}

impl Pipeline {
    /// Creates a pipeline with no middleware in front of `router`.
    pub fn new(router: Router) -> Self {
        let router = Arc::new(router);
        let chain = Self::assemble(&[], &router);
        Self {
            layers: Vec::new(),
            router,
            chain,
        }
    }

    /// Appends `middleware` as the innermost layer added so far.
    ///
    /// The first middleware added sees the request first.
    #[must_use]
    pub fn with<M>(mut self, middleware: Arc<M>) -> Self
    where
        M: Middleware + 'static,
    {
        self.layers.push(from_middleware(middleware));
        self.chain = Self::assemble(&self.layers, &self.router);
        self
    }

    /// Runs `request` through every middleware and then the router.
    pub async fn handle(&self, request: Request) -> Response {
        Next::new(Arc::clone(&self.chain))
            .run(Context::new(request))
            .await
    }

    fn assemble(layers: &[MiddlewareHandler], router: &Arc<Router>) -> Arc<[MiddlewareHandler]> {
        let router = Arc::clone(router);
        let endpoint: MiddlewareHandler = Arc::new(move |ctx: Context, _next: Next| {
            let router = Arc::clone(&router);
            Box::pin(async move { router.route(ctx.into_request()).await })
        });
        layers.iter().cloned().chain(std::iter::once(endpoint)).collect()
    }
}

/// Built-in middleware that logs each request's method, path, status, and duration.
///
/// `LoggerMiddleware` does not short-circuit; it always delegates to the next
/// middleware and records timing after the fact.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_owned();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            tracing::info!(
                %method,
                %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request handled"
            );

            response
        })
    }
}
