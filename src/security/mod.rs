//! Security middleware.
//!
//! Only cross-origin resource sharing is handled here; the task API has no
//! authentication.

mod cors;

pub use cors::CorsMiddleware;
