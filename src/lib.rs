//! # taskq
//!
//! A bounded, in-memory task queue with a single background worker, served
//! over a small async HTTP/1.1 stack.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use taskq::queue::{SimulatedProcessor, TaskService, Worker};
//! use taskq::server::Server;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = Arc::new(TaskService::new(100));
//!     let processor = Arc::new(SimulatedProcessor::new(Duration::from_secs(2), 0.2));
//!     let worker = Worker::new(Arc::clone(&service), processor, CancellationToken::new()).spawn();
//!
//!     let app = Arc::new(taskq::api::app(service));
//!     let server = Server::bind("127.0.0.1:8081").await?;
//!     server
//!         .run(
//!             move |req| {
//!                 let app = Arc::clone(&app);
//!                 async move { app.handle(req).await }
//!             },
//!             async { let _ = tokio::signal::ctrl_c().await; },
//!         )
//!         .await?;
//!
//!     worker.shutdown(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

// ── Task core ─────────────────────────────────────────────────────────────────
pub mod queue;

// ── HTTP stack ────────────────────────────────────────────────────────────────
pub mod api;
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod security;
pub mod server;

// ── Process plumbing ──────────────────────────────────────────────────────────
pub mod config;
pub mod logging;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use queue::{Task, TaskError, TaskService, TaskStatus};
pub use router::Router;
pub use server::{Server, ServerError};
