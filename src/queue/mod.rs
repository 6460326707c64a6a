//! Task queue core: registry, bounded queue, service facade, and worker.
//!
//! ```text
//!  add_task / retry_task                     list_tasks
//!          │                                     │
//!          ▼                                     ▼
//!   ┌─────────────┐   register / update   ┌────────────┐
//!   │ TaskService │ ────────────────────▶ │  Registry  │ ◀──┐
//!   └─────────────┘                       └────────────┘    │ status
//!          │ send_timeout / try_send                         │ transitions
//!          ▼                                                 │
//!   ┌──────────────┐        receive        ┌────────┐        │
//!   │ BoundedQueue │ ────────────────────▶ │ Worker │ ───────┘
//!   └──────────────┘                       └────────┘
//! ```
//!
//! The queue carries task IDs; the registry owns the tasks. Only the
//! service and the worker change a task's status.

mod channel;
mod error;
mod id;
mod registry;
mod service;
mod task;
mod worker;

pub use channel::BoundedQueue;
pub use error::{ProcessError, ShutdownError, TaskError};
pub use registry::Registry;
pub use service::{DEFAULT_ADMISSION_TIMEOUT, DEFAULT_LIMIT, DEFAULT_PAGE, TaskPage, TaskService};
pub use task::{ParseStatusError, Task, TaskStatus};
pub use worker::{
    FnProcessor, ProcessFuture, SimulatedProcessor, TaskProcessor, Worker, WorkerHandle,
    processor_fn,
};
