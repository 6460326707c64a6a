//! The background consumer that drives queued tasks to a terminal status.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{ProcessError, ShutdownError, Task, TaskService, TaskStatus};

/// Boxed future returned by [`TaskProcessor::process`].
pub type ProcessFuture = Pin<Box<dyn Future<Output = Result<(), ProcessError>> + Send>>;

/// The unit of work the worker performs for each task.
///
/// Returning `Ok` resolves the task to `done`, returning `Err` resolves it to
/// `failed`. A panic inside the returned future is caught by the worker and
/// also ends in `failed`; it never stops the worker loop.
pub trait TaskProcessor: Send + Sync + 'static {
    fn process(&self, task: Task) -> ProcessFuture;
}

/// Adapts an async closure into a [`TaskProcessor`].
///
/// Created with [`processor_fn`].
pub struct FnProcessor<F> {
    f: F,
}

/// Wraps `f` so it can be used as a [`TaskProcessor`].
pub fn processor_fn<F, Fut>(f: F) -> FnProcessor<F>
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProcessError>> + Send + 'static,
{
    FnProcessor { f }
}

impl<F, Fut> TaskProcessor for FnProcessor<F>
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ProcessError>> + Send + 'static,
{
    fn process(&self, task: Task) -> ProcessFuture {
        Box::pin((self.f)(task))
    }
}

/// Default processor: sleeps for a fixed delay, then fails at random.
#[derive(Debug, Clone)]
pub struct SimulatedProcessor {
    delay: Duration,
    failure_rate: f64,
}

impl SimulatedProcessor {
    /// `failure_rate` is clamped to `[0, 1]`.
    pub fn new(delay: Duration, failure_rate: f64) -> Self {
        Self {
            delay,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl TaskProcessor for SimulatedProcessor {
    fn process(&self, task: Task) -> ProcessFuture {
        let delay = self.delay;
        let failure_rate = self.failure_rate;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            if fastrand::f64() < failure_rate {
                return Err(ProcessError::new(format!("simulated failure for {}", task.id)));
            }
            Ok(())
        })
    }
}

/// Single consumer of the [`TaskService`] queue.
///
/// Suspends only while waiting for the next task and while the processor
/// runs. Cancellation is observed between tasks: a task that has been
/// received is always carried to a terminal status first.
pub struct Worker {
    service: Arc<TaskService>,
    processor: Arc<dyn TaskProcessor>,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(
        service: Arc<TaskService>,
        processor: Arc<dyn TaskProcessor>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            processor,
            shutdown,
        }
    }

    /// Spawns the worker loop onto the current tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let shutdown = self.shutdown.clone();
        let join = tokio::spawn(self.run());
        WorkerHandle { shutdown, join }
    }

    /// Runs until the cancellation token fires.
    pub async fn run(self) {
        info!("worker started");
        loop {
            let id = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                next = self.service.next_queued() => match next {
                    Some(id) => id,
                    None => break,
                },
            };
            self.handle(&id).await;
        }
        info!("worker shutting down");
    }

    async fn handle(&self, id: &str) {
        let Some(task) = self.service.begin_processing(id) else {
            return;
        };
        info!(task_id = %id, "processing task");

        // The work runs in its own task so that a panic surfaces as a
        // `JoinError` here instead of unwinding through the loop.
        let processor = Arc::clone(&self.processor);
        let outcome = tokio::spawn(async move { processor.process(task).await }).await;

        let resolved = match outcome {
            Ok(Ok(())) => {
                info!(task_id = %id, "task done");
                self.service.resolve(id, TaskStatus::Done)
            }
            Ok(Err(err)) => {
                warn!(task_id = %id, error = %err, "task failed");
                self.service.resolve(id, TaskStatus::Failed)
            }
            Err(err) => {
                error!(task_id = %id, error = %err, "recovered from fault while processing task");
                self.service.mark_failed(id)
            }
        };
        if let Err(err) = resolved {
            error!(task_id = %id, error = %err, "could not record task outcome");
        }
    }
}

/// Handle to a spawned [`Worker`].
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Returns `true` while the worker loop has not exited.
    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Signals the worker to stop and waits up to `grace` for it to exit.
    ///
    /// The task in progress, if any, is allowed to finish.
    ///
    /// # Errors
    ///
    /// - [`ShutdownError::GracePeriodElapsed`]: the worker is still busy;
    ///   it is left to finish in the background.
    /// - [`ShutdownError::Join`]: the worker loop itself panicked.
    pub async fn shutdown(self, grace: Duration) -> Result<(), ShutdownError> {
        self.shutdown.cancel();
        match tokio::time::timeout(grace, self.join).await {
            Ok(joined) => Ok(joined?),
            Err(_) => Err(ShutdownError::GracePeriodElapsed(grace)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use parking_lot::Mutex;

    fn spawn_with(service: &Arc<TaskService>, processor: impl TaskProcessor) -> WorkerHandle {
        Worker::new(
            Arc::clone(service),
            Arc::new(processor),
            CancellationToken::new(),
        )
        .spawn()
    }

    async fn wait_for(service: &TaskService, id: &str, status: TaskStatus) {
        for _ in 0..200 {
            if service.get_task(id).map(|t| t.status) == Ok(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {id} never reached {status}");
    }

    #[tokio::test]
    async fn processes_to_done() {
        let service = Arc::new(TaskService::new(8));
        let worker = spawn_with(&service, processor_fn(|_task| async { Ok::<_, ProcessError>(()) }));

        service.add_task(Some("a"), "x").await.unwrap();
        wait_for(&service, "a", TaskStatus::Done).await;

        worker.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn processor_error_marks_failed() {
        let service = Arc::new(TaskService::new(8));
        let worker = spawn_with(
            &service,
            processor_fn(|_task| async { Err::<(), _>(ProcessError::new("boom")) }),
        );

        service.add_task(Some("a"), "x").await.unwrap();
        wait_for(&service, "a", TaskStatus::Failed).await;

        worker.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn panic_is_isolated_to_one_task() {
        let service = Arc::new(TaskService::new(8));
        let worker = spawn_with(
            &service,
            processor_fn(|task: Task| async move {
                if task.data == "explode" {
                    panic!("injected fault");
                }
                Ok::<_, ProcessError>(())
            }),
        );

        service.add_task(Some("bad"), "explode").await.unwrap();
        service.add_task(Some("good"), "fine").await.unwrap();

        wait_for(&service, "bad", TaskStatus::Failed).await;
        wait_for(&service, "good", TaskStatus::Done).await;
        assert!(worker.is_running());

        worker.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn retried_task_is_redelivered_once() {
        let service = Arc::new(TaskService::new(8));
        let deliveries: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

        let seen = Arc::clone(&deliveries);
        let worker = spawn_with(
            &service,
            processor_fn(move |task: Task| {
                let attempt = {
                    let mut seen = seen.lock();
                    let count = seen.entry(task.id.clone()).or_default();
                    *count += 1;
                    *count
                };
                async move {
                    if attempt == 1 {
                        Err(ProcessError::new("first attempt fails"))
                    } else {
                        Ok(())
                    }
                }
            }),
        );

        service.add_task(Some("a"), "x").await.unwrap();
        wait_for(&service, "a", TaskStatus::Failed).await;

        let retried = service.retry_task("a").unwrap();
        assert_eq!(retried.status, TaskStatus::Pending);
        wait_for(&service, "a", TaskStatus::Done).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(deliveries.lock().get("a"), Some(&2));
        assert_eq!(service.queued(), 0);

        worker.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn idle_worker_exits_on_shutdown() {
        let service = Arc::new(TaskService::new(8));
        let worker = spawn_with(&service, processor_fn(|_task| async { Ok::<_, ProcessError>(()) }));
        assert!(worker.is_running());
        worker.shutdown(Duration::from_millis(500)).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_lets_current_task_finish() {
        let service = Arc::new(TaskService::new(8));
        let worker = spawn_with(
            &service,
            SimulatedProcessor::new(Duration::from_millis(200), 0.0),
        );

        service.add_task(Some("a"), "x").await.unwrap();
        service.add_task(Some("b"), "x").await.unwrap();
        wait_for(&service, "a", TaskStatus::Processing).await;

        worker.shutdown(Duration::from_secs(2)).await.unwrap();
        assert_eq!(service.get_task("a").unwrap().status, TaskStatus::Done);
        assert_eq!(service.get_task("b").unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn shutdown_reports_elapsed_grace() {
        let service = Arc::new(TaskService::new(8));
        let worker = spawn_with(
            &service,
            SimulatedProcessor::new(Duration::from_millis(500), 0.0),
        );

        service.add_task(Some("a"), "x").await.unwrap();
        wait_for(&service, "a", TaskStatus::Processing).await;

        let err = worker.shutdown(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, ShutdownError::GracePeriodElapsed(_)));
    }

    #[tokio::test]
    async fn simulated_processor_always_fails_at_rate_one() {
        let processor = SimulatedProcessor::new(Duration::ZERO, 1.5);
        let result = processor.process(Task::new("a", "x")).await;
        assert!(result.is_err());

        let processor = SimulatedProcessor::new(Duration::ZERO, 0.0);
        assert!(processor.process(Task::new("a", "x")).await.is_ok());
    }
}
