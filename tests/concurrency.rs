use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use taskq::queue::{ProcessError, TaskError, TaskService, Worker, processor_fn};
use taskq::{Task, TaskStatus};
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admission_registers_each_task_once() {
    let service = Arc::new(TaskService::new(256));

    let mut joins = Vec::new();
    for producer in 0..8 {
        let service = Arc::clone(&service);
        joins.push(tokio::spawn(async move {
            for n in 0..25 {
                service
                    .add_task(Some(&format!("p{producer}-{n}")), "payload")
                    .await
                    .unwrap();
            }
        }));
    }
    for join in joins {
        join.await.unwrap();
    }

    let page = service.list_tasks(None, Some(1), Some(1_000));
    assert_eq!(page.total, 200);
    let ids: HashSet<_> = page.tasks.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids.len(), 200);
    assert_eq!(service.queued(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_duplicates_admit_exactly_one() {
    let service = Arc::new(TaskService::new(64));

    let mut joins = Vec::new();
    for _ in 0..16 {
        let service = Arc::clone(&service);
        joins.push(tokio::spawn(async move {
            service.add_task(Some("same"), "payload").await
        }));
    }

    let mut admitted = 0;
    for join in joins {
        match join.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(err) => assert_eq!(err, TaskError::DuplicateId("same".into())),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(service.registered(), 1);
    assert_eq!(service.queued(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_drains_concurrent_producers() {
    let service = Arc::new(TaskService::new(4).with_admission_timeout(Duration::from_secs(5)));
    let processor = processor_fn(|task: Task| async move {
        if task.data == "bad" {
            Err(ProcessError::new("rejected"))
        } else {
            Ok(())
        }
    });
    let worker = Worker::new(
        Arc::clone(&service),
        Arc::new(processor),
        CancellationToken::new(),
    )
    .spawn();

    let mut joins = Vec::new();
    for producer in 0..4 {
        let service = Arc::clone(&service);
        joins.push(tokio::spawn(async move {
            for n in 0..5 {
                let data = if n == 0 { "bad" } else { "good" };
                service
                    .add_task(Some(&format!("p{producer}-{n}")), data)
                    .await
                    .unwrap();
            }
        }));
    }
    for join in joins {
        join.await.unwrap();
    }

    // Wait for every task to reach a terminal status.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let busy = service.list_tasks(Some("pending"), None, None).total
                + service.list_tasks(Some("processing"), None, None).total;
            if busy == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(service.list_tasks(Some("done"), None, None).total, 16);
    assert_eq!(service.list_tasks(Some("failed"), None, None).total, 4);
    assert_eq!(service.get_task("p0-0").unwrap().status, TaskStatus::Failed);

    worker.shutdown(Duration::from_secs(1)).await.unwrap();
}
