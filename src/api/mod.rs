//! The task HTTP API: route table, handlers, and JSON envelope.
//!
//! | Method | Path              | Handler                       |
//! |--------|-------------------|-------------------------------|
//! | GET    | `/api/healthz`    | [`handlers::healthz`]         |
//! | POST   | `/api/enqueue`    | [`handlers::enqueue`]         |
//! | GET    | `/api/queue`      | [`handlers::list`]            |
//! | POST   | `/api/retry/:id`  | [`handlers::retry`]           |

use std::sync::Arc;

use crate::Router;
use crate::context::Context;
use crate::middleware::{LoggerMiddleware, Pipeline};
use crate::queue::TaskService;
use crate::security::CorsMiddleware;

pub mod envelope;
pub mod handlers;

pub use envelope::{ApiError, ApiResponse, Outcome};

/// Builds the router for the task API on top of `service`.
pub fn routes(service: Arc<TaskService>) -> Router {
    let mut router = Router::new();

    router.get("/api/healthz", handlers::healthz);

    let svc = Arc::clone(&service);
    router.post("/api/enqueue", move |ctx: Context| {
        let svc = Arc::clone(&svc);
        async move { handlers::enqueue(&svc, ctx).await }
    });

    let svc = Arc::clone(&service);
    router.get("/api/queue", move |ctx: Context| {
        let svc = Arc::clone(&svc);
        async move { handlers::list(&svc, ctx).await }
    });

    router.post("/api/retry/:id", move |ctx: Context| {
        let svc = Arc::clone(&service);
        async move { handlers::retry(&svc, ctx).await }
    });

    router.not_found(handlers::not_found);
    router.method_not_allowed(handlers::method_not_allowed);
    router
}

/// The full request pipeline: request logging, CORS, then [`routes`].
///
/// CORS accepts every origin; use [`app_with`] for an allow-list.
pub fn app(service: Arc<TaskService>) -> Pipeline {
    app_with(service, CorsMiddleware::new())
}

/// Like [`app`], with the given CORS policy.
pub fn app_with(service: Arc<TaskService>, cors: CorsMiddleware) -> Pipeline {
    Pipeline::new(routes(service))
        .with(Arc::new(LoggerMiddleware))
        .with(Arc::new(cors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TaskStatus;
    use crate::{Request, Response, StatusCode};

    fn request(method: &str, target: &str, body: &str) -> Request {
        let raw = format!(
            "{method} {target} HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost:5173\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    fn json(res: &Response) -> serde_json::Value {
        serde_json::from_slice(res.body_bytes()).unwrap()
    }

    // Takes the next delivery the way the worker does and fails it.
    async fn fail_next(service: &TaskService, id: &str) {
        assert_eq!(service.next_queued().await.as_deref(), Some(id));
        service.begin_processing(id).unwrap();
        service.resolve(id, TaskStatus::Failed).unwrap();
    }

    #[test]
    fn route_table() {
        let router = routes(Arc::new(TaskService::new(4)));
        assert_eq!(router.len(), 4);
    }

    #[tokio::test]
    async fn enqueue_then_list_through_pipeline() {
        let service = Arc::new(TaskService::new(4));
        let app = app(Arc::clone(&service));

        let res = app
            .handle(request("POST", "/api/enqueue", r#"{"id":"a","data":"hello"}"#))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.headers().get("access-control-allow-origin"), Some("*"));

        let res = app.handle(request("GET", "/api/queue", "")).await;
        let body = json(&res);
        assert_eq!(body["data"]["tasks"][0]["id"], "a");
        assert_eq!(body["data"]["tasks"][0]["data"], "hello");
        assert_eq!(body["data"]["meta"]["count"], 1);
    }

    #[tokio::test]
    async fn retry_path_param() {
        let service = Arc::new(TaskService::new(4));
        service.add_task(Some("job-9"), "x").await.unwrap();
        fail_next(&service, "job-9").await;

        let res = app(Arc::clone(&service))
            .handle(request("POST", "/api/retry/job-9", ""))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(json(&res)["data"]["id"], "job-9");
        assert_eq!(service.queued(), 1);
    }

    #[tokio::test]
    async fn retry_id_with_escaped_space() {
        let service = Arc::new(TaskService::new(4));
        let app = app(Arc::clone(&service));

        let res = app
            .handle(request("POST", "/api/enqueue", r#"{"id":"job 1","data":"x"}"#))
            .await;
        assert_eq!(json(&res)["data"]["id"], "job 1");
        fail_next(&service, "job 1").await;

        let res = app.handle(request("POST", "/api/retry/job%201", "")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(json(&res)["data"]["id"], "job 1");
        assert_eq!(
            service.get_task("job 1").unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn list_status_filter_is_decoded() {
        let service = Arc::new(TaskService::new(4));
        service.add_task(Some("a"), "x").await.unwrap();
        fail_next(&service, "a").await;

        let res = app(service)
            .handle(request("GET", "/api/queue?status=fail%65d", ""))
            .await;
        let body = json(&res);
        assert_eq!(body["data"]["meta"]["total"], 1);
        assert_eq!(body["data"]["tasks"][0]["id"], "a");
    }

    #[tokio::test]
    async fn restricted_cors_ignores_other_origins() {
        let cors = CorsMiddleware::restricted(["https://app.example.com"]);
        let app = app_with(Arc::new(TaskService::new(4)), cors);
        let res = app.handle(request("GET", "/api/healthz", "")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert!(!res.headers().contains("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn wrong_method_is_405_envelope() {
        let app = app(Arc::new(TaskService::new(4)));
        let res = app.handle(request("GET", "/api/enqueue", "")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert_eq!(res.headers().get("allow"), Some("POST"));
        assert_eq!(json(&res)["status"], "error");
    }

    #[tokio::test]
    async fn unknown_path_is_404_envelope() {
        let app = app(Arc::new(TaskService::new(4)));
        let res = app.handle(request("GET", "/api/nope", "")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
        assert_eq!(json(&res)["message"], "Route not found");
    }

    #[tokio::test]
    async fn preflight_is_answered_by_cors() {
        let app = app(Arc::new(TaskService::new(4)));
        let res = app.handle(request("OPTIONS", "/api/enqueue", "")).await;
        assert_eq!(res.status(), StatusCode::NoContent);
        assert_eq!(
            res.headers().get("access-control-allow-methods"),
            Some("GET, POST, OPTIONS")
        );
    }
}
