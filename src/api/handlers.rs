//! Request handlers for the task API.
//!
//! Each handler borrows the shared [`TaskService`] and turns a [`Context`]
//! into a JSON [`Response`].

use serde::{Deserialize, Serialize};

use super::envelope::{ApiError, ApiResponse};
use crate::context::Context;
use crate::queue::{Task, TaskService};
use crate::{Response, StatusCode};

/// Body of `POST /api/enqueue`.
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct TaskRef {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskListing {
    pub tasks: Vec<Task>,
    pub meta: PageMeta,
}

/// `GET /api/healthz`
pub async fn healthz(_ctx: Context) -> Response {
    ApiResponse::message("Service is healthy").into_response(StatusCode::Ok)
}

/// `POST /api/enqueue`
pub async fn enqueue(service: &TaskService, ctx: Context) -> Response {
    respond(enqueue_inner(service, ctx).await)
}

async fn enqueue_inner(service: &TaskService, ctx: Context) -> Result<Response, ApiError> {
    let payload: EnqueueRequest = ctx.json().map_err(ApiError::InvalidJson)?;
    let task = service
        .add_task(payload.id.as_deref(), &payload.data)
        .await?;
    Ok(ApiResponse::success("Task queued", TaskRef { id: task.id }).into_response(StatusCode::Ok))
}

/// `GET /api/queue?status=&page=&limit=`
///
/// `page` and `limit` that do not parse as integers are treated as absent.
pub async fn list(service: &TaskService, ctx: Context) -> Response {
    let request = ctx.request();
    let page = request.query_param("page").and_then(parse_int);
    let limit = request.query_param("limit").and_then(parse_int);
    let status = request.query_param("status");

    let listing = service.list_tasks(status, page, limit);
    let meta = PageMeta {
        page: listing.page,
        limit: listing.limit,
        total: listing.total,
        count: listing.count(),
    };
    ApiResponse::success(
        "List of tasks",
        TaskListing {
            tasks: listing.tasks,
            meta,
        },
    )
    .into_response(StatusCode::Ok)
}

/// `POST /api/retry/:id`
pub async fn retry(service: &TaskService, ctx: Context) -> Response {
    respond(retry_inner(service, &ctx))
}

fn retry_inner(service: &TaskService, ctx: &Context) -> Result<Response, ApiError> {
    let id = ctx
        .params()
        .get("id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingId)?;
    let task = service.retry_task(id)?;
    Ok(ApiResponse::success("Task retried", TaskRef { id: task.id }).into_response(StatusCode::Ok))
}

/// Fallback for paths no route knows.
pub async fn not_found(_ctx: Context) -> Response {
    ApiError::RouteNotFound.into_response()
}

/// Fallback for known paths hit with the wrong method.
pub async fn method_not_allowed(_ctx: Context) -> Response {
    ApiError::MethodNotAllowed.into_response()
}

fn respond(result: Result<Response, ApiError>) -> Response {
    result.unwrap_or_else(ApiError::into_response)
}

fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}
