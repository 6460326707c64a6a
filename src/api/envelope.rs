//! JSON envelope shared by every API response, and the API error type.

use serde::Serialize;
use thiserror::Error;

use crate::queue::TaskError;
use crate::{Response, StatusCode};

/// Top-level `status` field of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// `{ "status": ..., "message": ..., "data": ... }`
///
/// `data` is omitted entirely when there is none.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T = ()> {
    pub status: Outcome,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl ApiResponse {
    /// A success envelope with no `data`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: Outcome::Success,
            message: message.into(),
            data: None,
        }
    }

    /// An error envelope.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Outcome::Error,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// A success envelope carrying `data`.
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: Outcome::Success,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Serializes the envelope into an HTTP response with the given status.
    pub fn into_response(self, status: StatusCode) -> Response {
        Response::new(status).json(&self)
    }
}

/// Everything a handler can fail with, mapped onto HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid task JSON")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Task ID is required in URL")]
    MissingId,

    #[error("Route not found")]
    RouteNotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJson(_) | Self::MissingId => StatusCode::BadRequest,
            Self::RouteNotFound => StatusCode::NotFound,
            Self::MethodNotAllowed => StatusCode::MethodNotAllowed,
            Self::Task(err) => match err {
                TaskError::Validation(_)
                | TaskError::DuplicateId(_)
                | TaskError::InvalidState { .. } => StatusCode::BadRequest,
                TaskError::NotFound(_) => StatusCode::NotFound,
                TaskError::QueueFull => StatusCode::ServiceUnavailable,
            },
        }
    }

    /// The client-facing message. Task identifiers are left out.
    pub fn message(&self) -> String {
        match self {
            Self::Task(err) => match err {
                TaskError::Validation(msg) => msg.clone(),
                TaskError::DuplicateId(_) => "Task ID already exists".to_owned(),
                TaskError::NotFound(_) => "Task not found".to_owned(),
                TaskError::InvalidState { .. } => "Only failed tasks can be retried".to_owned(),
                TaskError::QueueFull => "Queue is full, try again later".to_owned(),
            },
            other => other.to_string(),
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        ApiResponse::error(self.message()).into_response(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TaskStatus;

    fn body(res: &Response) -> serde_json::Value {
        serde_json::from_slice(res.body_bytes()).unwrap()
    }

    #[test]
    fn success_without_data_omits_field() {
        let res = ApiResponse::message("Service is healthy").into_response(StatusCode::Ok);
        assert_eq!(
            body(&res),
            serde_json::json!({"status": "success", "message": "Service is healthy"})
        );
    }

    #[test]
    fn success_with_data() {
        let res = ApiResponse::success("Task queued", serde_json::json!({"id": "a"}))
            .into_response(StatusCode::Ok);
        assert_eq!(body(&res)["data"]["id"], "a");
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
    }

    #[test]
    fn task_errors_map_to_status_and_message() {
        let cases = [
            (TaskError::Validation("data field is required".into()), 400, "data field is required"),
            (TaskError::DuplicateId("a".into()), 400, "Task ID already exists"),
            (TaskError::NotFound("a".into()), 404, "Task not found"),
            (
                TaskError::InvalidState {
                    id: "a".into(),
                    status: TaskStatus::Done,
                },
                400,
                "Only failed tasks can be retried",
            ),
            (TaskError::QueueFull, 503, "Queue is full, try again later"),
        ];
        for (err, code, message) in cases {
            let res = ApiError::from(err).into_response();
            assert_eq!(res.status().as_u16(), code);
            let json = body(&res);
            assert_eq!(json["status"], "error");
            assert_eq!(json["message"], message);
            assert!(json.get("data").is_none());
        }
    }

    #[test]
    fn routing_errors() {
        assert_eq!(ApiError::RouteNotFound.status(), StatusCode::NotFound);
        assert_eq!(ApiError::MethodNotAllowed.status(), StatusCode::MethodNotAllowed);
        assert_eq!(ApiError::MissingId.message(), "Task ID is required in URL");
    }
}
