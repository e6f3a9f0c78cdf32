use std::fmt::Display;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub type HttpResponse = Response;
pub type HttpResult<T = ()> = Result<T, HttpResponse>;

#[derive(Debug, Serialize, PartialEq)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

pub(crate) fn json_error(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> HttpResponse {
    (
        status,
        Json(HttpErrorEnvelope {
            code: code.into(),
            message: message.into(),
            details: None,
        }),
    )
        .into_response()
}

pub fn internal_error(err: impl Display) -> HttpResponse {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn assert_error_response(response: Response, expected_status: StatusCode, expected_code: &str, expected_message: &str) {
        assert_eq!(response.status(), expected_status);

        let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body should be readable");
        let parsed: HttpErrorEnvelope = serde_json::from_slice(&body).expect("response body should be valid error json");

        assert_eq!(parsed.code, expected_code);
        assert_eq!(parsed.message, expected_message);
        assert_eq!(parsed.details, None);
    }

    #[tokio::test]
    async fn json_error_sets_status_code_message_and_no_details() {
        let response = json_error(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", "upstream failure");
        assert_error_response(response, StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", "upstream failure").await;
    }

    #[tokio::test]
    async fn internal_error_sets_internal_contract() {
        let response = internal_error("broker pipeline failure");
        assert_error_response(response, StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "broker pipeline failure").await;
    }

    #[tokio::test]
    async fn bad_request_sets_bad_request_contract() {
        let response = bad_request("invalid query");
        assert_error_response(response, StatusCode::BAD_REQUEST, "BAD_REQUEST", "invalid query").await;
    }
}
