use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use paybook_core::{DomainError, StoreId};

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DomainError::Gateway(_) => StatusCode::BAD_GATEWAY,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Unauthorized => StatusCode::FORBIDDEN,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match err {
        // Backend detail stays in the logs.
        DomainError::Storage(detail) => {
            tracing::error!(%detail, "storage failure");
            "internal error".to_string()
        }
        DomainError::Validation(msg) => msg,
        other => other.to_string(),
    };
    json_error(status, message)
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, axum::Json(json!({ "error": message.into() }))).into_response()
}

pub fn parse_store_id(raw: &str) -> Result<StoreId, axum::response::Response> {
    raw.parse::<StoreId>()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid store id"))
}
