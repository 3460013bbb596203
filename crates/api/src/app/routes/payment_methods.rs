use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use paybook_infra::Services;
use paybook_payments::{MethodId, NewCustomMethod};

use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route(
        "/:id/payment-methods",
        get(list_methods)
            .patch(update_methods)
            .post(create_method)
            .delete(delete_method),
    )
}

/// Every method of the store, secrets masked.
pub async fn list_methods(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let store_id = match errors::parse_store_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.registry.list(&principal.principal(), store_id).await {
        Ok(methods) => (StatusCode::OK, Json(serde_json::json!({ "methods": methods }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn update_methods(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateMethodsRequest>,
) -> axum::response::Response {
    let store_id = match errors::parse_store_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let count = body.updates.len();
    match services.registry.update_many(&principal.principal(), store_id, body.updates).await {
        Ok(methods) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "count": count, "methods": methods })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_method(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<NewCustomMethod>,
) -> axum::response::Response {
    let store_id = match errors::parse_store_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.registry.create_custom(&principal.principal(), store_id, body).await {
        Ok(method) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": method.id, "message": "Payment method created", "method": method })),
        )
            .into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn delete_method(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::MethodQuery>,
) -> axum::response::Response {
    let store_id = match errors::parse_store_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(method_id) = query.method_id.filter(|m| !m.trim().is_empty()) else {
        return errors::json_error(StatusCode::BAD_REQUEST, "methodId required");
    };

    match services
        .registry
        .delete(&principal.principal(), store_id, &MethodId::new(method_id))
        .await
    {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
