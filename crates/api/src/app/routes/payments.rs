use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use paybook_infra::Services;
use paybook_infra::services::PaymentRequest;
use paybook_payments::MethodId;

use crate::app::errors;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id/payments", post(initiate_payment))
        .route("/:id/payments/:method_id/:reference/verify", post(verify_payment))
}

/// Start a checkout; the body names the method and order.
pub async fn initiate_payment(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<PaymentRequest>,
) -> axum::response::Response {
    let store_id = match errors::parse_store_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.payments.initiate(&principal.principal(), store_id, body).await {
        Ok(initiation) => (StatusCode::OK, Json(initiation)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn verify_payment(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, method_id, reference)): Path<(String, String, String)>,
) -> axum::response::Response {
    let store_id = match errors::parse_store_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .payments
        .verify(&principal.principal(), store_id, &MethodId::new(method_id), &reference)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
