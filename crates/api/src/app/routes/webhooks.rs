//! Processor callbacks. No bearer token: each request is authenticated by the
//! processor's signature (or, for M-Pesa, the token baked into the callback URL).

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};

use paybook_core::DomainError;
use paybook_gateways::GatewayKind;
use paybook_infra::Services;
use paybook_infra::services::RecordOutcome;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/stripe/:store_id", post(stripe_webhook))
        .route("/paystack/:store_id", post(paystack_webhook))
        .route("/mpesa/:store_id", post(mpesa_callback))
}

pub async fn stripe_webhook(
    Extension(services): Extension<Arc<Services>>,
    Path(store_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = header_str(&headers, "stripe-signature");
    match receive(&services, GatewayKind::Stripe, &store_id, &body, signature).await {
        Ok(outcome) => acknowledged(outcome),
        Err(resp) => resp,
    }
}

pub async fn paystack_webhook(
    Extension(services): Extension<Arc<Services>>,
    Path(store_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = header_str(&headers, "x-paystack-signature");
    match receive(&services, GatewayKind::Paystack, &store_id, &body, signature).await {
        Ok(outcome) => acknowledged(outcome),
        Err(resp) => resp,
    }
}

/// STK push result. Daraja only wants `ResultCode: 0` back.
pub async fn mpesa_callback(
    Extension(services): Extension<Arc<Services>>,
    Path(store_id): Path<String>,
    Query(query): Query<dto::MpesaCallbackQuery>,
    body: Bytes,
) -> axum::response::Response {
    match receive(&services, GatewayKind::Mpesa, &store_id, &body, query.token.as_deref()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({ "ResultCode": 0, "ResultDesc": "Accepted" })),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

async fn receive(
    services: &Services,
    kind: GatewayKind,
    store_id: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<Option<RecordOutcome>, axum::response::Response> {
    let store_id = errors::parse_store_id(store_id)?;

    services
        .payments
        .handle_webhook(kind, store_id, body, signature)
        .await
        .map_err(|e| match e {
            DomainError::Unauthorized => errors::json_error(StatusCode::UNAUTHORIZED, "invalid signature"),
            other => errors::domain_error_to_response(other),
        })
}

fn acknowledged(outcome: Option<RecordOutcome>) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "received": true, "outcome": outcome })),
    )
        .into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
