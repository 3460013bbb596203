use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use paybook_infra::Services;

use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/transactions", get(list_transactions).post(post_transaction))
}

/// Journal lines, newest first.
pub async fn list_transactions(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::StoreQuery>,
) -> axum::response::Response {
    let store_id = match query.store_id() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.list_transactions(&principal.principal(), store_id).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "transactions": items }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn post_transaction(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::StoreQuery>,
    Json(body): Json<dto::PostTransactionRequest>,
) -> axum::response::Response {
    let store_id = match query.store_id() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .post_transaction(&principal.principal(), store_id, body.into_new_transaction())
        .await
    {
        Ok(tx) => (StatusCode::CREATED, Json(tx)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
