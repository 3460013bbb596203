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
    Router::new().route("/accounts", get(list_accounts).post(create_account))
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::StoreQuery>,
) -> axum::response::Response {
    let store_id = match query.store_id() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.list_accounts(&principal.principal(), store_id).await {
        Ok(accounts) => (StatusCode::OK, Json(serde_json::json!({ "accounts": accounts }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_account(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::StoreQuery>,
    Json(body): Json<dto::CreateAccountRequest>,
) -> axum::response::Response {
    let store_id = match query.store_id() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .ledger
        .create_account(&principal.principal(), store_id, body.into_new_account())
        .await
    {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
