use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use paybook_infra::Services;
use paybook_infra::services::NewStore;

use crate::app::errors;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_stores).post(open_store))
}

pub async fn list_stores(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.stores.stores_of(&principal.principal()).await {
        Ok(stores) => (StatusCode::OK, Json(serde_json::json!({ "stores": stores }))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn open_store(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewStore>,
) -> axum::response::Response {
    match services.stores.open_store(&principal.principal(), body).await {
        Ok(store) => (StatusCode::CREATED, Json(store)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
