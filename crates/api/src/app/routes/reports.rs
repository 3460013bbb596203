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
    Router::new().route("/reports", get(financial_report))
}

/// P&L for the period plus the balance sheet as of its end.
pub async fn financial_report(
    Extension(services): Extension<Arc<Services>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::ReportQuery>,
) -> axum::response::Response {
    let store_id = match query.store_id() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (from, to) = match query.bounds() {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.ledger.report(&principal.principal(), store_id, from, to).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
