//! HTTP application wiring.
//!
//! - `services.rs`: storage, vault and HTTP client wiring
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies and query strings
//! - `errors.rs`: `{ "error": ... }` responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use paybook_infra::Services;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router.
///
/// Processor callbacks sit outside the bearer-auth layer; they authenticate
/// with their own signatures.
pub fn build_app(jwt_secret: String, services: Services) -> Router {
    let jwt = Arc::new(paybook_auth::Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = middleware::AuthState { jwt };
    let services = Arc::new(services);

    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/webhooks", routes::webhooks::router().layer(Extension(services)))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
