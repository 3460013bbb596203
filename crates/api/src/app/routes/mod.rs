use axum::{Router, routing::get};

pub mod accounts;
pub mod payment_methods;
pub mod payments;
pub mod reports;
pub mod stores;
pub mod system;
pub mod transactions;
pub mod webhooks;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest(
            "/stores",
            stores::router()
                .merge(payment_methods::router())
                .merge(payments::router()),
        )
        .nest(
            "/finance",
            reports::router()
                .merge(accounts::router())
                .merge(transactions::router()),
        )
}
