use anyhow::Context;

use paybook_api::app::{build_app, services::build_services};
use paybook_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    paybook_observability::init();
    paybook_observability::announce("paybook-api");

    let settings = Settings::from_env().context("invalid configuration")?;
    tracing::debug!(?settings, "configuration loaded");

    let services = build_services(&settings).await?;
    let app = build_app(settings.jwt_secret.clone(), services);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
