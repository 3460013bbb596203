use std::sync::Arc;

use anyhow::Context;

use paybook_gateways::build_http_client;
use paybook_infra::{Services, Settings, connect_storage};

/// Wire storage, the vault and the outbound HTTP client into the service set.
pub async fn build_services(settings: &Settings) -> anyhow::Result<Services> {
    let vault = Arc::new(settings.vault().context("failed to load the encryption key")?);
    let http = build_http_client(settings.gateway_timeout).context("failed to build the gateway HTTP client")?;
    let storage = connect_storage(settings).await.context("failed to open storage")?;

    tracing::info!(
        public_url = %settings.public_url,
        gateway_timeout_ms = settings.gateway_timeout.as_millis() as u64,
        persistent = settings.database_url.is_some(),
        "services ready"
    );

    Ok(Services::new(storage, vault, http, settings.public_url.clone()))
}
