use std::sync::Arc;

use reqwest::Client;
use tracing::instrument;

use paybook_core::{DomainError, DomainResult, StoreId};
use paybook_gateways::{Gateway, GatewayKind};
use paybook_payments::{MethodId, PaymentMethodConfig};
use paybook_vault::Vault;

use crate::storage::Storage;

/// Turns a stored method configuration into a ready adapter.
#[derive(Clone)]
pub struct GatewayResolver {
    storage: Arc<dyn Storage>,
    vault: Arc<Vault>,
    http: Client,
}

impl GatewayResolver {
    pub fn new(storage: Arc<dyn Storage>, vault: Arc<Vault>, http: Client) -> Self {
        Self { storage, vault, http }
    }

    /// Adapter for an enabled method of the store.
    #[instrument(skip(self), fields(store_id = %store_id, method_id = %method_id), err)]
    pub async fn resolve(
        &self,
        store_id: StoreId,
        method_id: &MethodId,
    ) -> DomainResult<(PaymentMethodConfig, Gateway)> {
        let method = self
            .storage
            .get_method(store_id, method_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("payment method {method_id}")))?;
        if !method.enabled {
            return Err(DomainError::validation(format!("payment method {method_id} is disabled")));
        }

        let gateway = Gateway::from_config(&method, &self.vault, &self.http)?;
        Ok((method, gateway))
    }

    /// Adapter for the store's method bound to `kind`, preferring an enabled one.
    /// Callbacks for a method disabled after checkout are still accepted.
    #[instrument(skip(self), fields(store_id = %store_id, gateway = %kind), err)]
    pub async fn resolve_kind(
        &self,
        store_id: StoreId,
        kind: GatewayKind,
    ) -> DomainResult<(PaymentMethodConfig, Gateway)> {
        let mut candidates: Vec<PaymentMethodConfig> = self
            .storage
            .list_methods(store_id)
            .await?
            .into_iter()
            .filter(|m| m.gateway.as_deref().and_then(|g| g.parse::<GatewayKind>().ok()) == Some(kind))
            .collect();
        candidates.sort_by_key(|m| !m.enabled);

        let method = candidates
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::not_found(format!("{kind} payment method")))?;
        let gateway = Gateway::from_config(&method, &self.vault, &self.http)?;
        Ok((method, gateway))
    }
}
