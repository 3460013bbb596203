use std::sync::Arc;

use serde::Deserialize;
use tracing::instrument;

use paybook_auth::{Principal, authorize_store};
use paybook_core::{DomainError, DomainResult, StoreId};

use crate::storage::{Storage, Store};

/// Input for opening a store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStore {
    pub name: String,
    pub currency: String,
}

/// Store ownership gate. Every store-scoped operation passes through here first.
#[derive(Clone)]
pub struct StoreAccess {
    storage: Arc<dyn Storage>,
}

impl StoreAccess {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Load the store and check the principal owns it.
    ///
    /// Unknown store → `NotFound`; someone else's store → `Unauthorized`.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id, store_id = %store_id), err)]
    pub async fn require_owner(&self, principal: &Principal, store_id: StoreId) -> DomainResult<Store> {
        let store = self
            .storage
            .get_store(store_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("store {store_id}")))?;
        authorize_store(principal, store.owner_id)?;
        Ok(store)
    }

    /// Store lookup without an ownership check, for processor callbacks.
    pub async fn find(&self, store_id: StoreId) -> DomainResult<Store> {
        self.storage
            .get_store(store_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("store {store_id}")))
    }

    #[instrument(skip(self, principal, input), fields(user_id = %principal.user_id), err)]
    pub async fn open_store(&self, principal: &Principal, input: NewStore) -> DomainResult<Store> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("store name is required"));
        }
        let currency = input.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation("currency must be a 3-letter ISO code"));
        }

        let store = Store {
            id: StoreId::new(),
            owner_id: principal.user_id,
            name: name.to_string(),
            currency,
        };
        self.storage.insert_store(store.clone()).await?;
        tracing::info!(store_id = %store.id, "store opened");
        Ok(store)
    }

    pub async fn stores_of(&self, principal: &Principal) -> DomainResult<Vec<Store>> {
        self.storage.stores_owned_by(principal.user_id).await
    }
}
