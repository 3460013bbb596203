//! Payment method registry.
//!
//! Keeps the invariant that every enabled method's `coaCode` resolves to a ledger
//! account, by creating the account rather than rejecting the method.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use paybook_auth::Principal;
use paybook_core::{DomainError, DomainResult, StoreId};
use paybook_payments::{
    MethodId, MethodUpdate, NewCustomMethod, PaymentMethodConfig, PaymentMethodView, accounts_to_provision,
    enabled_codes, normalize_display_names, seed_methods,
};
use paybook_vault::Vault;

use crate::services::access::StoreAccess;
use crate::storage::Storage;

#[derive(Clone)]
pub struct PaymentMethodRegistry {
    storage: Arc<dyn Storage>,
    vault: Arc<Vault>,
    access: StoreAccess,
}

impl PaymentMethodRegistry {
    pub fn new(storage: Arc<dyn Storage>, vault: Arc<Vault>) -> Self {
        let access = StoreAccess::new(storage.clone());
        Self { storage, vault, access }
    }

    /// All methods of the store, sorted by `sortOrder`, secrets masked.
    ///
    /// Seeds the catalog on first access, adds catalog gateway methods missing from
    /// an existing list, renames legacy labels, and provisions accounts for enabled
    /// methods.
    #[instrument(skip(self, principal), fields(store_id = %store_id), err)]
    pub async fn list(&self, principal: &Principal, store_id: StoreId) -> DomainResult<Vec<PaymentMethodView>> {
        self.access.require_owner(principal, store_id).await?;

        let mut methods = self.storage.list_methods(store_id).await?;
        let seeded = seed_methods(store_id, &methods, Utc::now());
        if !seeded.is_empty() {
            tracing::info!(count = seeded.len(), "seeding catalog payment methods");
        }
        methods.extend(seeded.iter().cloned());

        let renamed: HashSet<MethodId> = normalize_display_names(&mut methods).into_iter().collect();
        let seeded_ids: HashSet<&MethodId> = seeded.iter().map(|m| &m.id).collect();
        let dirty: Vec<PaymentMethodConfig> = methods
            .iter()
            .filter(|m| seeded_ids.contains(&m.id) || renamed.contains(&m.id))
            .cloned()
            .collect();
        self.provision_accounts(store_id, &methods).await?;
        self.storage.save_methods(dirty).await?;

        methods.sort_by_key(|m| m.sort_order);
        Ok(methods.iter().map(PaymentMethodConfig::view).collect())
    }

    /// Partial update of one method. Secrets that still carry the mask are left
    /// untouched.
    pub async fn update(
        &self,
        principal: &Principal,
        store_id: StoreId,
        update: MethodUpdate,
    ) -> DomainResult<PaymentMethodView> {
        let id = update.id.clone();
        self.update_many(principal, store_id, vec![update])
            .await?
            .pop()
            .ok_or_else(|| DomainError::not_found(format!("payment method {id}")))
    }

    /// Apply a batch of partial updates, provisioning accounts for the store's
    /// enabled methods once.
    ///
    /// All-or-nothing: an unknown id or a bad field rejects the whole batch before
    /// anything is written. Accounts are provisioned before the methods are saved,
    /// so a saved enabled method always has its account.
    #[instrument(skip(self, principal, updates), fields(store_id = %store_id, count = updates.len()), err)]
    pub async fn update_many(
        &self,
        principal: &Principal,
        store_id: StoreId,
        updates: Vec<MethodUpdate>,
    ) -> DomainResult<Vec<PaymentMethodView>> {
        self.access.require_owner(principal, store_id).await?;

        let mut methods = self.storage.list_methods(store_id).await?;
        let now = Utc::now();
        let mut touched: Vec<MethodId> = Vec::with_capacity(updates.len());
        for update in updates {
            let method = methods
                .iter_mut()
                .find(|m| m.id == update.id)
                .ok_or_else(|| DomainError::not_found(format!("payment method {}", update.id)))?;
            update.apply_to(method, &self.vault, now)?;
            if !touched.contains(&method.id) {
                touched.push(method.id.clone());
            }
        }

        let changed: Vec<PaymentMethodConfig> = touched
            .iter()
            .filter_map(|id| methods.iter().find(|m| &m.id == id).cloned())
            .collect();
        self.provision_accounts(store_id, &methods).await?;
        self.storage.save_methods(changed.clone()).await?;

        Ok(changed.iter().map(PaymentMethodConfig::view).collect())
    }

    /// Add a merchant-defined method. Its `coaCode` must not belong to an existing
    /// account.
    #[instrument(skip(self, principal, input), fields(store_id = %store_id), err)]
    pub async fn create_custom(
        &self,
        principal: &Principal,
        store_id: StoreId,
        input: NewCustomMethod,
    ) -> DomainResult<PaymentMethodView> {
        self.access.require_owner(principal, store_id).await?;

        let existing = self.storage.list_methods(store_id).await?;
        let sort_order = i32::try_from(existing.len() + 1).unwrap_or(i32::MAX);
        let method = input.into_config(store_id, sort_order, &self.vault, Utc::now())?;

        let clashing = self
            .storage
            .accounts_by_codes(store_id, std::slice::from_ref(&method.coa_code))
            .await?;
        if let Some(account) = clashing.first() {
            return Err(DomainError::conflict(format!(
                "COA code {} is already in use by account \"{}\"",
                method.coa_code, account.name
            )));
        }

        self.provision_accounts(store_id, std::slice::from_ref(&method)).await?;
        self.storage.save_methods(vec![method.clone()]).await?;
        tracing::info!(method_id = %method.id, "custom payment method created");

        Ok(method.view())
    }

    /// Remove a custom method. Built-in methods can only be disabled.
    #[instrument(skip(self, principal), fields(store_id = %store_id, method_id = %method_id), err)]
    pub async fn delete(&self, principal: &Principal, store_id: StoreId, method_id: &MethodId) -> DomainResult<()> {
        self.access.require_owner(principal, store_id).await?;

        if !method_id.is_custom() {
            return Err(DomainError::validation(
                "Built-in payment methods cannot be deleted. Disable them instead.",
            ));
        }
        if !self.storage.delete_method(store_id, method_id).await? {
            return Err(DomainError::not_found(format!("payment method {method_id}")));
        }
        Ok(())
    }

    /// Make sure every enabled method's code has an account.
    ///
    /// One batch read plus at most one batch insert. Concurrent callers may plan
    /// the same account; the storage layer drops the duplicate insert.
    #[instrument(skip(self, methods), fields(store_id = %store_id, created), err)]
    pub async fn provision_accounts(&self, store_id: StoreId, methods: &[PaymentMethodConfig]) -> DomainResult<usize> {
        let codes = enabled_codes(methods);
        if codes.is_empty() {
            return Ok(0);
        }

        let existing: HashSet<String> = self
            .storage
            .accounts_by_codes(store_id, &codes)
            .await?
            .into_iter()
            .map(|a| a.code)
            .collect();

        let plan = accounts_to_provision(methods, &existing);
        if plan.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let accounts = plan
            .into_iter()
            .map(|a| a.into_account(store_id, now))
            .collect::<DomainResult<Vec<_>>>()?;
        let created = self.storage.insert_accounts(store_id, accounts).await?;

        tracing::Span::current().record("created", created);
        tracing::info!(created, "provisioned ledger accounts for payment methods");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paybook_accounting::AccountType;
    use paybook_core::UserId;
    use paybook_payments::PaymentCategory;
    use paybook_vault::MASK;
    use serde_json::Map;

    use async_trait::async_trait;
    use paybook_accounting::{Account, AppendOutcome, JournalEntry, Transaction};
    use paybook_core::AccountId;

    use crate::services::fixtures::Fixture;
    use crate::storage::{
        AccountRepository, InMemoryLedgerStore, JournalRepository, PaymentMethodRepository, Store, StoreDirectory,
    };

    fn custom(name: &str, code: &str) -> NewCustomMethod {
        NewCustomMethod {
            name: name.into(),
            category: PaymentCategory::Other,
            coa_code: code.into(),
            gateway: None,
            api_key: Some("sk_live_custom".into()),
            public_key: None,
            webhook_secret: None,
            description: None,
            icon: None,
            settings: Map::new(),
        }
    }

    fn enable(id: &MethodId) -> MethodUpdate {
        MethodUpdate {
            id: id.clone(),
            enabled: Some(true),
            ..MethodUpdate::default()
        }
    }

    #[tokio::test]
    async fn first_listing_seeds_catalog_and_cash_account() {
        let fx = Fixture::new().await;
        let methods = fx.registry.list(&fx.owner, fx.store.id).await.unwrap();

        assert_eq!(methods.len(), 8);
        assert!(methods.windows(2).all(|w| w[0].sort_order <= w[1].sort_order));
        assert_eq!(methods[0].name, "Cash on Hand");

        let accounts = fx.db.list_accounts(fx.store.id).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].code, "1000");

        // Second listing adds nothing.
        assert_eq!(fx.registry.list(&fx.owner, fx.store.id).await.unwrap().len(), 8);
        assert_eq!(fx.db.list_accounts(fx.store.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enabling_push_payment_provisions_one_asset_account() {
        let fx = Fixture::new().await;
        let methods = fx.registry.list(&fx.owner, fx.store.id).await.unwrap();
        let mpesa = methods.iter().find(|m| m.coa_code == "1030").unwrap();

        fx.registry.update(&fx.owner, fx.store.id, enable(&mpesa.id)).await.unwrap();
        let codes: Vec<String> = fx.db.list_accounts(fx.store.id).await.unwrap().into_iter().map(|a| a.code).collect();
        assert!(codes.contains(&"1030".to_string()));
        let provisioned = fx
            .db
            .accounts_by_codes(fx.store.id, &["1030".to_string()])
            .await
            .unwrap()
            .remove(0);
        assert_eq!(provisioned.account_type, AccountType::Asset);
        assert_eq!(provisioned.category, "Current Asset");
        assert_eq!(provisioned.name, "M-Pesa Express (Kenya)");

        fx.registry.update(&fx.owner, fx.store.id, enable(&mpesa.id)).await.unwrap();
        assert_eq!(fx.db.list_accounts(fx.store.id).await.unwrap().len(), 2);
    }

    /// In-memory backend whose account inserts always fail.
    struct AccountsDown(Arc<InMemoryLedgerStore>);

    #[async_trait]
    impl StoreDirectory for AccountsDown {
        async fn get_store(&self, store_id: StoreId) -> DomainResult<Option<Store>> {
            self.0.get_store(store_id).await
        }

        async fn insert_store(&self, store: Store) -> DomainResult<()> {
            self.0.insert_store(store).await
        }

        async fn stores_owned_by(&self, owner_id: UserId) -> DomainResult<Vec<Store>> {
            self.0.stores_owned_by(owner_id).await
        }
    }

    #[async_trait]
    impl AccountRepository for AccountsDown {
        async fn list_accounts(&self, store_id: StoreId) -> DomainResult<Vec<Account>> {
            self.0.list_accounts(store_id).await
        }

        async fn get_account(&self, store_id: StoreId, account_id: AccountId) -> DomainResult<Option<Account>> {
            self.0.get_account(store_id, account_id).await
        }

        async fn accounts_by_codes(&self, store_id: StoreId, codes: &[String]) -> DomainResult<Vec<Account>> {
            self.0.accounts_by_codes(store_id, codes).await
        }

        async fn insert_accounts(&self, _store_id: StoreId, _accounts: Vec<Account>) -> DomainResult<usize> {
            Err(DomainError::storage("accounts table unavailable"))
        }
    }

    #[async_trait]
    impl JournalRepository for AccountsDown {
        async fn append(&self, entry: JournalEntry) -> DomainResult<AppendOutcome> {
            self.0.append(entry).await
        }

        async fn list_transactions(&self, store_id: StoreId) -> DomainResult<Vec<Transaction>> {
            self.0.list_transactions(store_id).await
        }
    }

    #[async_trait]
    impl PaymentMethodRepository for AccountsDown {
        async fn list_methods(&self, store_id: StoreId) -> DomainResult<Vec<PaymentMethodConfig>> {
            self.0.list_methods(store_id).await
        }

        async fn get_method(&self, store_id: StoreId, method_id: &MethodId) -> DomainResult<Option<PaymentMethodConfig>> {
            self.0.get_method(store_id, method_id).await
        }

        async fn save_methods(&self, methods: Vec<PaymentMethodConfig>) -> DomainResult<()> {
            self.0.save_methods(methods).await
        }

        async fn delete_method(&self, store_id: StoreId, method_id: &MethodId) -> DomainResult<bool> {
            self.0.delete_method(store_id, method_id).await
        }
    }

    #[tokio::test]
    async fn failed_provisioning_leaves_method_disabled() {
        let fx = Fixture::new().await;
        let mpesa = fx.method_with_code("1030").await;

        let broken = PaymentMethodRegistry::new(Arc::new(AccountsDown(fx.db.clone())), fx.vault.clone());
        let err = broken.update(&fx.owner, fx.store.id, enable(&mpesa.id)).await.unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));

        assert!(!fx.stored_method(&mpesa.id).await.enabled);
        assert!(fx.db.accounts_by_codes(fx.store.id, &["1030".to_string()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn provisioning_takes_at_most_two_round_trips() {
        let fx = Fixture::new().await;
        let mut methods = seed_methods(fx.store.id, &[], Utc::now());
        for m in methods.iter_mut() {
            m.enabled = true;
        }

        let before = fx.db.account_round_trips();
        let created = fx.registry.provision_accounts(fx.store.id, &methods).await.unwrap();
        assert_eq!(created, 8);
        assert!(fx.db.account_round_trips() - before <= 2);

        let before = fx.db.account_round_trips();
        assert_eq!(fx.registry.provision_accounts(fx.store.id, &methods).await.unwrap(), 0);
        assert_eq!(fx.db.account_round_trips() - before, 1);
    }

    #[tokio::test]
    async fn secrets_are_stored_sealed_and_shown_masked() {
        let fx = Fixture::new().await;
        let methods = fx.registry.list(&fx.owner, fx.store.id).await.unwrap();
        let stripe = methods.iter().find(|m| m.gateway.as_deref() == Some("Stripe")).unwrap();

        let update = MethodUpdate {
            id: stripe.id.clone(),
            api_key: Some("sk_test_123".into()),
            ..MethodUpdate::default()
        };
        let view = fx.registry.update(&fx.owner, fx.store.id, update).await.unwrap();
        assert_eq!(view.api_key.as_deref(), Some(MASK));

        let stored = fx.stored_method(&stripe.id).await;
        let sealed = stored.api_key.clone().unwrap();
        assert_ne!(sealed, "sk_test_123");
        assert_eq!(fx.vault.decrypt(&sealed).unwrap(), "sk_test_123");

        // Echoing the mask back keeps the stored ciphertext.
        let echo = MethodUpdate {
            id: stripe.id.clone(),
            api_key: Some(MASK.into()),
            ..MethodUpdate::default()
        };
        fx.registry.update(&fx.owner, fx.store.id, echo).await.unwrap();
        assert_eq!(fx.stored_method(&stripe.id).await.api_key, Some(sealed));
    }

    #[tokio::test]
    async fn batch_with_unknown_id_writes_nothing() {
        let fx = Fixture::new().await;
        let methods = fx.registry.list(&fx.owner, fx.store.id).await.unwrap();
        let cheque = methods.iter().find(|m| m.coa_code == "1040").unwrap();

        let err = fx
            .registry
            .update_many(&fx.owner, fx.store.id, vec![enable(&cheque.id), enable(&MethodId::new("pm_nope"))])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        assert!(!fx.stored_method(&cheque.id).await.enabled);

        let updated = fx
            .registry
            .update_many(&fx.owner, fx.store.id, vec![enable(&cheque.id)])
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert!(fx.db.accounts_by_codes(fx.store.id, &["1040".to_string()]).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .registry
            .update(&fx.owner, fx.store.id, enable(&MethodId::new("pm_nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn custom_method_with_used_code_conflicts() {
        let fx = Fixture::new().await;
        fx.registry.list(&fx.owner, fx.store.id).await.unwrap();

        let err = fx
            .registry
            .create_custom(&fx.owner, fx.store.id, custom("Till", "1000"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::Conflict("COA code 1000 is already in use by account \"Cash on Hand\"".into())
        );
    }

    #[tokio::test]
    async fn custom_method_is_appended_and_deletable() {
        let fx = Fixture::new().await;
        fx.registry.list(&fx.owner, fx.store.id).await.unwrap();

        let created = fx
            .registry
            .create_custom(&fx.owner, fx.store.id, custom("Airtel Money", "1060"))
            .await
            .unwrap();
        assert!(created.id.is_custom());
        assert!(created.enabled);
        assert_eq!(created.sort_order, 9);
        assert_eq!(created.api_key.as_deref(), Some(MASK));
        assert_eq!(fx.db.accounts_by_codes(fx.store.id, &["1060".to_string()]).await.unwrap().len(), 1);

        fx.registry.delete(&fx.owner, fx.store.id, &created.id).await.unwrap();
        let err = fx.registry.delete(&fx.owner, fx.store.id, &created.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn built_in_methods_cannot_be_deleted() {
        let fx = Fixture::new().await;
        let methods = fx.registry.list(&fx.owner, fx.store.id).await.unwrap();
        let err = fx.registry.delete(&fx.owner, fx.store.id, &methods[0].id).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("Disable them instead")));
    }

    #[tokio::test]
    async fn other_owners_cannot_list() {
        let fx = Fixture::new().await;
        let stranger = Principal::new(UserId::new());
        let err = fx.registry.list(&stranger, fx.store.id).await.unwrap_err();
        assert_eq!(err, DomainError::Unauthorized);
    }
}
