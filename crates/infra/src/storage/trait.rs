use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use paybook_accounting::{Account, AppendOutcome, JournalEntry, Transaction};
use paybook_core::{AccountId, DomainResult, StoreId, UserId};
use paybook_payments::{MethodId, PaymentMethodConfig};

/// A merchant store: the ownership boundary for every other record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: StoreId,
    pub owner_id: UserId,
    pub name: String,
    /// ISO 4217 code used when a payment request names no currency.
    pub currency: String,
}

#[async_trait]
pub trait StoreDirectory: Send + Sync {
    async fn get_store(&self, store_id: StoreId) -> DomainResult<Option<Store>>;

    async fn insert_store(&self, store: Store) -> DomainResult<()>;

    async fn stores_owned_by(&self, owner_id: UserId) -> DomainResult<Vec<Store>>;
}

/// Chart-of-accounts storage. `(store_id, code)` is unique.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn list_accounts(&self, store_id: StoreId) -> DomainResult<Vec<Account>>;

    async fn get_account(&self, store_id: StoreId, account_id: AccountId) -> DomainResult<Option<Account>>;

    /// One round-trip for any number of codes.
    async fn accounts_by_codes(&self, store_id: StoreId, codes: &[String]) -> DomainResult<Vec<Account>>;

    /// Insert in one round-trip. Accounts whose `(store, code)` already exists are
    /// skipped silently; returns how many rows were written.
    async fn insert_accounts(&self, store_id: StoreId, accounts: Vec<Account>) -> DomainResult<usize>;
}

/// Append-only journal.
#[async_trait]
pub trait JournalRepository: Send + Sync {
    /// Write all lines of `entry` atomically. An entry whose reference was already
    /// posted for the store writes nothing and reports `Duplicate`.
    async fn append(&self, entry: JournalEntry) -> DomainResult<AppendOutcome>;

    /// Every line of the store, oldest first.
    async fn list_transactions(&self, store_id: StoreId) -> DomainResult<Vec<Transaction>>;
}

#[async_trait]
pub trait PaymentMethodRepository: Send + Sync {
    async fn list_methods(&self, store_id: StoreId) -> DomainResult<Vec<PaymentMethodConfig>>;

    async fn get_method(&self, store_id: StoreId, method_id: &MethodId) -> DomainResult<Option<PaymentMethodConfig>>;

    /// Insert or replace by `(store_id, id)`.
    async fn save_methods(&self, methods: Vec<PaymentMethodConfig>) -> DomainResult<()>;

    /// Returns whether a row was removed.
    async fn delete_method(&self, store_id: StoreId, method_id: &MethodId) -> DomainResult<bool>;
}

/// Everything the services need from one backing store.
pub trait Storage: StoreDirectory + AccountRepository + JournalRepository + PaymentMethodRepository {}

impl<T> Storage for T where T: StoreDirectory + AccountRepository + JournalRepository + PaymentMethodRepository {}
