use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use paybook_accounting::{Account, AppendOutcome, JournalEntry, Transaction};
use paybook_core::{AccountId, DomainError, DomainResult, StoreId, UserId};
use paybook_payments::{MethodId, PaymentMethodConfig};

use super::r#trait::{AccountRepository, JournalRepository, PaymentMethodRepository, Store, StoreDirectory};

#[derive(Debug, Default)]
struct State {
    stores: HashMap<StoreId, Store>,
    accounts: HashMap<StoreId, Vec<Account>>,
    transactions: HashMap<StoreId, Vec<Transaction>>,
    references: HashSet<(StoreId, String)>,
    methods: HashMap<StoreId, Vec<PaymentMethodConfig>>,
}

/// In-memory store for tests/dev. Not optimized for performance.
///
/// One lock guards all tables, so an append (reference check + insert) is atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
    account_round_trips: AtomicUsize,
}

fn poisoned<T>(_: T) -> DomainError {
    DomainError::storage("lock poisoned")
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls made against the account table so far.
    pub fn account_round_trips(&self) -> usize {
        self.account_round_trips.load(Ordering::SeqCst)
    }

    fn count_account_trip(&self) {
        self.account_round_trips.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreDirectory for InMemoryLedgerStore {
    async fn get_store(&self, store_id: StoreId) -> DomainResult<Option<Store>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.stores.get(&store_id).cloned())
    }

    async fn insert_store(&self, store: Store) -> DomainResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.stores.contains_key(&store.id) {
            return Err(DomainError::conflict(format!("store {} already exists", store.id)));
        }
        state.stores.insert(store.id, store);
        Ok(())
    }

    async fn stores_owned_by(&self, owner_id: UserId) -> DomainResult<Vec<Store>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut stores: Vec<Store> = state.stores.values().filter(|s| s.owner_id == owner_id).cloned().collect();
        stores.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stores)
    }
}

#[async_trait]
impl AccountRepository for InMemoryLedgerStore {
    async fn list_accounts(&self, store_id: StoreId) -> DomainResult<Vec<Account>> {
        self.count_account_trip();
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.accounts.get(&store_id).cloned().unwrap_or_default())
    }

    async fn get_account(&self, store_id: StoreId, account_id: AccountId) -> DomainResult<Option<Account>> {
        self.count_account_trip();
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .accounts
            .get(&store_id)
            .and_then(|accounts| accounts.iter().find(|a| a.id == account_id))
            .cloned())
    }

    async fn accounts_by_codes(&self, store_id: StoreId, codes: &[String]) -> DomainResult<Vec<Account>> {
        self.count_account_trip();
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .accounts
            .get(&store_id)
            .map(|accounts| accounts.iter().filter(|a| codes.contains(&a.code)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_accounts(&self, store_id: StoreId, accounts: Vec<Account>) -> DomainResult<usize> {
        self.count_account_trip();
        let mut state = self.state.write().map_err(poisoned)?;
        let table = state.accounts.entry(store_id).or_default();

        let mut inserted = 0;
        for account in accounts {
            if account.store_id != store_id || table.iter().any(|a| a.code == account.code) {
                continue;
            }
            table.push(account);
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[async_trait]
impl JournalRepository for InMemoryLedgerStore {
    async fn append(&self, entry: JournalEntry) -> DomainResult<AppendOutcome> {
        let mut state = self.state.write().map_err(poisoned)?;

        if let Some(reference) = &entry.reference {
            if !state.references.insert((entry.store_id, reference.clone())) {
                return Ok(AppendOutcome::Duplicate);
            }
        }

        let written = entry.lines.len();
        state.transactions.entry(entry.store_id).or_default().extend(entry.lines);
        Ok(AppendOutcome::Appended(written))
    }

    async fn list_transactions(&self, store_id: StoreId) -> DomainResult<Vec<Transaction>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.transactions.get(&store_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl PaymentMethodRepository for InMemoryLedgerStore {
    async fn list_methods(&self, store_id: StoreId) -> DomainResult<Vec<PaymentMethodConfig>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.methods.get(&store_id).cloned().unwrap_or_default())
    }

    async fn get_method(&self, store_id: StoreId, method_id: &MethodId) -> DomainResult<Option<PaymentMethodConfig>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .methods
            .get(&store_id)
            .and_then(|methods| methods.iter().find(|m| &m.id == method_id))
            .cloned())
    }

    async fn save_methods(&self, methods: Vec<PaymentMethodConfig>) -> DomainResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        for method in methods {
            let table = state.methods.entry(method.store_id).or_default();
            match table.iter_mut().find(|m| m.id == method.id) {
                Some(slot) => *slot = method,
                None => table.push(method),
            }
        }
        Ok(())
    }

    async fn delete_method(&self, store_id: StoreId, method_id: &MethodId) -> DomainResult<bool> {
        let mut state = self.state.write().map_err(poisoned)?;
        let Some(table) = state.methods.get_mut(&store_id) else {
            return Ok(false);
        };
        let before = table.len();
        table.retain(|m| &m.id != method_id);
        Ok(table.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use paybook_accounting::{AccountType, EntryType, NewAccount, NewTransaction, ReferenceType};
    use rust_decimal_macros::dec;

    fn cash(store: StoreId) -> Account {
        NewAccount::new("1000", "Cash on Hand", AccountType::Asset, "Current Asset")
            .into_account(store, Utc::now())
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_codes_are_skipped() {
        let db = InMemoryLedgerStore::new();
        let store = StoreId::new();
        assert_eq!(db.insert_accounts(store, vec![cash(store)]).await.unwrap(), 1);
        assert_eq!(db.insert_accounts(store, vec![cash(store)]).await.unwrap(), 0);
        assert_eq!(db.list_accounts(store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn referenced_entry_is_written_once() {
        let db = InMemoryLedgerStore::new();
        let store = StoreId::new();
        let account = cash(store);

        let entry = || {
            let line = NewTransaction::new(account.id, EntryType::Debit, dec!(10))
                .referencing("cs_1", ReferenceType::Order)
                .into_transaction(store, Utc::now())
                .unwrap();
            JournalEntry::new(store, Some("cs_1".into()), vec![line]).unwrap()
        };

        assert_eq!(db.append(entry()).await.unwrap(), AppendOutcome::Appended(1));
        assert_eq!(db.append(entry()).await.unwrap(), AppendOutcome::Duplicate);
        assert_eq!(db.list_transactions(store).await.unwrap().len(), 1);

        // References are scoped per store.
        let other = StoreId::new();
        let line = NewTransaction::new(account.id, EntryType::Debit, dec!(10))
            .into_transaction(other, Utc::now())
            .unwrap();
        let foreign = JournalEntry::new(other, Some("cs_1".into()), vec![line]).unwrap();
        assert_eq!(db.append(foreign).await.unwrap(), AppendOutcome::Appended(1));
    }

    #[tokio::test]
    async fn stores_are_listed_per_owner() {
        let db = InMemoryLedgerStore::new();
        let owner = UserId::new();
        let store = Store {
            id: StoreId::new(),
            owner_id: owner,
            name: "Kiosk".into(),
            currency: "KES".into(),
        };
        db.insert_store(store.clone()).await.unwrap();
        assert!(matches!(db.insert_store(store.clone()).await, Err(DomainError::Conflict(_))));
        assert_eq!(db.stores_owned_by(owner).await.unwrap(), vec![store]);
        assert!(db.stores_owned_by(UserId::new()).await.unwrap().is_empty());
    }
}
