use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use paybook_accounting::{
    Account, FinancialReport, JournalEntry, NewAccount, NewTransaction, ReportPeriod, Transaction, build_report,
    default_chart,
};
use paybook_auth::Principal;
use paybook_core::{DomainError, DomainResult, StoreId};

use crate::services::access::StoreAccess;
use crate::storage::Storage;

/// Chart of accounts, manual journal lines and financial reports.
#[derive(Clone)]
pub struct LedgerService {
    storage: Arc<dyn Storage>,
    access: StoreAccess,
}

impl LedgerService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let access = StoreAccess::new(storage.clone());
        Self { storage, access }
    }

    /// P&L over `[from, to]` and the balance sheet as of `to`. Both bounds default
    /// to the edges of the current UTC month. A store with no data reports zeros.
    #[instrument(skip(self, principal), fields(store_id = %store_id), err)]
    pub async fn report(
        &self,
        principal: &Principal,
        store_id: StoreId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<FinancialReport> {
        self.access.require_owner(principal, store_id).await?;
        let period = ReportPeriod::resolve(from, to, Utc::now())?;

        let accounts = self.storage.list_accounts(store_id).await?;
        let transactions = self.storage.list_transactions(store_id).await?;
        tracing::debug!(accounts = accounts.len(), transactions = transactions.len(), "building report");

        Ok(build_report(&accounts, &transactions, period))
    }

    /// Accounts sorted by name.
    ///
    /// A chart holding nothing but payment-method accounts is topped up with the
    /// default chart; codes already taken are left as they are.
    #[instrument(skip(self, principal), fields(store_id = %store_id), err)]
    pub async fn list_accounts(&self, principal: &Principal, store_id: StoreId) -> DomainResult<Vec<Account>> {
        self.access.require_owner(principal, store_id).await?;

        let mut accounts = self.storage.list_accounts(store_id).await?;
        if accounts.iter().all(|a| a.payment_method_id.is_some()) {
            let now = Utc::now();
            let chart = default_chart()
                .into_iter()
                .map(|a| a.into_account(store_id, now))
                .collect::<DomainResult<Vec<_>>>()?;
            let seeded = self.storage.insert_accounts(store_id, chart).await?;
            tracing::info!(seeded, "seeded default chart of accounts");
            accounts = self.storage.list_accounts(store_id).await?;
        }

        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    #[instrument(skip(self, principal, input), fields(store_id = %store_id, code = %input.code), err)]
    pub async fn create_account(
        &self,
        principal: &Principal,
        store_id: StoreId,
        input: NewAccount,
    ) -> DomainResult<Account> {
        self.access.require_owner(principal, store_id).await?;

        let account = input.into_account(store_id, Utc::now())?;
        let duplicate = || DomainError::conflict(format!("Account code {} already exists", account.code));

        let clashing = self
            .storage
            .accounts_by_codes(store_id, std::slice::from_ref(&account.code))
            .await?;
        if !clashing.is_empty() {
            return Err(duplicate());
        }
        // A racing insert of the same code lands between the check and here.
        if self.storage.insert_accounts(store_id, vec![account.clone()]).await? == 0 {
            return Err(duplicate());
        }
        Ok(account)
    }

    /// Journal lines, newest first.
    #[instrument(skip(self, principal), fields(store_id = %store_id), err)]
    pub async fn list_transactions(&self, principal: &Principal, store_id: StoreId) -> DomainResult<Vec<Transaction>> {
        self.access.require_owner(principal, store_id).await?;

        let mut transactions = self.storage.list_transactions(store_id).await?;
        transactions.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(transactions)
    }

    /// Append one manual journal line, attributed to the caller.
    #[instrument(skip(self, principal, input), fields(store_id = %store_id, account_id = %input.account_id), err)]
    pub async fn post_transaction(
        &self,
        principal: &Principal,
        store_id: StoreId,
        input: NewTransaction,
    ) -> DomainResult<Transaction> {
        self.access.require_owner(principal, store_id).await?;

        if self.storage.get_account(store_id, input.account_id).await?.is_none() {
            return Err(DomainError::not_found(format!("account {}", input.account_id)));
        }

        let transaction = input
            .created_by(principal.user_id.to_string())
            .into_transaction(store_id, Utc::now())?;
        let entry = JournalEntry::new(store_id, None, vec![transaction.clone()])?;
        self.storage.append(entry).await?;

        Ok(transaction)
    }
}
