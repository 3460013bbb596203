use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paybook_core::{AccountId, DomainError, DomainResult, StoreId};

/// High-level account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "Asset",
            AccountType::Liability => "Liability",
            AccountType::Equity => "Equity",
            AccountType::Revenue => "Revenue",
            AccountType::Expense => "Expense",
        }
    }

    /// Revenue and expense accounts describe flow over a period.
    pub fn is_period_flow(&self) -> bool {
        matches!(self, AccountType::Revenue | AccountType::Expense)
    }
}

impl core::str::FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            _ => Err(DomainError::validation(
                "type must be one of: Asset, Liability, Equity, Revenue, Expense",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl core::str::FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(DomainError::validation(format!("unknown account status '{other}'"))),
        }
    }
}

/// Chart-of-accounts entry. `code` is unique per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub store_id: StoreId,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub category: String,
    pub status: AccountStatus,
    /// Payment method this account was provisioned for, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub category: String,
    pub payment_method_id: Option<String>,
}

impl NewAccount {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        category: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            category: category.into(),
            payment_method_id: None,
        }
    }

    /// Validate and materialize the account for a store.
    pub fn into_account(self, store_id: StoreId, now: DateTime<Utc>) -> DomainResult<Account> {
        let code = self.code.trim().to_string();
        if code.is_empty() {
            return Err(DomainError::validation("account code is required"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("account name is required"));
        }

        Ok(Account {
            id: AccountId::new(),
            store_id,
            code,
            name: self.name,
            account_type: self.account_type,
            category: self.category,
            status: AccountStatus::Active,
            payment_method_id: self.payment_method_id,
            created_at: now,
        })
    }
}

/// Standard chart seeded for a store that has no accounts yet.
pub fn default_chart() -> Vec<NewAccount> {
    vec![
        NewAccount::new("1000", "Cash on Hand", AccountType::Asset, "Current Asset"),
        NewAccount::new("1200", "Accounts Receivable", AccountType::Asset, "Current Asset"),
        NewAccount::new("2000", "Accounts Payable", AccountType::Liability, "Current Liability"),
        NewAccount::new("3000", "Owner's Equity", AccountType::Equity, "Equity"),
        NewAccount::new("4000", "Sales Revenue", AccountType::Revenue, "Operating Revenue"),
        NewAccount::new("5000", "Cost of Goods Sold", AccountType::Expense, "Cost of Sales"),
    ]
}
