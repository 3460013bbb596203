use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use paybook_core::{AccountId, DomainError, DomainResult, StoreId, TransactionId};

/// Code of the receivables account credited when a customer payment settles.
pub const ACCOUNTS_RECEIVABLE_CODE: &str = "1200";

/// Posting side of a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "Debit",
            EntryType::Credit => "Credit",
        }
    }
}

impl core::str::FromStr for EntryType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Debit" | "debit" => Ok(EntryType::Debit),
            "Credit" | "credit" => Ok(EntryType::Credit),
            other => Err(DomainError::validation(format!(
                "type must be Debit or Credit (got '{other}')"
            ))),
        }
    }
}

/// What produced a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReferenceType {
    Order,
    Invoice,
    Bill,
    #[default]
    Manual,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Order => "Order",
            ReferenceType::Invoice => "Invoice",
            ReferenceType::Bill => "Bill",
            ReferenceType::Manual => "Manual",
        }
    }
}

impl core::str::FromStr for ReferenceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Order" => Ok(ReferenceType::Order),
            "Invoice" => Ok(ReferenceType::Invoice),
            "Bill" => Ok(ReferenceType::Bill),
            "Manual" => Ok(ReferenceType::Manual),
            other => Err(DomainError::validation(format!("unknown referenceType '{other}'"))),
        }
    }
}

/// One Debit or Credit posting against exactly one account (immutable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub store_id: StoreId,
    pub account_id: AccountId,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Non-negative amount in store currency.
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub description: String,
    pub category: String,
    /// Processor reference or business document id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub reference_type: ReferenceType,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Input for posting a journal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub date: Option<DateTime<Utc>>,
    pub description: String,
    pub category: String,
    pub reference: Option<String>,
    pub reference_type: ReferenceType,
    pub created_by: String,
}

impl NewTransaction {
    pub fn new(account_id: AccountId, entry_type: EntryType, amount: Decimal) -> Self {
        Self {
            account_id,
            entry_type,
            amount,
            date: None,
            description: "Manual Transaction".to_string(),
            category: "General".to_string(),
            reference: None,
            reference_type: ReferenceType::Manual,
            created_by: "system".to_string(),
        }
    }

    pub fn dated(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn referencing(mut self, reference: impl Into<String>, kind: ReferenceType) -> Self {
        self.reference = Some(reference.into());
        self.reference_type = kind;
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    /// Validate and stamp the line. `date` defaults to `now`.
    pub fn into_transaction(self, store_id: StoreId, now: DateTime<Utc>) -> DomainResult<Transaction> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(DomainError::validation("amount must not be negative"));
        }
        if self.amount.normalize().scale() > AMOUNT_SCALE {
            return Err(DomainError::validation(format!(
                "amount {} has more than {AMOUNT_SCALE} decimal places",
                self.amount
            )));
        }
        if self.amount >= AMOUNT_CEILING {
            return Err(DomainError::validation(format!("amount {} is too large", self.amount)));
        }

        Ok(Transaction {
            id: TransactionId::new(),
            store_id,
            account_id: self.account_id,
            entry_type: self.entry_type,
            amount: self.amount,
            date: self.date.unwrap_or(now),
            description: self.description,
            category: self.category,
            reference: self.reference,
            reference_type: self.reference_type,
            created_by: self.created_by,
            created_at: now,
        })
    }
}

/// Decimal places a journal amount may carry; matches the `NUMERIC(19, 4)` column.
pub const AMOUNT_SCALE: u32 = 4;

/// Exclusive upper bound for a journal amount (15 integer digits).
pub const AMOUNT_CEILING: Decimal = Decimal::from_parts(0xA4C6_8000, 0x38D7E, 0, false, 0);

/// Lines appended together. When `reference` is set it is unique per store, so a
/// re-delivered processor notification can never be posted twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub store_id: StoreId,
    pub reference: Option<String>,
    pub lines: Vec<Transaction>,
}

impl JournalEntry {
    pub fn new(store_id: StoreId, reference: Option<String>, lines: Vec<Transaction>) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("journal entry must have lines"));
        }
        if lines.iter().any(|l| l.store_id != store_id) {
            return Err(DomainError::validation("journal lines must belong to the entry's store"));
        }
        Ok(Self {
            store_id,
            reference,
            lines,
        })
    }
}

/// Result of appending a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Lines were written.
    Appended(usize),
    /// The reference was already posted; nothing was written.
    Duplicate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_must_fit_the_stored_precision() {
        let line = |amount: Decimal| {
            NewTransaction::new(AccountId::new(), EntryType::Debit, amount).into_transaction(StoreId::new(), Utc::now())
        };
        assert!(line(dec!(19.9999)).is_ok());
        assert!(line(dec!(19.990000)).is_ok());
        assert!(line(dec!(999999999999999.9999)).is_ok());

        let err = line(dec!(19.99999)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("decimal places")));
        let err = line(dec!(1000000000000000)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("too large")));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let err = NewTransaction::new(AccountId::new(), EntryType::Credit, dec!(-1))
            .into_transaction(StoreId::new(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("negative")));
    }

    #[test]
    fn date_defaults_to_now() {
        let now = Utc::now();
        let tx = NewTransaction::new(AccountId::new(), EntryType::Debit, dec!(10))
            .into_transaction(StoreId::new(), now)
            .unwrap();
        assert_eq!(tx.date, now);
        assert_eq!(tx.reference_type, ReferenceType::Manual);
    }

    #[test]
    fn entry_requires_lines_of_one_store() {
        let store = StoreId::new();
        assert!(JournalEntry::new(store, None, vec![]).is_err());

        let foreign = NewTransaction::new(AccountId::new(), EntryType::Debit, dec!(1))
            .into_transaction(StoreId::new(), Utc::now())
            .unwrap();
        assert!(JournalEntry::new(store, None, vec![foreign]).is_err());
    }

    #[test]
    fn entry_type_parses_capitalized_names() {
        assert_eq!("Credit".parse::<EntryType>().unwrap(), EntryType::Credit);
        assert!("CR".parse::<EntryType>().is_err());
    }
}
