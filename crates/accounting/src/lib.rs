//! Accounting module: chart of accounts, immutable journal, and the balance engine.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.
//! Balances are never stored; they are derived from the journal on every read.

pub mod account;
pub mod balance;
pub mod ledger;
pub mod report;

pub use account::{Account, AccountStatus, AccountType, NewAccount, default_chart};
pub use balance::{BalanceScope, ReportPeriod, account_balance, signed_amount};
pub use ledger::{
    ACCOUNTS_RECEIVABLE_CODE, AppendOutcome, EntryType, JournalEntry, NewTransaction,
    ReferenceType, Transaction,
};
pub use report::{
    AccountLine, BALANCE_TOLERANCE, BalanceSheet, FinancialReport, PeriodView, ProfitAndLoss,
    build_report, from_minor_units, to_minor_units,
};
