use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use paybook_core::{AccountId, DomainError, DomainResult};

use crate::ledger::{EntryType, Transaction};

/// Inclusive reporting window `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl ReportPeriod {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> DomainResult<Self> {
        if from > to {
            return Err(DomainError::validation("`from` must not be after `to`"));
        }
        Ok(Self { from, to })
    }

    /// First instant of the month containing `now` through 23:59:59 on its last day.
    pub fn month_containing(now: DateTime<Utc>) -> Self {
        let (year, month) = (now.year(), now.month());
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };

        let from = first_instant_of(year, month).unwrap_or(now);
        let to = first_instant_of(next_year, next_month)
            .map(|next| next - Duration::seconds(1))
            .unwrap_or(now);

        Self { from, to }
    }

    /// Resolve optional bounds, defaulting each to the current month's edge.
    pub fn resolve(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let month = Self::month_containing(now);
        Self::new(from.unwrap_or(month.from), to.unwrap_or(month.to))
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

fn first_instant_of(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

/// Which transactions count toward a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceScope {
    /// Dated inside the period (P&L flow).
    Within(ReportPeriod),
    /// Dated at or before the instant (balance-sheet position).
    UpTo(DateTime<Utc>),
}

impl BalanceScope {
    pub fn includes(&self, at: DateTime<Utc>) -> bool {
        match self {
            BalanceScope::Within(period) => period.contains(at),
            BalanceScope::UpTo(end) => at <= *end,
        }
    }
}

/// Contribution of one line: Credit adds, Debit subtracts, for every account type.
pub fn signed_amount(tx: &Transaction) -> Decimal {
    match tx.entry_type {
        EntryType::Credit => tx.amount,
        EntryType::Debit => -tx.amount,
    }
}

/// Balance of one account over the transactions in scope.
pub fn account_balance<'a>(
    account_id: AccountId,
    transactions: impl IntoIterator<Item = &'a Transaction>,
    scope: BalanceScope,
) -> Decimal {
    transactions
        .into_iter()
        .filter(|t| t.account_id == account_id && scope.includes(t.date))
        .map(signed_amount)
        .sum()
}
