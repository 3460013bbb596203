use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use paybook_core::{DomainError, DomainResult};

use crate::account::{Account, AccountType};
use crate::balance::{BalanceScope, ReportPeriod, account_balance};
use crate::ledger::Transaction;

/// Allowed rounding drift when checking the accounting equation.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

const COST_OF_GOODS_SOLD: &str = "Cost of Goods Sold";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLine {
    pub code: String,
    pub name: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodView {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitAndLoss {
    pub revenue: Vec<AccountLine>,
    pub expenses: Vec<AccountLine>,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub gross_profit: Decimal,
    pub net_income: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheet {
    pub assets: Vec<AccountLine>,
    pub liabilities: Vec<AccountLine>,
    pub equity: Vec<AccountLine>,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub total_equity: Decimal,
    pub balanced: bool,
}

/// Read-only snapshot of a store's statements for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub period: PeriodView,
    pub profit_and_loss: ProfitAndLoss,
    pub balance_sheet: BalanceSheet,
}

fn lines_of(
    accounts: &[Account],
    transactions: &[Transaction],
    account_type: AccountType,
    scope: BalanceScope,
) -> Vec<AccountLine> {
    let mut lines: Vec<AccountLine> = accounts
        .iter()
        .filter(|a| a.account_type == account_type)
        .map(|a| AccountLine {
            code: a.code.clone(),
            name: a.name.clone(),
            balance: account_balance(a.id, transactions, scope),
        })
        .collect();
    lines.sort_by(|a, b| a.code.cmp(&b.code));
    lines
}

fn total(lines: &[AccountLine]) -> Decimal {
    lines.iter().map(|l| l.balance).sum()
}

/// Aggregate the journal into P&L (flow within the period) and balance sheet
/// (position as of the period end).
///
/// Empty inputs are valid and yield zero totals.
pub fn build_report(
    accounts: &[Account],
    transactions: &[Transaction],
    period: ReportPeriod,
) -> FinancialReport {
    let flow = BalanceScope::Within(period);
    let position = BalanceScope::UpTo(period.to());

    let revenue = lines_of(accounts, transactions, AccountType::Revenue, flow);
    let expenses = lines_of(accounts, transactions, AccountType::Expense, flow);
    let total_revenue = total(&revenue);
    let total_expenses = total(&expenses);
    let net_income = total_revenue - total_expenses;

    let cogs = expenses
        .iter()
        .find(|l| l.name == COST_OF_GOODS_SOLD)
        .map(|l| l.balance)
        .unwrap_or_default();
    let gross_profit = total_revenue - cogs;

    let assets = lines_of(accounts, transactions, AccountType::Asset, position);
    let liabilities = lines_of(accounts, transactions, AccountType::Liability, position);
    let equity = lines_of(accounts, transactions, AccountType::Equity, position);
    let total_assets = total(&assets);
    let total_liabilities = total(&liabilities);
    let total_equity = total(&equity);

    let drift = (total_assets - (total_liabilities + total_equity + net_income)).abs();
    let balanced = drift < BALANCE_TOLERANCE;
    if !balanced {
        tracing::warn!(%drift, "balance sheet does not reconcile");
    }

    FinancialReport {
        period: PeriodView {
            from: period.from(),
            to: period.to(),
        },
        profit_and_loss: ProfitAndLoss {
            revenue,
            expenses,
            total_revenue,
            total_expenses,
            gross_profit,
            net_income,
        },
        balance_sheet: BalanceSheet {
            assets,
            liabilities,
            equity,
            total_assets,
            total_liabilities,
            total_equity,
            balanced,
        },
    }
}

/// Minor-unit conversion used by processors that quote amounts in cents.
/// Amounts whose cent value does not fit an `i64` are rejected.
pub fn to_minor_units(amount: Decimal) -> DomainResult<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| DomainError::validation(format!("amount {amount} is out of range")))
}

/// Inverse of [`to_minor_units`].
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use paybook_core::StoreId;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    use crate::account::default_chart;
    use crate::ledger::{EntryType, NewTransaction};

    fn chart(store: StoreId, now: DateTime<Utc>) -> Vec<Account> {
        default_chart()
            .into_iter()
            .map(|a| a.into_account(store, now).unwrap())
            .collect()
    }

    fn by_code<'a>(accounts: &'a [Account], code: &str) -> &'a Account {
        accounts.iter().find(|a| a.code == code).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn cash_sale_reconciles() {
        let store = StoreId::new();
        let now = at(2026, 4, 12);
        let accounts = chart(store, now);
        let txs = vec![
            NewTransaction::new(by_code(&accounts, "1000").id, EntryType::Credit, dec!(500))
                .into_transaction(store, now)
                .unwrap(),
            NewTransaction::new(by_code(&accounts, "4000").id, EntryType::Credit, dec!(500))
                .into_transaction(store, now)
                .unwrap(),
        ];

        let report = build_report(&accounts, &txs, ReportPeriod::month_containing(now));

        assert_eq!(report.profit_and_loss.total_revenue, dec!(500));
        assert_eq!(report.profit_and_loss.net_income, dec!(500));
        assert_eq!(report.profit_and_loss.gross_profit, dec!(500));
        assert_eq!(report.balance_sheet.total_assets, dec!(500));
        assert!(report.balance_sheet.balanced);
    }

    #[test]
    fn empty_store_reports_zeroes() {
        let report = build_report(&[], &[], ReportPeriod::month_containing(Utc::now()));
        assert!(report.profit_and_loss.revenue.is_empty());
        assert_eq!(report.balance_sheet.total_assets, Decimal::ZERO);
        assert!(report.balance_sheet.balanced);
    }

    #[test]
    fn gross_profit_subtracts_cost_of_goods_sold() {
        let store = StoreId::new();
        let now = at(2026, 4, 12);
        let accounts = chart(store, now);
        let txs = vec![
            NewTransaction::new(by_code(&accounts, "4000").id, EntryType::Credit, dec!(300))
                .into_transaction(store, now)
                .unwrap(),
            NewTransaction::new(by_code(&accounts, "5000").id, EntryType::Credit, dec!(120))
                .into_transaction(store, now)
                .unwrap(),
        ];

        let report = build_report(&accounts, &txs, ReportPeriod::month_containing(now));
        assert_eq!(report.profit_and_loss.gross_profit, dec!(180));
        assert_eq!(report.profit_and_loss.net_income, dec!(180));
    }

    #[test]
    fn revenue_outside_period_is_excluded_but_assets_carry_forward() {
        let store = StoreId::new();
        let march = at(2026, 3, 5);
        let april = at(2026, 4, 20);
        let accounts = chart(store, march);
        let txs = vec![
            NewTransaction::new(by_code(&accounts, "4000").id, EntryType::Credit, dec!(80))
                .dated(march)
                .into_transaction(store, march)
                .unwrap(),
            NewTransaction::new(by_code(&accounts, "1000").id, EntryType::Credit, dec!(80))
                .dated(march)
                .into_transaction(store, march)
                .unwrap(),
        ];

        let report = build_report(&accounts, &txs, ReportPeriod::month_containing(april));
        assert_eq!(report.profit_and_loss.total_revenue, Decimal::ZERO);
        assert_eq!(report.balance_sheet.total_assets, dec!(80));
    }

    #[test]
    fn lines_are_sorted_by_code() {
        let store = StoreId::new();
        let now = Utc::now();
        let mut accounts = chart(store, now);
        accounts.reverse();
        let report = build_report(&accounts, &[], ReportPeriod::month_containing(now));
        let codes: Vec<_> = report.balance_sheet.assets.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["1000", "1200"]);
    }

    #[test]
    fn serializes_in_camel_case() {
        let report = build_report(&[], &[], ReportPeriod::month_containing(Utc::now()));
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["profitAndLoss"]["netIncome"].is_string() || json["profitAndLoss"]["netIncome"].is_number());
        assert!(json["balanceSheet"]["balanced"].as_bool().unwrap());
    }

    #[test]
    fn minor_units_round_half_away() {
        assert_eq!(to_minor_units(dec!(12.345)), Ok(1235));
        assert_eq!(from_minor_units(1999), dec!(19.99));
    }

    #[test]
    fn minor_units_out_of_range_is_rejected() {
        let err = to_minor_units(Decimal::MAX).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let err = to_minor_units(Decimal::from(i64::MAX)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        // Each sale lands the same amount on an asset and a revenue account, so the
        // equation must hold whatever the mix.
        #[test]
        fn paired_postings_keep_books_balanced(
            sales in proptest::collection::vec((1u32..1_000_000u32, 0usize..2), 0..40)
        ) {
            let store = StoreId::new();
            let now = at(2026, 6, 15);
            let accounts = chart(store, now);
            let asset_codes = ["1000", "1200"];
            let revenue = by_code(&accounts, "4000").id;

            let mut txs = Vec::new();
            for (cents, slot) in sales {
                let amount = Decimal::new(i64::from(cents), 2);
                let asset = by_code(&accounts, asset_codes[slot]).id;
                txs.push(NewTransaction::new(asset, EntryType::Credit, amount).into_transaction(store, now).unwrap());
                txs.push(NewTransaction::new(revenue, EntryType::Credit, amount).into_transaction(store, now).unwrap());
            }

            let report = build_report(&accounts, &txs, ReportPeriod::month_containing(now));
            let bs = &report.balance_sheet;
            let rhs = bs.total_liabilities + bs.total_equity + report.profit_and_loss.net_income;
            prop_assert!((bs.total_assets - rhs).abs() < BALANCE_TOLERANCE);
            prop_assert!(bs.balanced);
        }
    }
}
