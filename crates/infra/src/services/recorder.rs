use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use paybook_accounting::{
    ACCOUNTS_RECEIVABLE_CODE, AppendOutcome, EntryType, JournalEntry, NewTransaction, ReferenceType,
};
use paybook_core::{AccountId, DomainError, DomainResult, StoreId};
use paybook_gateways::{PaymentNotice, PaymentStatus};
use paybook_payments::PaymentMethodConfig;

use crate::storage::Storage;

const PAYMENT_CATEGORY: &str = "Payment";

/// What happened to a settled-payment notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RecordOutcome {
    Recorded { lines: usize },
    /// The processor reference was posted before; nothing was written.
    AlreadyRecorded,
    /// The payment has not succeeded; nothing was written.
    NotSettled,
}

/// Turns settled payments into journal entries.
#[derive(Clone)]
pub struct PaymentRecorder {
    storage: Arc<dyn Storage>,
}

impl PaymentRecorder {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Debit the method's account and credit Accounts Receivable (when the store
    /// has one), both tagged with the processor reference.
    ///
    /// The reference is unique per store, so a re-delivered notice posts nothing
    /// and reports `AlreadyRecorded`.
    #[instrument(
        skip(self, notice, method),
        fields(store_id = %store_id, reference = %notice.reference, method_id = %method.id),
        err
    )]
    pub async fn record_payment(
        &self,
        store_id: StoreId,
        notice: &PaymentNotice,
        method: &PaymentMethodConfig,
    ) -> DomainResult<RecordOutcome> {
        if notice.status != PaymentStatus::Success {
            tracing::info!(status = ?notice.status, "payment not settled; nothing to record");
            return Ok(RecordOutcome::NotSettled);
        }
        if notice.amount <= Decimal::ZERO {
            tracing::warn!(amount = %notice.amount, "settled payment without a positive amount; nothing to record");
            return Ok(RecordOutcome::NotSettled);
        }

        let codes = [method.coa_code.clone(), ACCOUNTS_RECEIVABLE_CODE.to_string()];
        let accounts = self.storage.accounts_by_codes(store_id, &codes).await?;
        let settlement = accounts
            .iter()
            .find(|a| a.code == method.coa_code)
            .ok_or_else(|| DomainError::not_found(format!("ledger account {}", method.coa_code)))?;
        let receivable = accounts.iter().find(|a| a.code == ACCOUNTS_RECEIVABLE_CODE);

        let now = Utc::now();
        let description = match &notice.order_id {
            Some(order) => format!("{} payment for order {order}", method.name),
            None => format!("{} payment {}", method.name, notice.reference),
        };
        let actor = method.gateway.clone().unwrap_or_else(|| method.name.clone());
        let line = |account: AccountId, entry_type: EntryType| {
            NewTransaction::new(account, entry_type, notice.amount)
                .described(description.clone())
                .referencing(notice.reference.clone(), ReferenceType::Order)
                .in_category(PAYMENT_CATEGORY)
                .created_by(actor.clone())
                .into_transaction(store_id, now)
        };

        let mut lines = vec![line(settlement.id, EntryType::Debit)?];
        match receivable {
            Some(ar) => lines.push(line(ar.id, EntryType::Credit)?),
            None => tracing::warn!("store has no accounts receivable account; posting settlement side only"),
        }

        let entry = JournalEntry::new(store_id, Some(notice.reference.clone()), lines)?;
        match self.storage.append(entry).await? {
            AppendOutcome::Appended(lines) => {
                tracing::info!(lines, amount = %notice.amount, "payment recorded");
                Ok(RecordOutcome::Recorded { lines })
            }
            AppendOutcome::Duplicate => {
                tracing::info!("payment already recorded");
                Ok(RecordOutcome::AlreadyRecorded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paybook_payments::MethodId;
    use rust_decimal_macros::dec;

    use crate::services::fixtures::Fixture;
    use crate::storage::JournalRepository;

    fn notice(status: PaymentStatus) -> PaymentNotice {
        PaymentNotice {
            reference: "ws_CO_0001".into(),
            order_id: Some("order-7".into()),
            amount: dec!(250),
            currency: Some("KES".into()),
            status,
            receipt: Some("QAB12CD".into()),
        }
    }

    #[tokio::test]
    async fn settled_notice_posts_debit_and_receivable_credit_once() {
        let fx = Fixture::new().await;
        fx.ledger.list_accounts(&fx.owner, fx.store.id).await.unwrap();
        let cash = fx.method_with_code("1000").await;

        let outcome = fx.recorder.record_payment(fx.store.id, &notice(PaymentStatus::Success), &cash).await;
        assert_eq!(outcome.unwrap(), RecordOutcome::Recorded { lines: 2 });

        let again = fx.recorder.record_payment(fx.store.id, &notice(PaymentStatus::Success), &cash).await;
        assert_eq!(again.unwrap(), RecordOutcome::AlreadyRecorded);

        let lines = fx.db.list_transactions(fx.store.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.reference.as_deref() == Some("ws_CO_0001")));
        assert_eq!(lines[0].entry_type, EntryType::Debit);
        assert_eq!(lines[1].entry_type, EntryType::Credit);
    }

    #[tokio::test]
    async fn failed_notice_posts_nothing() {
        let fx = Fixture::new().await;
        let cash = fx.method_with_code("1000").await;
        let outcome = fx.recorder.record_payment(fx.store.id, &notice(PaymentStatus::Failed), &cash).await;
        assert_eq!(outcome.unwrap(), RecordOutcome::NotSettled);
        assert!(fx.db.list_transactions(fx.store.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_amount_success_posts_nothing() {
        let fx = Fixture::new().await;
        fx.ledger.list_accounts(&fx.owner, fx.store.id).await.unwrap();
        let cash = fx.method_with_code("1000").await;
        let mut free = notice(PaymentStatus::Success);
        free.amount = dec!(0);

        let outcome = fx.recorder.record_payment(fx.store.id, &free, &cash).await;
        assert_eq!(outcome.unwrap(), RecordOutcome::NotSettled);
        assert!(fx.db.list_transactions(fx.store.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_settlement_account_is_not_found() {
        let fx = Fixture::new().await;
        let mut cash = fx.method_with_code("1000").await;
        cash.id = MethodId::new("pm_custom_1");
        cash.coa_code = "1999".into();
        let err = fx
            .recorder
            .record_payment(fx.store.id, &notice(PaymentStatus::Success), &cash)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
