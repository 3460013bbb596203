//! Checkout orchestration: initiate, verify, and processor callbacks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use paybook_auth::Principal;
use paybook_core::{DomainError, DomainResult, StoreId};
use paybook_gateways::gateway::webhook_path;
use paybook_gateways::{GatewayKind, InitiateRequest, Initiation, PaymentNotice, PaymentStatus, Verification};
use paybook_payments::MethodId;

use crate::services::access::StoreAccess;
use crate::services::recorder::{PaymentRecorder, RecordOutcome};
use crate::services::resolver::GatewayResolver;

/// Checkout request for one order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub method_id: MethodId,
    pub order_id: String,
    pub amount: Decimal,
    /// Falls back to the store currency.
    pub currency: Option<String>,
    pub customer_email: Option<String>,
    pub phone_number: Option<String>,
    pub return_url: String,
    /// Falls back to `return_url`.
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub verification: Verification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded: Option<RecordOutcome>,
}

#[derive(Clone)]
pub struct PaymentService {
    access: StoreAccess,
    resolver: GatewayResolver,
    recorder: PaymentRecorder,
    public_url: String,
}

impl PaymentService {
    pub fn new(access: StoreAccess, resolver: GatewayResolver, recorder: PaymentRecorder, public_url: String) -> Self {
        Self {
            access,
            resolver,
            recorder,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn callback_base(&self, kind: GatewayKind, store_id: StoreId) -> String {
        format!("{}{}", self.public_url, webhook_path(kind, store_id))
    }

    /// Start collecting a payment through one of the store's enabled methods.
    #[instrument(
        skip(self, principal, request),
        fields(store_id = %store_id, method_id = %request.method_id, order_id = %request.order_id),
        err
    )]
    pub async fn initiate(
        &self,
        principal: &Principal,
        store_id: StoreId,
        request: PaymentRequest,
    ) -> DomainResult<Initiation> {
        let store = self.access.require_owner(principal, store_id).await?;

        if request.amount <= Decimal::ZERO {
            return Err(DomainError::validation("amount must be positive"));
        }
        if request.order_id.trim().is_empty() {
            return Err(DomainError::validation("orderId is required"));
        }

        let (_, gateway) = self.resolver.resolve(store_id, &request.method_id).await?;
        let callback_url = gateway.callback_url(&self.callback_base(gateway.kind(), store_id))?;

        let outbound = InitiateRequest {
            order_id: request.order_id,
            amount: request.amount,
            currency: request.currency.filter(|c| !c.trim().is_empty()).unwrap_or(store.currency),
            customer_email: request.customer_email,
            phone_number: request.phone_number,
            cancel_url: request.cancel_url.unwrap_or_else(|| request.return_url.clone()),
            return_url: request.return_url,
            callback_url,
        };
        gateway.initiate(&outbound).await
    }

    /// Ask the processor for the payment's status. A Success is recorded in the
    /// journal (idempotently, keyed by `reference`).
    #[instrument(skip(self, principal), fields(store_id = %store_id, method_id = %method_id), err)]
    pub async fn verify(
        &self,
        principal: &Principal,
        store_id: StoreId,
        method_id: &MethodId,
        reference: &str,
    ) -> DomainResult<VerifyOutcome> {
        self.access.require_owner(principal, store_id).await?;

        let (method, gateway) = self.resolver.resolve(store_id, method_id).await?;
        let verification = gateway.verify(reference).await?;

        let recorded = match (verification.status, verification.amount) {
            (PaymentStatus::Success, Some(amount)) => {
                let notice = PaymentNotice {
                    reference: reference.to_string(),
                    order_id: verification.order_id.clone(),
                    amount,
                    currency: verification.currency.clone(),
                    status: PaymentStatus::Success,
                    receipt: None,
                };
                Some(self.recorder.record_payment(store_id, &notice, &method).await?)
            }
            (PaymentStatus::Success, None) => {
                tracing::warn!("processor confirmed payment without an amount; not recorded");
                None
            }
            _ => None,
        };

        Ok(VerifyOutcome { verification, recorded })
    }

    /// Authenticate, decode and record a processor callback.
    ///
    /// A callback that fails authentication is rejected with `Unauthorized` and
    /// posts nothing. Events that do not settle a payment return `None`.
    #[instrument(skip(self, raw_body, signature), fields(store_id = %store_id, gateway = %kind), err)]
    pub async fn handle_webhook(
        &self,
        kind: GatewayKind,
        store_id: StoreId,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> DomainResult<Option<RecordOutcome>> {
        self.access.find(store_id).await?;
        let (method, gateway) = self.resolver.resolve_kind(store_id, kind).await?;

        if !gateway.authenticate_callback(raw_body, signature) {
            tracing::warn!("callback signature rejected");
            return Err(DomainError::Unauthorized);
        }

        let Some(notice) = gateway.parse_callback(raw_body)? else {
            tracing::debug!("callback acknowledged without posting");
            return Ok(None);
        };
        self.recorder.record_payment(store_id, &notice, &method).await.map(Some)
    }
}
