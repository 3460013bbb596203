//! Hosted-checkout adapter (Stripe Checkout Sessions over the REST API).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use paybook_accounting::from_minor_units;
use paybook_payments::PaymentMethodConfig;
use paybook_vault::Vault;

use crate::error::GatewayError;
use crate::gateway::{PaymentGateway, minor_units, open_secret};
use crate::http::{parse_json, read_body, trim_base};
use crate::signature::{DEFAULT_TOLERANCE_SECS, verify_timestamped};
use crate::types::{GatewayKind, InitiateRequest, Initiation, PaymentNotice, PaymentStatus, Verification};

const API_BASE: &str = "https://api.stripe.com";
const COMPLETED_EVENT: &str = "checkout.session.completed";

#[derive(Clone)]
pub struct StripeGateway {
    http: Client,
    base_url: String,
    secret_key: String,
    webhook_secret: Option<String>,
}

impl core::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct Session {
    id: String,
    url: Option<String>,
    status: Option<String>,
    payment_status: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    fn order_id(&self) -> Option<String> {
        self.client_reference_id.clone().or_else(|| {
            self.metadata
                .get("orderId")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

impl StripeGateway {
    pub fn new(config: &PaymentMethodConfig, vault: &Vault, http: Client) -> Result<Self, GatewayError> {
        let secret_key = open_secret(vault, config.api_key.as_deref())?.ok_or_else(|| {
            GatewayError::Configuration("Stripe Secret Key (apiKey) is not configured.".into())
        })?;
        let webhook_secret = open_secret(vault, config.webhook_secret.as_deref())?;
        let base_url = trim_base(config.setting_str("baseUrl").unwrap_or(API_BASE));

        Ok(Self {
            http,
            base_url,
            secret_key,
            webhook_secret,
        })
    }

    fn rejection(body: &str) -> GatewayError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| "checkout session request failed".to_string());
        GatewayError::Rejected(format!("Stripe Error: {message}"))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Stripe
    }

    async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError> {
        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".into()),
            ("payment_method_types[0]", "card".into()),
            ("line_items[0][quantity]", "1".into()),
            ("line_items[0][price_data][currency]", request.currency.to_lowercase()),
            (
                "line_items[0][price_data][product_data][name]",
                format!("Order #{}", request.order_id),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                minor_units(request.amount)?.to_string(),
            ),
            ("client_reference_id", request.order_id.clone()),
            ("metadata[orderId]", request.order_id.clone()),
            ("success_url", request.return_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
        ];
        if let Some(email) = &request.customer_email {
            form.push(("customer_email", email.clone()));
        }

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(Self::rejection(&body));
        }

        let session: Session = parse_json("Stripe", &body)?;
        let url = session
            .url
            .ok_or_else(|| GatewayError::Malformed("Stripe session has no url".into()))?;
        Ok(Initiation::redirect(session.id, url))
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions/{reference}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(Self::rejection(&body));
        }

        let session: Session = parse_json("Stripe", &body)?;
        let payment_status = if session.payment_status.as_deref() == Some("paid") {
            PaymentStatus::Success
        } else if session.status.as_deref() == Some("expired") {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Pending
        };

        Ok(Verification {
            status: payment_status,
            amount: session.amount_total.map(from_minor_units),
            currency: session.currency.as_deref().map(str::to_uppercase),
            order_id: session.order_id(),
            evidence: body,
        })
    }

    fn verify_inbound_signature(&self, raw_body: &[u8], signature: &str, secret: &str) -> bool {
        verify_timestamped(raw_body, signature, secret, Utc::now().timestamp(), DEFAULT_TOLERANCE_SECS)
    }

    fn inbound_secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }

    fn parse_callback(&self, raw_body: &[u8]) -> Result<Option<PaymentNotice>, GatewayError> {
        let event: Event = serde_json::from_slice(raw_body)
            .map_err(|e| GatewayError::Malformed(format!("Stripe event: {e}")))?;
        if event.event_type != COMPLETED_EVENT {
            return Ok(None);
        }

        let session: Session = serde_json::from_value(event.data.object)
            .map_err(|e| GatewayError::Malformed(format!("Stripe session: {e}")))?;
        let status = match session.payment_status.as_deref() {
            Some("paid") => PaymentStatus::Success,
            Some("unpaid") => PaymentStatus::Pending,
            _ => {
                tracing::warn!(reference = %session.id, "completed session without a payment status");
                return Ok(None);
            }
        };
        let Some(amount_total) = session.amount_total else {
            tracing::warn!(reference = %session.id, "completed session without amount_total");
            return Ok(None);
        };

        Ok(Some(PaymentNotice {
            order_id: session.order_id(),
            amount: from_minor_units(amount_total),
            currency: session.currency.as_deref().map(str::to_uppercase),
            status,
            receipt: None,
            reference: session.id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn gateway() -> StripeGateway {
        StripeGateway {
            http: Client::new(),
            base_url: API_BASE.into(),
            secret_key: "sk_test".into(),
            webhook_secret: Some("whsec_test".into()),
        }
    }

    fn completed(session: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": "checkout.session.completed",
            "data": { "object": session }
        }))
        .unwrap()
    }

    #[test]
    fn paid_session_converts_cents() {
        let body = completed(json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "amount_total": 4999,
            "currency": "usd",
            "client_reference_id": "order-9"
        }));
        let notice = gateway().parse_callback(&body).unwrap().unwrap();
        assert_eq!(notice.reference, "cs_test_1");
        assert_eq!(notice.amount, dec!(49.99));
        assert_eq!(notice.currency.as_deref(), Some("USD"));
        assert_eq!(notice.order_id.as_deref(), Some("order-9"));
        assert_eq!(notice.status, PaymentStatus::Success);
    }

    #[test]
    fn session_without_amount_does_not_settle() {
        let body = completed(json!({ "id": "cs_test_2", "payment_status": "paid" }));
        assert_eq!(gateway().parse_callback(&body).unwrap(), None);
    }

    #[test]
    fn session_without_payment_status_does_not_settle() {
        let body = completed(json!({ "id": "cs_test_3", "amount_total": 1000 }));
        assert_eq!(gateway().parse_callback(&body).unwrap(), None);
    }

    #[test]
    fn unpaid_session_is_pending() {
        let body = completed(json!({ "id": "cs_test_4", "payment_status": "unpaid", "amount_total": 1000 }));
        let notice = gateway().parse_callback(&body).unwrap().unwrap();
        assert_eq!(notice.status, PaymentStatus::Pending);
    }

    #[test]
    fn other_events_are_ignored() {
        let body = serde_json::to_vec(&json!({ "type": "payment_intent.created", "data": { "object": {} } })).unwrap();
        assert_eq!(gateway().parse_callback(&body).unwrap(), None);
    }
}
