//! Marketplace REST adapter (Paystack transactions API).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use paybook_accounting::from_minor_units;
use paybook_payments::PaymentMethodConfig;
use paybook_vault::Vault;

use crate::error::GatewayError;
use crate::gateway::{PaymentGateway, minor_units, open_secret};
use crate::http::{parse_json, read_body, trim_base};
use crate::signature::verify_hmac_sha512;
use crate::types::{GatewayKind, InitiateRequest, Initiation, PaymentNotice, PaymentStatus, Verification};

const API_BASE: &str = "https://api.paystack.co";
const COMPLETED_EVENT: &str = "charge.success";

#[derive(Clone)]
pub struct PaystackGateway {
    http: Client,
    base_url: String,
    secret_key: String,
}

impl core::fmt::Debug for PaystackGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PaystackGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Authorization {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct Charge {
    status: Option<String>,
    reference: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl Charge {
    fn order_id(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("orderId"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| self.reference.clone())
    }
}

#[derive(Debug, Deserialize)]
struct Event {
    event: String,
    data: Charge,
}

impl PaystackGateway {
    pub fn new(config: &PaymentMethodConfig, vault: &Vault, http: Client) -> Result<Self, GatewayError> {
        let secret_key = open_secret(vault, config.api_key.as_deref())?.ok_or_else(|| {
            GatewayError::Configuration("Paystack Secret Key (apiKey) is not configured.".into())
        })?;
        let base_url = trim_base(config.setting_str("baseUrl").unwrap_or(API_BASE));
        Ok(Self {
            http,
            base_url,
            secret_key,
        })
    }
}

fn status_of(charge_status: Option<&str>) -> PaymentStatus {
    match charge_status {
        Some("success") => PaymentStatus::Success,
        Some("failed" | "abandoned" | "reversed") => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Paystack
    }

    async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError> {
        let email = request
            .customer_email
            .as_deref()
            .ok_or_else(|| GatewayError::InvalidRequest("customer email is required for Paystack".into()))?;

        let payload = json!({
            "amount": minor_units(request.amount)?,
            "email": email,
            "currency": request.currency.to_uppercase(),
            "reference": request.order_id,
            "callback_url": request.return_url,
            "metadata": { "orderId": request.order_id },
        });

        let response = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await?;
        let (_, body) = read_body(response).await?;

        let envelope: Envelope<Authorization> = parse_json("Paystack", &body)?;
        match envelope {
            Envelope {
                status: true,
                data: Some(auth),
                ..
            } => Ok(Initiation::redirect(auth.reference, auth.authorization_url)),
            Envelope { message, .. } => Err(GatewayError::Rejected(format!(
                "Paystack Initialization Error: {}",
                message.unwrap_or_default()
            ))),
        }
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        let response = self
            .http
            .get(format!("{}/transaction/verify/{reference}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        let (_, body) = read_body(response).await?;

        let envelope: Envelope<Charge> = parse_json("Paystack", &body)?;
        let Some(charge) = envelope.data.filter(|_| envelope.status) else {
            return Err(GatewayError::Rejected(format!(
                "Paystack Verification Error: {}",
                envelope.message.unwrap_or_default()
            )));
        };

        Ok(Verification {
            status: status_of(charge.status.as_deref()),
            amount: charge.amount.map(from_minor_units),
            currency: charge.currency.as_deref().map(str::to_uppercase),
            order_id: charge.order_id(),
            evidence: body,
        })
    }

    fn verify_inbound_signature(&self, raw_body: &[u8], signature: &str, secret: &str) -> bool {
        verify_hmac_sha512(secret.as_bytes(), raw_body, signature)
    }

    fn inbound_secret(&self) -> Option<&str> {
        Some(&self.secret_key)
    }

    fn parse_callback(&self, raw_body: &[u8]) -> Result<Option<PaymentNotice>, GatewayError> {
        let event: Event = serde_json::from_slice(raw_body)
            .map_err(|e| GatewayError::Malformed(format!("Paystack event: {e}")))?;
        if event.event != COMPLETED_EVENT {
            return Ok(None);
        }

        let charge = event.data;
        let order_id = charge.order_id();
        let Some(reference) = charge.reference.clone().or_else(|| order_id.clone()) else {
            tracing::warn!("charge.success event without reference");
            return Ok(None);
        };

        let Some(amount) = charge.amount else {
            tracing::warn!(%reference, "charge.success event without amount");
            return Ok(None);
        };

        Ok(Some(PaymentNotice {
            reference,
            order_id,
            amount: from_minor_units(amount),
            currency: charge.currency.as_deref().map(str::to_uppercase),
            status: PaymentStatus::Success,
            receipt: None,
        }))
    }
}
