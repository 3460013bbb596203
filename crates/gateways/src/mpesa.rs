//! Push-payment adapter (Safaricom Daraja STK push).
//!
//! Completion is asynchronous only: the payer approves on their handset and the
//! processor calls back. `verify` never claims more than Pending.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::json;

use paybook_core::StoreId;
use paybook_payments::PaymentMethodConfig;
use paybook_vault::Vault;

use crate::error::GatewayError;
use crate::gateway::{PaymentGateway, open_secret};
use crate::http::{parse_json, read_body, trim_base};
use crate::signature::{hmac_sha256_hex, verify_hmac_sha256};
use crate::types::{
    GatewayKind, InitiateRequest, Initiation, NextStep, PaymentNotice, PaymentStatus, Verification,
};

const SANDBOX_BASE: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE: &str = "https://api.safaricom.co.ke";

#[derive(Clone)]
pub struct MpesaGateway {
    http: Client,
    base_url: String,
    store_id: StoreId,
    consumer_key: String,
    consumer_secret: String,
    short_code: String,
    passkey: String,
}

impl core::fmt::Debug for MpesaGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MpesaGateway")
            .field("base_url", &self.base_url)
            .field("short_code", &self.short_code)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushResponse {
    response_code: Option<String>,
    response_description: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    customer_message: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Callback {
    #[serde(rename = "Body")]
    body: CallbackBody,
}

#[derive(Debug, Deserialize)]
struct CallbackBody {
    #[serde(rename = "stkCallback")]
    stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StkCallback {
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    result_code: i64,
    result_desc: Option<String>,
    callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallbackMetadata {
    #[serde(default)]
    item: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetadataItem {
    name: String,
    value: Option<serde_json::Value>,
}

impl CallbackMetadata {
    fn value(&self, name: &str) -> Option<&serde_json::Value> {
        self.item
            .iter()
            .find(|i| i.name == name)
            .and_then(|i| i.value.as_ref())
    }
}

/// Normalize a Kenyan MSISDN to `2547XXXXXXXX`: strip `+`, map a leading `0`
/// or a bare leading `7` onto the `254` country code.
pub fn normalize_phone(raw: &str) -> String {
    let phone: String = raw.chars().filter(|c| *c != '+' && !c.is_whitespace()).collect();
    let phone = match phone.strip_prefix('0') {
        Some(rest) => format!("254{rest}"),
        None => phone,
    };
    if phone.starts_with('7') {
        format!("254{phone}")
    } else {
        phone
    }
}

/// STK password: Base64(shortCode + passkey + timestamp).
pub fn stk_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{short_code}{passkey}{timestamp}"))
}

fn required(value: Option<String>, what: &str) -> Result<String, GatewayError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::Configuration(format!("M-Pesa {what} is not configured.")))
}

impl MpesaGateway {
    pub fn new(config: &PaymentMethodConfig, vault: &Vault, http: Client) -> Result<Self, GatewayError> {
        let consumer_key = required(open_secret(vault, config.api_key.as_deref())?, "consumer key (apiKey)")?;
        let consumer_secret = required(
            open_secret(vault, config.webhook_secret.as_deref())?,
            "consumer secret (webhookSecret)",
        )?;
        let short_code = required(config.gateway_account_id.clone(), "short code (gatewayAccountId)")?;
        let passkey = required(config.setting_str("passkey").map(str::to_string), "passkey (settings.passkey)")?;

        let default_base = if config.setting_str("mode") == Some("production") {
            PRODUCTION_BASE
        } else {
            SANDBOX_BASE
        };
        let base_url = trim_base(config.setting_str("baseUrl").unwrap_or(default_base));

        Ok(Self {
            http,
            base_url,
            store_id: config.store_id,
            consumer_key,
            consumer_secret,
            short_code,
            passkey,
        })
    }

    /// Token the callback URL must carry: hex HMAC-SHA256 of the store id.
    pub fn callback_token(&self) -> Result<String, GatewayError> {
        hmac_sha256_hex(self.consumer_secret.as_bytes(), self.store_id.to_string().as_bytes())
            .ok_or_else(|| GatewayError::Configuration("M-Pesa callback token could not be derived".into()))
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let response = self
            .http
            .get(format!("{}/oauth/v1/generate", self.base_url))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await?;
        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!("M-Pesa Error: OAuth failed ({status})")));
        }

        let token: AccessToken = parse_json("M-Pesa", &body)?;
        token
            .access_token
            .ok_or_else(|| GatewayError::Rejected("M-Pesa Error: OAuth response had no access_token".into()))
    }
}

fn whole_units(amount: Decimal) -> Result<i64, GatewayError> {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidRequest(format!("amount {amount} is out of range")))
}

#[async_trait]
impl PaymentGateway for MpesaGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Mpesa
    }

    async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError> {
        let phone = request
            .phone_number
            .as_deref()
            .map(normalize_phone)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GatewayError::InvalidRequest("phone number is required for M-Pesa".into()))?;

        let token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let payload = json!({
            "BusinessShortCode": self.short_code,
            "Password": stk_password(&self.short_code, &self.passkey, &timestamp),
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": whole_units(request.amount)?,
            "PartyA": phone,
            "PartyB": self.short_code,
            "PhoneNumber": phone,
            "CallBackURL": request.callback_url,
            "AccountReference": request.order_id,
            "TransactionDesc": format!("Payment for Order {}", request.order_id),
        });

        let response = self
            .http
            .post(format!("{}/mpesa/stkpush/v1/processrequest", self.base_url))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        let (_, body) = read_body(response).await?;
        let push: StkPushResponse = parse_json("M-Pesa", &body)?;

        if push.response_code.as_deref() != Some("0") {
            let reason = push
                .response_description
                .or(push.error_message)
                .unwrap_or_else(|| "STK push was not accepted".into());
            return Err(GatewayError::Rejected(format!("M-Pesa Error: {reason}")));
        }

        let reference = push
            .checkout_request_id
            .ok_or_else(|| GatewayError::Malformed("M-Pesa response has no CheckoutRequestID".into()))?;
        Ok(Initiation {
            reference,
            status: PaymentStatus::Pending,
            next_step: NextStep::AwaitApproval {
                message: push
                    .customer_message
                    .unwrap_or_else(|| "Check your phone to approve the payment".into()),
            },
        })
    }

    async fn verify(&self, _reference: &str) -> Result<Verification, GatewayError> {
        Ok(Verification::pending("awaiting M-Pesa callback"))
    }

    /// `signature` is the `token` echoed on the callback URL; the body is unsigned.
    fn verify_inbound_signature(&self, _raw_body: &[u8], signature: &str, secret: &str) -> bool {
        verify_hmac_sha256(secret.as_bytes(), self.store_id.to_string().as_bytes(), signature)
    }

    fn inbound_secret(&self) -> Option<&str> {
        Some(&self.consumer_secret)
    }

    fn parse_callback(&self, raw_body: &[u8]) -> Result<Option<PaymentNotice>, GatewayError> {
        let callback: Callback = serde_json::from_slice(raw_body)
            .map_err(|e| GatewayError::Malformed(format!("M-Pesa callback: {e}")))?;
        let stk = callback.body.stk_callback;

        if stk.result_code != 0 {
            tracing::info!(
                reference = %stk.checkout_request_id,
                reason = stk.result_desc.as_deref().unwrap_or_default(),
                "M-Pesa payment failed or was cancelled"
            );
            return Ok(Some(PaymentNotice {
                reference: stk.checkout_request_id,
                order_id: None,
                amount: Decimal::ZERO,
                currency: None,
                status: PaymentStatus::Failed,
                receipt: None,
            }));
        }

        let metadata = stk
            .callback_metadata
            .ok_or_else(|| GatewayError::Malformed("M-Pesa success callback without metadata".into()))?;
        let amount = metadata
            .value("Amount")
            .and_then(|v| match v {
                serde_json::Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
                serde_json::Value::String(s) => s.parse::<Decimal>().ok(),
                _ => None,
            })
            .ok_or_else(|| GatewayError::Malformed("M-Pesa callback without Amount".into()))?;
        let receipt = metadata
            .value("MpesaReceiptNumber")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Some(PaymentNotice {
            reference: stk.checkout_request_id,
            order_id: None,
            amount,
            currency: Some("KES".into()),
            status: PaymentStatus::Success,
            receipt,
        }))
    }
}
