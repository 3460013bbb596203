use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::instrument;

use paybook_accounting::to_minor_units;
use paybook_core::{DomainError, DomainResult, StoreId};
use paybook_payments::PaymentMethodConfig;
use paybook_vault::Vault;

use crate::dpo::DpoGateway;
use crate::error::GatewayError;
use crate::mpesa::MpesaGateway;
use crate::paystack::PaystackGateway;
use crate::stripe::StripeGateway;
use crate::types::{GatewayKind, InitiateRequest, Initiation, PaymentNotice, Verification};

/// Processor-independent capability contract.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError>;

    /// Check an inbound callback against `secret` using the processor's own scheme.
    fn verify_inbound_signature(&self, raw_body: &[u8], signature: &str, secret: &str) -> bool;

    /// Secret this adapter authenticates callbacks with, if it accepts any.
    fn inbound_secret(&self) -> Option<&str>;

    /// Decode an already-authenticated callback. Events that do not settle a
    /// payment decode to `None`.
    fn parse_callback(&self, raw_body: &[u8]) -> Result<Option<PaymentNotice>, GatewayError>;
}

/// Decrypt a stored secret; unset and empty both mean "not configured".
pub(crate) fn open_secret(vault: &Vault, stored: Option<&str>) -> Result<Option<String>, GatewayError> {
    match stored {
        None | Some("") => Ok(None),
        Some(sealed) => vault
            .decrypt(sealed)
            .map(|plain| Some(plain).filter(|p| !p.is_empty()))
            .map_err(|e| GatewayError::Configuration(format!("stored secret could not be decrypted: {e}"))),
    }
}

/// Cent amount for processors that quote minor units.
pub(crate) fn minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    to_minor_units(amount).map_err(|e| GatewayError::InvalidRequest(e.to_string()))
}

/// An adapter resolved from a stored method configuration.
#[derive(Debug, Clone)]
pub enum Gateway {
    Stripe(StripeGateway),
    Dpo(DpoGateway),
    Mpesa(MpesaGateway),
    Paystack(PaystackGateway),
}

impl Gateway {
    /// Resolve the adapter named by `config.gateway`, decrypting its secrets.
    ///
    /// Missing secrets fail here with `Configuration`, before any network call.
    pub fn from_config(config: &PaymentMethodConfig, vault: &Vault, http: &Client) -> DomainResult<Self> {
        let name = config
            .gateway
            .as_deref()
            .ok_or_else(|| DomainError::configuration(format!("payment method {} has no gateway", config.id)))?;
        let kind: GatewayKind = name.parse()?;

        let gateway = match kind {
            GatewayKind::Stripe => Gateway::Stripe(StripeGateway::new(config, vault, http.clone())?),
            GatewayKind::Dpo => Gateway::Dpo(DpoGateway::new(config, vault, http.clone())?),
            GatewayKind::Mpesa => Gateway::Mpesa(MpesaGateway::new(config, vault, http.clone())?),
            GatewayKind::Paystack => Gateway::Paystack(PaystackGateway::new(config, vault, http.clone())?),
        };
        Ok(gateway)
    }

    fn adapter(&self) -> &dyn PaymentGateway {
        match self {
            Gateway::Stripe(g) => g,
            Gateway::Dpo(g) => g,
            Gateway::Mpesa(g) => g,
            Gateway::Paystack(g) => g,
        }
    }

    pub fn kind(&self) -> GatewayKind {
        self.adapter().kind()
    }

    /// Start a payment. A processor that does not answer in time leaves the
    /// payment Pending under the order id rather than failing it.
    #[instrument(skip(self, request), fields(gateway = %self.kind(), order_id = %request.order_id))]
    pub async fn initiate(&self, request: &InitiateRequest) -> DomainResult<Initiation> {
        match self.adapter().initiate(request).await {
            Ok(initiation) => {
                tracing::info!(reference = %initiation.reference, "payment initiated");
                Ok(initiation)
            }
            Err(GatewayError::Timeout) => {
                tracing::warn!("gateway timed out; payment left pending");
                Ok(Initiation::provisional(&request.order_id))
            }
            Err(e) => {
                tracing::warn!(error = %e, "payment initiation failed");
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self), fields(gateway = %self.kind()))]
    pub async fn verify(&self, reference: &str) -> DomainResult<Verification> {
        match self.adapter().verify(reference).await {
            Ok(verification) => Ok(verification),
            Err(GatewayError::Timeout) => {
                tracing::warn!("gateway timed out during verification");
                Ok(Verification::pending("timeout"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Authenticate a callback with the adapter's own secret. Fails closed when no
    /// secret is configured or no signature was presented.
    pub fn authenticate_callback(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
        let adapter = self.adapter();
        match (signature, adapter.inbound_secret()) {
            (Some(signature), Some(secret)) => adapter.verify_inbound_signature(raw_body, signature, secret),
            _ => false,
        }
    }

    pub fn parse_callback(&self, raw_body: &[u8]) -> DomainResult<Option<PaymentNotice>> {
        self.adapter().parse_callback(raw_body).map_err(DomainError::from)
    }

    /// Callback URL to hand the processor. M-Pesa signs nothing, so its URL carries
    /// a per-store token that the callback must echo.
    pub fn callback_url(&self, base: &str) -> DomainResult<String> {
        match self {
            Gateway::Mpesa(g) => Ok(format!("{base}?token={}", g.callback_token()?)),
            _ => Ok(base.to_string()),
        }
    }
}

/// `{public_url}/webhooks/{slug}/{store_id}`
pub fn webhook_path(kind: GatewayKind, store_id: StoreId) -> String {
    let slug = match kind {
        GatewayKind::Stripe => "stripe",
        GatewayKind::Dpo => "dpo",
        GatewayKind::Mpesa => "mpesa",
        GatewayKind::Paystack => "paystack",
    };
    format!("/webhooks/{slug}/{store_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use paybook_payments::{MethodId, PaymentCategory};
    use serde_json::{Map, json};

    fn config(gateway: Option<&str>) -> PaymentMethodConfig {
        let now = Utc::now();
        PaymentMethodConfig {
            id: MethodId::new("pm_test_1"),
            store_id: StoreId::new(),
            name: "Test".into(),
            category: PaymentCategory::CreditCard,
            enabled: true,
            coa_code: "1010".into(),
            gateway: gateway.map(str::to_string),
            gateway_account_id: None,
            api_key: None,
            webhook_secret: None,
            public_key: None,
            description: None,
            icon: None,
            sort_order: 1,
            settings: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn vault() -> Vault {
        Vault::from_key_bytes([9u8; 32])
    }

    #[test]
    fn method_without_gateway_cannot_resolve() {
        let err = Gateway::from_config(&config(None), &vault(), &Client::new()).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }

    #[test]
    fn unknown_gateway_is_rejected() {
        let err = Gateway::from_config(&config(Some("Square")), &vault(), &Client::new()).unwrap_err();
        assert_eq!(err, DomainError::Configuration("Unsupported payment gateway: Square".into()));
    }

    #[test]
    fn stripe_without_key_is_configuration_error() {
        let err = Gateway::from_config(&config(Some("Stripe")), &vault(), &Client::new()).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(msg) if msg.contains("apiKey")));
    }

    #[test]
    fn resolves_by_alias_and_decrypts() {
        let v = vault();
        let mut c = config(Some("mpesa"));
        c.api_key = Some(v.encrypt("consumer-key").unwrap());
        c.webhook_secret = Some(v.encrypt("consumer-secret").unwrap());
        c.gateway_account_id = Some("174379".into());
        c.settings.insert("passkey".into(), json!("pk"));

        let gateway = Gateway::from_config(&c, &v, &Client::new()).unwrap();
        assert_eq!(gateway.kind(), GatewayKind::Mpesa);
        let url = gateway.callback_url("https://shop.example/webhooks/mpesa/x").unwrap();
        assert!(url.starts_with("https://shop.example/webhooks/mpesa/x?token="));
    }

    #[test]
    fn callbacks_without_signature_fail_closed() {
        let v = vault();
        let mut c = config(Some("Paystack"));
        c.api_key = Some(v.encrypt("sk_test").unwrap());
        let gateway = Gateway::from_config(&c, &v, &Client::new()).unwrap();
        assert!(!gateway.authenticate_callback(b"{}", None));
    }

    #[test]
    fn tampered_secret_is_configuration_error() {
        let v = vault();
        let mut c = config(Some("Paystack"));
        let sealed = v.encrypt("sk_test").unwrap();
        let mut parts: Vec<&str> = sealed.split('.').collect();
        let zeros = "00".repeat(16);
        parts[1] = &zeros;
        c.api_key = Some(parts.join("."));
        let err = Gateway::from_config(&c, &v, &Client::new()).unwrap_err();
        assert!(matches!(err, DomainError::Configuration(_)));
    }
}
