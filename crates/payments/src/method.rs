use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use paybook_core::{DomainError, DomainResult, StoreId};
use paybook_vault::{Vault, is_masked, mask};

/// Prefix reserved for merchant-created methods. Only these may be deleted.
pub const CUSTOM_PREFIX: &str = "pm_custom_";

/// Stable per-store method identifier (a slug, not a UUID).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(String);

impl MethodId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `pm_custom_<millis>`
    pub fn custom(now: DateTime<Utc>) -> Self {
        Self(format!("{CUSTOM_PREFIX}{}", now.timestamp_millis()))
    }

    /// `pm_<label>_<millis>_<index>` for catalog methods.
    pub fn seeded(label: &str, now: DateTime<Utc>, index: usize) -> Self {
        Self(format!("pm_{label}_{}_{index}", now.timestamp_millis()))
    }

    pub fn is_custom(&self) -> bool {
        self.0.starts_with(CUSTOM_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for MethodId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MethodId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentCategory {
    Cash,
    CreditCard,
    BankTransfer,
    MobileMoney,
    Crypto,
    Cheque,
    Other,
}

impl PaymentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentCategory::Cash => "Cash",
            PaymentCategory::CreditCard => "CreditCard",
            PaymentCategory::BankTransfer => "BankTransfer",
            PaymentCategory::MobileMoney => "MobileMoney",
            PaymentCategory::Crypto => "Crypto",
            PaymentCategory::Cheque => "Cheque",
            PaymentCategory::Other => "Other",
        }
    }
}

impl core::str::FromStr for PaymentCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Cash" => Ok(PaymentCategory::Cash),
            "CreditCard" => Ok(PaymentCategory::CreditCard),
            "BankTransfer" => Ok(PaymentCategory::BankTransfer),
            "MobileMoney" => Ok(PaymentCategory::MobileMoney),
            "Crypto" => Ok(PaymentCategory::Crypto),
            "Cheque" => Ok(PaymentCategory::Cheque),
            "Other" => Ok(PaymentCategory::Other),
            other => Err(DomainError::validation(format!("unknown payment method type '{other}'"))),
        }
    }
}

/// Stored configuration of one payment channel for one store.
///
/// `api_key` and `webhook_secret` hold vault ciphertext, never plaintext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodConfig {
    pub id: MethodId,
    pub store_id: StoreId,
    pub name: String,
    #[serde(rename = "type")]
    pub category: PaymentCategory,
    pub enabled: bool,
    /// Code of the ledger account this method posts to.
    pub coa_code: String,
    pub gateway: Option<String>,
    pub gateway_account_id: Option<String>,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub public_key: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i32,
    #[serde(default)]
    pub settings: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethodConfig {
    /// String value of a free-form setting, if present.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }

    /// Display form: secrets replaced by the mask literal.
    pub fn view(&self) -> PaymentMethodView {
        PaymentMethodView {
            id: self.id.clone(),
            store_id: self.store_id,
            name: self.name.clone(),
            category: self.category,
            enabled: self.enabled,
            coa_code: self.coa_code.clone(),
            gateway: self.gateway.clone(),
            gateway_account_id: self.gateway_account_id.clone(),
            api_key: mask(self.api_key.as_deref()),
            webhook_secret: mask(self.webhook_secret.as_deref()),
            public_key: self.public_key.clone(),
            description: self.description.clone(),
            icon: self.icon.clone(),
            sort_order: self.sort_order,
            settings: self.settings.clone(),
        }
    }
}

/// What leaves the service for display. Has no field that could carry plaintext
/// or ciphertext secrets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodView {
    pub id: MethodId,
    pub store_id: StoreId,
    pub name: String,
    #[serde(rename = "type")]
    pub category: PaymentCategory,
    pub enabled: bool,
    pub coa_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub sort_order: i32,
    pub settings: Map<String, Value>,
}

/// Partial update of one method; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodUpdate {
    pub id: MethodId,
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub coa_code: Option<String>,
    pub gateway: Option<String>,
    pub gateway_account_id: Option<String>,
    pub api_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub public_key: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i32>,
    pub settings: Option<Map<String, Value>>,
}

impl MethodUpdate {
    /// Apply onto `config`. Secrets are sealed with `vault`; a masked echo keeps the
    /// stored ciphertext, an empty string clears it.
    pub fn apply_to(
        self,
        config: &mut PaymentMethodConfig,
        vault: &Vault,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(code) = self.coa_code {
            let code = code.trim().to_string();
            if code.is_empty() {
                return Err(DomainError::validation("coaCode must not be empty"));
            }
            config.coa_code = code;
        }
        if let Some(gateway) = self.gateway {
            config.gateway = non_empty(gateway);
        }
        if let Some(account) = self.gateway_account_id {
            config.gateway_account_id = non_empty(account);
        }
        if let Some(public_key) = self.public_key {
            config.public_key = non_empty(public_key);
        }
        if let Some(description) = self.description {
            config.description = non_empty(description);
        }
        if let Some(icon) = self.icon {
            config.icon = non_empty(icon);
        }
        if let Some(order) = self.sort_order {
            config.sort_order = order;
        }
        if let Some(settings) = self.settings {
            config.settings = settings;
        }

        replace_secret(&mut config.api_key, self.api_key, vault)?;
        replace_secret(&mut config.webhook_secret, self.webhook_secret, vault)?;

        config.updated_at = now;
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn replace_secret(slot: &mut Option<String>, incoming: Option<String>, vault: &Vault) -> DomainResult<()> {
    match incoming {
        None => {}
        Some(value) if is_masked(&value) => {}
        Some(value) if value.is_empty() => *slot = None,
        Some(value) => *slot = Some(seal(vault, &value)?),
    }
    Ok(())
}

pub(crate) fn seal(vault: &Vault, plaintext: &str) -> DomainResult<String> {
    vault
        .encrypt(plaintext)
        .map_err(|e| DomainError::configuration(format!("failed to encrypt secret: {e}")))
}

/// Merchant-defined payment channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomMethod {
    pub name: String,
    #[serde(rename = "type")]
    pub category: PaymentCategory,
    pub coa_code: String,
    pub gateway: Option<String>,
    pub api_key: Option<String>,
    pub public_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl NewCustomMethod {
    pub fn into_config(
        self,
        store_id: StoreId,
        sort_order: i32,
        vault: &Vault,
        now: DateTime<Utc>,
    ) -> DomainResult<PaymentMethodConfig> {
        if self.name.trim().is_empty() || self.coa_code.trim().is_empty() {
            return Err(DomainError::validation("name, type, coaCode required"));
        }

        let api_key = self.api_key.filter(|s| !s.is_empty()).map(|s| seal(vault, &s)).transpose()?;
        let webhook_secret = self
            .webhook_secret
            .filter(|s| !s.is_empty())
            .map(|s| seal(vault, &s))
            .transpose()?;

        Ok(PaymentMethodConfig {
            id: MethodId::custom(now),
            store_id,
            name: self.name,
            category: self.category,
            enabled: true,
            coa_code: self.coa_code.trim().to_string(),
            gateway: self.gateway.and_then(non_empty),
            gateway_account_id: None,
            api_key,
            webhook_secret,
            public_key: self.public_key.and_then(non_empty),
            description: self.description,
            icon: Some(self.icon.unwrap_or_else(|| "💰".to_string())),
            sort_order,
            settings: self.settings,
            created_at: now,
            updated_at: now,
        })
    }
}
