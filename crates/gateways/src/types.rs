use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use paybook_core::DomainError;

/// Supported processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatewayKind {
    Stripe,
    Dpo,
    Mpesa,
    Paystack,
}

impl GatewayKind {
    /// Name as stored on payment methods.
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Stripe => "Stripe",
            GatewayKind::Dpo => "DPO",
            GatewayKind::Mpesa => "M-Pesa",
            GatewayKind::Paystack => "Paystack",
        }
    }
}

impl core::fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for GatewayKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stripe" => Ok(GatewayKind::Stripe),
            "dpo" => Ok(GatewayKind::Dpo),
            "m-pesa" | "mpesa" => Ok(GatewayKind::Mpesa),
            "paystack" => Ok(GatewayKind::Paystack),
            _ => Err(DomainError::configuration(format!("Unsupported payment gateway: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Success,
    Pending,
    Failed,
}

/// Everything a processor needs to start collecting a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRequest {
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub customer_email: Option<String>,
    pub phone_number: Option<String>,
    /// Where the payer lands after completing payment.
    pub return_url: String,
    /// Where the payer lands after abandoning payment.
    pub cancel_url: String,
    /// Server-to-server notification target.
    pub callback_url: String,
}

/// What the payer has to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NextStep {
    /// Send the payer to a hosted page.
    Redirect { url: String },
    /// The payer approves on their own device; completion arrives by callback.
    AwaitApproval { message: String },
    /// Nothing to show yet.
    NoAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiation {
    /// Processor-side identifier used for verification and idempotent recording.
    pub reference: String,
    pub status: PaymentStatus,
    pub next_step: NextStep,
}

impl Initiation {
    pub fn redirect(reference: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            status: PaymentStatus::Pending,
            next_step: NextStep::Redirect { url: url.into() },
        }
    }

    /// Outcome unknown (e.g. the processor did not answer in time). The order id
    /// stands in as reference until a callback or verification settles it.
    pub fn provisional(order_id: impl Into<String>) -> Self {
        Self {
            reference: order_id.into(),
            status: PaymentStatus::Pending,
            next_step: NextStep::NoAction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub status: PaymentStatus,
    /// Raw processor response, kept for audit.
    pub evidence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Order the processor associates with the payment, when it says.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl Verification {
    pub fn pending(evidence: impl Into<String>) -> Self {
        Self {
            status: PaymentStatus::Pending,
            evidence: evidence.into(),
            amount: None,
            currency: None,
            order_id: None,
        }
    }
}

/// Decoded, authenticated processor callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotice {
    pub reference: String,
    pub order_id: Option<String>,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub status: PaymentStatus,
    /// Processor receipt number, if separate from the reference.
    pub receipt: Option<String>,
}
