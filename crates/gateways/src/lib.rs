//! Payment processor adapters behind one internal contract.
//!
//! A stored method's `gateway` string is resolved once into a [`Gateway`]; callers
//! never branch on processor names after that.

pub mod dpo;
pub mod error;
pub mod gateway;
pub mod http;
pub mod mpesa;
pub mod paystack;
pub mod signature;
pub mod stripe;
pub mod types;

pub use error::GatewayError;
pub use gateway::{Gateway, PaymentGateway};
pub use http::build_http_client;
pub use types::{
    GatewayKind, InitiateRequest, Initiation, NextStep, PaymentNotice, PaymentStatus,
    Verification,
};
