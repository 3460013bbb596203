//! `paybook-core` — shared building blocks for the payment and ledger crates.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{AccountId, StoreId, TransactionId, UserId};
