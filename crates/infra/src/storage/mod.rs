//! Storage boundary: ports the services depend on, plus the two backends.
//!
//! Balances are never stored. The journal is append-only and store-scoped; nothing
//! here updates or deletes a transaction.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{
    AccountRepository, JournalRepository, PaymentMethodRepository, Storage, Store, StoreDirectory,
};
