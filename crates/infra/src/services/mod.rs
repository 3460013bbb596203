//! Application services. Each one checks store ownership before touching data.

use std::sync::Arc;

use reqwest::Client;

use paybook_vault::Vault;

use crate::storage::Storage;

pub mod access;
pub mod ledger;
pub mod payments;
pub mod recorder;
pub mod registry;
pub mod resolver;

pub use access::{NewStore, StoreAccess};
pub use ledger::LedgerService;
pub use payments::{PaymentRequest, PaymentService, VerifyOutcome};
pub use recorder::{PaymentRecorder, RecordOutcome};
pub use registry::PaymentMethodRegistry;
pub use resolver::GatewayResolver;

/// Every service, wired over one storage backend and one vault.
#[derive(Clone)]
pub struct Services {
    pub stores: StoreAccess,
    pub registry: PaymentMethodRegistry,
    pub ledger: LedgerService,
    pub payments: PaymentService,
}

impl Services {
    pub fn new(storage: Arc<dyn Storage>, vault: Arc<Vault>, http: Client, public_url: impl Into<String>) -> Self {
        let stores = StoreAccess::new(storage.clone());
        let resolver = GatewayResolver::new(storage.clone(), vault.clone(), http);
        let recorder = PaymentRecorder::new(storage.clone());

        Self {
            registry: PaymentMethodRegistry::new(storage.clone(), vault),
            ledger: LedgerService::new(storage),
            payments: PaymentService::new(stores.clone(), resolver, recorder, public_url.into()),
            stores,
        }
    }
}
