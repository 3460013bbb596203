//! Payment method configuration: the model, the built-in catalog, and the plan
//! for provisioning the ledger accounts that enabled methods post to.
//!
//! Pure domain logic; persistence and HTTP live in `paybook-infra`/`paybook-api`.

pub mod catalog;
pub mod method;
pub mod provisioning;

pub use catalog::{CatalogEntry, default_catalog, missing_defaults, normalize_display_names, seed_methods};
pub use method::{
    MethodId, MethodUpdate, NewCustomMethod, PaymentCategory, PaymentMethodConfig,
    PaymentMethodView,
};
pub use provisioning::{accounts_to_provision, enabled_codes};
