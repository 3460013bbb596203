use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Map;

use paybook_core::StoreId;

use crate::method::{MethodId, PaymentCategory, PaymentMethodConfig};

/// Built-in method template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub category: PaymentCategory,
    pub enabled: bool,
    pub coa_code: &'static str,
    pub gateway: Option<&'static str>,
    pub description: &'static str,
    pub icon: &'static str,
    pub sort_order: i32,
}

impl CatalogEntry {
    /// Label used in seeded ids: the gateway when there is one, else the category.
    fn id_label(&self) -> String {
        self.gateway
            .unwrap_or(self.category.as_str())
            .to_lowercase()
    }

    fn instantiate(&self, store_id: StoreId, now: DateTime<Utc>, index: usize) -> PaymentMethodConfig {
        PaymentMethodConfig {
            id: MethodId::seeded(&self.id_label(), now, index),
            store_id,
            name: self.name.to_string(),
            category: self.category,
            enabled: self.enabled,
            coa_code: self.coa_code.to_string(),
            gateway: self.gateway.map(str::to_string),
            gateway_account_id: None,
            api_key: None,
            webhook_secret: None,
            public_key: None,
            description: Some(self.description.to_string()),
            icon: Some(self.icon.to_string()),
            sort_order: self.sort_order,
            settings: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

const CATALOG: [CatalogEntry; 8] = [
    CatalogEntry {
        name: "Cash on Hand",
        category: PaymentCategory::Cash,
        enabled: true,
        coa_code: "1000",
        gateway: None,
        description: "Physical cash payments received in person",
        icon: "💵",
        sort_order: 1,
    },
    CatalogEntry {
        name: "Stripe",
        category: PaymentCategory::CreditCard,
        enabled: false,
        coa_code: "1010",
        gateway: Some("Stripe"),
        description: "Card payments via Stripe (Global)",
        icon: "💳",
        sort_order: 2,
    },
    CatalogEntry {
        name: "Paystack (Africa)",
        category: PaymentCategory::CreditCard,
        enabled: false,
        coa_code: "1015",
        gateway: Some("Paystack"),
        description: "Payments via Paystack (Nigeria, Ghana, Kenya, SA)",
        icon: "🇳🇬",
        sort_order: 3,
    },
    CatalogEntry {
        name: "Bank Transfer",
        category: PaymentCategory::BankTransfer,
        enabled: false,
        coa_code: "1020",
        gateway: None,
        description: "Direct bank-to-bank transfers and wire payments",
        icon: "🏦",
        sort_order: 4,
    },
    CatalogEntry {
        name: "M-Pesa Express (Kenya)",
        category: PaymentCategory::MobileMoney,
        enabled: false,
        coa_code: "1030",
        gateway: Some("M-Pesa"),
        description: "Lipa na M-Pesa STK Push payments",
        icon: "📱",
        sort_order: 5,
    },
    CatalogEntry {
        name: "DPO Group (Africa)",
        category: PaymentCategory::CreditCard,
        enabled: false,
        coa_code: "1035",
        gateway: Some("DPO"),
        description: "Direct Pay Online - Cards and Mobile Money",
        icon: "🌍",
        sort_order: 6,
    },
    CatalogEntry {
        name: "Cheque",
        category: PaymentCategory::Cheque,
        enabled: false,
        coa_code: "1040",
        gateway: None,
        description: "Cheque payments deposited to business bank account",
        icon: "📄",
        sort_order: 7,
    },
    CatalogEntry {
        name: "Cryptocurrency",
        category: PaymentCategory::Crypto,
        enabled: false,
        coa_code: "1050",
        gateway: None,
        description: "Bitcoin, USDT and other digital currency payments",
        icon: "₿",
        sort_order: 8,
    },
];

pub fn default_catalog() -> &'static [CatalogEntry] {
    &CATALOG
}

/// Catalog entries a store is missing: the whole catalog for a store with no
/// methods, otherwise only gateway entries whose gateway is not configured yet.
pub fn missing_defaults(existing: &[PaymentMethodConfig]) -> Vec<&'static CatalogEntry> {
    if existing.is_empty() {
        return CATALOG.iter().collect();
    }

    let configured: HashSet<&str> = existing.iter().filter_map(|m| m.gateway.as_deref()).collect();
    CATALOG
        .iter()
        .filter(|entry| entry.gateway.is_some_and(|g| !configured.contains(g)))
        .collect()
}

/// Materialize the missing catalog methods for `store_id`.
pub fn seed_methods(
    store_id: StoreId,
    existing: &[PaymentMethodConfig],
    now: DateTime<Utc>,
) -> Vec<PaymentMethodConfig> {
    missing_defaults(existing)
        .into_iter()
        .enumerate()
        .map(|(i, entry)| entry.instantiate(store_id, now, i))
        .collect()
}

/// Rename legacy grouped labels to gateway-specific ones. Returns the methods
/// whose name changed.
pub fn normalize_display_names(methods: &mut [PaymentMethodConfig]) -> Vec<MethodId> {
    let mut changed = Vec::new();
    for method in methods.iter_mut() {
        let renamed = match method.gateway.as_deref() {
            Some("Stripe") if method.name.contains("Credit / Debit Card") => Some("Stripe"),
            Some("M-Pesa") if method.name == "Mobile Money" => Some("M-Pesa Express"),
            _ => None,
        };
        if let Some(name) = renamed {
            method.name = name.to_string();
            changed.push(method.id.clone());
        }
    }
    changed
}
