use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use paybook_accounting::{AccountType, EntryType, NewAccount, NewTransaction, ReferenceType};
use paybook_core::{AccountId, StoreId};
use paybook_payments::MethodUpdate;

use crate::app::errors;

// -------------------------
// Query strings
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreQuery {
    pub store_id: Option<String>,
}

impl StoreQuery {
    pub fn store_id(&self) -> Result<StoreId, axum::response::Response> {
        required_store_id(self.store_id.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub store_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ReportQuery {
    pub fn store_id(&self) -> Result<StoreId, axum::response::Response> {
        required_store_id(self.store_id.as_deref())
    }

    pub fn bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), axum::response::Response> {
        Ok((parse_bound("from", self.from.as_deref())?, parse_bound("to", self.to.as_deref())?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodQuery {
    pub method_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MpesaCallbackQuery {
    pub token: Option<String>,
}

fn required_store_id(raw: Option<&str>) -> Result<StoreId, axum::response::Response> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => errors::parse_store_id(raw),
        None => Err(errors::json_error(StatusCode::BAD_REQUEST, "storeId is required")),
    }
}

/// RFC 3339 instant, or a bare `YYYY-MM-DD` read as midnight UTC.
fn parse_bound(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, axum::response::Response> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(instant.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| errors::json_error(StatusCode::BAD_REQUEST, format!("{name} is not a valid date")))
}

// -------------------------
// Request bodies
// -------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateMethodsRequest {
    pub updates: Vec<MethodUpdate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub category: String,
    pub payment_method_id: Option<String>,
}

impl CreateAccountRequest {
    pub fn into_new_account(self) -> NewAccount {
        let account = NewAccount::new(self.code, self.name, self.account_type, self.category);
        match self.payment_method_id {
            Some(id) => NewAccount {
                payment_method_id: Some(id),
                ..account
            },
            None => account,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostTransactionRequest {
    pub account_id: AccountId,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "referenceId")]
    pub reference: Option<String>,
    pub reference_type: Option<ReferenceType>,
}

impl PostTransactionRequest {
    pub fn into_new_transaction(self) -> NewTransaction {
        let mut tx = NewTransaction::new(self.account_id, self.entry_type, self.amount);
        if let Some(description) = self.description.filter(|d| !d.trim().is_empty()) {
            tx = tx.described(description);
        }
        if let Some(date) = self.date {
            tx = tx.dated(date);
        }
        if let Some(category) = self.category {
            tx = tx.in_category(category);
        }
        if let Some(reference) = self.reference {
            tx = tx.referencing(reference, self.reference_type.unwrap_or_default());
        }
        tx
    }
}
