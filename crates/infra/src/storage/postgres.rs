//! Postgres-backed storage.
//!
//! Every query carries `store_id` in its WHERE clause or key. Uniqueness rules
//! (`(store_id, code)` on accounts, `(store_id, reference)` on the journal) are
//! enforced by the schema so racing writers cannot break them.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | DomainError |
//! |------------|---------------|-------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Storage` |
//! | PoolClosed / Io / other | n/a | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};
use uuid::Uuid;

use paybook_accounting::{Account, AppendOutcome, JournalEntry, Transaction};
use paybook_core::{AccountId, DomainError, DomainResult, StoreId, TransactionId, UserId};
use paybook_payments::{MethodId, PaymentMethodConfig};

use super::r#trait::{AccountRepository, JournalRepository, PaymentMethodRepository, Store, StoreDirectory};

const ACCOUNT_COLUMNS: &str = "id, store_id, code, name, type, category, status, payment_method_id, created_at";

const TRANSACTION_COLUMNS: &str =
    "id, store_id, account_id, type, amount, date, description, category, reference, reference_type, created_by, created_at";

const METHOD_COLUMNS: &str = "store_id, id, name, type, enabled, coa_code, gateway, gateway_account_id, api_key, \
     webhook_secret, public_key, description, icon, sort_order, settings, created_at, updated_at";

/// Postgres-backed implementation of every storage port.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and shared by clone.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DomainError::storage(format!("migration failed: {e}")))?;

        tracing::info!("postgres store ready");
        Ok(Self::new(pool))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DomainError::conflict(msg),
                _ => DomainError::storage(msg),
            }
        }
        sqlx::Error::PoolClosed => DomainError::storage(format!("connection pool closed in {operation}")),
        other => DomainError::storage(format!("{operation}: {other}")),
    }
}

fn decode_err(what: &str, err: impl core::fmt::Display) -> DomainError {
    DomainError::storage(format!("failed to decode {what} row: {err}"))
}

fn store_from_row(row: &PgRow) -> Result<Store, sqlx::Error> {
    Ok(Store {
        id: StoreId::from_uuid(row.try_get("id")?),
        owner_id: UserId::from_uuid(row.try_get("owner_id")?),
        name: row.try_get("name")?,
        currency: row.try_get("currency")?,
    })
}

fn account_from_row(row: &PgRow) -> DomainResult<Account> {
    let get = |e: sqlx::Error| decode_err("account", e);
    let account_type: String = row.try_get("type").map_err(get)?;
    let status: String = row.try_get("status").map_err(get)?;

    Ok(Account {
        id: AccountId::from_uuid(row.try_get("id").map_err(get)?),
        store_id: StoreId::from_uuid(row.try_get("store_id").map_err(get)?),
        code: row.try_get("code").map_err(get)?,
        name: row.try_get("name").map_err(get)?,
        account_type: account_type.parse().map_err(|e| decode_err("account", e))?,
        category: row.try_get("category").map_err(get)?,
        status: status.parse().map_err(|e| decode_err("account", e))?,
        payment_method_id: row.try_get("payment_method_id").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

fn transaction_from_row(row: &PgRow) -> DomainResult<Transaction> {
    let get = |e: sqlx::Error| decode_err("transaction", e);
    let entry_type: String = row.try_get("type").map_err(get)?;
    let reference_type: String = row.try_get("reference_type").map_err(get)?;

    Ok(Transaction {
        id: TransactionId::from_uuid(row.try_get("id").map_err(get)?),
        store_id: StoreId::from_uuid(row.try_get("store_id").map_err(get)?),
        account_id: AccountId::from_uuid(row.try_get("account_id").map_err(get)?),
        entry_type: entry_type.parse().map_err(|e| decode_err("transaction", e))?,
        amount: row.try_get::<Decimal, _>("amount").map_err(get)?.normalize(),
        date: row.try_get("date").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        category: row.try_get("category").map_err(get)?,
        reference: row.try_get("reference").map_err(get)?,
        reference_type: reference_type.parse().map_err(|e| decode_err("transaction", e))?,
        created_by: row.try_get("created_by").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

fn method_from_row(row: &PgRow) -> DomainResult<PaymentMethodConfig> {
    let get = |e: sqlx::Error| decode_err("payment method", e);
    let id: String = row.try_get("id").map_err(get)?;
    let category: String = row.try_get("type").map_err(get)?;
    let Json(settings): Json<Map<String, Value>> = row.try_get("settings").map_err(get)?;

    Ok(PaymentMethodConfig {
        id: MethodId::new(id),
        store_id: StoreId::from_uuid(row.try_get("store_id").map_err(get)?),
        name: row.try_get("name").map_err(get)?,
        category: category.parse().map_err(|e| decode_err("payment method", e))?,
        enabled: row.try_get("enabled").map_err(get)?,
        coa_code: row.try_get("coa_code").map_err(get)?,
        gateway: row.try_get("gateway").map_err(get)?,
        gateway_account_id: row.try_get("gateway_account_id").map_err(get)?,
        api_key: row.try_get("api_key").map_err(get)?,
        webhook_secret: row.try_get("webhook_secret").map_err(get)?,
        public_key: row.try_get("public_key").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        icon: row.try_get("icon").map_err(get)?,
        sort_order: row.try_get("sort_order").map_err(get)?,
        settings,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
    })
}

#[async_trait]
impl StoreDirectory for PostgresLedgerStore {
    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn get_store(&self, store_id: StoreId) -> DomainResult<Option<Store>> {
        let row = sqlx::query("SELECT id, owner_id, name, currency FROM stores WHERE id = $1")
            .bind(store_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_store", e))?;

        row.as_ref()
            .map(store_from_row)
            .transpose()
            .map_err(|e| decode_err("store", e))
    }

    #[instrument(skip(self, store), fields(store_id = %store.id), err)]
    async fn insert_store(&self, store: Store) -> DomainResult<()> {
        sqlx::query("INSERT INTO stores (id, owner_id, name, currency) VALUES ($1, $2, $3, $4)")
            .bind(store.id.as_uuid())
            .bind(store.owner_id.as_uuid())
            .bind(&store.name)
            .bind(&store.currency)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_store", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(owner_id = %owner_id), err)]
    async fn stores_owned_by(&self, owner_id: UserId) -> DomainResult<Vec<Store>> {
        let rows = sqlx::query("SELECT id, owner_id, name, currency FROM stores WHERE owner_id = $1 ORDER BY name")
            .bind(owner_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("stores_owned_by", e))?;

        rows.iter()
            .map(|row| store_from_row(row).map_err(|e| decode_err("store", e)))
            .collect()
    }
}

#[async_trait]
impl AccountRepository for PostgresLedgerStore {
    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn list_accounts(&self, store_id: StoreId) -> DomainResult<Vec<Account>> {
        let rows = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE store_id = $1"))
            .bind(store_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_accounts", e))?;

        rows.iter().map(account_from_row).collect()
    }

    #[instrument(skip(self), fields(store_id = %store_id, account_id = %account_id), err)]
    async fn get_account(&self, store_id: StoreId, account_id: AccountId) -> DomainResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE store_id = $1 AND id = $2"
        ))
        .bind(store_id.as_uuid())
        .bind(account_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_account", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(skip(self, codes), fields(store_id = %store_id, code_count = codes.len()), err)]
    async fn accounts_by_codes(&self, store_id: StoreId, codes: &[String]) -> DomainResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE store_id = $1 AND code = ANY($2)"
        ))
        .bind(store_id.as_uuid())
        .bind(codes)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts_by_codes", e))?;

        rows.iter().map(account_from_row).collect()
    }

    #[instrument(skip(self, accounts), fields(store_id = %store_id, requested = accounts.len(), inserted), err)]
    async fn insert_accounts(&self, store_id: StoreId, accounts: Vec<Account>) -> DomainResult<usize> {
        let accounts: Vec<Account> = accounts.into_iter().filter(|a| a.store_id == store_id).collect();
        if accounts.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = accounts.iter().map(|a| *a.id.as_uuid()).collect();
        let codes: Vec<String> = accounts.iter().map(|a| a.code.clone()).collect();
        let names: Vec<String> = accounts.iter().map(|a| a.name.clone()).collect();
        let types: Vec<&str> = accounts.iter().map(|a| a.account_type.as_str()).collect();
        let categories: Vec<String> = accounts.iter().map(|a| a.category.clone()).collect();
        let statuses: Vec<&str> = accounts.iter().map(|a| a.status.as_str()).collect();
        let method_ids: Vec<Option<String>> = accounts.iter().map(|a| a.payment_method_id.clone()).collect();
        let created: Vec<DateTime<Utc>> = accounts.iter().map(|a| a.created_at).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO accounts (id, store_id, code, name, type, category, status, payment_method_id, created_at)
            SELECT u.id, $1, u.code, u.name, u.type, u.category, u.status, u.payment_method_id, u.created_at
            FROM UNNEST($2::uuid[], $3::text[], $4::text[], $5::text[], $6::text[], $7::text[], $8::text[], $9::timestamptz[])
                AS u(id, code, name, type, category, status, payment_method_id, created_at)
            ON CONFLICT (store_id, code) DO NOTHING
            "#,
        )
        .bind(store_id.as_uuid())
        .bind(&ids)
        .bind(&codes)
        .bind(&names)
        .bind(&types)
        .bind(&categories)
        .bind(&statuses)
        .bind(&method_ids)
        .bind(&created)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_accounts", e))?;

        let inserted = result.rows_affected() as usize;
        Span::current().record("inserted", inserted);
        Ok(inserted)
    }
}

#[async_trait]
impl JournalRepository for PostgresLedgerStore {
    /// The reference row and the lines share one transaction: either the entry is
    /// fully posted or nothing is.
    #[instrument(
        skip(self, entry),
        fields(store_id = %entry.store_id, lines = entry.lines.len(), reference = ?entry.reference),
        err
    )]
    async fn append(&self, entry: JournalEntry) -> DomainResult<AppendOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("append_begin", e))?;

        if let Some(reference) = &entry.reference {
            let claimed = sqlx::query(
                "INSERT INTO journal_references (store_id, reference) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(entry.store_id.as_uuid())
            .bind(reference)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("append_reference", e))?;

            if claimed.rows_affected() == 0 {
                tx.rollback().await.map_err(|e| map_sqlx_error("append_rollback", e))?;
                tracing::info!("reference already posted");
                return Ok(AppendOutcome::Duplicate);
            }
        }

        for line in &entry.lines {
            sqlx::query(&format!(
                "INSERT INTO transactions ({TRANSACTION_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
            ))
            .bind(line.id.as_uuid())
            .bind(line.store_id.as_uuid())
            .bind(line.account_id.as_uuid())
            .bind(line.entry_type.as_str())
            .bind(line.amount)
            .bind(line.date)
            .bind(&line.description)
            .bind(&line.category)
            .bind(&line.reference)
            .bind(line.reference_type.as_str())
            .bind(&line.created_by)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("append_line", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("append_commit", e))?;
        Ok(AppendOutcome::Appended(entry.lines.len()))
    }

    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn list_transactions(&self, store_id: StoreId) -> DomainResult<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE store_id = $1 ORDER BY date ASC, created_at ASC"
        ))
        .bind(store_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        rows.iter().map(transaction_from_row).collect()
    }
}

#[async_trait]
impl PaymentMethodRepository for PostgresLedgerStore {
    #[instrument(skip(self), fields(store_id = %store_id), err)]
    async fn list_methods(&self, store_id: StoreId) -> DomainResult<Vec<PaymentMethodConfig>> {
        let rows = sqlx::query(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE store_id = $1 ORDER BY sort_order"
        ))
        .bind(store_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_methods", e))?;

        rows.iter().map(method_from_row).collect()
    }

    #[instrument(skip(self), fields(store_id = %store_id, method_id = %method_id), err)]
    async fn get_method(&self, store_id: StoreId, method_id: &MethodId) -> DomainResult<Option<PaymentMethodConfig>> {
        let row = sqlx::query(&format!(
            "SELECT {METHOD_COLUMNS} FROM payment_methods WHERE store_id = $1 AND id = $2"
        ))
        .bind(store_id.as_uuid())
        .bind(method_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_method", e))?;

        row.as_ref().map(method_from_row).transpose()
    }

    #[instrument(skip(self, methods), fields(count = methods.len()), err)]
    async fn save_methods(&self, methods: Vec<PaymentMethodConfig>) -> DomainResult<()> {
        if methods.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("save_methods_begin", e))?;

        for m in &methods {
            sqlx::query(&format!(
                r#"
                INSERT INTO payment_methods ({METHOD_COLUMNS})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                ON CONFLICT (store_id, id) DO UPDATE SET
                    name = EXCLUDED.name,
                    type = EXCLUDED.type,
                    enabled = EXCLUDED.enabled,
                    coa_code = EXCLUDED.coa_code,
                    gateway = EXCLUDED.gateway,
                    gateway_account_id = EXCLUDED.gateway_account_id,
                    api_key = EXCLUDED.api_key,
                    webhook_secret = EXCLUDED.webhook_secret,
                    public_key = EXCLUDED.public_key,
                    description = EXCLUDED.description,
                    icon = EXCLUDED.icon,
                    sort_order = EXCLUDED.sort_order,
                    settings = EXCLUDED.settings,
                    updated_at = EXCLUDED.updated_at
                "#
            ))
            .bind(m.store_id.as_uuid())
            .bind(m.id.as_str())
            .bind(&m.name)
            .bind(m.category.as_str())
            .bind(m.enabled)
            .bind(&m.coa_code)
            .bind(&m.gateway)
            .bind(&m.gateway_account_id)
            .bind(&m.api_key)
            .bind(&m.webhook_secret)
            .bind(&m.public_key)
            .bind(&m.description)
            .bind(&m.icon)
            .bind(m.sort_order)
            .bind(Json(&m.settings))
            .bind(m.created_at)
            .bind(m.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("save_method", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("save_methods_commit", e))
    }

    #[instrument(skip(self), fields(store_id = %store_id, method_id = %method_id), err)]
    async fn delete_method(&self, store_id: StoreId, method_id: &MethodId) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE store_id = $1 AND id = $2")
            .bind(store_id.as_uuid())
            .bind(method_id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_method", e))?;
        Ok(result.rows_affected() > 0)
    }
}
