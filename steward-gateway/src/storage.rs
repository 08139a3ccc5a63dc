//! Persistence layer.
//!
//! The gateway reads API keys and writes cost records through the
//! [`GatewayStore`] trait. Production uses [`PgStore`] over a bounded
//! sqlx pool; [`MemoryStore`] backs development and the test suite.
//! Cost durability is best-effort: a failed write is logged, never
//! propagated to the client, and never retried.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// One provisioned API key. The plaintext credential is never stored;
/// `key_hash` is a bcrypt digest.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub key_hash: String,
    pub name: String,
    pub rate_limit_per_minute: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Cost attribution for one successful provider attempt, pre-insert.
#[derive(Debug, Clone)]
pub struct NewCostRecord {
    pub api_key_id: Uuid,
    pub request_id: String,
    pub provider: String,
    pub model: String,
    pub tokens_in: i32,
    pub tokens_out: i32,
    pub cost_usd: Decimal,
    pub latency_ms: i32,
}

/// A persisted cost row.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CostRecord {
    pub id: Uuid,
    pub api_key_id: Uuid,
    pub request_id: String,
    pub provider: String,
    pub model: String,
    pub tokens_in: i32,
    pub tokens_out: i32,
    pub cost_usd: Decimal,
    pub latency_ms: i32,
    pub created_at: DateTime<Utc>,
}

/// One aggregation bucket of the cost summary.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CostSummaryRow {
    pub provider: String,
    pub model: String,
    pub requests: i64,
    pub cost_usd: Decimal,
    pub tokens_in: i64,
    pub tokens_out: i64,
}

/// Store operations the gateway depends on.
#[async_trait]
pub trait GatewayStore: Send + Sync {
    /// All keys that can currently authenticate.
    async fn list_active_keys(&self) -> Result<Vec<ApiKeyRecord>, StoreError>;

    /// Fetch one key by id, active or not.
    async fn get_key(&self, id: Uuid) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Persist one cost row.
    async fn insert_cost_record(&self, record: &NewCostRecord) -> Result<(), StoreError>;

    /// Per-(provider, model) aggregation for one key, most expensive first.
    async fn cost_summary(&self, api_key_id: Uuid) -> Result<Vec<CostSummaryRow>, StoreError>;

    /// Most recent cost rows for one key.
    async fn recent_cost_records(
        &self,
        api_key_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CostRecord>, StoreError>;
}

/// Postgres-backed store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run pending migrations. Pool acquisition is bounded so
    /// a saturated database cannot stall the request path indefinitely.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl GatewayStore for PgStore {
    async fn list_active_keys(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let keys = sqlx::query_as::<_, ApiKeyRecord>(
            "SELECT id, key_hash, name, rate_limit_per_minute, is_active, created_at
             FROM api_keys WHERE is_active = TRUE",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn get_key(&self, id: Uuid) -> Result<Option<ApiKeyRecord>, StoreError> {
        let key = sqlx::query_as::<_, ApiKeyRecord>(
            "SELECT id, key_hash, name, rate_limit_per_minute, is_active, created_at
             FROM api_keys WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn insert_cost_record(&self, record: &NewCostRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO cost_records
                 (id, api_key_id, request_id, provider, model,
                  tokens_in, tokens_out, cost_usd, latency_ms)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::new_v4())
        .bind(record.api_key_id)
        .bind(&record.request_id)
        .bind(&record.provider)
        .bind(&record.model)
        .bind(record.tokens_in)
        .bind(record.tokens_out)
        .bind(record.cost_usd)
        .bind(record.latency_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn cost_summary(&self, api_key_id: Uuid) -> Result<Vec<CostSummaryRow>, StoreError> {
        let rows = sqlx::query_as::<_, CostSummaryRow>(
            "SELECT provider, model,
                    COUNT(*) AS requests,
                    SUM(cost_usd) AS cost_usd,
                    SUM(tokens_in) AS tokens_in,
                    SUM(tokens_out) AS tokens_out
             FROM cost_records
             WHERE api_key_id = $1
             GROUP BY provider, model
             ORDER BY cost_usd DESC",
        )
        .bind(api_key_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn recent_cost_records(
        &self,
        api_key_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CostRecord>, StoreError> {
        let rows = sqlx::query_as::<_, CostRecord>(
            "SELECT id, api_key_id, request_id, provider, model,
                    tokens_in, tokens_out, cost_usd, latency_ms, created_at
             FROM cost_records
             WHERE api_key_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(api_key_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// In-memory store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    keys: RwLock<Vec<ApiKeyRecord>>,
    records: RwLock<Vec<CostRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_key(&self, key: ApiKeyRecord) {
        self.keys.write().expect("key lock poisoned").push(key);
    }

    pub fn set_key_active(&self, id: Uuid, is_active: bool) {
        let mut keys = self.keys.write().expect("key lock poisoned");
        if let Some(key) = keys.iter_mut().find(|k| k.id == id) {
            key.is_active = is_active;
        }
    }

    /// Snapshot of every persisted cost row.
    pub fn cost_records(&self) -> Vec<CostRecord> {
        self.records.read().expect("record lock poisoned").clone()
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn list_active_keys(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        Ok(self
            .keys
            .read()
            .expect("key lock poisoned")
            .iter()
            .filter(|k| k.is_active)
            .cloned()
            .collect())
    }

    async fn get_key(&self, id: Uuid) -> Result<Option<ApiKeyRecord>, StoreError> {
        Ok(self
            .keys
            .read()
            .expect("key lock poisoned")
            .iter()
            .find(|k| k.id == id)
            .cloned())
    }

    async fn insert_cost_record(&self, record: &NewCostRecord) -> Result<(), StoreError> {
        let row = CostRecord {
            id: Uuid::new_v4(),
            api_key_id: record.api_key_id,
            request_id: record.request_id.clone(),
            provider: record.provider.clone(),
            model: record.model.clone(),
            tokens_in: record.tokens_in,
            tokens_out: record.tokens_out,
            cost_usd: record.cost_usd,
            latency_ms: record.latency_ms,
            created_at: Utc::now(),
        };
        self.records
            .write()
            .expect("record lock poisoned")
            .push(row);
        Ok(())
    }

    async fn cost_summary(&self, api_key_id: Uuid) -> Result<Vec<CostSummaryRow>, StoreError> {
        let records = self.records.read().expect("record lock poisoned");
        let mut buckets: Vec<CostSummaryRow> = Vec::new();
        for record in records.iter().filter(|r| r.api_key_id == api_key_id) {
            match buckets
                .iter_mut()
                .find(|b| b.provider == record.provider && b.model == record.model)
            {
                Some(bucket) => {
                    bucket.requests += 1;
                    bucket.cost_usd += record.cost_usd;
                    bucket.tokens_in += i64::from(record.tokens_in);
                    bucket.tokens_out += i64::from(record.tokens_out);
                }
                None => buckets.push(CostSummaryRow {
                    provider: record.provider.clone(),
                    model: record.model.clone(),
                    requests: 1,
                    cost_usd: record.cost_usd,
                    tokens_in: i64::from(record.tokens_in),
                    tokens_out: i64::from(record.tokens_out),
                }),
            }
        }
        buckets.sort_by(|a, b| b.cost_usd.cmp(&a.cost_usd));
        Ok(buckets)
    }

    async fn recent_cost_records(
        &self,
        api_key_id: Uuid,
        limit: i64,
    ) -> Result<Vec<CostRecord>, StoreError> {
        let mut rows: Vec<CostRecord> = self
            .records
            .read()
            .expect("record lock poisoned")
            .iter()
            .filter(|r| r.api_key_id == api_key_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}
