//! Postgres-backed record store
//!
//! One row per (owner, fingerprint) key with the interpretation as JSONB.
//! A row whose payload no longer deserializes is treated as a cache miss:
//! it is logged and skipped so the caller regenerates and overwrites it.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{AlmanacError, Result};
use crate::models::{Fingerprint, GenerationMethod, Interpretation, InterpretationRecord};

use super::RecordStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS interpretation_records (
    owner_id     UUID        NOT NULL,
    fingerprint  TEXT        NOT NULL,
    payload      JSONB       NOT NULL,
    method       TEXT        NOT NULL,
    generated_at TIMESTAMPTZ NOT NULL,
    expires_at   TIMESTAMPTZ,
    PRIMARY KEY (owner_id, fingerprint)
)
"#;

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small pool and make sure the table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(store_err)?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    fn decode_row(row: &PgRow) -> Result<InterpretationRecord> {
        let payload: serde_json::Value = row.try_get("payload").map_err(store_err)?;
        let interpretation: Interpretation = serde_json::from_value(payload)?;
        let method_text: String = row.try_get("method").map_err(store_err)?;
        let method = method_from_str(&method_text).ok_or_else(|| {
            AlmanacError::data_integrity(format!("unknown generation method '{method_text}'"))
        })?;
        let fingerprint: String = row.try_get("fingerprint").map_err(store_err)?;

        Ok(InterpretationRecord {
            owner: row.try_get("owner_id").map_err(store_err)?,
            fingerprint: Fingerprint::from_hex(fingerprint),
            interpretation,
            method,
            generated_at: row.try_get("generated_at").map_err(store_err)?,
            expires_at: row.try_get("expires_at").map_err(store_err)?,
        })
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn upsert(&self, record: InterpretationRecord) -> Result<()> {
        let payload = serde_json::to_value(&record.interpretation)?;
        sqlx::query(
            r#"
            INSERT INTO interpretation_records
                (owner_id, fingerprint, payload, method, generated_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (owner_id, fingerprint) DO UPDATE SET
                payload = EXCLUDED.payload,
                method = EXCLUDED.method,
                generated_at = EXCLUDED.generated_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(record.owner)
        .bind(record.fingerprint.as_str())
        .bind(payload)
        .bind(record.method.to_string())
        .bind(record.generated_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn get(
        &self,
        owner: Uuid,
        fingerprint: &Fingerprint,
    ) -> Result<Option<InterpretationRecord>> {
        let row = sqlx::query(
            r#"
            SELECT owner_id, fingerprint, payload, method, generated_at, expires_at
            FROM interpretation_records
            WHERE owner_id = $1 AND fingerprint = $2
            "#,
        )
        .bind(owner)
        .bind(fingerprint.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match row {
            None => Ok(None),
            Some(row) => match Self::decode_row(&row) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    tracing::warn!(
                        %owner,
                        fingerprint = fingerprint.as_str(),
                        error = %err,
                        "discarding malformed interpretation record"
                    );
                    Ok(None)
                }
            },
        }
    }

    async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<InterpretationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT owner_id, fingerprint, payload, method, generated_at, expires_at
            FROM interpretation_records
            WHERE owner_id = $1
            ORDER BY generated_at ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::decode_row(row) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(%owner, error = %err, "skipping malformed interpretation record");
                }
            }
        }
        Ok(records)
    }

    async fn delete(&self, owner: Uuid, fingerprint: &Fingerprint) -> Result<()> {
        sqlx::query(
            "DELETE FROM interpretation_records WHERE owner_id = $1 AND fingerprint = $2",
        )
        .bind(owner)
        .bind(fingerprint.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

fn method_from_str(s: &str) -> Option<GenerationMethod> {
    match s {
        "primary_session" => Some(GenerationMethod::PrimarySession),
        "secondary_completion" => Some(GenerationMethod::SecondaryCompletion),
        "deterministic_template" => Some(GenerationMethod::DeterministicTemplate),
        _ => None,
    }
}

fn store_err(e: sqlx::Error) -> AlmanacError {
    AlmanacError::store(e.to_string())
}
