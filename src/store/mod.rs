//! Interpretation record persistence
//!
//! The cache talks to a [`RecordStore`] trait so deployments can choose
//! between the always-available in-memory store and the Postgres store
//! behind the `database` feature. Records are keyed by owner plus content
//! fingerprint; upsert replaces the previous record at the same key.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::MemoryRecordStore;
#[cfg(feature = "database")]
pub use postgres::PgRecordStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Fingerprint, InterpretationRecord};

/// Storage behind the interpretation cache
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace the record at its (owner, fingerprint) key.
    async fn upsert(&self, record: InterpretationRecord) -> Result<()>;

    /// Fetch the record at the key, live or expired.
    async fn get(
        &self,
        owner: Uuid,
        fingerprint: &Fingerprint,
    ) -> Result<Option<InterpretationRecord>>;

    /// All records belonging to an owner, oldest generation first.
    async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<InterpretationRecord>>;

    /// Remove the record at the key. Absent keys are not an error.
    async fn delete(&self, owner: Uuid, fingerprint: &Fingerprint) -> Result<()>;
}
