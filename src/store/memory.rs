//! In-memory record store
//!
//! Backs the CLI and the test suite. Same visible semantics as the
//! Postgres store: keyed upsert, owner listing, idempotent delete.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Fingerprint, InterpretationRecord};

use super::RecordStore;

type Key = (Uuid, String);

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<Key, InterpretationRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(owner: Uuid, fingerprint: &Fingerprint) -> Key {
        (owner, fingerprint.as_str().to_string())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert(&self, record: InterpretationRecord) -> Result<()> {
        let key = Self::key(record.owner, &record.fingerprint);
        self.records.write().await.insert(key, record);
        Ok(())
    }

    async fn get(
        &self,
        owner: Uuid,
        fingerprint: &Fingerprint,
    ) -> Result<Option<InterpretationRecord>> {
        let key = Self::key(owner, fingerprint);
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<InterpretationRecord>> {
        let mut records: Vec<InterpretationRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.generated_at);
        Ok(records)
    }

    async fn delete(&self, owner: Uuid, fingerprint: &Fingerprint) -> Result<()> {
        let key = Self::key(owner, fingerprint);
        self.records.write().await.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::fingerprint::contextual_fingerprint;
    use crate::models::{
        BirthProfile, BirthTime, GenerationMethod, Interpretation,
    };
    use chrono::{NaiveDate, Utc};

    fn fingerprint(label: &str) -> Fingerprint {
        let profile = BirthProfile::new(
            NaiveDate::from_ymd_opt(1990, 6, 15).unwrap(),
            BirthTime::Unknown,
            0.0,
            0.0,
            "UTC",
        )
        .unwrap();
        contextual_fingerprint(label, &profile)
    }

    fn record(owner: Uuid, fp: &Fingerprint, mantra: &str) -> InterpretationRecord {
        InterpretationRecord {
            owner,
            fingerprint: fp.clone(),
            interpretation: Interpretation {
                meaning: "m".to_string(),
                guidance: "g".to_string(),
                mantra: mantra.to_string(),
                ritual: None,
                warnings: vec![],
                opportunity: None,
                actions: vec![],
                timing_hint: None,
            },
            method: GenerationMethod::DeterministicTemplate,
            generated_at: Utc::now(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_at_the_same_key() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let fp = fingerprint("a");

        store.upsert(record(owner, &fp, "first")).await.unwrap();
        store.upsert(record(owner, &fp, "second")).await.unwrap();

        let got = store.get(owner, &fp).await.unwrap().unwrap();
        assert_eq!(got.interpretation.mantra, "second");
        assert_eq!(store.list_for_owner(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_owner() {
        let store = MemoryRecordStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store
            .upsert(record(alice, &fingerprint("a"), "x"))
            .await
            .unwrap();
        store
            .upsert(record(alice, &fingerprint("b"), "y"))
            .await
            .unwrap();
        store
            .upsert(record(bob, &fingerprint("a"), "z"))
            .await
            .unwrap();

        assert_eq!(store.list_for_owner(alice).await.unwrap().len(), 2);
        assert_eq!(store.list_for_owner(bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let fp = fingerprint("a");

        store.upsert(record(owner, &fp, "x")).await.unwrap();
        store.delete(owner, &fp).await.unwrap();
        assert!(store.get(owner, &fp).await.unwrap().is_none());

        // Deleting again is fine
        store.delete(owner, &fp).await.unwrap();
    }
}
