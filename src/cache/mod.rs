//! Fingerprint-keyed interpretation cache
//!
//! Records are cached per owner under the subject's fingerprint:
//! event text is content-addressed and never expires, contextual text
//! carries a TTL and is regenerated lazily on the first read after
//! expiry. A miss runs the generation chain exactly once per key, with
//! concurrent readers parked on the in-flight generation instead of
//! stacking duplicate requests. Generation runs on its own task, so a
//! caller that gives up waiting cannot cancel work other waiters and
//! the cache itself depend on.

pub(crate) mod inflight;

use std::sync::Arc;

use chrono::{Duration as TtlDuration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::error::{AlmanacError, Result};
use crate::interpret::{GenerationFallbackChain, InterpretationRequest};
use crate::models::{Fingerprint, InterpretationRecord};
use crate::store::RecordStore;

use inflight::{Flight, InFlightKeys};

/// Lifetime class of a cached record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlPolicy {
    /// Context-sensitive text, live for the configured TTL.
    Contextual,
    /// Content-addressed event text, live until replaced.
    PerEvent,
}

pub struct InterpretationCache {
    store: Arc<dyn RecordStore>,
    chain: Arc<GenerationFallbackChain>,
    inflight: Arc<InFlightKeys>,
    config: CacheConfig,
}

impl InterpretationCache {
    pub fn new(
        store: Arc<dyn RecordStore>,
        chain: GenerationFallbackChain,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            chain: Arc::new(chain),
            inflight: Arc::new(InFlightKeys::default()),
            config,
        }
    }

    /// Fetch the cached record if it exists and is still live. Expired
    /// rows are left in place; they are replaced on the next
    /// [`InterpretationCache::get_or_generate`] for the same key.
    pub async fn get(
        &self,
        owner: Uuid,
        fingerprint: &Fingerprint,
    ) -> Result<Option<InterpretationRecord>> {
        let record = self.store.get(owner, fingerprint).await?;
        Ok(record.filter(|r| r.is_live(Utc::now())))
    }

    /// Drop the cached record for one key. Missing rows are fine.
    pub async fn delete(&self, owner: Uuid, fingerprint: &Fingerprint) -> Result<()> {
        self.store.delete(owner, fingerprint).await
    }

    /// Everything cached for one owner, live or not.
    pub async fn list_for_owner(&self, owner: Uuid) -> Result<Vec<InterpretationRecord>> {
        self.store.list_for_owner(owner).await
    }

    /// Return the live cached record, or generate, store and return a
    /// fresh one. `regenerate` skips the liveness check and always
    /// produces a new record with a strictly newer `generated_at`.
    ///
    /// Concurrent calls for the same key are single-flighted: one runs
    /// the chain, the rest wait and pick up its stored record. An
    /// explicit regenerate still waits its turn, then runs a generation
    /// of its own.
    pub async fn get_or_generate(
        &self,
        request: InterpretationRequest,
        policy: TtlPolicy,
        regenerate: bool,
    ) -> Result<InterpretationRecord> {
        let owner = request.owner;
        let fingerprint = request.fingerprint.clone();

        loop {
            if !regenerate {
                if let Some(record) = self.get(owner, &fingerprint).await? {
                    debug!(fingerprint = %fingerprint, "interpretation cache hit");
                    return Ok(record);
                }
            }

            match self.inflight.claim(owner, fingerprint.as_str()) {
                Flight::Begun(guard) => {
                    return self.generate_and_store(request, policy, guard).await;
                }
                Flight::Wait(handle) => {
                    debug!(fingerprint = %fingerprint, "waiting on in-flight generation");
                    handle.wait().await;
                    // Re-read on the next pass; a plain miss is satisfied
                    // by the record the finished flight stored, while a
                    // regenerate claims its own flight.
                }
            }
        }
    }

    async fn generate_and_store(
        &self,
        request: InterpretationRequest,
        policy: TtlPolicy,
        guard: inflight::FlightGuard,
    ) -> Result<InterpretationRecord> {
        let store = self.store.clone();
        let chain = self.chain.clone();
        let expires_after = self.expires_after(policy);

        let task = tokio::spawn(async move {
            let _guard = guard;
            let (interpretation, method) = chain.produce(&request).await;
            let now = Utc::now();
            let record = InterpretationRecord {
                owner: request.owner,
                fingerprint: request.fingerprint,
                interpretation,
                method,
                generated_at: now,
                expires_at: expires_after.and_then(|ttl| now.checked_add_signed(ttl)),
            };
            store.upsert(record.clone()).await?;
            info!(
                fingerprint = %record.fingerprint,
                method = %record.method,
                "interpretation generated and cached"
            );
            Ok(record)
        });

        task.await
            .map_err(|e| AlmanacError::store(format!("generation task aborted: {e}")))?
    }

    /// TTL for the policy. A configured lifetime too large for the
    /// calendar collapses to "never expires".
    fn expires_after(&self, policy: TtlPolicy) -> Option<TtlDuration> {
        match policy {
            TtlPolicy::Contextual => TtlDuration::from_std(self.config.contextual_ttl).ok(),
            TtlPolicy::PerEvent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::interpret::test_fixtures::event_request;
    use crate::interpret::{InterpretationProducer, InterpretationSubject};
    use crate::models::{GenerationMethod, Interpretation};
    use crate::store::MemoryRecordStore;

    struct CountingProducer {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl InterpretationProducer for CountingProducer {
        fn method(&self) -> GenerationMethod {
            GenerationMethod::PrimarySession
        }

        async fn produce(
            &self,
            _request: &InterpretationRequest,
        ) -> crate::error::Result<Interpretation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Interpretation {
                meaning: "counted meaning".to_string(),
                guidance: "counted guidance".to_string(),
                mantra: "counted mantra".to_string(),
                ritual: None,
                opportunity: None,
                timing_hint: None,
                warnings: vec![],
                actions: vec![],
            })
        }
    }

    fn counted_cache(
        calls: Arc<AtomicUsize>,
        delay: Duration,
        ttl: Duration,
    ) -> InterpretationCache {
        let chain =
            GenerationFallbackChain::with_tiers(vec![Box::new(CountingProducer { calls, delay })]);
        InterpretationCache::new(
            Arc::new(MemoryRecordStore::new()),
            chain,
            CacheConfig {
                contextual_ttl: ttl,
            },
        )
    }

    fn template_cache() -> InterpretationCache {
        InterpretationCache::new(
            Arc::new(MemoryRecordStore::new()),
            GenerationFallbackChain::with_tiers(vec![]),
            CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn miss_generates_and_stores() {
        let cache = template_cache();
        let request = event_request();
        let fingerprint = request.fingerprint.clone();
        let owner = request.owner;

        let record = cache
            .get_or_generate(request, TtlPolicy::PerEvent, false)
            .await
            .unwrap();
        assert_eq!(record.method, GenerationMethod::DeterministicTemplate);
        assert!(record.expires_at.is_none());

        let cached = cache.get(owner, &fingerprint).await.unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn hit_skips_generation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counted_cache(calls.clone(), Duration::ZERO, Duration::from_secs(3600));
        let request = event_request();

        let first = cache
            .get_or_generate(request.clone(), TtlPolicy::PerEvent, false)
            .await
            .unwrap();
        let second = cache
            .get_or_generate(request, TtlPolicy::PerEvent, false)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.generated_at, second.generated_at);
    }

    #[tokio::test]
    async fn contextual_records_expire_and_regenerate() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Zero TTL: the record is expired the moment it lands.
        let cache = counted_cache(calls.clone(), Duration::ZERO, Duration::ZERO);
        let request = event_request();

        let first = cache
            .get_or_generate(request.clone(), TtlPolicy::Contextual, false)
            .await
            .unwrap();
        assert!(first.expires_at.is_some());

        let second = cache
            .get_or_generate(request, TtlPolicy::Contextual, false)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(second.generated_at >= first.generated_at);
    }

    #[tokio::test]
    async fn regenerate_replaces_a_live_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = counted_cache(calls.clone(), Duration::ZERO, Duration::from_secs(3600));
        let request = event_request();

        let first = cache
            .get_or_generate(request.clone(), TtlPolicy::PerEvent, false)
            .await
            .unwrap();
        let second = cache
            .get_or_generate(request, TtlPolicy::PerEvent, true)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(second.generated_at > first.generated_at);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_generation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(counted_cache(
            calls.clone(),
            Duration::from_millis(50),
            Duration::from_secs(3600),
        ));
        let request = event_request();

        let mut join = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let request = request.clone();
            join.spawn(async move {
                cache
                    .get_or_generate(request, TtlPolicy::PerEvent, false)
                    .await
            });
        }

        let mut records = Vec::new();
        while let Some(result) = join.join_next().await {
            records.push(result.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(records
            .windows(2)
            .all(|pair| pair[0].generated_at == pair[1].generated_at));
    }

    #[tokio::test]
    async fn delete_then_get_misses() {
        let cache = template_cache();
        let request = event_request();
        let owner = request.owner;
        let fingerprint = request.fingerprint.clone();

        cache
            .get_or_generate(request, TtlPolicy::PerEvent, false)
            .await
            .unwrap();
        cache.delete(owner, &fingerprint).await.unwrap();
        assert!(cache.get(owner, &fingerprint).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chart_overview_requests_cache_like_events() {
        let cache = template_cache();
        let request = crate::interpret::test_fixtures::chart_overview_request();
        assert!(matches!(
            request.subject,
            InterpretationSubject::ChartOverview { .. }
        ));

        let record = cache
            .get_or_generate(request.clone(), TtlPolicy::Contextual, false)
            .await
            .unwrap();
        assert!(record.expires_at.is_some());
        assert!(record.interpretation.has_required_fields());
    }
}
