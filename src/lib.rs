//! astro-almanac - Personalized Astrological Almanac Engine
//!
//! This crate turns a birth profile into a twelve-month personal
//! almanac: the birth instant is resolved against the historical
//! timezone record, a natal chart is acquired (or synthesized when no
//! computation service is configured), the personal year is scanned for
//! lunar phases, eclipses, stations and ingresses, and every event is
//! paired with a cached, fingerprint-addressed natural-language
//! interpretation produced by a tiered fallback chain.
//!
//! ## Pipeline
//! BirthProfile -> ResolvedBirth -> ChartSource -> EventCalendar ->
//! interpreted BookPayload
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use astro_almanac::{
//!     AlmanacConfig, AlmanacService, BirthProfile, BirthTime, MemoryRecordStore,
//! };
//! use chrono::NaiveDate;
//! use uuid::Uuid;
//!
//! # async fn run() -> astro_almanac::Result<()> {
//! let config = AlmanacConfig::from_env()?;
//! let service = AlmanacService::from_config(&config, Arc::new(MemoryRecordStore::new()))?;
//!
//! let profile = BirthProfile::new(
//!     NaiveDate::from_ymd_opt(1974, 2, 10).unwrap(),
//!     BirthTime::Unknown,
//!     40.4168,
//!     -3.7038,
//!     "Europe/Madrid",
//! )?;
//! let today = chrono::Utc::now().date_naive();
//! let payload = service
//!     .build_book_payload(Uuid::new_v4(), &profile, today, false)
//!     .await?;
//! println!("{} months, {} interpretations", payload.months.len(), payload.interpretations.len());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Configuration read from the environment
pub mod config;

// Domain model: profiles, charts, events, interpretations
pub mod models;

// Historical timezone resolution of the birth instant
pub mod timezone;

// Chart and position acquisition with synthetic degradation
pub mod ephemeris;

// Personal-year event generation and fingerprinting
pub mod events;

// Tiered natural-language interpretation generation
pub mod interpret;

// Fingerprint-keyed interpretation cache
pub mod cache;

// Record persistence (in-memory by default, Postgres when enabled)
pub mod store;

// Orchestration and the assembler payload contract
pub mod almanac;

// Shared HTTP response plumbing
pub(crate) mod net;

// Top-level service and payload types
pub use almanac::{
    AlmanacService, BookAssembler, BookPayload, JsonAssembler, MonthEvents, SCAN_BODIES,
};

// Configuration
pub use config::{AlmanacConfig, CacheConfig, EphemerisConfig, GenerationConfig};

// Essential error types
pub use error::{AlmanacError, Result, UpstreamService};

// Domain model
pub use models::{
    Aspect, AspectType, AstrologicalEvent, BirthProfile, BirthTime, CelestialBody, ChartData,
    ChartSource, Element, ElementDistribution, EventKind, Fingerprint, GenerationMethod,
    HouseCusp, Interpretation, InterpretationRecord, Modality, ModalityDistribution,
    PlanetPosition, TimePrecision, ZodiacSign,
};

// Acquisition and event generation
pub use ephemeris::{DailySample, EphemerisClient, PositionSeries};
pub use events::fingerprint::{contextual_fingerprint, event_fingerprint};
pub use events::{generate_events, personal_year, EventCalendar, GenerationMeta, Window};
pub use timezone::{resolve_birth_instant, ResolvedBirth};

// Interpretation generation and caching
pub use cache::{InterpretationCache, TtlPolicy};
pub use interpret::{
    CompletionProducer, GenerationFallbackChain, InterpretationProducer, InterpretationRequest,
    InterpretationSubject, SessionProducer, TemplateProducer,
};

// Persistence
pub use store::{MemoryRecordStore, RecordStore};
#[cfg(feature = "database")]
pub use store::PgRecordStore;
