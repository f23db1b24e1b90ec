//! Domain models for the almanac pipeline
//!
//! Birth data, chart vocabulary, astrological events and interpretation
//! records. Everything here is serde-serializable so the same types flow
//! through the HTTP clients, the record store and the book payload.

pub mod chart;
pub mod event;
pub mod interpretation;
pub mod profile;

pub use chart::{
    house_of, Aspect, AspectType, CelestialBody, ChartData, ChartSource, Element,
    ElementDistribution, HouseCusp, Modality, ModalityDistribution, PlanetPosition, ZodiacSign,
};
pub use event::{AstrologicalEvent, EventKind, Fingerprint};
pub use interpretation::{GenerationMethod, Interpretation, InterpretationRecord};
pub use profile::{BirthProfile, BirthTime, TimePrecision};
