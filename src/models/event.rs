//! Astrological events and their identity
//!
//! Events carry a fixed priority rank used to break same-instant ordering
//! ties, and are identified across runs by a content fingerprint rather
//! than their generated id.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chart::{CelestialBody, ZodiacSign};

/// Kinds of calendar events the generator can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LunarNew,
    LunarFirstQuarter,
    LunarFull,
    LunarLastQuarter,
    SolarEclipse,
    LunarEclipse,
    RetrogradeStation,
    DirectStation,
    Ingress,
    Aspect,
}

impl EventKind {
    /// Ordering rank for same-instant ties. Lower sorts first: eclipses
    /// before lunar phases, phases before stations, stations before
    /// ingresses, aspects last.
    pub fn priority(&self) -> u8 {
        match self {
            EventKind::SolarEclipse | EventKind::LunarEclipse => 0,
            EventKind::LunarNew
            | EventKind::LunarFirstQuarter
            | EventKind::LunarFull
            | EventKind::LunarLastQuarter => 1,
            EventKind::RetrogradeStation | EventKind::DirectStation => 2,
            EventKind::Ingress => 3,
            EventKind::Aspect => 4,
        }
    }

    /// Stable tag used in fingerprint canonical strings.
    pub fn fingerprint_tag(&self) -> &'static str {
        match self {
            EventKind::LunarNew => "lunar-new",
            EventKind::LunarFirstQuarter => "lunar-first-quarter",
            EventKind::LunarFull => "lunar-full",
            EventKind::LunarLastQuarter => "lunar-last-quarter",
            EventKind::SolarEclipse => "solar-eclipse",
            EventKind::LunarEclipse => "lunar-eclipse",
            EventKind::RetrogradeStation => "retrograde-station",
            EventKind::DirectStation => "direct-station",
            EventKind::Ingress => "ingress",
            EventKind::Aspect => "aspect",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EventKind::LunarNew => "New Moon",
            EventKind::LunarFirstQuarter => "First Quarter Moon",
            EventKind::LunarFull => "Full Moon",
            EventKind::LunarLastQuarter => "Last Quarter Moon",
            EventKind::SolarEclipse => "Solar Eclipse",
            EventKind::LunarEclipse => "Lunar Eclipse",
            EventKind::RetrogradeStation => "Retrograde Station",
            EventKind::DirectStation => "Direct Station",
            EventKind::Ingress => "Sign Ingress",
            EventKind::Aspect => "Aspect",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry in the twelve-month event calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstrologicalEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    /// Involved bodies in canonical order
    pub bodies: Vec<CelestialBody>,
    pub sign: ZodiacSign,
    /// Natal house the event falls in, when cusps are available
    pub house: Option<u8>,
    /// Copy of the kind's priority rank, kept on the event so persisted
    /// payloads sort without re-deriving it
    pub priority: u8,
}

impl AstrologicalEvent {
    pub fn new(
        kind: EventKind,
        timestamp: DateTime<Utc>,
        mut bodies: Vec<CelestialBody>,
        sign: ZodiacSign,
        house: Option<u8>,
    ) -> Self {
        bodies.sort_by_key(|b| b.canonical_index());
        bodies.dedup();
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp,
            bodies,
            sign,
            house,
            priority: kind.priority(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Total-order key: time, then priority rank, then first involved body.
    pub fn ordering_key(&self) -> (DateTime<Utc>, u8, usize) {
        let body_rank = self
            .bodies
            .first()
            .map(|b| b.canonical_index())
            .unwrap_or(usize::MAX);
        (self.timestamp, self.priority, body_rank)
    }
}

/// Deterministic identity of an event's interpretable content.
///
/// Produced by hashing the canonical event descriptor; see
/// `events::fingerprint`. Opaque to callers, stable across runs, safe to
/// use as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub(crate) fn from_hex(hex: String) -> Self {
        Fingerprint(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
