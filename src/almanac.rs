//! Book payload assembly
//!
//! The top-level pipeline behind one almanac: resolve the birth instant,
//! acquire the natal chart, scan the personal year for events, then
//! attach a cached or freshly generated interpretation to every event
//! and to the chart itself. The result is a renderer-agnostic payload;
//! a [`BookAssembler`] turns it into a deliverable without recomputing
//! anything.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::cache::{InterpretationCache, TtlPolicy};
use crate::config::AlmanacConfig;
use crate::ephemeris::EphemerisClient;
use crate::error::Result;
use crate::events::fingerprint::{contextual_fingerprint, event_fingerprint};
use crate::events::{generate_events, personal_year, GenerationMeta, Window};
use crate::interpret::{GenerationFallbackChain, InterpretationRequest, InterpretationSubject};
use crate::models::{
    AstrologicalEvent, BirthProfile, CelestialBody, ChartSource, Fingerprint,
    InterpretationRecord,
};
use crate::store::RecordStore;
use crate::timezone::{resolve_birth_instant, ResolvedBirth};

/// Bodies sampled daily for station and ingress scanning. The Moon is
/// excluded (its ingresses would flood the calendar) and the luminaries
/// never station; Chiron is scanned for its slow ingresses.
pub const SCAN_BODIES: [CelestialBody; 10] = [
    CelestialBody::Sun,
    CelestialBody::Mercury,
    CelestialBody::Venus,
    CelestialBody::Mars,
    CelestialBody::Jupiter,
    CelestialBody::Saturn,
    CelestialBody::Uranus,
    CelestialBody::Neptune,
    CelestialBody::Pluto,
    CelestialBody::Chiron,
];

/// One calendar month of the personal year, in window order. Months
/// without events keep an empty section so a rendered book shows the
/// full year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthEvents {
    pub year: i32,
    /// 1-based calendar month
    pub month: u32,
    /// Human form, e.g. "February 2026"
    pub label: String,
    pub events: Vec<AstrologicalEvent>,
}

/// Everything an assembler needs to render one almanac.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookPayload {
    pub owner: Uuid,
    pub profile: BirthProfile,
    pub birth: ResolvedBirth,
    pub chart: ChartSource,
    /// Key of the chart-overview record in `interpretations`
    pub overview_fingerprint: Fingerprint,
    pub months: Vec<MonthEvents>,
    /// Interpretation records keyed by fingerprint; covers every event
    /// in `months` plus the chart overview
    pub interpretations: HashMap<Fingerprint, InterpretationRecord>,
    pub meta: GenerationMeta,
}

/// Renders an assembled payload into a deliverable.
///
/// Implementations consume the payload as-is: no recomputation, no
/// service calls.
pub trait BookAssembler {
    type Output;

    fn assemble(&self, payload: &BookPayload) -> Result<Self::Output>;
}

/// Assembler that emits the payload as pretty-printed JSON.
pub struct JsonAssembler;

impl BookAssembler for JsonAssembler {
    type Output = String;

    fn assemble(&self, payload: &BookPayload) -> Result<Self::Output> {
        Ok(serde_json::to_string_pretty(payload)?)
    }
}

/// Orchestrating service tying acquisition, event generation and
/// interpretation caching together.
pub struct AlmanacService {
    ephemeris: Arc<EphemerisClient>,
    cache: Arc<InterpretationCache>,
}

impl AlmanacService {
    pub fn new(ephemeris: Arc<EphemerisClient>, cache: Arc<InterpretationCache>) -> Self {
        Self { ephemeris, cache }
    }

    /// Build the full stack from configuration over the given store.
    pub fn from_config(config: &AlmanacConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let ephemeris = Arc::new(EphemerisClient::new(config.ephemeris.clone())?);
        let chain = GenerationFallbackChain::new(config.generation.as_ref())?;
        let cache = Arc::new(InterpretationCache::new(
            store,
            chain,
            config.cache.clone(),
        ));
        Ok(Self::new(ephemeris, cache))
    }

    pub fn cache(&self) -> &Arc<InterpretationCache> {
        &self.cache
    }

    /// Assemble the payload for one owner's personal year starting from
    /// `today`. With `regenerate` every interpretation is produced
    /// fresh; otherwise cached records are reused.
    pub async fn build_book_payload(
        &self,
        owner: Uuid,
        profile: &BirthProfile,
        today: NaiveDate,
        regenerate: bool,
    ) -> Result<BookPayload> {
        let birth = resolve_birth_instant(profile)?;
        let chart = self
            .ephemeris
            .natal_chart(profile.date, &birth, profile.latitude, profile.longitude)
            .await;

        let window = personal_year(profile.date, today);
        let series = self
            .ephemeris
            .daily_positions(window.start.date_naive(), window.scan_days(), &SCAN_BODIES)
            .await;
        let calendar = generate_events(&chart, &series, &window);

        let mut interpretations = HashMap::new();

        let overview = self.overview_request(owner, profile, &birth, &chart);
        let overview_fingerprint = overview.fingerprint.clone();
        let record = self
            .cache
            .get_or_generate(overview, TtlPolicy::Contextual, regenerate)
            .await?;
        interpretations.insert(record.fingerprint.clone(), record);

        for event in &calendar.events {
            let request = InterpretationRequest {
                owner,
                fingerprint: event_fingerprint(event),
                subject: InterpretationSubject::Event(event.clone()),
                profile: profile.clone(),
                precision: birth.precision,
            };
            let record = self
                .cache
                .get_or_generate(request, TtlPolicy::PerEvent, regenerate)
                .await?;
            interpretations.insert(record.fingerprint.clone(), record);
        }

        info!(
            %owner,
            events = calendar.events.len(),
            synthetic_chart = calendar.meta.synthetic_chart,
            "book payload assembled"
        );

        Ok(BookPayload {
            owner,
            profile: profile.clone(),
            birth,
            chart,
            overview_fingerprint,
            months: partition_by_month(calendar.events, &calendar.meta.window),
            interpretations,
            meta: calendar.meta,
        })
    }

    fn overview_request(
        &self,
        owner: Uuid,
        profile: &BirthProfile,
        birth: &ResolvedBirth,
        chart: &ChartSource,
    ) -> InterpretationRequest {
        let data = chart.data();
        InterpretationRequest {
            owner,
            fingerprint: contextual_fingerprint("chart-overview", profile),
            subject: InterpretationSubject::ChartOverview {
                sun: data.sign_of(CelestialBody::Sun),
                moon: data.sign_of(CelestialBody::Moon),
                ascendant: data.ascendant_sign(),
                synthetic: chart.is_synthetic(),
            },
            profile: profile.clone(),
            precision: birth.precision,
        }
    }
}

/// Split a sorted event list into consecutive calendar-month sections
/// covering the window, keeping empty months.
fn partition_by_month(events: Vec<AstrologicalEvent>, window: &Window) -> Vec<MonthEvents> {
    let mut months = Vec::new();
    let mut cursor = first_of_month(window.start.date_naive());
    while month_start_utc(cursor) < window.end {
        months.push(MonthEvents {
            year: cursor.year(),
            month: cursor.month(),
            label: cursor.format("%B %Y").to_string(),
            events: Vec::new(),
        });
        cursor = next_month(cursor);
    }

    for event in events {
        let date = event.date();
        if let Some(section) = months
            .iter_mut()
            .find(|m| m.year == date.year() && m.month == date.month())
        {
            section.events.push(event);
        }
    }
    months
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    // day 1 exists in every month
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("valid first of month")
}

fn next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).expect("valid first of month")
}

fn month_start_utc(first: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    crate::events::midnight_utc(first)
}
