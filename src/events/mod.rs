//! Twelve-month event calendar generation
//!
//! The window is anchored on the owner's most recent birthday. Lunar
//! phases come from synodic-month arithmetic against a fixed reference
//! new moon; a phase within node-axis range is upgraded to an eclipse and
//! replaces the plain phase event. Stations are found by daily velocity
//! sign change, ingresses by sign-band change between daily samples, both
//! with sub-day linear interpolation. Everything is sorted by time, then
//! priority rank, then body order.

pub mod fingerprint;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ephemeris::synthetic::{
    angular_separation, days_since_j2000, mean_node_longitude, reference_new_moon,
    solar_mean_longitude, SYNODIC_MONTH,
};
use crate::ephemeris::PositionSeries;
use crate::error::{AlmanacError, Result};
use crate::models::{AstrologicalEvent, CelestialBody, ChartData, ChartSource, EventKind, ZodiacSign};

/// Max separation of a new moon from the node axis for a solar eclipse.
const SOLAR_ECLIPSE_NODE_LIMIT: f64 = 15.0;
/// Max separation of a full moon from the node axis for a lunar eclipse.
const LUNAR_ECLIPSE_NODE_LIMIT: f64 = 10.0;

/// Half-open UTC window [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(AlmanacError::validation(
                "window",
                format!("start {start} is not before end {end}"),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Daily scan length covering every date the window touches.
    pub fn scan_days(&self) -> u32 {
        let days = (self.end.date_naive() - self.start.date_naive()).num_days();
        days.max(0) as u32 + 1
    }
}

/// Twelve months anchored on the most recent birthday on or before
/// `today`. A February 29 birthday anchors on March 1 in common years.
pub fn personal_year(birth_date: NaiveDate, today: NaiveDate) -> Window {
    let mut anchor = anniversary_in(birth_date, today.year());
    if anchor > today {
        anchor = anniversary_in(birth_date, today.year() - 1);
    }
    let end = anniversary_in(birth_date, anchor.year() + 1);
    Window {
        start: midnight_utc(anchor),
        end: midnight_utc(end),
    }
}

fn anniversary_in(birth_date: NaiveDate, year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, birth_date.month(), birth_date.day())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 3, 1).expect("March 1 exists"))
}

pub(crate) fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is a valid UTC time"))
}

/// Provenance of one generated calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMeta {
    pub window: Window,
    pub synthetic_chart: bool,
    pub synthetic_positions: bool,
    /// True when station events were dropped because velocity data was
    /// unavailable for at least one scanned body
    pub retrogrades_omitted: bool,
    pub scanned_bodies: Vec<CelestialBody>,
}

/// A generated calendar with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCalendar {
    pub events: Vec<AstrologicalEvent>,
    pub meta: GenerationMeta,
}

/// Generate the full event calendar for a window.
pub fn generate_events(
    chart: &ChartSource,
    positions: &[PositionSeries],
    window: &Window,
) -> EventCalendar {
    let natal = chart.data();
    let mut events = Vec::new();

    lunar_events(&mut events, natal, window);
    let retrogrades_omitted = station_events(&mut events, natal, positions, window);
    ingress_events(&mut events, natal, positions, window);

    events.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));
    debug!(
        count = events.len(),
        start = %window.start,
        end = %window.end,
        "generated event calendar"
    );

    EventCalendar {
        events,
        meta: GenerationMeta {
            window: *window,
            synthetic_chart: chart.is_synthetic(),
            synthetic_positions: positions.iter().any(|s| s.synthetic),
            retrogrades_omitted,
            scanned_bodies: positions.iter().map(|s| s.body).collect(),
        },
    }
}

/// New, first-quarter, full and last-quarter instants from the synodic
/// cadence. New and full moons near the node axis become eclipses and
/// replace the plain phase event.
fn lunar_events(events: &mut Vec<AstrologicalEvent>, natal: &ChartData, window: &Window) {
    const PHASES: [(f64, EventKind); 4] = [
        (0.0, EventKind::LunarNew),
        (0.25, EventKind::LunarFirstQuarter),
        (0.5, EventKind::LunarFull),
        (0.75, EventKind::LunarLastQuarter),
    ];

    let reference = reference_new_moon();
    let elapsed_days =
        (window.start - reference).num_milliseconds() as f64 / 86_400_000.0;

    for (fraction, phase_kind) in PHASES {
        let mut cycle = ((elapsed_days / SYNODIC_MONTH) - fraction).ceil();
        loop {
            let offset_days = (cycle + fraction) * SYNODIC_MONTH;
            let timestamp =
                reference + Duration::milliseconds((offset_days * 86_400_000.0).round() as i64);
            if timestamp >= window.end {
                break;
            }
            if timestamp >= window.start {
                let d = days_since_j2000(timestamp);
                let sun = solar_mean_longitude(d);
                let moon = (sun + fraction * 360.0).rem_euclid(360.0);
                let node = mean_node_longitude(d);
                let node_separation = angular_separation(moon, node)
                    .min(angular_separation(moon, (node + 180.0).rem_euclid(360.0)));

                let kind = match phase_kind {
                    EventKind::LunarNew if node_separation <= SOLAR_ECLIPSE_NODE_LIMIT => {
                        EventKind::SolarEclipse
                    }
                    EventKind::LunarFull if node_separation <= LUNAR_ECLIPSE_NODE_LIMIT => {
                        EventKind::LunarEclipse
                    }
                    other => other,
                };

                events.push(AstrologicalEvent::new(
                    kind,
                    timestamp,
                    vec![CelestialBody::Sun, CelestialBody::Moon],
                    ZodiacSign::from_longitude(moon),
                    natal.house_of(moon),
                ));
            }
            cycle += 1.0;
        }
    }
}

/// Retrograde and direct stations from daily velocity sign changes.
///
/// Returns true when stations were omitted entirely because a scanned
/// stationable body carried no velocity data.
fn station_events(
    events: &mut Vec<AstrologicalEvent>,
    natal: &ChartData,
    positions: &[PositionSeries],
    window: &Window,
) -> bool {
    let stationable: Vec<&PositionSeries> = positions
        .iter()
        .filter(|s| s.body.can_station())
        .collect();

    if stationable.iter().any(|s| !s.has_velocity()) {
        warn!("velocity data unavailable for at least one body, omitting station events");
        return true;
    }

    for series in stationable {
        for pair in series.samples.windows(2) {
            let (Some(v_prev), Some(v_curr)) = (pair[0].speed, pair[1].speed) else {
                continue;
            };
            if v_prev * v_curr >= 0.0 {
                continue;
            }

            // Zero crossing sits between the two samples; interpolate.
            let fraction = v_prev.abs() / (v_prev.abs() + v_curr.abs());
            let timestamp = midnight_utc(pair[0].date)
                + Duration::milliseconds((fraction * 86_400_000.0).round() as i64);
            if !window.contains(timestamp) {
                continue;
            }

            let longitude =
                interpolate_longitude(pair[0].longitude, pair[1].longitude, fraction);
            let kind = if v_prev > 0.0 {
                EventKind::RetrogradeStation
            } else {
                EventKind::DirectStation
            };
            events.push(AstrologicalEvent::new(
                kind,
                timestamp,
                vec![series.body],
                ZodiacSign::from_longitude(longitude),
                natal.house_of(longitude),
            ));
        }
    }
    false
}

/// Sign ingresses from daily sign-band changes, wrap-aware in both
/// directions (retrograde re-entries count).
fn ingress_events(
    events: &mut Vec<AstrologicalEvent>,
    natal: &ChartData,
    positions: &[PositionSeries],
    window: &Window,
) {
    for series in positions {
        // The Moon changes sign every ~2.4 days and would drown a yearly
        // calendar; the phase cadence covers it instead.
        if series.body == CelestialBody::Moon {
            continue;
        }
        for pair in series.samples.windows(2) {
            let prev = &pair[0];
            let curr = &pair[1];
            let sign_prev = ZodiacSign::from_longitude(prev.longitude);
            let sign_curr = ZodiacSign::from_longitude(curr.longitude);
            if sign_prev == sign_curr {
                continue;
            }

            // Signed motion folded into (-180, 180]
            let mut delta = (curr.longitude - prev.longitude).rem_euclid(360.0);
            if delta > 180.0 {
                delta -= 360.0;
            }
            if delta == 0.0 {
                continue;
            }

            let (boundary, probe) = if delta > 0.0 {
                let b = ((prev.longitude / 30.0).floor() + 1.0) * 30.0;
                (b.rem_euclid(360.0), b.rem_euclid(360.0))
            } else {
                let b = (prev.longitude / 30.0).floor() * 30.0;
                // Entered sign lies just below the cusp
                (b.rem_euclid(360.0), (b - 1e-6).rem_euclid(360.0))
            };

            let distance = if delta > 0.0 {
                (boundary - prev.longitude).rem_euclid(360.0)
            } else {
                (prev.longitude - boundary).rem_euclid(360.0)
            };
            let fraction = (distance / delta.abs()).clamp(0.0, 1.0);
            let timestamp = midnight_utc(prev.date)
                + Duration::milliseconds((fraction * 86_400_000.0).round() as i64);
            if !window.contains(timestamp) {
                continue;
            }

            events.push(AstrologicalEvent::new(
                EventKind::Ingress,
                timestamp,
                vec![series.body],
                sign_curr,
                natal.house_of(probe),
            ));
        }
    }
}

/// Interpolate between two daily longitudes, wrap-aware.
fn interpolate_longitude(prev: f64, curr: f64, fraction: f64) -> f64 {
    let mut delta = (curr - prev).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    (prev + delta * fraction).rem_euclid(360.0)
}
