//! Deterministic synthetic ephemeris
//!
//! Stand-in data used whenever the real computation service cannot be
//! reached. Charts are seeded from the birth date alone, so the same
//! person always receives the same synthetic chart. Daily positions come
//! from mean orbital elements with one sinusoidal synodic term per body;
//! the sampled velocity is the exact derivative of the sampled longitude,
//! which makes station detection behave the same way it does on real
//! data. None of this aims at observational accuracy.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::models::{
    house_of, Aspect, AspectType, CelestialBody, ChartData, ElementDistribution, HouseCusp,
    ModalityDistribution, PlanetPosition, ZodiacSign,
};

use super::{DailySample, PositionSeries};

/// Mean synodic month in days.
pub(crate) const SYNODIC_MONTH: f64 = 29.530_588_853;

/// Reference new moon: 2000-01-06 18:14 UTC.
pub(crate) fn reference_new_moon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0)
        .single()
        .expect("reference new moon is a valid UTC instant")
}

/// Days elapsed since the J2000.0 epoch (2000-01-01 12:00 UTC).
pub(crate) fn days_since_j2000(instant: DateTime<Utc>) -> f64 {
    let epoch = Utc
        .with_ymd_and_hms(2000, 1, 1, 12, 0, 0)
        .single()
        .expect("J2000 epoch is a valid UTC instant");
    let seconds = instant.signed_duration_since(epoch).num_seconds() as f64;
    seconds / 86_400.0
}

/// Solar mean ecliptic longitude, degrees in [0, 360).
pub(crate) fn solar_mean_longitude(days: f64) -> f64 {
    (280.460 + 0.985_647_4 * days).rem_euclid(360.0)
}

/// Lunar mean ecliptic longitude, degrees in [0, 360).
pub(crate) fn lunar_mean_longitude(days: f64) -> f64 {
    (218.316 + 13.176_396 * days).rem_euclid(360.0)
}

/// Mean ascending lunar node longitude, degrees in [0, 360). The node
/// regresses, hence the negative rate.
pub(crate) fn mean_node_longitude(days: f64) -> f64 {
    (125.044_52 - 0.052_953_77 * days).rem_euclid(360.0)
}

/// Mean motion model for one body: J2000 base longitude, mean daily
/// motion, synodic cycle length and the velocity swing of the synodic
/// term. A swing larger than the mean motion produces retrograde spells.
struct MotionProfile {
    base: f64,
    motion: f64,
    cycle: f64,
    swing: f64,
}

fn motion_profile(body: CelestialBody) -> MotionProfile {
    let (base, motion, cycle, swing) = match body {
        CelestialBody::Sun => (280.46, 0.985_65, 365.25, 0.0),
        CelestialBody::Moon => (218.32, 13.176_4, 27.32, 0.0),
        CelestialBody::Mercury => (252.25, 0.985_65, 115.88, 2.0),
        CelestialBody::Venus => (181.98, 0.985_65, 583.92, 1.25),
        CelestialBody::Mars => (355.43, 0.524_0, 779.94, 0.75),
        CelestialBody::Jupiter => (34.35, 0.083_1, 398.88, 0.22),
        CelestialBody::Saturn => (50.08, 0.033_5, 378.09, 0.12),
        CelestialBody::Uranus => (314.06, 0.011_7, 369.66, 0.06),
        CelestialBody::Neptune => (304.35, 0.006_0, 367.49, 0.04),
        CelestialBody::Pluto => (238.93, 0.004_0, 366.73, 0.03),
        CelestialBody::NorthNode => (125.04, -0.052_953_77, 365.25, 0.0),
        CelestialBody::SouthNode => (305.04, -0.052_953_77, 365.25, 0.0),
        CelestialBody::Chiron => (251.50, 0.018_5, 372.70, 0.05),
    };
    MotionProfile {
        base,
        motion,
        cycle,
        swing,
    }
}

/// Longitude of `body` at `days` since J2000 under the mean model.
fn model_longitude(profile: &MotionProfile, days: f64) -> f64 {
    let phase = std::f64::consts::TAU * days / profile.cycle;
    let wave = profile.swing * profile.cycle / std::f64::consts::TAU * phase.sin();
    (profile.base + profile.motion * days - wave).rem_euclid(360.0)
}

/// Velocity of `body` at `days` since J2000; the exact derivative of
/// [`model_longitude`].
fn model_velocity(profile: &MotionProfile, days: f64) -> f64 {
    let phase = std::f64::consts::TAU * days / profile.cycle;
    profile.motion - profile.swing * phase.cos()
}

/// Share of time each stationable body spends retrograde, used for the
/// seeded natal retrograde flag.
fn retrograde_share(body: CelestialBody) -> f64 {
    match body {
        CelestialBody::Mercury => 0.19,
        CelestialBody::Venus => 0.07,
        CelestialBody::Mars => 0.09,
        CelestialBody::Jupiter => 0.33,
        CelestialBody::Saturn => 0.36,
        CelestialBody::Uranus => 0.41,
        CelestialBody::Neptune => 0.43,
        CelestialBody::Pluto => 0.44,
        CelestialBody::Chiron => 0.40,
        _ => 0.0,
    }
}

/// Seed derived from the birth date alone.
fn date_seed(date: NaiveDate) -> u64 {
    let digest = Sha256::digest(date.format("%Y-%m-%d").to_string().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Build the deterministic synthetic natal chart for a birth date.
///
/// The Sun and the nodes track the calendar through the mean formulas;
/// everything else is drawn from the date-seeded generator. Houses are
/// twelve equal 30° spans from the seeded ascendant.
pub fn synthetic_chart(birth_date: NaiveDate) -> ChartData {
    let mut rng = StdRng::seed_from_u64(date_seed(birth_date));
    let days = days_since_j2000(midday_utc(birth_date));

    let ascendant: f64 = rng.gen_range(0.0..360.0);
    let midheaven = (ascendant + 270.0).rem_euclid(360.0);
    let houses: Vec<HouseCusp> = (0..12)
        .map(|i| HouseCusp {
            house: i + 1,
            longitude: (ascendant + 30.0 * f64::from(i)).rem_euclid(360.0),
        })
        .collect();

    let mut positions = Vec::with_capacity(CelestialBody::CANONICAL.len());
    for body in CelestialBody::CANONICAL {
        let longitude = match body {
            CelestialBody::Sun => solar_mean_longitude(days),
            CelestialBody::Moon => lunar_mean_longitude(days),
            CelestialBody::NorthNode => mean_node_longitude(days),
            CelestialBody::SouthNode => (mean_node_longitude(days) + 180.0).rem_euclid(360.0),
            _ => rng.gen_range(0.0..360.0),
        };
        let retrograde = body.can_station() && rng.gen_bool(retrograde_share(body));
        let mean = motion_profile(body).motion;
        let speed = if retrograde { -0.3 * mean.abs() } else { mean };
        positions.push(PlanetPosition {
            body,
            longitude,
            sign: ZodiacSign::from_longitude(longitude),
            house: house_of(&houses, longitude),
            speed: Some(speed),
            retrograde,
        });
    }

    let aspects = aspects_between(&positions);
    let elements = ElementDistribution::from_positions(&positions);
    let modalities = ModalityDistribution::from_positions(&positions);

    ChartData {
        positions,
        houses,
        ascendant,
        midheaven,
        aspects,
        elements,
        modalities,
    }
}

/// Daily position series from the mean motion model. Always carries
/// velocities.
pub fn synthetic_positions(
    start: NaiveDate,
    days: u32,
    bodies: &[CelestialBody],
) -> Vec<PositionSeries> {
    bodies
        .iter()
        .map(|&body| {
            let profile = motion_profile(body);
            let samples = (0..=days)
                .filter_map(|offset| start.checked_add_days(chrono::Days::new(offset.into())))
                .map(|date| {
                    let d = days_since_j2000(midday_utc(date));
                    DailySample {
                        date,
                        longitude: model_longitude(&profile, d),
                        speed: Some(model_velocity(&profile, d)),
                    }
                })
                .collect();
            PositionSeries {
                body,
                samples,
                synthetic: true,
            }
        })
        .collect()
}

/// Major aspects between all charted pairs, closest match per pair.
fn aspects_between(positions: &[PlanetPosition]) -> Vec<Aspect> {
    let mut aspects = Vec::new();
    for (i, a) in positions.iter().enumerate() {
        for b in positions.iter().skip(i + 1) {
            let separation = angular_separation(a.longitude, b.longitude);
            let best = AspectType::ALL
                .iter()
                .map(|&kind| (kind, (separation - kind.angle()).abs()))
                .filter(|(kind, orb)| *orb <= kind.default_orb())
                .min_by(|x, y| x.1.total_cmp(&y.1));
            if let Some((kind, orb)) = best {
                aspects.push(Aspect {
                    body_a: a.body,
                    body_b: b.body,
                    aspect: kind,
                    orb,
                });
            }
        }
    }
    aspects
}

/// Separation of two longitudes folded into [0, 180].
pub(crate) fn angular_separation(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

fn midday_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &date.and_hms_opt(12, 0, 0).expect("noon is a valid UTC time"),
    )
}
