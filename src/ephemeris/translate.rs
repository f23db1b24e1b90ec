//! Translation of service payloads into domain vocabulary
//!
//! The service's body naming is mapped through a fixed table, signs are
//! always recomputed locally from longitude, house placement falls back
//! to cusp spans when the service omits it, and element/modality
//! distributions are recomputed rather than trusted.

use tracing::debug;

use crate::error::{AlmanacError, Result};
use crate::models::{
    house_of, Aspect, AspectType, CelestialBody, ChartData, ElementDistribution, HouseCusp,
    ModalityDistribution, PlanetPosition, ZodiacSign,
};

use super::{ChartResponse, DailySample, PositionSeries, PositionsResponse};

/// Service body naming, including the aliases seen across providers.
pub(crate) fn body_from_name(name: &str) -> Option<CelestialBody> {
    let normalized = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "sun" | "sol" => Some(CelestialBody::Sun),
        "moon" | "luna" => Some(CelestialBody::Moon),
        "mercury" => Some(CelestialBody::Mercury),
        "venus" => Some(CelestialBody::Venus),
        "mars" => Some(CelestialBody::Mars),
        "jupiter" => Some(CelestialBody::Jupiter),
        "saturn" => Some(CelestialBody::Saturn),
        "uranus" => Some(CelestialBody::Uranus),
        "neptune" => Some(CelestialBody::Neptune),
        "pluto" => Some(CelestialBody::Pluto),
        "north_node" | "true_node" | "mean_node" | "rahu" => Some(CelestialBody::NorthNode),
        "south_node" | "ketu" => Some(CelestialBody::SouthNode),
        "chiron" => Some(CelestialBody::Chiron),
        _ => None,
    }
}

pub(crate) fn aspect_from_name(name: &str) -> Option<AspectType> {
    match name.trim().to_ascii_lowercase().as_str() {
        "conjunction" => Some(AspectType::Conjunction),
        "sextile" => Some(AspectType::Sextile),
        "square" => Some(AspectType::Square),
        "trine" => Some(AspectType::Trine),
        "opposition" => Some(AspectType::Opposition),
        _ => None,
    }
}

/// Turn a raw chart payload into validated [`ChartData`].
pub(crate) fn chart_from_response(raw: ChartResponse) -> Result<ChartData> {
    if raw.houses.len() != 12 {
        return Err(AlmanacError::data_integrity(format!(
            "chart payload carried {} house cusps, expected 12",
            raw.houses.len()
        )));
    }

    let mut houses: Vec<HouseCusp> = raw
        .houses
        .into_iter()
        .map(|c| HouseCusp {
            house: c.house,
            longitude: c.longitude.rem_euclid(360.0),
        })
        .collect();
    houses.sort_by_key(|c| c.house);
    for (i, cusp) in houses.iter().enumerate() {
        if usize::from(cusp.house) != i + 1 {
            return Err(AlmanacError::data_integrity(
                "chart payload house cusps are not numbered 1 through 12",
            ));
        }
    }

    let mut positions = Vec::with_capacity(raw.bodies.len());
    for body_raw in raw.bodies {
        let Some(body) = body_from_name(&body_raw.name) else {
            debug!(name = %body_raw.name, "skipping unrecognized body in chart payload");
            continue;
        };
        let longitude = body_raw.longitude.rem_euclid(360.0);
        let house = body_raw
            .house
            .filter(|h| (1..=12).contains(h))
            .or_else(|| house_of(&houses, longitude));
        let retrograde = match body_raw.retrograde {
            Some(flag) => flag,
            None => body_raw.speed.is_some_and(|s| s < 0.0),
        };
        positions.push(PlanetPosition {
            body,
            longitude,
            sign: ZodiacSign::from_longitude(longitude),
            house,
            speed: body_raw.speed,
            retrograde,
        });
    }

    if positions.iter().all(|p| p.body != CelestialBody::Sun)
        || positions.iter().all(|p| p.body != CelestialBody::Moon)
    {
        return Err(AlmanacError::data_integrity(
            "chart payload is missing the Sun or the Moon",
        ));
    }

    let aspects = raw
        .aspects
        .into_iter()
        .filter_map(|a| {
            let body_a = body_from_name(&a.body_a)?;
            let body_b = body_from_name(&a.body_b)?;
            let aspect = aspect_from_name(&a.kind)?;
            Some(Aspect {
                body_a,
                body_b,
                aspect,
                orb: a.orb.abs(),
            })
        })
        .collect();

    let elements = ElementDistribution::from_positions(&positions);
    let modalities = ModalityDistribution::from_positions(&positions);

    Ok(ChartData {
        positions,
        houses,
        ascendant: raw.ascendant.rem_euclid(360.0),
        midheaven: raw.midheaven.rem_euclid(360.0),
        aspects,
        elements,
        modalities,
    })
}

/// Turn a raw positions payload into domain series, dropping series whose
/// body the vocabulary does not cover.
pub(crate) fn series_from_response(raw: PositionsResponse) -> Vec<PositionSeries> {
    raw.series
        .into_iter()
        .filter_map(|s| {
            let Some(body) = body_from_name(&s.name) else {
                debug!(name = %s.name, "skipping unrecognized body in position payload");
                return None;
            };
            let samples = s
                .samples
                .into_iter()
                .map(|x| DailySample {
                    date: x.date,
                    longitude: x.longitude.rem_euclid(360.0),
                    speed: x.speed,
                })
                .collect();
            Some(PositionSeries {
                body,
                samples,
                synthetic: false,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart_json(houses: usize) -> ChartResponse {
        let houses_json: Vec<serde_json::Value> = (0..houses)
            .map(|i| {
                serde_json::json!({
                    "house": i + 1,
                    "longitude": 15.0 + 30.0 * i as f64,
                })
            })
            .collect();
        let payload = serde_json::json!({
            "bodies": [
                { "name": "Sun", "longitude": 321.5, "speed": 1.01 },
                { "name": "Moon", "longitude": 95.2, "speed": 13.2, "house": 4 },
                { "name": "Rahu", "longitude": 250.1, "retrograde": true },
                { "name": "Vesta", "longitude": 12.0 }
            ],
            "houses": houses_json,
            "aspects": [
                { "body_a": "Sun", "body_b": "Moon", "type": "trine", "orb": -3.4 },
                { "body_a": "Sun", "body_b": "Vesta", "type": "square", "orb": 1.0 }
            ],
            "ascendant": 15.0,
            "midheaven": 285.0
        });
        serde_json::from_value(payload).unwrap()
    }

    #[test]
    fn body_naming_follows_the_alias_table() {
        assert_eq!(body_from_name("Sun"), Some(CelestialBody::Sun));
        assert_eq!(body_from_name("  luna "), Some(CelestialBody::Moon));
        assert_eq!(body_from_name("True Node"), Some(CelestialBody::NorthNode));
        assert_eq!(body_from_name("mean-node"), Some(CelestialBody::NorthNode));
        assert_eq!(body_from_name("KETU"), Some(CelestialBody::SouthNode));
        assert_eq!(body_from_name("Ceres"), None);
    }

    #[test]
    fn signs_are_recomputed_from_longitude() {
        let chart = chart_from_response(chart_json(12)).unwrap();
        let sun = chart.position(CelestialBody::Sun).unwrap();
        // 321.5° falls in Aquarius regardless of what the payload claims
        assert_eq!(sun.sign, ZodiacSign::Aquarius);
    }

    #[test]
    fn missing_house_is_filled_from_cusp_spans() {
        let chart = chart_from_response(chart_json(12)).unwrap();
        let sun = chart.position(CelestialBody::Sun).unwrap();
        // Cusps start at 15° in 30° steps; 321.5° sits in the 11th span
        assert_eq!(sun.house, Some(11));
        // The Moon's house came straight from the payload
        let moon = chart.position(CelestialBody::Moon).unwrap();
        assert_eq!(moon.house, Some(4));
    }

    #[test]
    fn unknown_bodies_are_skipped_not_fatal() {
        let chart = chart_from_response(chart_json(12)).unwrap();
        assert_eq!(chart.positions.len(), 3);
        // An aspect naming the unknown body is dropped with it
        assert_eq!(chart.aspects.len(), 1);
        assert_eq!(chart.aspects[0].aspect, AspectType::Trine);
        assert!((chart.aspects[0].orb - 3.4).abs() < 1e-9);
    }

    #[test]
    fn wrong_cusp_count_is_rejected() {
        let err = chart_from_response(chart_json(11)).unwrap_err();
        assert!(matches!(err, AlmanacError::DataIntegrity { .. }));
    }

    #[test]
    fn chart_without_luminaries_is_rejected() {
        let payload = serde_json::json!({
            "bodies": [ { "name": "Mars", "longitude": 100.0 } ],
            "houses": (0..12).map(|i| serde_json::json!({
                "house": i + 1, "longitude": 30.0 * i as f64
            })).collect::<Vec<_>>(),
            "ascendant": 0.0,
            "midheaven": 270.0
        });
        let raw: ChartResponse = serde_json::from_value(payload).unwrap();
        let err = chart_from_response(raw).unwrap_err();
        assert!(matches!(err, AlmanacError::DataIntegrity { .. }));
    }

    #[test]
    fn retrograde_falls_back_to_speed_sign() {
        let payload = serde_json::json!({
            "bodies": [
                { "name": "Sun", "longitude": 10.0, "speed": 1.0 },
                { "name": "Moon", "longitude": 40.0, "speed": 13.0 },
                { "name": "Mercury", "longitude": 20.0, "speed": -0.5 }
            ],
            "houses": (0..12).map(|i| serde_json::json!({
                "house": i + 1, "longitude": 30.0 * i as f64
            })).collect::<Vec<_>>(),
            "ascendant": 0.0,
            "midheaven": 270.0
        });
        let raw: ChartResponse = serde_json::from_value(payload).unwrap();
        let chart = chart_from_response(raw).unwrap();
        assert!(chart.position(CelestialBody::Mercury).unwrap().retrograde);
        assert!(!chart.position(CelestialBody::Sun).unwrap().retrograde);
    }

    #[test]
    fn position_series_translate_and_normalize() {
        let payload = serde_json::json!({
            "series": [
                {
                    "name": "mercury",
                    "samples": [
                        { "date": "2026-01-01", "longitude": 365.0, "speed": 1.2 },
                        { "date": "2026-01-02", "longitude": -5.0 }
                    ]
                },
                { "name": "Juno", "samples": [] }
            ]
        });
        let raw: PositionsResponse = serde_json::from_value(payload).unwrap();
        let series = series_from_response(raw);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].body, CelestialBody::Mercury);
        assert!((series[0].samples[0].longitude - 5.0).abs() < 1e-9);
        assert!((series[0].samples[1].longitude - 355.0).abs() < 1e-9);
        assert!(!series[0].has_velocity());
    }
}
