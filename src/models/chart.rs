//! Natal chart vocabulary and data
//!
//! Zodiac signs, celestial bodies, aspects, house cusps and the assembled
//! chart. Signs are always recomputed locally from ecliptic longitude so
//! the pipeline never depends on upstream naming for them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The twelve tropical zodiac signs, in ecliptic order from 0° Aries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    /// Map an ecliptic longitude onto its 30° sign band.
    pub fn from_longitude(longitude: f64) -> Self {
        let normalized = longitude.rem_euclid(360.0);
        let index = ((normalized / 30.0).floor() as usize).min(11);
        Self::ALL[index]
    }

    /// Position in ecliptic order, 0 for Aries through 11 for Pisces.
    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or_default()
    }

    pub fn element(&self) -> Element {
        match self.index() % 4 {
            0 => Element::Fire,
            1 => Element::Earth,
            2 => Element::Air,
            _ => Element::Water,
        }
    }

    pub fn modality(&self) -> Modality {
        match self.index() % 3 {
            0 => Modality::Cardinal,
            1 => Modality::Fixed,
            _ => Modality::Mutable,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ZodiacSign::Aries => "Aries",
            ZodiacSign::Taurus => "Taurus",
            ZodiacSign::Gemini => "Gemini",
            ZodiacSign::Cancer => "Cancer",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Virgo",
            ZodiacSign::Libra => "Libra",
            ZodiacSign::Scorpio => "Scorpio",
            ZodiacSign::Sagittarius => "Sagittarius",
            ZodiacSign::Capricorn => "Capricorn",
            ZodiacSign::Aquarius => "Aquarius",
            ZodiacSign::Pisces => "Pisces",
        }
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Fire,
    Earth,
    Air,
    Water,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Cardinal,
    Fixed,
    Mutable,
}

/// Bodies the almanac knows how to place and interpret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CelestialBody {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Pluto,
    NorthNode,
    SouthNode,
    Chiron,
}

impl CelestialBody {
    /// Canonical ordering used for fingerprinting and event body lists.
    pub const CANONICAL: [CelestialBody; 13] = [
        CelestialBody::Sun,
        CelestialBody::Moon,
        CelestialBody::Mercury,
        CelestialBody::Venus,
        CelestialBody::Mars,
        CelestialBody::Jupiter,
        CelestialBody::Saturn,
        CelestialBody::Uranus,
        CelestialBody::Neptune,
        CelestialBody::Pluto,
        CelestialBody::NorthNode,
        CelestialBody::SouthNode,
        CelestialBody::Chiron,
    ];

    pub fn canonical_index(&self) -> usize {
        Self::CANONICAL
            .iter()
            .position(|b| b == self)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        match self {
            CelestialBody::Sun => "Sun",
            CelestialBody::Moon => "Moon",
            CelestialBody::Mercury => "Mercury",
            CelestialBody::Venus => "Venus",
            CelestialBody::Mars => "Mars",
            CelestialBody::Jupiter => "Jupiter",
            CelestialBody::Saturn => "Saturn",
            CelestialBody::Uranus => "Uranus",
            CelestialBody::Neptune => "Neptune",
            CelestialBody::Pluto => "Pluto",
            CelestialBody::NorthNode => "North Node",
            CelestialBody::SouthNode => "South Node",
            CelestialBody::Chiron => "Chiron",
        }
    }

    /// Whether the body ever stations (luminaries and the mean nodes never
    /// reverse apparent direction, so station scanning skips them).
    pub fn can_station(&self) -> bool {
        !matches!(
            self,
            CelestialBody::Sun
                | CelestialBody::Moon
                | CelestialBody::NorthNode
                | CelestialBody::SouthNode
        )
    }
}

impl fmt::Display for CelestialBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Major (Ptolemaic) aspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectType {
    Conjunction,
    Sextile,
    Square,
    Trine,
    Opposition,
}

impl AspectType {
    pub const ALL: [AspectType; 5] = [
        AspectType::Conjunction,
        AspectType::Sextile,
        AspectType::Square,
        AspectType::Trine,
        AspectType::Opposition,
    ];

    /// Exact angular separation of the aspect, in degrees.
    pub fn angle(&self) -> f64 {
        match self {
            AspectType::Conjunction => 0.0,
            AspectType::Sextile => 60.0,
            AspectType::Square => 90.0,
            AspectType::Trine => 120.0,
            AspectType::Opposition => 180.0,
        }
    }

    /// Default orb within which the aspect is considered in effect.
    pub fn default_orb(&self) -> f64 {
        match self {
            AspectType::Conjunction | AspectType::Opposition => 8.0,
            AspectType::Square | AspectType::Trine => 7.0,
            AspectType::Sextile => 5.0,
        }
    }
}

/// One body placed on the ecliptic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanetPosition {
    pub body: CelestialBody,
    /// Ecliptic longitude in [0, 360)
    pub longitude: f64,
    pub sign: ZodiacSign,
    /// House 1..=12 when house placement is known
    pub house: Option<u8>,
    /// Degrees per day; negative while retrograde. None when the source
    /// supplied no velocity.
    pub speed: Option<f64>,
    pub retrograde: bool,
}

/// One house cusp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseCusp {
    /// House number 1..=12
    pub house: u8,
    pub longitude: f64,
}

/// An aspect between two charted bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aspect {
    pub body_a: CelestialBody,
    pub body_b: CelestialBody,
    pub aspect: AspectType,
    /// Deviation from the exact angle, in degrees
    pub orb: f64,
}

/// Share of charted bodies per element, in whole percent summing to 100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDistribution {
    pub fire: u8,
    pub earth: u8,
    pub air: u8,
    pub water: u8,
}

impl ElementDistribution {
    pub fn total(&self) -> u16 {
        self.fire as u16 + self.earth as u16 + self.air as u16 + self.water as u16
    }

    pub fn from_positions(positions: &[PlanetPosition]) -> Self {
        let mut counts = [0usize; 4];
        for p in positions {
            match p.sign.element() {
                Element::Fire => counts[0] += 1,
                Element::Earth => counts[1] += 1,
                Element::Air => counts[2] += 1,
                Element::Water => counts[3] += 1,
            }
        }
        let [fire, earth, air, water] = whole_percentages(counts);
        Self {
            fire,
            earth,
            air,
            water,
        }
    }
}

/// Share of charted bodies per modality, in whole percent summing to 100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityDistribution {
    pub cardinal: u8,
    pub fixed: u8,
    pub mutable: u8,
}

impl ModalityDistribution {
    pub fn total(&self) -> u16 {
        self.cardinal as u16 + self.fixed as u16 + self.mutable as u16
    }

    pub fn from_positions(positions: &[PlanetPosition]) -> Self {
        let mut counts = [0usize; 3];
        for p in positions {
            match p.sign.modality() {
                Modality::Cardinal => counts[0] += 1,
                Modality::Fixed => counts[1] += 1,
                Modality::Mutable => counts[2] += 1,
            }
        }
        let [cardinal, fixed, mutable] = whole_percentages(counts);
        Self {
            cardinal,
            fixed,
            mutable,
        }
    }
}

/// Whole-percent split of `counts` summing to exactly 100 (largest
/// remainder method, ties broken by bucket order). All zero when the
/// input is empty.
fn whole_percentages<const N: usize>(counts: [usize; N]) -> [u8; N] {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return [0; N];
    }

    let mut out = [0u8; N];
    let mut remainders: Vec<(usize, usize)> = Vec::with_capacity(N);
    let mut assigned = 0usize;
    for (i, &count) in counts.iter().enumerate() {
        let scaled = count * 100;
        out[i] = (scaled / total) as u8;
        assigned += (scaled / total) as usize;
        remainders.push((i, scaled % total));
    }

    remainders.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut leftover = 100usize.saturating_sub(assigned);
    for (i, _) in remainders {
        if leftover == 0 {
            break;
        }
        out[i] += 1;
        leftover -= 1;
    }
    out
}

/// A complete natal chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub positions: Vec<PlanetPosition>,
    /// Exactly twelve cusps, house numbers 1..=12
    pub houses: Vec<HouseCusp>,
    pub ascendant: f64,
    pub midheaven: f64,
    pub aspects: Vec<Aspect>,
    pub elements: ElementDistribution,
    pub modalities: ModalityDistribution,
}

impl ChartData {
    pub fn position(&self, body: CelestialBody) -> Option<&PlanetPosition> {
        self.positions.iter().find(|p| p.body == body)
    }

    pub fn sign_of(&self, body: CelestialBody) -> Option<ZodiacSign> {
        self.position(body).map(|p| p.sign)
    }

    pub fn ascendant_sign(&self) -> ZodiacSign {
        ZodiacSign::from_longitude(self.ascendant)
    }

    /// House containing the given ecliptic longitude, by cusp spans.
    pub fn house_of(&self, longitude: f64) -> Option<u8> {
        house_of(&self.houses, longitude)
    }
}

/// House containing `longitude` given twelve ordered cusps. Each house
/// spans from its cusp forward to the next cusp, wrapping at 360°.
pub fn house_of(cusps: &[HouseCusp], longitude: f64) -> Option<u8> {
    if cusps.len() != 12 {
        return None;
    }
    let lon = longitude.rem_euclid(360.0);
    for i in 0..12 {
        let start = cusps[i].longitude.rem_euclid(360.0);
        let end = cusps[(i + 1) % 12].longitude.rem_euclid(360.0);
        let inside = if start <= end {
            lon >= start && lon < end
        } else {
            lon >= start || lon < end
        };
        if inside {
            return Some(cusps[i].house);
        }
    }
    None
}

/// A chart together with its provenance.
///
/// Synthetic charts are first-class stand-ins produced whenever the real
/// computation service is unavailable or unconfigured; the tag survives
/// into the book payload so presentation can label them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "chart", rename_all = "snake_case")]
pub enum ChartSource {
    Real(ChartData),
    Synthetic(ChartData),
}

impl ChartSource {
    pub fn data(&self) -> &ChartData {
        match self {
            ChartSource::Real(data) | ChartSource::Synthetic(data) => data,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, ChartSource::Synthetic(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longitude_maps_onto_thirty_degree_bands() {
        assert_eq!(ZodiacSign::from_longitude(0.0), ZodiacSign::Aries);
        assert_eq!(ZodiacSign::from_longitude(29.999), ZodiacSign::Aries);
        assert_eq!(ZodiacSign::from_longitude(30.0), ZodiacSign::Taurus);
        assert_eq!(ZodiacSign::from_longitude(359.999), ZodiacSign::Pisces);
        // Wraps and negatives normalize first
        assert_eq!(ZodiacSign::from_longitude(360.0), ZodiacSign::Aries);
        assert_eq!(ZodiacSign::from_longitude(-10.0), ZodiacSign::Pisces);
        assert_eq!(ZodiacSign::from_longitude(725.0), ZodiacSign::Aries);
    }

    #[test]
    fn elements_and_modalities_follow_ecliptic_order() {
        assert_eq!(ZodiacSign::Aries.element(), Element::Fire);
        assert_eq!(ZodiacSign::Taurus.element(), Element::Earth);
        assert_eq!(ZodiacSign::Gemini.element(), Element::Air);
        assert_eq!(ZodiacSign::Cancer.element(), Element::Water);
        assert_eq!(ZodiacSign::Leo.element(), Element::Fire);

        assert_eq!(ZodiacSign::Aries.modality(), Modality::Cardinal);
        assert_eq!(ZodiacSign::Taurus.modality(), Modality::Fixed);
        assert_eq!(ZodiacSign::Gemini.modality(), Modality::Mutable);
        assert_eq!(ZodiacSign::Capricorn.modality(), Modality::Cardinal);
    }

    fn position(body: CelestialBody, longitude: f64) -> PlanetPosition {
        PlanetPosition {
            body,
            longitude,
            sign: ZodiacSign::from_longitude(longitude),
            house: None,
            speed: None,
            retrograde: false,
        }
    }

    #[test]
    fn distributions_sum_to_exactly_one_hundred() {
        // 7 bodies split unevenly: percentages do not divide cleanly
        let positions = vec![
            position(CelestialBody::Sun, 5.0),      // Aries, fire
            position(CelestialBody::Moon, 35.0),    // Taurus, earth
            position(CelestialBody::Mercury, 65.0), // Gemini, air
            position(CelestialBody::Venus, 95.0),   // Cancer, water
            position(CelestialBody::Mars, 125.0),   // Leo, fire
            position(CelestialBody::Jupiter, 155.0), // Virgo, earth
            position(CelestialBody::Saturn, 185.0), // Libra, air
        ];

        let elements = ElementDistribution::from_positions(&positions);
        assert_eq!(elements.total(), 100);

        let modalities = ModalityDistribution::from_positions(&positions);
        assert_eq!(modalities.total(), 100);
    }

    #[test]
    fn distribution_of_empty_chart_is_all_zero() {
        let elements = ElementDistribution::from_positions(&[]);
        assert_eq!(elements.total(), 0);
    }

    #[test]
    fn house_lookup_handles_the_wrap_span() {
        let cusps: Vec<HouseCusp> = (0..12)
            .map(|i| HouseCusp {
                house: i + 1,
                longitude: (300.0 + 30.0 * f64::from(i)).rem_euclid(360.0),
            })
            .collect();

        // First house spans 300°..330°
        assert_eq!(house_of(&cusps, 310.0), Some(1));
        // Third house spans 0°..30° after the wrap
        assert_eq!(house_of(&cusps, 15.0), Some(3));
        // Span containing the wrap itself
        assert_eq!(house_of(&cusps, 359.0), Some(2));
        assert_eq!(house_of(&cusps, 0.0), Some(3));
    }

    #[test]
    fn house_lookup_requires_twelve_cusps() {
        let cusps = vec![HouseCusp {
            house: 1,
            longitude: 0.0,
        }];
        assert_eq!(house_of(&cusps, 10.0), None);
    }

    #[test]
    fn chart_source_tags_survive_serialization() {
        let chart = ChartData {
            positions: vec![],
            houses: vec![],
            ascendant: 12.5,
            midheaven: 282.5,
            aspects: vec![],
            elements: ElementDistribution {
                fire: 0,
                earth: 0,
                air: 0,
                water: 0,
            },
            modalities: ModalityDistribution {
                cardinal: 0,
                fixed: 0,
                mutable: 0,
            },
        };

        let source = ChartSource::Synthetic(chart);
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["source"], "synthetic");

        let back: ChartSource = serde_json::from_value(json).unwrap();
        assert!(back.is_synthetic());
    }
}
