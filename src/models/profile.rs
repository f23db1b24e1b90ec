//! Birth profile: the input to every almanac computation

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{AlmanacError, Result};

/// A birth time is either known exactly or missing entirely.
///
/// Missing times are substituted with local noon downstream, and the
/// substitution is carried as [`TimePrecision::NoonDefault`] so consumers
/// can label time-sensitive chart elements as approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BirthTime {
    Known(NaiveTime),
    Unknown,
}

/// How precisely the birth instant is known
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePrecision {
    Exact,
    NoonDefault,
}

/// Validated birth data for one person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthProfile {
    pub date: NaiveDate,
    pub time: BirthTime,
    /// Degrees north, [-90, 90]
    pub latitude: f64,
    /// Degrees east, [-180, 180]
    pub longitude: f64,
    /// IANA zone identifier. May be empty, in which case the coordinates
    /// supply a fixed-offset fallback zone.
    pub timezone: String,
}

impl BirthProfile {
    pub fn new(
        date: NaiveDate,
        time: BirthTime,
        latitude: f64,
        longitude: f64,
        timezone: impl Into<String>,
    ) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(AlmanacError::validation(
                "latitude",
                format!("{latitude} is outside [-90, 90]"),
            ));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(AlmanacError::validation(
                "longitude",
                format!("{longitude} is outside [-180, 180]"),
            ));
        }
        Ok(Self {
            date,
            time,
            latitude,
            longitude,
            timezone: timezone.into(),
        })
    }

    /// Wall-clock time to resolve, with the precision actually achieved.
    pub fn wall_clock(&self) -> (NaiveTime, TimePrecision) {
        match self.time {
            BirthTime::Known(t) => (t, TimePrecision::Exact),
            BirthTime::Unknown => (noon(), TimePrecision::NoonDefault),
        }
    }
}

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).expect("noon is a valid wall-clock time")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let bad_lat = BirthProfile::new(
            date(1990, 6, 1),
            BirthTime::Unknown,
            91.0,
            0.0,
            "Europe/Madrid",
        );
        assert!(matches!(
            bad_lat,
            Err(AlmanacError::Validation { field: "latitude", .. })
        ));

        let bad_lon = BirthProfile::new(
            date(1990, 6, 1),
            BirthTime::Unknown,
            0.0,
            -181.0,
            "Europe/Madrid",
        );
        assert!(matches!(
            bad_lon,
            Err(AlmanacError::Validation { field: "longitude", .. })
        ));
    }

    #[test]
    fn unknown_time_defaults_to_noon_and_reports_it() {
        let profile = BirthProfile::new(
            date(1974, 2, 10),
            BirthTime::Unknown,
            40.4168,
            -3.7038,
            "Europe/Madrid",
        )
        .unwrap();

        let (time, precision) = profile.wall_clock();
        assert_eq!(time, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert_eq!(precision, TimePrecision::NoonDefault);
    }

    #[test]
    fn known_time_is_exact() {
        let profile = BirthProfile::new(
            date(1974, 2, 10),
            BirthTime::Known(NaiveTime::from_hms_opt(7, 30, 0).unwrap()),
            40.4168,
            -3.7038,
            "Europe/Madrid",
        )
        .unwrap();

        let (time, precision) = profile.wall_clock();
        assert_eq!(time, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(precision, TimePrecision::Exact);
    }
}
