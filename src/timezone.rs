//! Historically correct birth-instant resolution
//!
//! Local birth data becomes an offset-qualified instant using the IANA
//! zone rules in force on the birth date, not today's rules. DST gaps
//! shift forward in one-hour steps; ambiguous fold times resolve to the
//! standard-time offset. A missing zone id falls back to a longitude-
//! derived fixed offset, and a missing birth time resolves at local noon
//! with the substitution reported on the result.

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AlmanacError, Result};
use crate::models::{BirthProfile, TimePrecision};

/// Gap shifts give up after a day; no real zone discontinuity is larger.
const MAX_GAP_SHIFTS: u32 = 24;

/// A birth instant pinned to the offset that was in force
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBirth {
    pub instant: DateTime<FixedOffset>,
    /// Zone label actually used: the IANA id, or a fixed-offset label when
    /// the profile had no zone and coordinates supplied the hint
    pub zone: String,
    pub precision: TimePrecision,
}

impl ResolvedBirth {
    pub fn utc(&self) -> DateTime<Utc> {
        self.instant.with_timezone(&Utc)
    }
}

/// Resolve a profile's local birth data into a concrete instant.
pub fn resolve_birth_instant(profile: &BirthProfile) -> Result<ResolvedBirth> {
    let (wall, precision) = profile.wall_clock();
    if precision == TimePrecision::NoonDefault {
        debug!(date = %profile.date, "birth time unknown, resolving at local noon");
    }
    let naive = profile.date.and_time(wall);

    let zone_id = profile.timezone.trim();
    if zone_id.is_empty() {
        let offset = offset_from_longitude(profile.longitude);
        warn!(
            longitude = profile.longitude,
            offset = %offset,
            "profile has no timezone, using longitude-derived fixed offset"
        );
        let instant = offset.from_local_datetime(&naive).single().ok_or_else(|| {
            AlmanacError::data_integrity("fixed offset produced a non-unique local time")
        })?;
        return Ok(ResolvedBirth {
            instant,
            zone: format!("UTC{offset}"),
            precision,
        });
    }

    let zone: Tz = zone_id.parse().map_err(|_| AlmanacError::InvalidTimezone {
        zone: zone_id.to_string(),
    })?;

    let local = resolve_local(zone, naive)?;
    let instant = local.with_timezone(&local.offset().fix());
    Ok(ResolvedBirth {
        instant,
        zone: zone_id.to_string(),
        precision,
    })
}

/// Apply the historical zone rules to a naive local time.
fn resolve_local(zone: Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    let mut candidate = naive;
    for shift in 0..MAX_GAP_SHIFTS {
        match zone.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => {
                if shift > 0 {
                    warn!(
                        zone = zone.name(),
                        requested = %naive,
                        resolved = %candidate,
                        "local time fell in a DST gap, shifted forward"
                    );
                }
                return Ok(dt);
            }
            LocalResult::Ambiguous(earliest, latest) => {
                // Fold: take the standard-time side, i.e. the smaller offset.
                let standard = if earliest.offset().fix().local_minus_utc()
                    <= latest.offset().fix().local_minus_utc()
                {
                    earliest
                } else {
                    latest
                };
                debug!(
                    zone = zone.name(),
                    local = %candidate,
                    offset = %standard.offset().fix(),
                    "ambiguous local time resolved to standard offset"
                );
                return Ok(standard);
            }
            LocalResult::None => {
                candidate += Duration::hours(1);
            }
        }
    }
    Err(AlmanacError::InvalidTimezone {
        zone: zone.name().to_string(),
    })
}

/// Nearest whole-hour offset for the given longitude (15° per hour).
fn offset_from_longitude(longitude: f64) -> FixedOffset {
    let hours = ((longitude / 15.0).round() as i32).clamp(-12, 14);
    FixedOffset::east_opt(hours * 3600).expect("whole-hour offset within ±14h is valid")
}
