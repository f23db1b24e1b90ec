//! Deterministic event fingerprinting
//!
//! Provides a stable identity for an event's interpretable content, so the
//! same astrological moment maps to the same cached interpretation across
//! runs and processes. The canonical descriptor deliberately uses the
//! event date rather than the full timestamp: two generations of the same
//! event whose interpolated instants differ by minutes must still collide.

use sha2::{Digest, Sha256};

use crate::models::{AstrologicalEvent, BirthProfile, BirthTime, Fingerprint};

/// Fingerprint of one calendar event.
pub fn event_fingerprint(event: &AstrologicalEvent) -> Fingerprint {
    hash_descriptor(&event_descriptor(event))
}

/// Fingerprint of a contextual (non-event) interpretation such as the
/// chart overview, keyed on the label and the birth data.
pub fn contextual_fingerprint(label: &str, profile: &BirthProfile) -> Fingerprint {
    let time = match profile.time {
        BirthTime::Known(t) => t.format("%H:%M").to_string(),
        BirthTime::Unknown => "unknown".to_string(),
    };
    let descriptor = format!(
        "context|{label}|{}|{time}|{}",
        profile.date.format("%Y-%m-%d"),
        profile.timezone.trim()
    );
    hash_descriptor(&descriptor)
}

/// Canonical descriptor: kind tag, date, sorted bodies, sign, house.
fn event_descriptor(event: &AstrologicalEvent) -> String {
    let bodies = event
        .bodies
        .iter()
        .map(|b| b.name().to_ascii_lowercase().replace(' ', "-"))
        .collect::<Vec<_>>()
        .join(",");
    let house = event
        .house
        .map(|h| h.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}|{}|{}|{}|{}",
        event.kind.fingerprint_tag(),
        event.date().format("%Y-%m-%d"),
        bodies,
        event.sign.name().to_ascii_lowercase(),
        house
    )
}

fn hash_descriptor(descriptor: &str) -> Fingerprint {
    let digest = Sha256::digest(descriptor.as_bytes());
    Fingerprint::from_hex(hex::encode(digest))
}
