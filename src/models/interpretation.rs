//! Interpretation schema and cached records
//!
//! Every generation tier emits the same [`Interpretation`] shape, so
//! consumers never branch on how the text was produced. The producing
//! tier is still recorded on the cached envelope for quality telemetry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::Fingerprint;

/// Which tier of the fallback chain produced an interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    PrimarySession,
    SecondaryCompletion,
    DeterministicTemplate,
}

impl fmt::Display for GenerationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationMethod::PrimarySession => "primary_session",
            GenerationMethod::SecondaryCompletion => "secondary_completion",
            GenerationMethod::DeterministicTemplate => "deterministic_template",
        };
        f.write_str(s)
    }
}

/// Structured interpretation content.
///
/// `meaning`, `guidance` and `mantra` are required; the rest default to
/// empty so a sparse-but-valid producer response deserializes cleanly and
/// gets repaired instead of rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub meaning: String,
    pub guidance: String,
    pub mantra: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ritual: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opportunity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_hint: Option<String>,
}

impl Interpretation {
    /// True when all required fields carry content.
    pub fn has_required_fields(&self) -> bool {
        !self.meaning.trim().is_empty()
            && !self.guidance.trim().is_empty()
            && !self.mantra.trim().is_empty()
    }
}

/// A cached interpretation, keyed by owner and content fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretationRecord {
    pub owner: Uuid,
    pub fingerprint: Fingerprint,
    pub interpretation: Interpretation,
    pub method: GenerationMethod,
    pub generated_at: DateTime<Utc>,
    /// None means the record never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl InterpretationRecord {
    /// Whether the record is still servable at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now < expires,
            None => true,
        }
    }
}
