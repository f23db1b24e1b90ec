//! Natural-language interpretation generation
//!
//! A fingerprinted subject goes through an ordered fallback chain: the
//! primary session service, then the single-shot completion service,
//! then the offline template tables. Remote failures advance the chain
//! rather than surfacing, so production of an interpretation never
//! fails; the method that finally produced the text is reported
//! alongside it and stored with the record.

pub mod completion_client;
pub(crate) mod prompt;
pub mod session_client;
pub mod template;

pub use completion_client::CompletionProducer;
pub use session_client::SessionProducer;
pub use template::TemplateProducer;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::error::{AlmanacError, Result};
use crate::models::{
    AstrologicalEvent, BirthProfile, GenerationMethod, Interpretation, TimePrecision, ZodiacSign,
};

/// What a producer is asked to interpret
#[derive(Debug, Clone)]
pub enum InterpretationSubject {
    /// One calendar event
    Event(AstrologicalEvent),
    /// The natal chart as a whole, reduced to its headline placements
    ChartOverview {
        sun: Option<ZodiacSign>,
        moon: Option<ZodiacSign>,
        ascendant: ZodiacSign,
        synthetic: bool,
    },
}

/// A fully described generation request. The fingerprint is computed by
/// the caller from the subject's canonical descriptor and doubles as the
/// cache key, so equal subjects share one request identity.
#[derive(Debug, Clone)]
pub struct InterpretationRequest {
    pub owner: Uuid,
    pub fingerprint: crate::models::Fingerprint,
    pub subject: InterpretationSubject,
    pub profile: BirthProfile,
    pub precision: TimePrecision,
}

/// One tier of the generation chain.
#[async_trait]
pub trait InterpretationProducer: Send + Sync {
    /// Which method label records produced by this tier carry.
    fn method(&self) -> GenerationMethod;

    async fn produce(&self, request: &InterpretationRequest) -> Result<Interpretation>;
}

/// Ordered producer chain with the template tier as terminator.
///
/// The remote tiers are tried in order; any error advances to the next
/// tier. The template tier cannot fail, which is what makes
/// [`GenerationFallbackChain::produce`] infallible.
pub struct GenerationFallbackChain {
    remote_tiers: Vec<Box<dyn InterpretationProducer>>,
    template: TemplateProducer,
}

impl GenerationFallbackChain {
    /// Standard chain from configuration. With no generation config the
    /// chain is template-only and the almanac still works offline.
    pub fn new(config: Option<&GenerationConfig>) -> Result<Self> {
        let mut remote_tiers: Vec<Box<dyn InterpretationProducer>> = Vec::new();
        if let Some(config) = config {
            remote_tiers.push(Box::new(SessionProducer::new(config.clone())?));
            remote_tiers.push(Box::new(CompletionProducer::new(config.clone())?));
        } else {
            info!("no generation service configured, interpretations use templates only");
        }
        Ok(Self {
            remote_tiers,
            template: TemplateProducer::new(),
        })
    }

    /// Chain with caller-supplied remote tiers. The template terminator
    /// stays in place.
    pub fn with_tiers(remote_tiers: Vec<Box<dyn InterpretationProducer>>) -> Self {
        Self {
            remote_tiers,
            template: TemplateProducer::new(),
        }
    }

    /// Run the chain for one request. Never fails: the worst case is a
    /// template interpretation. Remote output with sparse optional
    /// fields is topped up from the template tables before it is
    /// returned.
    pub async fn produce(
        &self,
        request: &InterpretationRequest,
    ) -> (Interpretation, GenerationMethod) {
        for tier in &self.remote_tiers {
            match tier.produce(request).await {
                Ok(mut interpretation) => {
                    self.template
                        .fill_optional_defaults(&mut interpretation, request);
                    return (interpretation, tier.method());
                }
                Err(err) => {
                    warn!(
                        tier = %tier.method(),
                        fingerprint = %request.fingerprint,
                        retriable = err.advances_fallback(),
                        error = %err,
                        "generation tier failed, advancing"
                    );
                }
            }
        }
        (
            self.template.render(request),
            GenerationMethod::DeterministicTemplate,
        )
    }
}

/// Parse a model response into the interpretation schema.
///
/// Tolerates markdown fences and prose around the JSON object by
/// extracting the outermost brace-delimited slice before decoding.
/// Responses with blank required fields are rejected so the chain
/// advances instead of caching an unusable record.
pub(crate) fn parse_interpretation(raw: &str) -> Result<Interpretation> {
    let json = extract_json_object(raw).ok_or_else(|| {
        AlmanacError::data_integrity("generation response carried no JSON object")
    })?;
    let interpretation: Interpretation = serde_json::from_str(json)?;
    if !interpretation.has_required_fields() {
        return Err(AlmanacError::data_integrity(
            "generation response is missing required interpretation fields",
        ));
    }
    Ok(interpretation)
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use uuid::Uuid;

    use crate::events::fingerprint::{contextual_fingerprint, event_fingerprint};
    use crate::models::{
        AstrologicalEvent, BirthProfile, BirthTime, CelestialBody, EventKind, TimePrecision,
        ZodiacSign,
    };

    use super::{InterpretationRequest, InterpretationSubject};

    pub(crate) fn profile() -> BirthProfile {
        BirthProfile::new(
            NaiveDate::from_ymd_opt(1974, 2, 10).unwrap(),
            BirthTime::Known(NaiveTime::from_hms_opt(7, 30, 0).unwrap()),
            40.4168,
            -3.7038,
            "Europe/Madrid",
        )
        .unwrap()
    }

    pub(crate) fn event_request() -> InterpretationRequest {
        event_request_of(EventKind::LunarFull, ZodiacSign::Leo)
    }

    pub(crate) fn event_request_of(kind: EventKind, sign: ZodiacSign) -> InterpretationRequest {
        let bodies = match kind {
            EventKind::RetrogradeStation | EventKind::DirectStation | EventKind::Ingress => {
                vec![CelestialBody::Mercury]
            }
            EventKind::Aspect => vec![CelestialBody::Venus, CelestialBody::Mars],
            _ => vec![CelestialBody::Sun, CelestialBody::Moon],
        };
        let event = AstrologicalEvent::new(
            kind,
            Utc.with_ymd_and_hms(2026, 8, 8, 2, 18, 0).unwrap(),
            bodies,
            sign,
            None,
        );
        let fingerprint = event_fingerprint(&event);
        InterpretationRequest {
            owner: Uuid::new_v4(),
            fingerprint,
            subject: InterpretationSubject::Event(event),
            profile: profile(),
            precision: TimePrecision::Exact,
        }
    }

    pub(crate) fn chart_overview_request() -> InterpretationRequest {
        overview_request_of(
            Some(ZodiacSign::Aquarius),
            Some(ZodiacSign::Scorpio),
            ZodiacSign::Gemini,
            false,
        )
    }

    pub(crate) fn overview_request_of(
        sun: Option<ZodiacSign>,
        moon: Option<ZodiacSign>,
        ascendant: ZodiacSign,
        synthetic: bool,
    ) -> InterpretationRequest {
        let profile = profile();
        InterpretationRequest {
            owner: Uuid::new_v4(),
            fingerprint: contextual_fingerprint("chart-overview", &profile),
            subject: InterpretationSubject::ChartOverview {
                sun,
                moon,
                ascendant,
                synthetic,
            },
            profile,
            precision: TimePrecision::Exact,
        }
    }
}
