//! Deterministic interpretation templates
//!
//! The terminal tier of the generation chain. Builds schema-complete
//! interpretations from fixed phrase tables keyed on event kind and
//! zodiac sign, so a book can always be assembled with every remote
//! service down. The same tables supply default text for optional
//! fields a remote tier left blank.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AstrologicalEvent, Element, EventKind, GenerationMethod, Interpretation, Modality,
    TimePrecision, ZodiacSign,
};

use super::{InterpretationProducer, InterpretationRequest, InterpretationSubject};

/// Offline producer backed by phrase tables. Stateless and always
/// succeeds; parked at the end of the fallback chain.
#[derive(Debug, Clone, Default)]
pub struct TemplateProducer;

impl TemplateProducer {
    pub fn new() -> Self {
        Self
    }

    /// Render an interpretation without touching any service. The output
    /// is a pure function of the request, so repeated renders of the
    /// same subject are identical.
    pub fn render(&self, request: &InterpretationRequest) -> Interpretation {
        match &request.subject {
            InterpretationSubject::Event(event) => event_interpretation(event, request.precision),
            InterpretationSubject::ChartOverview {
                sun,
                moon,
                ascendant,
                synthetic,
            } => overview_interpretation(*sun, *moon, *ascendant, *synthetic, request.precision),
        }
    }

    /// Top up optional fields a remote tier left blank with the template
    /// text for the same subject. Required fields and warnings are left
    /// exactly as the tier produced them.
    pub(crate) fn fill_optional_defaults(
        &self,
        interpretation: &mut Interpretation,
        request: &InterpretationRequest,
    ) {
        let defaults = self.render(request);
        if interpretation.ritual.is_none() {
            interpretation.ritual = defaults.ritual;
        }
        if interpretation.opportunity.is_none() {
            interpretation.opportunity = defaults.opportunity;
        }
        if interpretation.timing_hint.is_none() {
            interpretation.timing_hint = defaults.timing_hint;
        }
        if interpretation.actions.is_empty() {
            interpretation.actions = defaults.actions;
        }
    }
}

#[async_trait]
impl InterpretationProducer for TemplateProducer {
    fn method(&self) -> GenerationMethod {
        GenerationMethod::DeterministicTemplate
    }

    async fn produce(&self, request: &InterpretationRequest) -> Result<Interpretation> {
        Ok(self.render(request))
    }
}

fn event_interpretation(event: &AstrologicalEvent, precision: TimePrecision) -> Interpretation {
    let templates = meaning_templates(event.kind);
    let mut meaning = fill(pick(templates, event), event);
    if let Some(house) = event.house {
        meaning.push_str(&format!(
            " In your chart this lands in the {} house.",
            house_ordinal(house)
        ));
    }

    let guidance = element_guidance(event.sign.element()).to_string();

    let mut warnings: Vec<String> = kind_warnings(event.kind)
        .iter()
        .map(|w| w.to_string())
        .collect();
    if event.house.is_some() && precision == TimePrecision::NoonDefault {
        warnings.push("Birth time unknown: house references are approximate.".to_string());
    }

    Interpretation {
        meaning,
        guidance,
        mantra: kind_mantra(event.kind).to_string(),
        ritual: kind_ritual(event.kind).map(str::to_string),
        opportunity: kind_opportunity(event.kind).map(str::to_string),
        timing_hint: Some(kind_timing(event.kind).to_string()),
        warnings,
        actions: kind_actions(event.kind)
            .iter()
            .map(|a| fill(a, event))
            .collect(),
    }
}

fn overview_interpretation(
    sun: Option<ZodiacSign>,
    moon: Option<ZodiacSign>,
    ascendant: ZodiacSign,
    synthetic: bool,
    precision: TimePrecision,
) -> Interpretation {
    let meaning = match (sun, moon) {
        (Some(sun), Some(moon)) => format!(
            "Your Sun in {sun} sets the center of gravity: {}. The Moon in {moon} colors your inner weather with {}, while a {ascendant} ascendant shapes the first impression you make.",
            sign_theme(sun),
            sign_theme(moon),
        ),
        _ => format!(
            "Your chart rises in {ascendant}, giving first impressions the flavor of {}.",
            sign_theme(ascendant)
        ),
    };

    let anchor = sun.unwrap_or(ascendant);
    let guidance = format!(
        "{} {}",
        element_guidance(anchor.element()),
        modality_note(anchor.modality())
    );

    let mut warnings = Vec::new();
    if synthetic {
        warnings.push("Chart positions are approximate; treat exact degrees loosely.".to_string());
    }
    if precision == TimePrecision::NoonDefault {
        warnings.push(
            "Birth time unknown: the ascendant and house emphasis are approximate.".to_string(),
        );
    }

    Interpretation {
        meaning,
        guidance,
        mantra: "I work with my chart, not against it.".to_string(),
        ritual: Some(
            "Read your main placements aloud once; notice which one feels most like home."
                .to_string(),
        ),
        opportunity: Some("Self-knowledge precise enough to act on.".to_string()),
        timing_hint: None,
        warnings,
        actions: vec![
            "Note one situation this week where your Sun sign's style served you.".to_string(),
            "Note one where your instincts asked for more room.".to_string(),
        ],
    }
}

/// Pick a variant from the per-kind table, keyed on sign and lead body
/// so the choice is stable for a given event.
fn pick<'a>(options: &'a [&'a str], event: &AstrologicalEvent) -> &'a str {
    let body = event
        .bodies
        .first()
        .map(|b| b.canonical_index())
        .unwrap_or(0);
    options[(event.sign.index() + body) % options.len()]
}

fn fill(template: &str, event: &AstrologicalEvent) -> String {
    let bodies = event
        .bodies
        .iter()
        .map(|b| b.name())
        .collect::<Vec<_>>()
        .join(" and ");
    template
        .replace("{bodies}", &bodies)
        .replace("{sign}", event.sign.name())
        .replace("{theme}", sign_theme(event.sign))
}

fn meaning_templates(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::LunarNew => &[
            "A new moon in {sign} opens a fresh cycle around {theme}. Intentions set now take root quietly.",
            "The new moon in {sign} clears the slate where {theme} is concerned. Start small and start honestly.",
        ],
        EventKind::LunarFirstQuarter => &[
            "The first quarter moon in {sign} brings the cycle's first friction: {theme} asks for a decision rather than more reflection.",
        ],
        EventKind::LunarFull => &[
            "The full moon in {sign} brings {theme} to a head. What has been building for two weeks now asks to be seen and named.",
            "Under the full moon in {sign}, {theme} reaches its brightest point. Harvest what worked and release what did not.",
        ],
        EventKind::LunarLastQuarter => &[
            "The last quarter moon in {sign} turns the cycle inward. Review {theme} and let go of what the next new moon should not inherit.",
        ],
        EventKind::SolarEclipse => &[
            "A solar eclipse in {sign} marks a doorway you cannot see past. Around {theme}, an ending and a beginning arrive as one event.",
        ],
        EventKind::LunarEclipse => &[
            "A lunar eclipse in {sign} pulls {theme} into full light. What surfaces now was already true; the eclipse only names it.",
        ],
        EventKind::RetrogradeStation => &[
            "{bodies} stations retrograde in {sign}. Its themes slow and turn inward; around {theme}, revisit rather than launch.",
        ],
        EventKind::DirectStation => &[
            "{bodies} stations direct in {sign}. Momentum returns to {theme}; what stalled during the retrograde can move again.",
        ],
        EventKind::Ingress => &[
            "{bodies} enters {sign}, opening a new chapter for {theme}. The shift is gradual but the direction is new.",
            "As {bodies} moves into {sign}, attention turns toward {theme}. Let your habits catch up with the new terrain.",
        ],
        EventKind::Aspect => &[
            "{bodies} form a close aspect in {sign}, drawing {theme} into focus and linking parts of your life that usually run separately.",
        ],
    }
}

fn kind_mantra(kind: EventKind) -> &'static str {
    match kind {
        EventKind::LunarNew => "I begin where I am.",
        EventKind::LunarFirstQuarter => "I choose, and the path answers.",
        EventKind::LunarFull => "I can hold what this moment shows me.",
        EventKind::LunarLastQuarter => "I release what the next cycle does not need.",
        EventKind::SolarEclipse => "I trust the door that closes behind me.",
        EventKind::LunarEclipse => "I am ready to see what was always there.",
        EventKind::RetrogradeStation => "I slow down on purpose.",
        EventKind::DirectStation => "I move again with what I learned.",
        EventKind::Ingress => "I meet the new season as it is.",
        EventKind::Aspect => "I let the parts of my life speak to each other.",
    }
}

fn kind_ritual(kind: EventKind) -> Option<&'static str> {
    match kind {
        EventKind::LunarNew => {
            Some("Write one intention on paper and keep it where morning light reaches it.")
        }
        EventKind::LunarFirstQuarter => {
            Some("Take the single next physical step on a stalled plan, however small.")
        }
        EventKind::LunarFull => Some("Light a candle and name aloud one thing you are finishing."),
        EventKind::LunarLastQuarter => {
            Some("Clear one drawer, folder or list, and let the space stay empty.")
        }
        EventKind::SolarEclipse => Some(
            "Spend ten minutes in silence at the day's start; write down the first thing you want afterwards.",
        ),
        EventKind::LunarEclipse => {
            Some("Before sleep, write down what surfaced today without editing it.")
        }
        EventKind::RetrogradeStation => {
            Some("Back up your work and reread a note from the last time this planet turned.")
        }
        EventKind::DirectStation => Some(
            "Revisit the list you made when the retrograde began and cross off what resolved itself.",
        ),
        EventKind::Ingress => {
            Some("Rearrange one small corner of your space to match the new season.")
        }
        EventKind::Aspect => None,
    }
}

fn kind_opportunity(kind: EventKind) -> Option<&'static str> {
    match kind {
        EventKind::LunarNew => Some("A clean start with low stakes and low visibility."),
        EventKind::LunarFull => Some("Recognition for what you have been carrying quietly."),
        EventKind::RetrogradeStation => Some("A second pass at something you shipped too fast."),
        EventKind::DirectStation => Some("A green light for the plan you kept revising."),
        EventKind::Ingress => Some("A new backdrop that makes an old habit easier to change."),
        EventKind::LunarFirstQuarter
        | EventKind::LunarLastQuarter
        | EventKind::SolarEclipse
        | EventKind::LunarEclipse
        | EventKind::Aspect => None,
    }
}

fn kind_timing(kind: EventKind) -> &'static str {
    match kind {
        EventKind::LunarNew
        | EventKind::LunarFirstQuarter
        | EventKind::LunarFull
        | EventKind::LunarLastQuarter => "Strongest within a day either side of the exact moment.",
        EventKind::SolarEclipse | EventKind::LunarEclipse => {
            "Effects unfold over the following weeks rather than on the day itself."
        }
        EventKind::RetrogradeStation | EventKind::DirectStation => {
            "Felt most in the week surrounding the station."
        }
        EventKind::Ingress => "Sets the tone for the weeks until the next sign change.",
        EventKind::Aspect => "Exact today, coloring the surrounding few days.",
    }
}

fn kind_warnings(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::SolarEclipse | EventKind::LunarEclipse => {
            &["Avoid forcing major decisions in the two days around the eclipse."]
        }
        EventKind::RetrogradeStation => {
            &["Double-check agreements and travel plans made this week."]
        }
        _ => &[],
    }
}

fn kind_actions(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::LunarNew => &[
            "Name one intention for this cycle.",
            "Do the first five-minute version of it today.",
        ],
        EventKind::LunarFirstQuarter => &[
            "Pick the option you keep postponing and act on it.",
            "Tell one person what you decided.",
        ],
        EventKind::LunarFull => &[
            "Finish one thing visibly.",
            "Thank someone who helped it along.",
        ],
        EventKind::LunarLastQuarter => &[
            "Retire one commitment that no longer earns its keep.",
            "Write down one lesson from this cycle.",
        ],
        EventKind::SolarEclipse => &[
            "Note what ends this week without rushing to replace it.",
        ],
        EventKind::LunarEclipse => &[
            "Say out loud the thing you have been circling.",
        ],
        EventKind::RetrogradeStation => &[
            "Review anything signed or promised in the last month.",
            "Leave slack in this week's schedule.",
        ],
        EventKind::DirectStation => &[
            "Restart the project you paused.",
            "Confirm plans that were left hanging.",
        ],
        EventKind::Ingress => &[
            "Choose one habit to retune for the new season of {bodies} in {sign}.",
        ],
        EventKind::Aspect => &[
            "Look for where these two themes touch in a single day.",
        ],
    }
}

fn sign_theme(sign: ZodiacSign) -> &'static str {
    match sign {
        ZodiacSign::Aries => "your drive to begin",
        ZodiacSign::Taurus => "what you are building to last",
        ZodiacSign::Gemini => "the conversations you keep returning to",
        ZodiacSign::Cancer => "your sense of home and belonging",
        ZodiacSign::Leo => "the work you want seen",
        ZodiacSign::Virgo => "the details that hold your days together",
        ZodiacSign::Libra => "the balance you strike with others",
        ZodiacSign::Scorpio => "what you keep beneath the surface",
        ZodiacSign::Sagittarius => "the horizon you are aiming for",
        ZodiacSign::Capricorn => "the structure you are climbing",
        ZodiacSign::Aquarius => "the circles and causes you belong to",
        ZodiacSign::Pisces => "the quiet current underneath your plans",
    }
}

fn element_guidance(element: Element) -> &'static str {
    match element {
        Element::Fire => {
            "Move while the energy is high, but pick one direction before you spend it."
        }
        Element::Earth => {
            "Favor the tangible: one practical step taken today outweighs a week of planning."
        }
        Element::Air => {
            "Talk it through or write it down; clarity arrives once the idea leaves your head."
        }
        Element::Water => {
            "Let the feeling finish surfacing before you act on it; it is carrying information."
        }
    }
}

fn modality_note(modality: Modality) -> &'static str {
    match modality {
        Modality::Cardinal => "You start things well; finishing is the skill to protect.",
        Modality::Fixed => "You hold steady under pressure; flexibility is the muscle to train.",
        Modality::Mutable => "You adapt quickly; direction is what needs deliberate tending.",
    }
}

fn house_ordinal(house: u8) -> &'static str {
    match house {
        1 => "first",
        2 => "second",
        3 => "third",
        4 => "fourth",
        5 => "fifth",
        6 => "sixth",
        7 => "seventh",
        8 => "eighth",
        9 => "ninth",
        10 => "tenth",
        11 => "eleventh",
        _ => "twelfth",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::test_fixtures::{event_request, event_request_of, overview_request_of};
    use crate::models::CelestialBody;
    use chrono::{TimeZone, Utc};

    #[test]
    fn every_kind_renders_a_complete_interpretation() {
        let producer = TemplateProducer::new();
        let kinds = [
            EventKind::LunarNew,
            EventKind::LunarFirstQuarter,
            EventKind::LunarFull,
            EventKind::LunarLastQuarter,
            EventKind::SolarEclipse,
            EventKind::LunarEclipse,
            EventKind::RetrogradeStation,
            EventKind::DirectStation,
            EventKind::Ingress,
            EventKind::Aspect,
        ];

        for kind in kinds {
            for sign in ZodiacSign::ALL {
                let request = event_request_of(kind, sign);
                let rendered = producer.render(&request);
                assert!(
                    rendered.has_required_fields(),
                    "{kind:?} in {sign:?} missing required fields"
                );
                assert!(rendered.timing_hint.is_some());
                assert!(!rendered.actions.is_empty());
                assert!(!rendered.meaning.contains('{'), "unfilled placeholder");
            }
        }
    }

    #[test]
    fn rendering_is_deterministic_for_equal_subjects() {
        let producer = TemplateProducer::new();
        let request = event_request();
        assert_eq!(producer.render(&request), producer.render(&request));
    }

    #[test]
    fn station_text_names_the_planet() {
        let producer = TemplateProducer::new();
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 10, 4, 0, 0).unwrap();
        let event = AstrologicalEvent::new(
            EventKind::RetrogradeStation,
            timestamp,
            vec![CelestialBody::Mercury],
            ZodiacSign::Aries,
            None,
        );
        let request = event_request_of_event(event);
        let rendered = producer.render(&request);
        assert!(rendered.meaning.contains("Mercury"));
        assert!(rendered.meaning.contains("Aries"));
    }

    #[test]
    fn noon_default_adds_a_house_warning_only_when_a_house_is_cited() {
        let producer = TemplateProducer::new();

        let mut request = event_request();
        request.precision = TimePrecision::NoonDefault;
        if let InterpretationSubject::Event(event) = &mut request.subject {
            event.house = Some(7);
        }
        let with_house = producer.render(&request);
        assert!(with_house.warnings.iter().any(|w| w.contains("Birth time")));

        if let InterpretationSubject::Event(event) = &mut request.subject {
            event.house = None;
        }
        let without_house = producer.render(&request);
        assert!(!without_house.warnings.iter().any(|w| w.contains("Birth time")));
    }

    #[test]
    fn overview_mentions_all_three_placements() {
        let producer = TemplateProducer::new();
        let request = overview_request_of(
            Some(ZodiacSign::Aquarius),
            Some(ZodiacSign::Scorpio),
            ZodiacSign::Gemini,
            false,
        );
        let rendered = producer.render(&request);
        assert!(rendered.meaning.contains("Aquarius"));
        assert!(rendered.meaning.contains("Scorpio"));
        assert!(rendered.meaning.contains("Gemini"));
        assert!(rendered.timing_hint.is_none());
    }

    #[test]
    fn synthetic_overview_carries_an_accuracy_warning() {
        let producer = TemplateProducer::new();
        let request = overview_request_of(
            Some(ZodiacSign::Leo),
            Some(ZodiacSign::Cancer),
            ZodiacSign::Libra,
            true,
        );
        let rendered = producer.render(&request);
        assert!(rendered.warnings.iter().any(|w| w.contains("approximate")));
    }

    #[test]
    fn fill_defaults_preserves_tier_text() {
        let producer = TemplateProducer::new();
        let request = event_request();

        let mut sparse = Interpretation {
            meaning: "Remote meaning.".to_string(),
            guidance: "Remote guidance.".to_string(),
            mantra: "Remote mantra.".to_string(),
            ritual: None,
            opportunity: Some("Remote opportunity.".to_string()),
            timing_hint: None,
            warnings: vec![],
            actions: vec![],
        };
        producer.fill_optional_defaults(&mut sparse, &request);

        assert_eq!(sparse.meaning, "Remote meaning.");
        assert_eq!(sparse.opportunity.as_deref(), Some("Remote opportunity."));
        assert!(sparse.ritual.is_some());
        assert!(sparse.timing_hint.is_some());
        assert!(!sparse.actions.is_empty());
    }

    fn event_request_of_event(event: AstrologicalEvent) -> InterpretationRequest {
        let mut request = event_request();
        request.subject = InterpretationSubject::Event(event);
        request
    }
}
