//! Prompt assembly for the remote generation tiers
//!
//! Both remote tiers send the same instruction pair: a fixed system
//! prompt that pins the response schema, and a per-request user prompt
//! describing the event or chart plus the birth context. Keeping the
//! schema in the system prompt lets the response parser stay strict
//! about required fields.

use crate::models::TimePrecision;

use super::{InterpretationRequest, InterpretationSubject};

/// Fixed system prompt shared by the session and completion tiers.
pub(crate) fn system_prompt() -> String {
    r#"You are an experienced astrologer writing short, personal interpretations for a yearly almanac. Your task is to interpret one astrological event or one natal chart summary for one reader.

## Your Role
- Interpret only the event or chart described in the request
- Write in the second person, addressed directly to the reader
- Ground every statement in the astrological facts provided
- Keep the tone warm, concrete and free of technical jargon

## Output Requirements
- Return ONLY a JSON object, no additional text
- Use exactly the field names shown below
- "meaning", "guidance" and "mantra" are required and must not be empty
- "ritual", "opportunity" and "timing_hint" are optional strings
- "warnings" and "actions" are optional arrays of short strings

## Response Format
{
  "meaning": "what this event or placement signifies (2-3 sentences)",
  "guidance": "how the reader can work with it (2-3 sentences)",
  "mantra": "one first-person affirmation",
  "ritual": "one small optional practice",
  "opportunity": "what this opens up, if anything",
  "timing_hint": "when the influence peaks or fades",
  "warnings": ["short caution"],
  "actions": ["short concrete step"]
}

## Critical Guidelines
1. ONLY return the JSON object, with no explanations and no markdown fences
2. Never invent astrological facts beyond those stated in the request
3. If the birth time is marked approximate, make no claim that depends on an exact house placement
4. Keep every field under 60 words"#
        .to_string()
}

/// Per-request user prompt describing the subject and birth context.
pub(crate) fn user_prompt(request: &InterpretationRequest) -> String {
    let mut lines: Vec<String> = Vec::new();

    match &request.subject {
        InterpretationSubject::Event(event) => {
            lines.push("Interpret this astrological event for the reader.".to_string());
            lines.push(format!("Event: {}", event.kind.label()));
            lines.push(format!("Date: {}", event.date()));
            let bodies = event
                .bodies
                .iter()
                .map(|b| b.name())
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("Bodies: {bodies}"));
            lines.push(format!("Sign: {}", event.sign));
            if let Some(house) = event.house {
                lines.push(format!("Natal house: {house}"));
            }
        }
        InterpretationSubject::ChartOverview {
            sun,
            moon,
            ascendant,
            synthetic,
        } => {
            lines.push("Interpret this natal chart summary for the reader.".to_string());
            if let Some(sun) = sun {
                lines.push(format!("Sun sign: {sun}"));
            }
            if let Some(moon) = moon {
                lines.push(format!("Moon sign: {moon}"));
            }
            lines.push(format!("Ascendant: {ascendant}"));
            if *synthetic {
                lines.push(
                    "Chart basis: approximate positions; do not cite exact degrees.".to_string(),
                );
            }
        }
    }

    lines.push(format!("Birth date: {}", request.profile.date));
    if request.precision == TimePrecision::NoonDefault {
        lines.push(
            "Birth time: unknown; the chart was computed for local noon, so treat house placements as approximate."
                .to_string(),
        );
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret::test_fixtures::{chart_overview_request, event_request};

    #[test]
    fn system_prompt_pins_the_schema() {
        let prompt = system_prompt();
        for field in [
            "\"meaning\"",
            "\"guidance\"",
            "\"mantra\"",
            "\"ritual\"",
            "\"opportunity\"",
            "\"timing_hint\"",
            "\"warnings\"",
            "\"actions\"",
        ] {
            assert!(prompt.contains(field), "schema field {field} missing");
        }
    }

    #[test]
    fn event_prompt_carries_the_event_facts() {
        let request = event_request();
        let prompt = user_prompt(&request);
        assert!(prompt.contains("Full Moon"));
        assert!(prompt.contains("Sign: Leo"));
        assert!(prompt.contains("Bodies: Sun, Moon"));
        assert!(prompt.contains("Birth date: 1974-02-10"));
    }

    #[test]
    fn noon_default_precision_is_flagged_to_the_model() {
        let mut request = chart_overview_request();
        request.precision = TimePrecision::NoonDefault;
        let prompt = user_prompt(&request);
        assert!(prompt.contains("local noon"));

        request.precision = TimePrecision::Exact;
        assert!(!user_prompt(&request).contains("local noon"));
    }
}
