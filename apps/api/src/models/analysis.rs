use serde::Serialize;
use serde_json::{Map, Value};

/// Upper bound of the nominal 0 – 100 match score.
pub const MAX_SCORE: u32 = 100;

const UNPARSEABLE_SKILL: &str = "Unable to parse model output";
const UNPARSEABLE_SUGGESTIONS: [&str; 3] = [
    "The AI model produced invalid output.",
    "Try using a shorter resume or job description.",
    "Consider switching to a larger generation model.",
];

/// Structured resume-vs-JD match report. Also the `/analyze` response body.
///
/// Always fully populated: missing fields default to `0` / empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisRecord {
    pub score: u32,
    pub missing_skills: Vec<String>,
    pub suggestions: Vec<String>,
    pub rewritten_bullets: Vec<String>,
}

impl AnalysisRecord {
    /// Fixed diagnostic record returned when no structure can be recovered.
    pub fn unparseable() -> Self {
        Self {
            score: 0,
            missing_skills: vec![UNPARSEABLE_SKILL.to_string()],
            suggestions: UNPARSEABLE_SUGGESTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rewritten_bullets: Vec::new(),
        }
    }

    /// Builds a record from a decoded JSON object, coercing loosely typed values.
    ///
    /// Returns `None` when the object carries none of the analysis keys, so an
    /// unrelated object (e.g. `{"note": "..."}`) never counts as a parse.
    pub fn from_json_object(object: &Map<String, Value>) -> Option<Self> {
        let known = ["score", "missing_skills", "suggestions", "rewritten_bullets"];
        if !known.iter().any(|k| object.contains_key(*k)) {
            return None;
        }

        Some(Self {
            score: object.get("score").and_then(coerce_score).unwrap_or(0),
            missing_skills: object.get("missing_skills").map(coerce_list).unwrap_or_default(),
            suggestions: object.get("suggestions").map(coerce_list).unwrap_or_default(),
            rewritten_bullets: object
                .get("rewritten_bullets")
                .map(coerce_list)
                .unwrap_or_default(),
        })
    }
}

/// Accepts integers, floats (rounded) and numeric strings; clamps into 0 – 100.
pub fn coerce_score(value: &Value) -> Option<u32> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, MAX_SCORE as f64) as u32)
}

/// Strings are kept (trimmed, blanks dropped), scalars are stringified, nested
/// values are skipped. A bare string is treated as a one-item list.
fn coerce_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(coerce_item).collect(),
        other => coerce_item(other).into_iter().collect(),
    }
}

fn coerce_item(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
