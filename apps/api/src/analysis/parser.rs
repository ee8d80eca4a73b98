//! Output Recovery Parser — turns raw generation text into an `AnalysisRecord`.
//!
//! # Tiers (first success wins)
//! 1. `balanced_object`: first `{...}` allowing one level of nested braces.
//! 2. `flat_object`: first `{...}` containing no braces at all.
//! 3. `whole_text`: the entire trimmed output as one JSON object.
//! 4. `field_level`: independent regex scans for `score` and each list field.
//! 5. Sentinel: the fixed `AnalysisRecord::unparseable()` diagnostic record.
//!
//! Tiers 1–3 only look at the *first* candidate substring. A candidate that is
//! valid JSON but carries none of the analysis keys does not count as a parse.
//!
//! `recover` never fails; every error is absorbed by falling through a tier.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::analysis::{AnalysisRecord, MAX_SCORE};

static BALANCED_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(?:[^{}]|\{[^{}]*\})*\}").expect("Invalid balanced-object regex"));

static FLAT_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("Invalid flat-object regex"));

static SCORE_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?\bscore\b"?\s*:\s*"?([0-9]+)"#).expect("Invalid score regex")
});

static MISSING_SKILLS_FIELD: Lazy<Regex> = Lazy::new(|| list_field_regex("missing_skills"));
static SUGGESTIONS_FIELD: Lazy<Regex> = Lazy::new(|| list_field_regex("suggestions"));
static REWRITTEN_BULLETS_FIELD: Lazy<Regex> = Lazy::new(|| list_field_regex("rewritten_bullets"));

static QUOTED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("Invalid quoted-item regex"));

/// `field: [ ... ]`, lazily matching up to the first closing bracket.
fn list_field_regex(field: &str) -> Regex {
    Regex::new(&format!(r#"(?is)"?\b{field}\b"?\s*:\s*\[(.*?)\]"#))
        .expect("Invalid list-field regex")
}

const PREVIEW_CHARS: usize = 200;

/// Which tier produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTier {
    BalancedObject,
    FlatObject,
    WholeText,
    FieldLevel,
    Sentinel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub record: AnalysisRecord,
    pub tier: RecoveryTier,
}

type Recognizer = fn(&str) -> Option<AnalysisRecord>;

const TIERS: [(RecoveryTier, Recognizer); 4] = [
    (RecoveryTier::BalancedObject, balanced_object),
    (RecoveryTier::FlatObject, flat_object),
    (RecoveryTier::WholeText, whole_text),
    (RecoveryTier::FieldLevel, field_level),
];

// ────────────────────────────────────────────────────────────────────────────
// Public entry points
// ────────────────────────────────────────────────────────────────────────────

/// Parses raw model output into a fully populated record. Total: never fails.
pub fn parse_model_output(raw: &str) -> AnalysisRecord {
    let outcome = recover(raw);
    if outcome.tier == RecoveryTier::Sentinel {
        warn!(
            output_preview = %preview(raw.trim()),
            "No analysis fields recoverable from model output, returning diagnostic record"
        );
    }
    outcome.record
}

/// Runs the tiers in order and reports which one succeeded.
pub fn recover(raw: &str) -> ParseOutcome {
    let text = raw.trim();

    for (tier, recognize) in TIERS {
        if let Some(record) = recognize(text) {
            debug!(?tier, score = record.score, "Recovered analysis from model output");
            return ParseOutcome { record, tier };
        }
    }

    ParseOutcome {
        record: AnalysisRecord::unparseable(),
        tier: RecoveryTier::Sentinel,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recognizers
// ────────────────────────────────────────────────────────────────────────────

pub fn balanced_object(text: &str) -> Option<AnalysisRecord> {
    parse_object(BALANCED_OBJECT.find(text)?.as_str())
}

pub fn flat_object(text: &str) -> Option<AnalysisRecord> {
    parse_object(FLAT_OBJECT.find(text)?.as_str())
}

pub fn whole_text(text: &str) -> Option<AnalysisRecord> {
    parse_object(text)
}

/// Scans for each field independently. Fields not found default to empty/zero;
/// `None` only when not a single field is present.
pub fn field_level(text: &str) -> Option<AnalysisRecord> {
    let score = SCORE_FIELD.captures(text).map(|c| clamp_digits(&c[1]));
    let missing_skills = quoted_items(&MISSING_SKILLS_FIELD, text);
    let suggestions = quoted_items(&SUGGESTIONS_FIELD, text);
    let rewritten_bullets = quoted_items(&REWRITTEN_BULLETS_FIELD, text);

    if score.is_none()
        && missing_skills.is_none()
        && suggestions.is_none()
        && rewritten_bullets.is_none()
    {
        return None;
    }

    Some(AnalysisRecord {
        score: score.unwrap_or(0),
        missing_skills: missing_skills.unwrap_or_default(),
        suggestions: suggestions.unwrap_or_default(),
        rewritten_bullets: rewritten_bullets.unwrap_or_default(),
    })
}

/// ASCII digits → score in 0 – 100. Values too large for `u64` clamp like any other.
fn clamp_digits(digits: &str) -> u32 {
    digits
        .parse::<u64>()
        .map_or(MAX_SCORE, |s| s.min(u64::from(MAX_SCORE)) as u32)
}

fn quoted_items(field: &Regex, text: &str) -> Option<Vec<String>> {
    let body = field.captures(text)?.get(1)?.as_str();
    Some(
        QUOTED_ITEM
            .captures_iter(body)
            .map(|c| c[1].to_string())
            .collect(),
    )
}

fn parse_object(candidate: &str) -> Option<AnalysisRecord> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => AnalysisRecord::from_json_object(&object),
        _ => None,
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
