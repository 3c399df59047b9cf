//! Response Normalizer — recovers a typed `AnalysisRecord` from raw model text.
//!
//! Models are told to answer with bare JSON but regularly wrap it in code
//! fences or commentary. Parsing runs in two attempts:
//! 1. the raw text verbatim, so compliant output is never touched;
//! 2. the text after `extract`, which strips fences, surrounding prose,
//!    zero-width characters and runs of blank lines.
//!
//! A successful parse is then validated: percentages coerced and clamped to
//! `[0, 100]`, list fields forced to lists. Field-level problems never fail
//! the call. Only empty input, text with no recoverable JSON, and JSON that is
//! not an object are errors.
//!
//! Pure and stateless; safe to call from any number of requests at once.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::models::{
    coerce_list, coerce_percentage, AnalysisRecord, LIST_FIELDS, PERCENTAGE_FIELDS,
};

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("model response is not parseable JSON: {0}")]
    UnparseableResponse(String),

    #[error("model response is JSON but not an object")]
    NotAnObject,
}

// ────────────────────────────────────────────────────────────────────────────
// Field schema
// ────────────────────────────────────────────────────────────────────────────

/// Which top-level keys are percentages and which are lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub required_numeric_fields: Vec<String>,
    pub required_list_fields: Vec<String>,
}

impl Default for FieldSpec {
    /// The eight fields of the analysis contract.
    fn default() -> Self {
        Self {
            required_numeric_fields: PERCENTAGE_FIELDS.iter().map(|f| f.to_string()).collect(),
            required_list_fields: LIST_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

static DEFAULT_FIELD_SPEC: Lazy<FieldSpec> = Lazy::new(FieldSpec::default);

/// Which parse attempt produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAttempt {
    Direct,
    Extracted,
}

/// Normalizer bound to a field schema. Holds no state between calls.
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer {
    schema: FieldSpec,
}

impl ResponseNormalizer {
    pub fn new(schema: FieldSpec) -> Self {
        Self { schema }
    }

    pub fn normalize(&self, raw: Option<&str>) -> Result<AnalysisRecord, NormalizeError> {
        parse(raw, Some(&self.schema))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

static JSON_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("valid regex"));
static BARE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```\s*(.*?)\s*```").expect("valid regex"));
static LOOSE_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)`{1,3}(?:json)?\s*(.*?)\s*`{1,3}").expect("valid regex"));
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

type FenceStrategy = fn(&str) -> Option<String>;

/// Tried in order; the first one returning `Some` wins.
const FENCE_STRATEGIES: [(&str, FenceStrategy); 3] = [
    ("json_fence", json_fence),
    ("bare_fence", bare_fence),
    ("loose_fence", loose_fence),
];

fn json_fence(text: &str) -> Option<String> {
    fence_body(&JSON_FENCE_RE, text)
}

fn bare_fence(text: &str) -> Option<String> {
    fence_body(&BARE_FENCE_RE, text)
}

fn loose_fence(text: &str) -> Option<String> {
    fence_body(&LOOSE_FENCE_RE, text)
}

/// A fence with nothing inside does not count as a match.
fn fence_body(re: &Regex, text: &str) -> Option<String> {
    let body = re.captures(text)?.get(1)?.as_str().trim();
    (!body.is_empty()).then(|| body.to_string())
}

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}')
}

/// Best-effort textual repair of raw model text into a JSON candidate.
///
/// Only fence and brace boundaries are considered; JSON structure is never
/// inspected here.
pub fn extract(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    for (name, strategy) in FENCE_STRATEGIES {
        if let Some(body) = strategy(&text) {
            debug!("Unwrapped model response using {name}");
            text = body;
            break;
        }
    }

    // Drop prose around the outermost object.
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            text = text[start..=end].to_string();
        }
    }

    text.retain(|c| !is_zero_width(c));
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");

    text.trim().to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Parse & validate
// ────────────────────────────────────────────────────────────────────────────

/// Parses raw model text into an `AnalysisRecord`.
///
/// `None` and `""` fail with `EmptyResponse`. Otherwise the raw text is tried
/// verbatim first, then after `extract`; if both fail the extraction attempt's
/// parse error is returned as `UnparseableResponse`.
pub fn parse(raw: Option<&str>, schema: Option<&FieldSpec>) -> Result<AnalysisRecord, NormalizeError> {
    parse_with_attempt(raw, schema).map(|(record, _)| record)
}

pub fn parse_with_attempt(
    raw: Option<&str>,
    schema: Option<&FieldSpec>,
) -> Result<(AnalysisRecord, ParseAttempt), NormalizeError> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(NormalizeError::EmptyResponse),
    };

    let (parsed, attempt) = match serde_json::from_str::<Value>(raw) {
        Ok(value) => (value, ParseAttempt::Direct),
        Err(direct_err) => {
            debug!("Direct parse of model response failed ({direct_err}), extracting");
            let candidate = extract(raw);
            match serde_json::from_str::<Value>(&candidate) {
                Ok(value) => (value, ParseAttempt::Extracted),
                Err(e) => {
                    warn!(
                        "Model response unparseable after extraction: {e} (raw length {})",
                        raw.len()
                    );
                    return Err(NormalizeError::UnparseableResponse(e.to_string()));
                }
            }
        }
    };

    let record = validate(parsed, schema)?;
    Ok((record, attempt))
}

/// Applies the clamp/default policy to a parsed value.
///
/// Fields named in `schema` are coerced in place (percentages clamped, lists
/// forced). Without a schema the contract's eight fields are used. The eight
/// contract fields are always present on the result.
pub fn validate(parsed: Value, schema: Option<&FieldSpec>) -> Result<AnalysisRecord, NormalizeError> {
    let Value::Object(mut fields) = parsed else {
        return Err(NormalizeError::NotAnObject);
    };

    let schema = schema.unwrap_or(&*DEFAULT_FIELD_SPEC);
    apply_schema(&mut fields, schema);

    Ok(AnalysisRecord::from_fields(fields))
}

fn apply_schema(fields: &mut Map<String, Value>, schema: &FieldSpec) {
    for name in &schema.required_numeric_fields {
        let value = coerce_percentage(fields.get(name));
        fields.insert(name.clone(), value.to_json());
    }

    for name in &schema.required_list_fields {
        let value = coerce_list(fields.remove(name));
        fields.insert(name.clone(), Value::Array(value));
    }
}
