use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

// ────────────────────────────────────────────────────────────────────────────
// Field names of the analysis contract
// ────────────────────────────────────────────────────────────────────────────

pub const OVERALL_MATCH: &str = "overallMatch";
pub const SKILLS_MATCH: &str = "skillsMatch";
pub const EXPERIENCE_MATCH: &str = "experienceMatch";
pub const EDUCATION_MATCH: &str = "educationMatch";

pub const RECOMMENDATIONS: &str = "recommendations";
pub const MISSING_SKILLS: &str = "missingSkills";
pub const STRENGTHS: &str = "strengths";
pub const IMPROVEMENTS: &str = "improvements";

pub const DETAILED_ANALYSIS: &str = "detailedAnalysis";

pub const PERCENTAGE_FIELDS: [&str; 4] = [OVERALL_MATCH, SKILLS_MATCH, EXPERIENCE_MATCH, EDUCATION_MATCH];
pub const LIST_FIELDS: [&str; 4] = [RECOMMENDATIONS, MISSING_SKILLS, STRENGTHS, IMPROVEMENTS];

// ────────────────────────────────────────────────────────────────────────────
// Percentage
// ────────────────────────────────────────────────────────────────────────────

/// A match percentage, always within `0.0 ..= 100.0`.
///
/// Whole numbers serialize as JSON integers (`82`, not `82.0`).
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Percentage {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 100.0;

    /// Clamps `value` into range. NaN becomes 0.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn to_json(self) -> Value {
        match self.as_whole() {
            Some(whole) => Value::from(whole),
            None => Value::from(self.0),
        }
    }

    fn as_whole(self) -> Option<i64> {
        (self.0.fract() == 0.0).then_some(self.0 as i64)
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_whole() {
            Some(whole) => serializer.serialize_i64(whole),
            None => serializer.serialize_f64(self.0),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AnalysisRecord
// ────────────────────────────────────────────────────────────────────────────

/// Whatever the model attached under `detailedAnalysis`, passed through.
///
/// An object keeps every member it was sent; only the four known sections are
/// forced to lists. Any other value is carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetailedAnalysis {
    Breakdown(AnalysisBreakdown),
    Unstructured(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisBreakdown {
    pub keyword_matches: Vec<Value>,
    pub experience_alignment: Vec<Value>,
    pub skill_gaps: Vec<Value>,
    pub recommendations: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DetailedAnalysis {
    /// `null` counts as absent.
    pub fn from_value(value: Value) -> Option<Self> {
        let mut fields = match value {
            Value::Null => return None,
            Value::Object(fields) => fields,
            other => return Some(Self::Unstructured(other)),
        };

        Some(Self::Breakdown(AnalysisBreakdown {
            keyword_matches: coerce_list(fields.remove("keywordMatches")),
            experience_alignment: coerce_list(fields.remove("experienceAlignment")),
            skill_gaps: coerce_list(fields.remove("skillGaps")),
            recommendations: coerce_list(fields.remove("recommendations")),
            extra: fields,
        }))
    }
}

/// The validated, defaulted, fixed-shape output of response normalization.
///
/// List elements are kept exactly as the model sent them. They are documented
/// as strings but are not checked individually.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub overall_match: Percentage,
    pub skills_match: Percentage,
    pub experience_match: Percentage,
    pub education_match: Percentage,
    pub recommendations: Vec<Value>,
    pub missing_skills: Vec<Value>,
    pub strengths: Vec<Value>,
    pub improvements: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_analysis: Option<DetailedAnalysis>,
    /// Any other top-level keys the model returned, including extra fields
    /// named by a custom `FieldSpec`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisRecord {
    /// Lifts the contract fields out of a JSON object. Every contract field is
    /// coerced, so the fixed shape holds whatever the object contains.
    pub(crate) fn from_fields(mut fields: Map<String, Value>) -> Self {
        let mut percentage = |name: &str| coerce_percentage(fields.remove(name).as_ref());
        let overall_match = percentage(OVERALL_MATCH);
        let skills_match = percentage(SKILLS_MATCH);
        let experience_match = percentage(EXPERIENCE_MATCH);
        let education_match = percentage(EDUCATION_MATCH);

        let recommendations = coerce_list(fields.remove(RECOMMENDATIONS));
        let missing_skills = coerce_list(fields.remove(MISSING_SKILLS));
        let strengths = coerce_list(fields.remove(STRENGTHS));
        let improvements = coerce_list(fields.remove(IMPROVEMENTS));

        let detailed_analysis = fields
            .remove(DETAILED_ANALYSIS)
            .and_then(DetailedAnalysis::from_value);

        Self {
            overall_match,
            skills_match,
            experience_match,
            education_match,
            recommendations,
            missing_skills,
            strengths,
            improvements,
            detailed_analysis,
            extra: fields,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field coercion
// ────────────────────────────────────────────────────────────────────────────

/// Coerces a JSON value to a percentage: numbers as-is, numeric strings
/// parsed, everything else (booleans included) 0. The result is clamped into
/// `[0, 100]`.
pub fn coerce_percentage(value: Option<&Value>) -> Percentage {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
            }
        }
        _ => 0.0,
    };
    Percentage::clamped(number)
}

/// Returns the list unchanged, or an empty list for any non-list value.
pub fn coerce_list(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request / result types
// ────────────────────────────────────────────────────────────────────────────

/// Everything the orchestrator needs to run one analysis.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub resume_text: String,
    #[serde(default)]
    pub resume_name: Option<String>,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub job_company: String,
    pub job_content: String,
}

/// The record handed back to the caller: normalized analysis plus the job
/// metadata it was run against. The caller owns persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: String,
    pub job_title: String,
    pub job_company: String,
    pub job_content: String,
    pub overall_match: Percentage,
    pub skills_match: Percentage,
    pub experience_match: Percentage,
    pub education_match: Percentage,
    pub recommendations: Vec<Value>,
    pub missing_skills: Vec<Value>,
    pub strengths: Vec<Value>,
    pub improvements: Vec<Value>,
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_analysis: Option<DetailedAnalysis>,
}

impl AnalysisResult {
    pub fn merge(
        record: AnalysisRecord,
        request: &AnalyzeRequest,
        id: String,
        analyzed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_title: request.job_title.clone(),
            job_company: request.job_company.clone(),
            job_content: request.job_content.clone(),
            overall_match: record.overall_match,
            skills_match: record.skills_match,
            experience_match: record.experience_match,
            education_match: record.education_match,
            recommendations: record.recommendations,
            missing_skills: record.missing_skills,
            strengths: record.strengths,
            improvements: record.improvements,
            analyzed_at,
            detailed_analysis: record.detailed_analysis,
        }
    }
}
