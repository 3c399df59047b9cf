//! Analysis Orchestrator — one request from resume + job text to `AnalysisResult`.
//!
//! Flow: build prompt → model call → normalize → merge job metadata, id and
//! timestamp. The model call is the only await point. Nothing is retried here;
//! every failure becomes `AppError::AnalysisUnavailable` and the caller may
//! re-submit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::models::{AnalysisResult, AnalyzeRequest};
use crate::analysis::normalizer::{FieldSpec, ResponseNormalizer};
use crate::analysis::prompts::{ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_ROLE};
use crate::config::Environment;
use crate::errors::AppError;
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::CompletionProvider;

/// How much raw model text a development-mode error detail may echo.
const RAW_EXCERPT_CHARS: usize = 500;

/// Source of result ids and analysis timestamps.
pub trait ResultStamper: Send + Sync {
    fn next_id(&self) -> String;
    fn now(&self) -> DateTime<Utc>;
}

/// Random v4 UUIDs and the system clock.
pub struct SystemStamper;

impl ResultStamper for SystemStamper {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct AnalysisOrchestrator {
    llm: Arc<dyn CompletionProvider>,
    stamper: Arc<dyn ResultStamper>,
    normalizer: ResponseNormalizer,
    environment: Environment,
    max_input_chars: usize,
}

impl AnalysisOrchestrator {
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        stamper: Arc<dyn ResultStamper>,
        environment: Environment,
        max_input_chars: usize,
    ) -> Self {
        Self {
            llm,
            stamper,
            normalizer: ResponseNormalizer::new(FieldSpec::default()),
            environment,
            max_input_chars,
        }
    }

    pub fn build_prompt(&self, request: &AnalyzeRequest) -> String {
        fill_template(
            ANALYSIS_PROMPT_TEMPLATE,
            &[
                ("job_title", request.job_title.trim()),
                ("job_company", request.job_company.trim()),
                (
                    "job_content",
                    truncate_chars(request.job_content.trim(), self.max_input_chars),
                ),
                (
                    "resume_text",
                    truncate_chars(request.resume_text.trim(), self.max_input_chars),
                ),
            ],
        )
    }

    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, AppError> {
        let prompt = self.build_prompt(request);
        let system = format!("{ANALYSIS_ROLE} {JSON_ONLY_INSTRUCTION}");

        info!(
            "Running analysis of {} for '{}' at '{}' (model: {})",
            request.resume_name.as_deref().unwrap_or("pasted resume"),
            request.job_title,
            request.job_company,
            self.llm.model()
        );

        let raw = self.llm.complete(&prompt, &system).await.map_err(|e| {
            error!("Model call failed: {e}");
            self.unavailable(e.to_string(), None)
        })?;

        let record = self.normalizer.normalize(raw.as_deref()).map_err(|e| {
            warn!("Model response rejected: {e}");
            self.unavailable(e.to_string(), raw.as_deref())
        })?;

        let result = AnalysisResult::merge(
            record,
            request,
            self.stamper.next_id(),
            self.stamper.now(),
        );
        info!(
            "Analysis {} complete: overall match {}",
            result.id,
            result.overall_match.value()
        );

        Ok(result)
    }

    fn unavailable(&self, cause: String, raw: Option<&str>) -> AppError {
        if self.environment.is_production() {
            return AppError::AnalysisUnavailable { detail: None };
        }

        let detail = match raw {
            Some(raw) => format!(
                "{cause}; raw response: {}",
                truncate_chars(raw, RAW_EXCERPT_CHARS)
            ),
            None => cause,
        };
        AppError::AnalysisUnavailable {
            detail: Some(detail),
        }
    }
}

/// Replaces each `{name}` in `template` with its value in a single pass.
/// Substituted text is never rescanned; unknown braces are copied through.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];

        let hit = values.iter().find(|(name, _)| {
            tail.strip_prefix(name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Cuts `text` to at most `max` characters on a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    use crate::llm_client::LlmError;

    pub(crate) enum StubReply {
        Text(Option<String>),
        ApiError(u16),
    }

    /// Returns a canned reply and records every prompt it receives.
    pub(crate) struct StubProvider {
        reply: StubReply,
        pub prompts: Mutex<Vec<(String, String)>>,
    }

    impl StubProvider {
        pub(crate) fn replying(text: &str) -> Self {
            Self::new(StubReply::Text(Some(text.to_string())))
        }

        pub(crate) fn new(reply: StubReply) -> Self {
            Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for StubProvider {
        async fn complete(&self, prompt: &str, system: &str) -> Result<Option<String>, LlmError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), system.to_string()));
            match &self.reply {
                StubReply::Text(text) => Ok(text.clone()),
                StubReply::ApiError(status) => Err(LlmError::Api {
                    status: *status,
                    message: "upstream unavailable".to_string(),
                }),
            }
        }

        fn model(&self) -> &str {
            "stub-model"
        }
    }

    pub(crate) struct FixedStamper;

    impl ResultStamper for FixedStamper {
        fn next_id(&self) -> String {
            "analysis-1".to_string()
        }

        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
        }
    }

    pub(crate) fn request() -> AnalyzeRequest {
        AnalyzeRequest {
            resume_text: "Senior Rust engineer, 6 years of Tokio and Axum.".to_string(),
            resume_name: Some("resume.pdf".to_string()),
            job_title: "Backend Engineer".to_string(),
            job_company: "Acme".to_string(),
            job_content: "We need Rust, Kubernetes and PostgreSQL.".to_string(),
        }
    }

    fn orchestrator(provider: Arc<StubProvider>, environment: Environment) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(provider, Arc::new(FixedStamper), environment, 12000)
    }

    const FENCED_REPLY: &str = "```json\n{\"overallMatch\": 82, \"skillsMatch\": 70, \"experienceMatch\": 91, \"educationMatch\": 40, \"recommendations\": [\"Add React\"], \"missingSkills\": \"none\", \"strengths\": [], \"improvements\": [\"Quantify results\"]}\n```";

    #[tokio::test]
    async fn test_analyze_merges_record_with_metadata() {
        let provider = Arc::new(StubProvider::replying(FENCED_REPLY));
        let result = orchestrator(provider, Environment::Development)
            .analyze(&request())
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "id": "analysis-1",
                "jobTitle": "Backend Engineer",
                "jobCompany": "Acme",
                "jobContent": "We need Rust, Kubernetes and PostgreSQL.",
                "overallMatch": 82,
                "skillsMatch": 70,
                "experienceMatch": 91,
                "educationMatch": 40,
                "recommendations": ["Add React"],
                "missingSkills": [],
                "strengths": [],
                "improvements": ["Quantify results"],
                "analyzedAt": "2026-03-01T09:30:00Z"
            })
        );
    }

    #[tokio::test]
    async fn test_analyze_sends_resume_and_job_in_prompt() {
        let provider = Arc::new(StubProvider::replying("{}"));
        orchestrator(provider.clone(), Environment::Development)
            .analyze(&request())
            .await
            .unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let (prompt, system) = &prompts[0];
        assert!(prompt.contains("Senior Rust engineer"));
        assert!(prompt.contains("JOB TITLE: Backend Engineer"));
        assert!(prompt.contains("COMPANY: Acme"));
        assert!(!prompt.contains("{resume_text}"));
        assert!(system.contains("valid JSON only"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_unavailable_with_detail_in_development() {
        let provider = Arc::new(StubProvider::new(StubReply::ApiError(503)));
        let err = orchestrator(provider, Environment::Development)
            .analyze(&request())
            .await
            .unwrap_err();

        match err {
            AppError::AnalysisUnavailable { detail: Some(detail) } => {
                assert!(detail.contains("503"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_production_hides_detail() {
        let provider = Arc::new(StubProvider::replying("not json at all, sorry"));
        let err = orchestrator(provider, Environment::Production)
            .analyze(&request())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AnalysisUnavailable { detail: None }));
    }

    #[tokio::test]
    async fn test_unparseable_reply_echoes_raw_excerpt_in_development() {
        let provider = Arc::new(StubProvider::replying("not json at all, sorry"));
        let err = orchestrator(provider, Environment::Development)
            .analyze(&request())
            .await
            .unwrap_err();

        match err {
            AppError::AnalysisUnavailable { detail: Some(detail) } => {
                assert!(detail.contains("not parseable"));
                assert!(detail.contains("raw response: not json at all, sorry"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_content_is_unavailable() {
        let provider = Arc::new(StubProvider::new(StubReply::Text(None)));
        let err = orchestrator(provider, Environment::Development)
            .analyze(&request())
            .await
            .unwrap_err();

        match err {
            AppError::AnalysisUnavailable { detail: Some(detail) } => {
                assert!(detail.contains("empty response"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_array_reply_is_unavailable() {
        let provider = Arc::new(StubProvider::replying("[1,2,3]"));
        let err = orchestrator(provider, Environment::Development)
            .analyze(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AnalysisUnavailable { .. }));
    }

    #[test]
    fn test_prompt_truncates_long_inputs() {
        let provider = Arc::new(StubProvider::replying("{}"));
        let orchestrator =
            AnalysisOrchestrator::new(provider, Arc::new(FixedStamper), Environment::Development, 10);
        let mut req = request();
        req.resume_text = "ÄÖÜ".repeat(20);

        let prompt = orchestrator.build_prompt(&req);
        assert!(prompt.contains(&"ÄÖÜ".repeat(3)));
        assert!(!prompt.contains(&"ÄÖÜ".repeat(4)));
    }

    #[test]
    fn test_prompt_does_not_expand_placeholders_in_caller_text() {
        let provider = Arc::new(StubProvider::replying("{}"));
        let orchestrator = orchestrator(provider, Environment::Development);
        let mut req = request();
        req.job_title = "Engineer {resume_text}".to_string();
        req.job_company = "{job_content} Inc".to_string();

        let prompt = orchestrator.build_prompt(&req);
        assert!(prompt.contains("JOB TITLE: Engineer {resume_text}\n"));
        assert!(prompt.contains("COMPANY: {job_content} Inc\n"));
        assert_eq!(prompt.matches("Senior Rust engineer").count(), 1);
        assert_eq!(prompt.matches("We need Rust").count(), 1);
    }

    #[test]
    fn test_fill_template_keeps_literal_braces() {
        assert_eq!(
            fill_template("{\"a\": {x}} {y} {unknown}", &[("x", "1"), ("y", "{x}")]),
            "{\"a\": 1} {x} {unknown}"
        );
        assert_eq!(fill_template("trailing {", &[("x", "1")]), "trailing {");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
