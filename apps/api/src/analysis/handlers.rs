//! Axum route handlers for the Analysis API.

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::analysis::ingest::extract_resume_text;
use crate::analysis::models::{AnalysisResult, AnalyzeRequest};
use crate::errors::AppError;
use crate::state::AppState;

fn validate_request(request: &AnalyzeRequest) -> Result<(), AppError> {
    if request.resume_text.trim().is_empty() {
        return Err(AppError::Validation("resumeText cannot be empty".to_string()));
    }
    if request.job_content.trim().is_empty() {
        return Err(AppError::Validation("jobContent cannot be empty".to_string()));
    }
    Ok(())
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {e}"))
}

/// POST /api/v1/analyses
///
/// Analyzes pasted resume text against a job description.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    validate_request(&request)?;
    let result = state.orchestrator.analyze(&request).await?;
    Ok(Json(result))
}

/// POST /api/v1/analyses/upload
///
/// Multipart variant: `resume` file (PDF or text) plus `jobTitle`,
/// `jobCompany` and `jobContent` text fields.
pub async fn handle_analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, AppError> {
    let mut resume_text = None;
    let mut resume_name = None;
    let mut job_title = String::new();
    let mut job_company = String::new();
    let mut job_content = String::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let file_name = field.file_name().map(String::from);
                let content_type = field.content_type().map(String::from);
                let data = field.bytes().await.map_err(multipart_error)?;
                resume_text = Some(
                    extract_resume_text(file_name.as_deref(), content_type.as_deref(), data).await?,
                );
                resume_name = file_name;
            }
            "jobTitle" => job_title = field.text().await.map_err(multipart_error)?,
            "jobCompany" => job_company = field.text().await.map_err(multipart_error)?,
            "jobContent" => job_content = field.text().await.map_err(multipart_error)?,
            _ => {}
        }
    }

    let resume_text = resume_text
        .ok_or_else(|| AppError::Validation("resume file is required".to_string()))?;

    let request = AnalyzeRequest {
        resume_text,
        resume_name,
        job_title,
        job_company,
        job_content,
    };
    validate_request(&request)?;

    let result = state.orchestrator.analyze(&request).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(resume: &str, job: &str) -> AnalyzeRequest {
        AnalyzeRequest {
            resume_text: resume.to_string(),
            resume_name: None,
            job_title: String::new(),
            job_company: String::new(),
            job_content: job.to_string(),
        }
    }

    #[test]
    fn test_validate_request_requires_resume_and_job() {
        assert!(validate_request(&request("resume", "job")).is_ok());
        assert!(matches!(
            validate_request(&request("  ", "job")),
            Err(AppError::Validation(msg)) if msg.contains("resumeText")
        ));
        assert!(matches!(
            validate_request(&request("resume", "\n")),
            Err(AppError::Validation(msg)) if msg.contains("jobContent")
        ));
    }

    #[test]
    fn test_request_deserializes_camel_case_with_optional_metadata() {
        let req: AnalyzeRequest = serde_json::from_str(
            r#"{"resumeText": "Rust dev", "jobContent": "Rust role"}"#,
        )
        .unwrap();
        assert_eq!(req.resume_text, "Rust dev");
        assert_eq!(req.job_title, "");
        assert!(req.resume_name.is_none());
    }
}
