// Prompt constants for resume/job analysis.

/// Role statement for the analysis system prompt. Combined with
/// `llm_client::prompts::JSON_ONLY_INSTRUCTION` at call time.
pub const ANALYSIS_ROLE: &str = "You are an expert technical recruiter and ATS analyst. \
    You compare a candidate's resume against a job description and report how well they match.";

/// Analysis prompt template.
/// Replace: {resume_text}, {job_title}, {job_company}, {job_content}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Compare the resume below with the job description and return a JSON object with this EXACT schema:
{
  "overallMatch": 0,
  "skillsMatch": 0,
  "experienceMatch": 0,
  "educationMatch": 0,
  "recommendations": ["Concrete change the candidate should make to the resume"],
  "missingSkills": ["Skill the job asks for that the resume does not show"],
  "strengths": ["Requirement the resume clearly covers"],
  "improvements": ["Weak spot in how the resume presents existing experience"],
  "detailedAnalysis": {
    "keywordMatches": ["Job keyword found in the resume"],
    "experienceAlignment": ["How a past role maps to a responsibility in the job"],
    "skillGaps": ["Gap with a short note on its importance"],
    "recommendations": ["Detailed, prioritised recommendation"]
  }
}

Rules:
- All four match fields are integers from 0 to 100.
- Every list field is a JSON array of strings, possibly empty.
- Base every statement on the texts below. Do NOT invent experience.

JOB TITLE: {job_title}
COMPANY: {job_company}

JOB DESCRIPTION:
{job_content}

RESUME:
{resume_text}"#;
