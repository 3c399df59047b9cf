//! Resume ingestion — turns an uploaded file into plain text for prompting.
//!
//! Supports PDF (via `pdf-extract`), DOCX (`zip` + `quick-xml`) and UTF-8
//! text. Document parsing is CPU-bound and runs on the blocking pool.

use std::io::{Cursor, Read};

use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::errors::AppError;

const PDF_MAGIC: &[u8] = b"%PDF-";
const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFormat {
    Pdf,
    Docx,
    PlainText,
}

/// Decides how to read an upload. File content wins over the declared type.
pub fn detect_format(
    file_name: Option<&str>,
    content_type: Option<&str>,
    data: &[u8],
) -> Option<ResumeFormat> {
    if data.starts_with(PDF_MAGIC) {
        return Some(ResumeFormat::Pdf);
    }

    let name = file_name.unwrap_or_default().to_ascii_lowercase();
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

    if content_type == "application/pdf" || name.ends_with(".pdf") {
        Some(ResumeFormat::Pdf)
    } else if content_type == DOCX_CONTENT_TYPE || name.ends_with(".docx") {
        Some(ResumeFormat::Docx)
    } else if content_type.starts_with("text/") || name.ends_with(".txt") || name.ends_with(".md") {
        Some(ResumeFormat::PlainText)
    } else {
        None
    }
}

/// Extracts trimmed resume text, rejecting unreadable or empty uploads.
pub async fn extract_resume_text(
    file_name: Option<&str>,
    content_type: Option<&str>,
    data: Bytes,
) -> Result<String, AppError> {
    let format = detect_format(file_name, content_type, &data).ok_or_else(|| {
        AppError::Validation("Unsupported resume format: upload a PDF, DOCX or plain text file".to_string())
    })?;
    debug!("Extracting resume text ({format:?}, {} bytes)", data.len());

    let text = match format {
        ResumeFormat::Pdf => extract_pdf_text(data).await?,
        ResumeFormat::Docx => extract_docx_text(data).await?,
        ResumeFormat::PlainText => String::from_utf8(data.to_vec())
            .map_err(|_| AppError::Validation("Resume text is not valid UTF-8".to_string()))?,
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation(
            "No readable text found in resume".to_string(),
        ));
    }

    Ok(text.to_string())
}

async fn extract_pdf_text(data: Bytes) -> Result<String, AppError> {
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await
        .map_err(|e| {
            warn!("PDF extraction task aborted: {e}");
            AppError::Validation("Could not read PDF resume".to_string())
        })?;

    extracted.map_err(|e| {
        warn!("PDF extraction failed: {e}");
        AppError::Validation("Could not read PDF resume".to_string())
    })
}

async fn extract_docx_text(data: Bytes) -> Result<String, AppError> {
    let extracted = tokio::task::spawn_blocking(move || read_docx_paragraphs(&data))
        .await
        .map_err(|e| {
            warn!("DOCX extraction task aborted: {e}");
            AppError::Validation("Could not read DOCX resume".to_string())
        })?;

    extracted.map_err(|e| {
        warn!("DOCX extraction failed: {e}");
        AppError::Validation("Could not read DOCX resume".to_string())
    })
}

/// Reads `word/document.xml` and returns one line per non-empty paragraph.
fn read_docx_paragraphs(data: &[u8]) -> anyhow::Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut buf = Vec::new();
    let mut paragraph: Option<String> = None;
    let mut lines = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"w:p" => paragraph = Some(String::new()),
            Event::End(e) if e.name().as_ref() == b"w:p" => {
                if let Some(text) = paragraph.take() {
                    let text = text.trim();
                    if !text.is_empty() {
                        lines.push(text.to_string());
                    }
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"w:tab" => {
                if let Some(text) = paragraph.as_mut() {
                    text.push('\t');
                }
            }
            Event::Text(e) => {
                if let Some(text) = paragraph.as_mut() {
                    text.push_str(&e.xml_content()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(lines.join("\n"))
}
