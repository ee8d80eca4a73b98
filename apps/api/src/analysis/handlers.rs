//! Axum route handlers for the Analysis API.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::analysis::pipeline::analyze_resume;
use crate::errors::AppError;
use crate::models::analysis::AnalysisRecord;
use crate::state::AppState;

const RESUME_FIELD: &str = "resume";
const JOB_DESCRIPTION_FIELD: &str = "job_description";

// ────────────────────────────────────────────────────────────────────────────
// Request parsing
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct AnalyzeRequest {
    resume: Bytes,
    job_description: String,
}

async fn read_analyze_request(mut multipart: Multipart) -> Result<AnalyzeRequest, AppError> {
    let mut resume = None;
    let mut job_description = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some(RESUME_FIELD) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read resume: {e}")))?;
                resume = Some(bytes);
            }
            Some(JOB_DESCRIPTION_FIELD) => {
                let text = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Could not read job description: {e}"))
                })?;
                job_description = Some(text);
            }
            _ => {}
        }
    }

    let resume = resume
        .filter(|b| !b.is_empty())
        .ok_or_else(|| AppError::Validation("A non-empty 'resume' file is required".into()))?;
    let job_description = job_description
        .map(|jd| jd.trim().to_string())
        .filter(|jd| !jd.is_empty())
        .ok_or_else(|| AppError::Validation("'job_description' must not be blank".into()))?;

    Ok(AnalyzeRequest {
        resume,
        job_description,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze (also mounted at /analyze)
/// Multipart: `resume` (PDF file) + `job_description` (text).
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisRecord>, AppError> {
    let request_id = Uuid::new_v4();
    async move {
        let req = read_analyze_request(multipart).await?;
        tracing::info!(
            resume_bytes = req.resume.len(),
            jd_chars = req.job_description.len(),
            "Analyze request accepted"
        );
        let record = analyze_resume(&state, req.resume, &req.job_description).await?;
        Ok::<_, AppError>(Json(record))
    }
    .instrument(info_span!("analyze", %request_id))
    .await
}
