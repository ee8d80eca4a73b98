//! End-to-end analysis of one resume against one job description.
//!
//! extract → embed JD (memoized) → retrieve top-k resume chunks → prompt →
//! generate → recover a structured record. Malformed model output never fails
//! the request; it degrades to the diagnostic record.

use bytes::Bytes;
use tracing::info;

use crate::analysis::parser::parse_model_output;
use crate::analysis::prompts::{build_context, format_analysis_prompt};
use crate::errors::AppError;
use crate::models::analysis::AnalysisRecord;
use crate::state::AppState;

pub async fn analyze_resume(
    state: &AppState,
    resume: Bytes,
    job_description: &str,
) -> Result<AnalysisRecord, AppError> {
    let settings = &state.settings;

    let resume_text = state.extractor.extract(resume).await?;
    let query = state.query_cache.embed_query(job_description).await?;

    let hits = state
        .retriever
        .retrieve_context(&resume_text, &query, settings.chunk, settings.top_k)
        .await?;

    let context = build_context(&hits, settings.max_context_words);
    let prompt = format_analysis_prompt(&context, job_description);
    let raw = state.generator.generate(&prompt).await?;

    let record = parse_model_output(&raw);
    info!(
        chunks = hits.len(),
        prompt_chars = prompt.len(),
        score = record.score,
        "Analysis completed"
    );
    Ok(record)
}
