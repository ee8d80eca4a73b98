//! Resume text extraction.
//!
//! PDF parsing is CPU-bound, so it runs inside `tokio::task::spawn_blocking`.
//! A semaphore caps concurrent extractions at `PDF_WORKERS`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Could not read PDF: {0}")]
    Pdf(String),

    #[error("Document contains no extractable text")]
    Empty,

    #[error("Extraction worker failed: {0}")]
    Worker(String),
}

/// Byte stream → page text, concatenated in page order.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bytes: Bytes) -> Result<String, ExtractError>;
}

#[derive(Clone)]
pub struct PdfExtractor {
    permits: Arc<Semaphore>,
}

impl PdfExtractor {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, bytes: Bytes) -> Result<String, ExtractError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ExtractError::Worker(e.to_string()))?;

        let size = bytes.len();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ExtractError::Worker(format!("spawn_blocking failed in extraction: {e}")))?
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;

        let text = non_empty(text)?;
        debug!(bytes = size, chars = text.len(), "Extracted resume text");
        Ok(text)
    }
}

/// Trims extracted text and rejects documents with nothing but whitespace.
pub fn non_empty(text: String) -> Result<String, ExtractError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(trimmed.to_string())
}
