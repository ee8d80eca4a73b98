//! Embedding backend — maps strings to unit-length `f32` vectors.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::llm_client::{ModelError, ModelTransport};

/// Batched text embedder. Returns one L2-normalized row per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

/// Embedding service reached over HTTP (`{"inputs": [...]}` → `[[f32]]`).
#[derive(Clone)]
pub struct HttpEmbedder {
    transport: ModelTransport,
    url: String,
    batch_size: usize,
}

impl HttpEmbedder {
    pub fn new(transport: ModelTransport, url: String, batch_size: usize) -> Self {
        Self {
            transport,
            url,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let rows: Vec<Vec<f32>> = self
                .transport
                .post_json(&self.url, &EmbedRequest { inputs: batch })
                .await?;
            if rows.len() != batch.len() {
                return Err(ModelError::ShapeMismatch {
                    expected: batch.len(),
                    actual: rows.len(),
                });
            }
            vectors.extend(rows.into_iter().map(|mut row| {
                l2_normalize(&mut row);
                row
            }));
        }

        debug!(texts = texts.len(), "Embedded batch");
        Ok(vectors)
    }
}

/// Scales `v` to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}
