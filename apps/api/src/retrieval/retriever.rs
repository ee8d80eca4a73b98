//! Retriever — orchestrates chunk → embed → cache → search for one document.

use std::sync::Arc;

use tracing::debug;

use crate::llm_client::embeddings::Embedder;
use crate::retrieval::chunker::ChunkConfig;
use crate::retrieval::index_cache::{CacheKey, SearchResult, VectorIndexCache};
use crate::retrieval::RetrievalError;

/// Ranks a document's chunks against an already-computed query vector.
///
/// The index cache is injected so every request shares one store and tests can
/// use an isolated one.
#[derive(Clone)]
pub struct Retriever {
    cache: Arc<VectorIndexCache>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(cache: Arc<VectorIndexCache>, embedder: Arc<dyn Embedder>) -> Self {
        Self { cache, embedder }
    }

    pub fn cache(&self) -> &VectorIndexCache {
        &self.cache
    }

    /// Returns the `k` chunks of `document_text` nearest to `query_vector`.
    ///
    /// Chunking and embedding only happen the first time a document is seen;
    /// later calls with the same text reuse the cached index.
    pub async fn retrieve_context(
        &self,
        document_text: &str,
        query_vector: &[f32],
        chunk_config: ChunkConfig,
        k: usize,
    ) -> Result<SearchResult, RetrievalError> {
        chunk_config.validate()?;

        let key = CacheKey::from_text(document_text);
        let handle = self
            .cache
            .get_or_try_build(key.clone(), || async {
                let chunks = chunk_config.chunk(document_text)?;
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let vectors = if texts.is_empty() {
                    Vec::new()
                } else {
                    self.embedder.embed(&texts).await?
                };
                Ok::<_, RetrievalError>((vectors, chunks))
            })
            .await?;

        let hits = self.cache.search(&key, query_vector, k)?;
        debug!(
            key = %key,
            indexed = handle.len(),
            returned = hits.len(),
            best_distance = ?hits.first().map(|h| h.distance),
            "Retrieved context"
        );
        Ok(hits)
    }
}
