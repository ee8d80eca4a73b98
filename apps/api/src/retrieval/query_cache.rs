//! Memoized job-description embeddings.
//!
//! The query vector for a given job description is computed once and reused by
//! every request that carries the same text, up to a bounded LRU capacity.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::debug;

use crate::llm_client::embeddings::Embedder;
use crate::llm_client::ModelError;

pub struct QueryEmbeddingCache {
    embedder: Arc<dyn Embedder>,
    vectors: Mutex<LruCache<String, Arc<[f32]>>>,
}

impl QueryEmbeddingCache {
    pub fn new(embedder: Arc<dyn Embedder>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            embedder,
            vectors: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Arc<[f32]>>> {
        self.vectors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the embedding of `query`, calling the embedder only on a miss.
    /// Failed embeddings are not cached.
    pub async fn embed_query(&self, query: &str) -> Result<Arc<[f32]>, ModelError> {
        let cached = self.lock().get(query).cloned();
        if let Some(vector) = cached {
            debug!("Query embedding cache hit");
            return Ok(vector);
        }

        let mut rows = self.embedder.embed(&[query.to_string()]).await?;
        if rows.len() != 1 {
            return Err(ModelError::ShapeMismatch {
                expected: 1,
                actual: rows.len(),
            });
        }
        let vector: Arc<[f32]> = rows.remove(0).into();

        self.lock().put(query.to_string(), Arc::clone(&vector));
        Ok(vector)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}
