//! Vector Index Cache — builds and memoizes one flat L2 index per unique document.
//!
//! # Build-once semantics
//! The key map is guarded by a single mutex that only covers the "find or insert
//! slot" step. Each slot is a `tokio::sync::OnceCell`, so concurrent requests for
//! the same key all await one build, and no caller ever sees a half-built entry.
//! Requests for different keys never wait on each other's builds.
//!
//! A failed build leaves the slot empty; the next caller retries it.
//!
//! Entries are immutable once built and live until the cache is dropped.
//! There is no eviction, size bound or TTL.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::retrieval::chunker::Chunk;
use crate::retrieval::RetrievalError;

// ────────────────────────────────────────────────────────────────────────────
// Cache key
// ────────────────────────────────────────────────────────────────────────────

/// BLAKE3 digest (hex) of a document's whitespace-normalized text.
///
/// Texts that differ only in whitespace chunk identically, so they share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_text(text: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (i, token) in text.split_whitespace().enumerate() {
            if i > 0 {
                hasher.update(b" ");
            }
            hasher.update(token.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Search structure
// ────────────────────────────────────────────────────────────────────────────

/// Exhaustive squared-L2 index over a row-major `N × D` matrix.
#[derive(Debug)]
struct FlatL2Index {
    dim: usize,
    rows: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    fn build(vectors: Vec<Vec<f32>>) -> Result<Self, RetrievalError> {
        let rows = vectors.len();
        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        if rows > 0 && dim == 0 {
            return Err(RetrievalError::InvalidVectors(
                "embedding vectors must not be empty".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(rows * dim);
        for (row, vector) in vectors.into_iter().enumerate() {
            if vector.len() != dim {
                return Err(RetrievalError::InvalidVectors(format!(
                    "row {row} has {} dimensions, expected {dim}",
                    vector.len()
                )));
            }
            data.extend(vector);
        }

        Ok(Self { dim, rows, data })
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Squared L2 distance from `query` to every row, in row order.
    fn distances(&self, query: &[f32]) -> Result<Vec<f32>, RetrievalError> {
        if self.rows > 0 && query.len() != self.dim {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        Ok((0..self.rows)
            .map(|i| squared_l2(self.row(i), query))
            .collect())
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

// ────────────────────────────────────────────────────────────────────────────
// Entries and handles
// ────────────────────────────────────────────────────────────────────────────

/// A chunk paired with its squared L2 distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Hits ranked by ascending distance, ties broken by chunk index. Length ≤ k.
pub type SearchResult = Vec<SearchHit>;

#[derive(Debug)]
struct IndexEntry {
    chunks: Vec<Chunk>,
    index: FlatL2Index,
}

/// Cheap, shareable reference to a built (immutable) index entry.
#[derive(Debug, Clone)]
pub struct IndexHandle(Arc<IndexEntry>);

impl IndexHandle {
    fn build(vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<Self, RetrievalError> {
        if vectors.len() != chunks.len() {
            return Err(RetrievalError::InvalidVectors(format!(
                "{} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        let index = FlatL2Index::build(vectors)?;
        Ok(Self(Arc::new(IndexEntry { chunks, index })))
    }

    #[cfg(test)]
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        (row < self.0.index.rows).then(|| self.0.index.row(row))
    }

    pub fn len(&self) -> usize {
        self.0.index.rows
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        self.0.index.dim
    }

    /// True when both handles point at the same built entry.
    #[cfg(test)]
    pub fn same_entry(&self, other: &IndexHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The `k` chunks nearest to `query`. Returns every chunk, ranked, when `k`
    /// exceeds the number indexed.
    pub fn search(&self, query: &[f32], k: usize) -> Result<SearchResult, RetrievalError> {
        let distances = self.0.index.distances(query)?;

        let mut ranked: Vec<(f32, usize)> = distances
            .into_iter()
            .enumerate()
            .map(|(row, d)| (d, row))
            .collect();
        ranked.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| self.0.chunks[a.1].index.cmp(&self.0.chunks[b.1].index))
        });
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(distance, row)| SearchHit {
                chunk: self.0.chunks[row].clone(),
                distance,
            })
            .collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Cache
// ────────────────────────────────────────────────────────────────────────────

type Slot = Arc<OnceCell<IndexHandle>>;

/// Process-lifetime store of built indexes, injected through `AppState`.
#[derive(Default)]
pub struct VectorIndexCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    builds: AtomicUsize,
}

impl VectorIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        // The guarded section never panics mid-update, so a poisoned map is still consistent.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        self.lock_slots().entry(key.clone()).or_default().clone()
    }

    /// Returns the entry for `key`, building it from the given vectors on first use.
    /// An existing entry is returned unchanged and the inputs are dropped.
    #[allow(dead_code)] // the retriever builds lazily through `get_or_try_build`
    pub async fn get_or_build(
        &self,
        key: CacheKey,
        vectors: Vec<Vec<f32>>,
        chunks: Vec<Chunk>,
    ) -> Result<IndexHandle, RetrievalError> {
        self.get_or_try_build(key, || async move { Ok::<_, RetrievalError>((vectors, chunks)) })
            .await
    }

    /// Returns the entry for `key`, running `produce` to obtain its vectors and
    /// chunks only if no entry exists yet. `produce` runs at most once per key
    /// across all concurrent callers (unless it fails, in which case a later
    /// caller may try again).
    pub async fn get_or_try_build<F, Fut>(
        &self,
        key: CacheKey,
        produce: F,
    ) -> Result<IndexHandle, RetrievalError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Vec<Vec<f32>>, Vec<Chunk>), RetrievalError>>,
    {
        let slot = self.slot(&key);

        if let Some(handle) = slot.get() {
            debug!(key = %key, "Index cache hit");
            return Ok(handle.clone());
        }

        let handle = slot
            .get_or_try_init(|| async {
                let (vectors, chunks) = produce().await?;
                let handle = IndexHandle::build(vectors, chunks)?;
                let builds = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
                info!(
                    key = %key,
                    chunks = handle.len(),
                    dim = handle.dim(),
                    total_builds = builds,
                    "Built vector index"
                );
                Ok::<_, RetrievalError>(handle)
            })
            .await?;

        Ok(handle.clone())
    }

    /// The built entry for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<IndexHandle> {
        self.lock_slots()
            .get(key)
            .and_then(|slot| slot.get().cloned())
    }

    /// Searches a previously built entry. Searching a key that was never built is
    /// a caller bug and reported as [`RetrievalError::CacheLookup`].
    pub fn search(
        &self,
        key: &CacheKey,
        query: &[f32],
        k: usize,
    ) -> Result<SearchResult, RetrievalError> {
        self.get(key)
            .ok_or_else(|| RetrievalError::CacheLookup(key.clone()))?
            .search(query, k)
    }

    /// Number of index structures constructed since startup.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Number of built entries currently held.
    pub fn len(&self) -> usize {
        self.lock_slots()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                index: i,
                text: format!("chunk {i}"),
            })
            .collect()
    }

    fn axis_vectors() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.6, 0.8, 0.0],
        ]
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = CacheKey::from_text("Senior Rust engineer");
        let b = CacheKey::from_text("Senior Rust engineer");
        assert_eq!(a, b);
        assert_eq!(a.to_string().len(), 64);
    }

    #[test]
    fn test_cache_key_ignores_whitespace_layout() {
        assert_eq!(
            CacheKey::from_text("Senior  Rust\nengineer "),
            CacheKey::from_text("Senior Rust engineer")
        );
    }

    #[test]
    fn test_cache_key_distinguishes_texts() {
        assert_ne!(
            CacheKey::from_text("Senior Rust engineer"),
            CacheKey::from_text("Senior Go engineer")
        );
        assert_ne!(CacheKey::from_text("ab c"), CacheKey::from_text("a bc"));
    }

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[1.0, 2.0], &[4.0, 6.0]), 25.0);
        assert_eq!(squared_l2(&[0.5, 0.5], &[0.5, 0.5]), 0.0);
    }

    #[tokio::test]
    async fn test_get_or_build_is_idempotent() {
        let cache = VectorIndexCache::new();
        let key = CacheKey::from_text("resume");

        let first = cache
            .get_or_build(key.clone(), axis_vectors(), chunks(4))
            .await
            .unwrap();
        let second = cache
            .get_or_build(key.clone(), vec![vec![9.0, 9.0, 9.0]], chunks(1))
            .await
            .unwrap();

        assert!(first.same_entry(&second));
        assert_eq!(second.len(), 4);
        assert_eq!(second.vector(3), Some(&[0.6, 0.8, 0.0][..]));
        assert_eq!(cache.build_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_entry_skips_producer() {
        let cache = VectorIndexCache::new();
        let key = CacheKey::from_text("resume");
        cache
            .get_or_build(key.clone(), axis_vectors(), chunks(4))
            .await
            .unwrap();

        let mut called = false;
        cache
            .get_or_try_build(key, || {
                called = true;
                async { Ok::<_, RetrievalError>((axis_vectors(), chunks(4))) }
            })
            .await
            .unwrap();

        assert!(!called);
    }

    #[tokio::test]
    async fn test_concurrent_callers_build_once() {
        let cache = Arc::new(VectorIndexCache::new());
        let produced = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::from_text("shared resume text");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let produced = Arc::clone(&produced);
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_try_build(key, || async move {
                        produced.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok::<_, RetrievalError>((axis_vectors(), chunks(4)))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(produced.load(Ordering::SeqCst), 1);
        assert_eq!(cache.build_count(), 1);
        assert!(handles.iter().all(|h| h.same_entry(&handles[0])));
    }

    #[tokio::test]
    async fn test_distinct_keys_build_separately() {
        let cache = VectorIndexCache::new();
        cache
            .get_or_build(CacheKey::from_text("a"), axis_vectors(), chunks(4))
            .await
            .unwrap();
        cache
            .get_or_build(CacheKey::from_text("b"), axis_vectors(), chunks(4))
            .await
            .unwrap();
        assert_eq!(cache.build_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_build_can_be_retried() {
        let cache = VectorIndexCache::new();
        let key = CacheKey::from_text("flaky");

        let failed = cache
            .get_or_try_build(key.clone(), || async {
                Err(RetrievalError::InvalidVectors("backend down".to_string()))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.build_count(), 0);

        cache
            .get_or_build(key.clone(), axis_vectors(), chunks(4))
            .await
            .unwrap();
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.build_count(), 1);
    }

    #[tokio::test]
    async fn test_search_ranks_by_ascending_distance() {
        let cache = VectorIndexCache::new();
        let key = CacheKey::from_text("resume");
        let handle = cache
            .get_or_build(key, axis_vectors(), chunks(4))
            .await
            .unwrap();

        let hits = handle.search(&[0.0, 1.0, 0.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.chunk.index).collect();
        assert_eq!(order, vec![1, 3, 0]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(hits[0].distance, 0.0);
    }

    #[tokio::test]
    async fn test_search_with_large_k_returns_all_ranked() {
        let cache = VectorIndexCache::new();
        let handle = cache
            .get_or_build(CacheKey::from_text("resume"), axis_vectors(), chunks(4))
            .await
            .unwrap();

        let hits = handle.search(&[1.0, 0.0, 0.0], 50).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].chunk.index, 0);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_ties_break_by_chunk_index() {
        let cache = VectorIndexCache::new();
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let handle = cache
            .get_or_build(CacheKey::from_text("ties"), vectors, chunks(4))
            .await
            .unwrap();

        let hits = handle.search(&[1.0, 0.0], 4).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.chunk.index).collect();
        assert_eq!(order, vec![0, 2, 1, 3]);
    }

    #[tokio::test]
    async fn test_k_zero_returns_nothing() {
        let cache = VectorIndexCache::new();
        let handle = cache
            .get_or_build(CacheKey::from_text("resume"), axis_vectors(), chunks(4))
            .await
            .unwrap();
        assert!(handle.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_index_searches_empty() {
        let cache = VectorIndexCache::new();
        let handle = cache
            .get_or_build(CacheKey::from_text(""), Vec::new(), Vec::new())
            .await
            .unwrap();
        assert!(handle.is_empty());
        assert!(handle.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_unknown_key_is_lookup_error() {
        let cache = VectorIndexCache::new();
        let key = CacheKey::from_text("never built");
        match cache.search(&key, &[1.0], 3) {
            Err(RetrievalError::CacheLookup(missing)) => assert_eq!(missing, key),
            other => panic!("expected CacheLookup, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_by_key_after_build() {
        let cache = VectorIndexCache::new();
        let key = CacheKey::from_text("resume");
        cache
            .get_or_build(key.clone(), axis_vectors(), chunks(4))
            .await
            .unwrap();
        let hits = cache.search(&key, &[0.0, 0.0, 1.0], 1).unwrap();
        assert_eq!(hits[0].chunk.index, 2);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let cache = VectorIndexCache::new();
        let handle = cache
            .get_or_build(CacheKey::from_text("resume"), axis_vectors(), chunks(4))
            .await
            .unwrap();
        assert!(matches!(
            handle.search(&[1.0, 0.0], 2),
            Err(RetrievalError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_ragged_vectors_are_rejected() {
        let cache = VectorIndexCache::new();
        let result = cache
            .get_or_build(
                CacheKey::from_text("ragged"),
                vec![vec![1.0, 0.0], vec![1.0]],
                chunks(2),
            )
            .await;
        assert!(matches!(result, Err(RetrievalError::InvalidVectors(_))));
        assert_eq!(cache.build_count(), 0);
    }

    #[tokio::test]
    async fn test_vector_chunk_count_mismatch_is_rejected() {
        let cache = VectorIndexCache::new();
        let result = cache
            .get_or_build(CacheKey::from_text("short"), axis_vectors(), chunks(2))
            .await;
        assert!(matches!(result, Err(RetrievalError::InvalidVectors(_))));
    }
}
