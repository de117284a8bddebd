//! In-memory keyword-overlap retrieval index
//!
//! Stands in for an external vector database so the full pipeline can run
//! self-contained. Scoring is lexical: the fraction of query words present
//! in a chunk. Good enough for tests and demos, not a semantic search.

use crate::RetrievalProvider;
use async_trait::async_trait;
use mathwiz_core::{DocumentChunk, MathWizResult, RetrievedPassage};
use std::collections::HashSet;
use std::sync::RwLock;

/// Thread-safe in-memory retrieval index.
#[derive(Debug, Default)]
pub struct InMemoryRetrievalIndex {
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl InMemoryRetrievalIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks currently indexed.
    pub fn len(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lower-cased word set of a text, split on non-alphanumeric characters.
fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl RetrievalProvider for InMemoryRetrievalIndex {
    async fn query(&self, text: &str, n: usize) -> MathWizResult<Vec<RetrievedPassage>> {
        let query_words = word_set(text);
        if query_words.is_empty() || n == 0 {
            return Ok(Vec::new());
        }

        let chunks = self
            .chunks
            .read()
            .map_err(|_| mathwiz_core::RetrievalError::QueryFailed {
                reason: "index lock poisoned".to_string(),
            })?;

        let mut scored: Vec<(f32, &DocumentChunk)> = chunks
            .iter()
            .filter_map(|chunk| {
                let overlap = word_set(&chunk.text)
                    .intersection(&query_words)
                    .count();
                if overlap == 0 {
                    return None;
                }
                // Distance in [0, 1); 0 means every query word appears
                let distance = 1.0 - overlap as f32 / query_words.len() as f32;
                Some((distance, chunk))
            })
            .collect();

        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id))
        });

        Ok(scored
            .into_iter()
            .take(n)
            .map(|(distance, chunk)| {
                RetrievedPassage::new(&chunk.text, distance)
                    .with_metadata(chunk.metadata.clone())
            })
            .collect())
    }

    async fn add(&self, chunks: &[DocumentChunk]) -> MathWizResult<Vec<String>> {
        let mut stored = self
            .chunks
            .write()
            .map_err(|_| mathwiz_core::RetrievalError::AddFailed {
                reason: "index lock poisoned".to_string(),
            })?;
        let ids = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        stored.extend_from_slice(chunks);
        Ok(ids)
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Queries return at most `n` passages, sorted by ascending distance,
        /// with every distance in [0, 1].
        #[test]
        fn prop_query_bounded_and_sorted(
            texts in proptest::collection::vec("[a-z ]{1,40}", 0..20),
            query in "[a-z ]{1,20}",
            n in 0usize..10,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(async {
                let index = InMemoryRetrievalIndex::new();
                let chunks: Vec<DocumentChunk> = texts
                    .iter()
                    .enumerate()
                    .map(|(i, t)| DocumentChunk::new("doc", i, t))
                    .collect();
                index.add(&chunks).await.unwrap();

                let results = index.query(&query, n).await.unwrap();
                assert!(results.len() <= n);
                for pair in results.windows(2) {
                    assert!(pair[0].distance <= pair[1].distance);
                }
                for passage in &results {
                    assert!((0.0..=1.0).contains(&passage.distance));
                }
            });
        }
    }
}
