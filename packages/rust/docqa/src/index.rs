//! Flat vector index: embedded chunks persisted as one JSON file.
//!
//! Search is an exhaustive cosine scan, which is plenty for the handful of
//! report files this indexes. The persisted file is trusted local data:
//! loading only checks that it is internally consistent and was built with
//! the expected embedding model.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use rivalscope_providers::Embedder;
use rivalscope_shared::{Result, RivalscopeError};

use crate::chunker::Chunk;

/// File written inside the index directory.
pub const INDEX_FILE: &str = "index.json";

/// Bumped whenever the on-disk layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Header stored alongside the vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub schema_version: u32,
    /// Embedding model that produced every vector.
    pub model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    /// SHA-256 over the indexed chunks, to spot a stale index.
    pub corpus_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// A retrieved chunk and its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    meta: IndexMeta,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed every chunk and assemble the index.
    #[instrument(skip_all, fields(chunks = chunks.len(), model = embedder.model()))]
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RivalscopeError::Index("no document chunks to index".into()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RivalscopeError::Index(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or_default();
        if dimensions == 0 || vectors.iter().any(|v| v.len() != dimensions) {
            return Err(RivalscopeError::Index(
                "embedder returned empty or inconsistent vector sizes".into(),
            ));
        }

        let meta = IndexMeta {
            schema_version: SCHEMA_VERSION,
            model: embedder.model().to_string(),
            dimensions,
            created_at: Utc::now(),
            corpus_hash: corpus_hash(&chunks),
        };
        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect::<Vec<_>>();

        info!(entries = entries.len(), dimensions, "vector index built");
        Ok(Self { meta, entries })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `dir` holds a persisted index.
    pub fn exists(dir: &Path) -> bool {
        dir.join(INDEX_FILE).is_file()
    }

    /// Persist to `dir/index.json`, replacing any previous index atomically.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| RivalscopeError::io(dir, e))?;

        let target = dir.join(INDEX_FILE);
        let temp = dir.join(format!(".{INDEX_FILE}.tmp"));
        let json = serde_json::to_vec(self)
            .map_err(|e| RivalscopeError::Index(format!("serialize index: {e}")))?;

        std::fs::write(&temp, json).map_err(|e| RivalscopeError::io(&temp, e))?;
        std::fs::rename(&temp, &target).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            RivalscopeError::io(&target, e)
        })?;

        info!(path = %target.display(), entries = self.len(), "vector index saved");
        Ok(target)
    }

    /// Load a previously saved index built with `expected_model`.
    pub fn load(dir: &Path, expected_model: &str) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        let content = std::fs::read(&path).map_err(|e| RivalscopeError::io(&path, e))?;
        let index: Self = serde_json::from_slice(&content).map_err(|e| {
            RivalscopeError::Index(format!("{} is not a valid index: {e}", path.display()))
        })?;

        if index.meta.schema_version != SCHEMA_VERSION {
            return Err(RivalscopeError::Index(format!(
                "index schema version {} is not supported (expected {SCHEMA_VERSION}); rebuild it",
                index.meta.schema_version
            )));
        }
        if index.meta.model != expected_model {
            return Err(RivalscopeError::Index(format!(
                "index was built with embedding model '{}' but '{expected_model}' is configured; rebuild it",
                index.meta.model
            )));
        }
        if let Some(entry) = index
            .entries
            .iter()
            .find(|e| e.vector.len() != index.meta.dimensions)
        {
            return Err(RivalscopeError::Index(format!(
                "vector for {} has {} dimensions, index declares {}",
                entry.chunk.source.display(),
                entry.vector.len(),
                index.meta.dimensions
            )));
        }

        info!(path = %path.display(), entries = index.len(), "vector index loaded");
        Ok(index)
    }

    /// The `k` chunks most similar to `query`, best first. Equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>> {
        if query.len() != self.meta.dimensions {
            return Err(RivalscopeError::Index(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.meta.dimensions
            )));
        }

        let mut hits: Vec<SearchHit<'_>> = self
            .entries
            .iter()
            .map(|e| SearchHit {
                chunk: &e.chunk,
                score: cosine_similarity(query, &e.vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Cosine similarity; zero when either vector has zero length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Hex SHA-256 over every chunk's source, row, and text.
pub fn corpus_hash(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.source.to_string_lossy().as_bytes());
        hasher.update(chunk.row.map(|r| r.to_string()).unwrap_or_default().as_bytes());
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::KeywordEmbedder;

    fn chunk(text: &str, source: &str) -> Chunk {
        Chunk {
            text: text.into(),
            source: PathBuf::from(source),
            row: None,
            index: 0,
        }
    }

    async fn sample_index() -> VectorIndex {
        let chunks = vec![
            chunk("audit services", "a.md"),
            chunk("cloud consulting", "b.md"),
            chunk("audit and cloud", "c.md"),
        ];
        VectorIndex::build(chunks, &KeywordEmbedder).await.unwrap()
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let index = sample_index().await;
        assert_eq!(index.meta().dimensions, 2);

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        let sources: Vec<String> = hits.iter().map(|h| h.chunk.source_name()).collect();
        assert_eq!(sources, ["a.md", "c.md"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let chunks = vec![chunk("audit one", "x.md"), chunk("audit two", "y.md")];
        let index = VectorIndex::build(chunks, &KeywordEmbedder).await.unwrap();
        let hits = index.search(&[1.0, 0.0], 5).unwrap();
        let sources: Vec<String> = hits.iter().map(|h| h.chunk.source_name()).collect();
        assert_eq!(sources, ["x.md", "y.md"]);
    }

    #[tokio::test]
    async fn search_rejects_wrong_dimensions() {
        let index = sample_index().await;
        assert!(index.search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("vectorstore").join("db_index");
        let index = sample_index().await;

        assert!(!VectorIndex::exists(&store));
        let path = index.save(&store).unwrap();
        assert_eq!(path, store.join(INDEX_FILE));
        assert!(VectorIndex::exists(&store));

        let loaded = VectorIndex::load(&store, "keyword").unwrap();
        assert_eq!(loaded, index);
    }

    #[tokio::test]
    async fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(INDEX_FILE)).unwrap();

        let err = sample_index().await.save(dir.path()).unwrap_err();
        assert!(matches!(err, RivalscopeError::Io { .. }));
        assert!(!dir.path().join(format!(".{INDEX_FILE}.tmp")).exists());
    }

    #[tokio::test]
    async fn load_rejects_other_model() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().await.save(dir.path()).unwrap();
        let err = VectorIndex::load(dir.path(), "text-embedding-004").unwrap_err();
        assert!(err.to_string().contains("rebuild"));
    }

    #[tokio::test]
    async fn load_rejects_inconsistent_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = sample_index().await;
        index.entries[1].vector.push(0.5);
        index.save(dir.path()).unwrap();
        let err = VectorIndex::load(dir.path(), "keyword").unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "not json").unwrap();
        let err = VectorIndex::load(dir.path(), "keyword").unwrap_err();
        assert!(matches!(err, RivalscopeError::Index(_)));
    }

    #[tokio::test]
    async fn build_rejects_empty_corpus() {
        let err = VectorIndex::build(Vec::new(), &KeywordEmbedder)
            .await
            .unwrap_err();
        assert!(matches!(err, RivalscopeError::Index(_)));
    }

    #[test]
    fn corpus_hash_changes_with_text() {
        let a = corpus_hash(&[chunk("one", "a.md")]);
        let b = corpus_hash(&[chunk("two", "a.md")]);
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
