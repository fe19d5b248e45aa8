//! ANN index over per-document embeddings.
//!
//! Backed by a usearch HNSW index with cosine metric over unit vectors,
//! persisted as `vector_store/index.bin` plus a parallel ordered
//! `metadata.json`. Both files are written atomically; a length mismatch
//! between them is treated as corruption.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};
use usearch::{Index as AnnIndex, IndexOptions, MetricKind, ScalarKind};

use crate::catalog::CatalogEntry;
use crate::error::{Error, Result};
use crate::store::{read_json, write_atomic, write_json_atomic};
use crate::vector::embedder::{embed_texts, Embedder};
use crate::vector::{build_embed_text, MetaRecord, SearchHit};

const INDEX_FILE: &str = "index.bin";
const METADATA_FILE: &str = "metadata.json";

/// Stats returned by [`VectorIndex::build`].
#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    pub num_vectors: usize,
    pub dimension: usize,
}

/// Stats returned by [`VectorIndex::add`].
#[derive(Debug, Clone, Serialize)]
pub struct AddStats {
    pub num_vectors: usize,
    pub added: usize,
}

/// Handle to the vector store directory of one metahub store.
pub struct VectorIndex {
    dir: PathBuf,
}

impl VectorIndex {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Build the index from scratch: embed every source and rewrite both
    /// files in parallel order.
    pub async fn build(
        &self,
        sources: &[CatalogEntry],
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<BuildStats> {
        let texts: Vec<String> = sources.iter().map(build_embed_text).collect();
        let vectors = embed_texts(embedder, &texts, batch_size).await?;
        let metadata: Vec<MetaRecord> = sources.iter().map(MetaRecord::from).collect();

        let ann = create_ann(embedder.dimensions(), vectors.len())?;
        for (i, vector) in vectors.iter().enumerate() {
            ann.add(i as u64, vector)
                .map_err(|e| Error::Embedding(format!("usearch add: {e}")))?;
        }

        self.persist(&ann, &metadata)?;
        info!(vectors = metadata.len(), "vector index rebuilt");
        Ok(BuildStats {
            num_vectors: metadata.len(),
            dimension: embedder.dimensions(),
        })
    }

    /// Append sources that are not yet present (by ID) to the existing
    /// index, creating it if absent.
    pub async fn add(
        &self,
        sources: &[CatalogEntry],
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<AddStats> {
        let (ann, mut metadata) = match self.load(embedder.dimensions())? {
            Some(loaded) => loaded,
            None => (create_ann(embedder.dimensions(), sources.len())?, Vec::new()),
        };

        let existing_ids: std::collections::HashSet<&str> =
            metadata.iter().map(|m| m.id.as_str()).collect();
        let new_sources: Vec<&CatalogEntry> = sources
            .iter()
            .filter(|s| !existing_ids.contains(s.id.as_str()))
            .collect();

        if new_sources.is_empty() {
            debug!("no new sources to add to vector index");
            return Ok(AddStats {
                num_vectors: metadata.len(),
                added: 0,
            });
        }

        let texts: Vec<String> = new_sources.iter().map(|s| build_embed_text(s)).collect();
        let vectors = embed_texts(embedder, &texts, batch_size).await?;

        ann.reserve(metadata.len() + new_sources.len())
            .map_err(|e| Error::Embedding(format!("usearch reserve: {e}")))?;
        for (offset, vector) in vectors.iter().enumerate() {
            let key = (metadata.len() + offset) as u64;
            ann.add(key, vector)
                .map_err(|e| Error::Embedding(format!("usearch add: {e}")))?;
        }
        metadata.extend(new_sources.iter().map(|s| MetaRecord::from(*s)));

        let added = new_sources.len();
        self.persist(&ann, &metadata)?;
        info!(added, total = metadata.len(), "vector index extended");
        Ok(AddStats {
            num_vectors: metadata.len(),
            added,
        })
    }

    /// Tier-1 search: embed the query and return the top `k` sources by
    /// similarity, ranked from 1. Missing index files yield an empty list.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<SearchHit>> {
        let Some((ann, metadata)) = self.load(embedder.dimensions())? else {
            return Ok(Vec::new());
        };
        if metadata.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vectors = embedder.embed_batch(std::slice::from_ref(&query.to_string())).await?;
        let query_vector = &query_vectors[0];

        let k = top_k.min(metadata.len());
        let matches = ann
            .search(query_vector, k)
            .map_err(|e| Error::Embedding(format!("usearch search: {e}")))?;

        let mut hits = Vec::with_capacity(k);
        for (key, distance) in matches.keys.iter().zip(matches.distances.iter()) {
            let Some(record) = metadata.get(*key as usize) else {
                continue;
            };
            // Cosine distance → similarity.
            let score = 1.0 - distance;
            hits.push(SearchHit {
                id: record.id.clone(),
                filename: record.filename.clone(),
                summary: record.summary.clone(),
                file_type: record.file_type,
                category: record.category,
                tags: record.tags.clone(),
                score,
                rank: hits.len() + 1,
            });
        }

        debug!(query, results = hits.len(), "tier-1 search complete");
        Ok(hits)
    }

    /// Retrieve every stored vector keyed by source ID, for the linking
    /// pass. Returns an empty map when no index exists.
    pub fn vectors(&self, dimensions: usize) -> Result<HashMap<String, Vec<f32>>> {
        let Some((ann, metadata)) = self.load(dimensions)? else {
            return Ok(HashMap::new());
        };

        let mut vectors = HashMap::with_capacity(metadata.len());
        for (i, record) in metadata.iter().enumerate() {
            let mut buffer = vec![0.0f32; dimensions];
            match ann.get(i as u64, &mut buffer) {
                Ok(found) if found > 0 => {
                    vectors.insert(record.id.clone(), buffer);
                }
                _ => continue,
            }
        }
        Ok(vectors)
    }

    /// Load the parallel pair, or `None` when either file is missing.
    fn load(&self, dimensions: usize) -> Result<Option<(AnnIndex, Vec<MetaRecord>)>> {
        let index_path = self.index_path();
        let metadata_path = self.metadata_path();
        if !index_path.is_file() || !metadata_path.is_file() {
            return Ok(None);
        }

        let metadata: Vec<MetaRecord> = read_json(&metadata_path)?;

        let bytes = std::fs::read(&index_path)?;
        let ann = create_ann(dimensions, metadata.len())?;
        ann.load_from_buffer(&bytes)
            .map_err(|e| Error::IndexCorrupted(format!("usearch load: {e}")))?;

        if ann.size() != metadata.len() {
            return Err(Error::IndexCorrupted(format!(
                "metadata length {} != vector count {}",
                metadata.len(),
                ann.size()
            )));
        }

        Ok(Some((ann, metadata)))
    }

    /// Write `index.bin` then `metadata.json`, both atomically.
    fn persist(&self, ann: &AnnIndex, metadata: &[MetaRecord]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let len = ann.serialized_length();
        let mut buffer = vec![0u8; len];
        ann.save_to_buffer(&mut buffer)
            .map_err(|e| Error::Serialization(format!("usearch save: {e}")))?;
        write_atomic(&self.index_path(), &buffer)?;
        write_json_atomic(&self.metadata_path(), &metadata)?;
        Ok(())
    }
}

/// Create an HNSW index sized for `capacity` vectors of the given
/// dimensionality, cosine metric.
fn create_ann(dimensions: usize, capacity: usize) -> Result<AnnIndex> {
    let opts = IndexOptions {
        dimensions,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        connectivity: 16,
        expansion_add: 128,
        expansion_search: 64,
        multi: false,
    };
    let ann = AnnIndex::new(&opts)
        .map_err(|e| Error::Embedding(format!("failed to create ANN index: {e}")))?;
    ann.reserve(capacity.max(1))
        .map_err(|e| Error::Embedding(format!("usearch reserve: {e}")))?;
    Ok(ann)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Category, FileType};
    use crate::sample::Approach;
    use crate::vector::embedder::MockEmbedder;
    use tempfile::TempDir;

    const DIMS: usize = 256;

    fn entry(id: &str, filename: &str, summary: &str, tags: &[&str]) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            filename: filename.to_string(),
            original_path: format!("/inbox/{filename}"),
            file_type: FileType::Markdown,
            category: Category::Text,
            size_kb: 1.0,
            strategy: Approach::TreeIndex,
            tree_path: String::new(),
            converted_path: String::new(),
            indexed_at: String::new(),
            summary: summary.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            doc_nature: String::new(),
            sampled: true,
            related: None,
        }
    }

    fn corpus() -> Vec<CatalogEntry> {
        vec![
            entry(
                "src_aaaa000000",
                "annual_report.pdf",
                "FY2025 annual report covering revenue, expenses, and guidance",
                &["finance", "annual"],
            ),
            entry(
                "src_bbbb000000",
                "q3_sales.xlsx",
                "Q3 2025 sales data broken down by region and product",
                &["sales", "regional"],
            ),
            entry(
                "src_cccc000000",
                "api_docs.md",
                "REST API documentation for the user management service",
                &["api", "docs"],
            ),
        ]
    }

    #[tokio::test]
    async fn build_writes_parallel_files() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::new(dir.path().join("vector_store"));
        let embedder = MockEmbedder::new(DIMS);

        let stats = index.build(&corpus(), &embedder, 8).await.unwrap();
        assert_eq!(stats.num_vectors, 3);
        assert_eq!(stats.dimension, DIMS);
        assert!(dir.path().join("vector_store/index.bin").is_file());
        assert!(dir.path().join("vector_store/metadata.json").is_file());

        let metadata: Vec<MetaRecord> =
            read_json(&dir.path().join("vector_store/metadata.json")).unwrap();
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata[0].id, "src_aaaa000000");
    }

    #[tokio::test]
    async fn search_missing_index_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::new(dir.path().join("vector_store"));
        let embedder = MockEmbedder::new(DIMS);

        let hits = index.search("anything", 5, &embedder).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_ranks_by_relevance() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::new(dir.path().join("vector_store"));
        let embedder = MockEmbedder::new(DIMS);
        index.build(&corpus(), &embedder, 8).await.unwrap();

        let hits = index
            .search("annual financial report revenue", 1, &embedder)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "src_aaaa000000");
        assert_eq!(hits[0].rank, 1);

        let hits = index
            .search("REST API user management endpoints", 1, &embedder)
            .await
            .unwrap();
        assert_eq!(hits[0].id, "src_cccc000000");
    }

    #[tokio::test]
    async fn search_scores_non_increasing_ranks_contiguous() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::new(dir.path().join("vector_store"));
        let embedder = MockEmbedder::new(DIMS);
        index.build(&corpus(), &embedder, 8).await.unwrap();

        let hits = index.search("sales report data", 10, &embedder).await.unwrap();
        assert_eq!(hits.len(), 3, "k is clamped to ntotal");
        for window in hits.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
        for (i, hit) in hits.iter().enumerate() {
            assert_eq!(hit.rank, i + 1);
        }
    }

    #[tokio::test]
    async fn add_skips_existing_ids() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::new(dir.path().join("vector_store"));
        let embedder = MockEmbedder::new(DIMS);

        let sources = corpus();
        index.build(&sources[..2], &embedder, 8).await.unwrap();

        let stats = index.add(&sources, &embedder, 8).await.unwrap();
        assert_eq!(stats.added, 1);
        assert_eq!(stats.num_vectors, 3);

        // Adding again is a no-op.
        let stats = index.add(&sources, &embedder, 8).await.unwrap();
        assert_eq!(stats.added, 0);
        assert_eq!(stats.num_vectors, 3);
    }

    #[tokio::test]
    async fn add_creates_index_when_missing() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::new(dir.path().join("vector_store"));
        let embedder = MockEmbedder::new(DIMS);

        let stats = index.add(&corpus(), &embedder, 8).await.unwrap();
        assert_eq!(stats.added, 3);

        let hits = index.search("sales", 2, &embedder).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn corrupted_metadata_length_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store_dir = dir.path().join("vector_store");
        let index = VectorIndex::new(store_dir.clone());
        let embedder = MockEmbedder::new(DIMS);
        index.build(&corpus(), &embedder, 8).await.unwrap();

        // Truncate the metadata array behind the index's back.
        let metadata: Vec<MetaRecord> = read_json(&store_dir.join("metadata.json")).unwrap();
        write_json_atomic(&store_dir.join("metadata.json"), &metadata[..1].to_vec()).unwrap();

        let result = index.search("anything", 1, &embedder).await;
        assert!(matches!(result, Err(Error::IndexCorrupted(_))));
    }

    #[tokio::test]
    async fn vectors_returns_unit_vectors_by_id() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::new(dir.path().join("vector_store"));
        let embedder = MockEmbedder::new(DIMS);
        index.build(&corpus(), &embedder, 8).await.unwrap();

        let vectors = index.vectors(DIMS).unwrap();
        assert_eq!(vectors.len(), 3);
        let v = &vectors["src_aaaa000000"];
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn build_empty_corpus() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::new(dir.path().join("vector_store"));
        let embedder = MockEmbedder::new(DIMS);

        let stats = index.build(&[], &embedder, 8).await.unwrap();
        assert_eq!(stats.num_vectors, 0);

        let hits = index.search("anything", 5, &embedder).await.unwrap();
        assert!(hits.is_empty());
    }
}
