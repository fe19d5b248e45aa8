//! Cross-document vector index.
//!
//! One embedding per catalog source, derived from its metadata card. The
//! ANN structure lives in `vector_store/index.bin` with a parallel
//! `metadata.json`: the `i`-th vector corresponds to `metadata[i]`.

pub mod embedder;
pub mod index;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::detect::{Category, FileType};

/// Metadata record bound to one vector by position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaRecord {
    pub id: String,
    pub filename: String,
    pub summary: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl From<&CatalogEntry> for MetaRecord {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            filename: entry.filename.clone(),
            summary: entry.summary.clone(),
            file_type: entry.file_type,
            category: entry.category,
            tags: entry.tags.clone(),
        }
    }
}

/// One Tier-1 search result, ranked by similarity.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub filename: String,
    pub summary: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub category: Category,
    pub tags: Vec<String>,
    /// Inner product of unit vectors, i.e. cosine similarity.
    pub score: f32,
    /// 1-based, contiguous.
    pub rank: usize,
}

/// Build the text embedded for a catalog entry: filename, doc nature,
/// summary, tags, and type, joined with `". "`. The summary carries most
/// of the semantic signal.
pub fn build_embed_text(entry: &CatalogEntry) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !entry.filename.is_empty() {
        parts.push(entry.filename.clone());
    }
    if !entry.doc_nature.is_empty() {
        parts.push(entry.doc_nature.replace('_', " "));
    }
    if !entry.summary.is_empty() {
        parts.push(entry.summary.clone());
    }
    if !entry.tags.is_empty() {
        parts.push(format!("Tags: {}", entry.tags.join(", ")));
    }
    parts.push(format!("Type: {} ({})", entry.file_type, entry.category));

    parts.join(". ")
}

/// Normalize a vector to unit L2 norm in place. Zero vectors are left
/// unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two vectors of equal dimension.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
