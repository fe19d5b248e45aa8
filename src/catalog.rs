//! The catalog: per-store registry of sources and their metadata.
//!
//! One `catalog.json` per store, rewritten atomically on save. Entries are
//! keyed by source ID; re-adding an existing ID replaces the entry in
//! place so re-ingest is idempotent on catalog length.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::FORMAT_VERSION;
use crate::detect::{Category, FileCard, FileType};
use crate::error::Result;
use crate::links::RelatedSource;
use crate::sample::Approach;
use crate::store::{read_json, write_json_atomic};

/// One registered source with its strategy, artifact paths, and metadata
/// card. `tree_path` and `converted_path` are store-root-relative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub filename: String,
    pub original_path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub category: Category,
    pub size_kb: f64,
    pub strategy: Approach,
    pub tree_path: String,
    pub converted_path: String,
    pub indexed_at: String,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub doc_nature: String,
    #[serde(default)]
    pub sampled: bool,
    /// Cross-source links, attached by the optional linking pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<Vec<RelatedSource>>,
}

/// The persistent registry mapping source IDs to everything known about
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub version: String,
    pub last_updated: String,
    #[serde(default)]
    pub sources: Vec<CatalogEntry>,
}

/// Aggregate view of a catalog, for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSummary {
    pub version: String,
    pub last_updated: String,
    pub total_sources: usize,
    pub by_category: BTreeMap<String, usize>,
    pub sampled_count: usize,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a fresh empty catalog.
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            last_updated: Utc::now().to_rfc3339(),
            sources: Vec::new(),
        }
    }

    /// Load a catalog from disk, or return a fresh one if the file does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_file() {
            read_json(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Save the catalog, refreshing `last_updated` with the current UTC
    /// instant. The write is atomic.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now().to_rfc3339();
        write_json_atomic(path, self)
    }

    /// Add or update a source entry built from a sampled file card.
    ///
    /// An existing entry with the same ID is replaced in place (keeping
    /// its position); otherwise the entry is appended.
    pub fn add_source(
        &mut self,
        card: &FileCard,
        converted_path: String,
        tree_path: String,
    ) -> CatalogEntry {
        let strategy = card.strategy.as_ref();

        let entry = CatalogEntry {
            id: card.id.clone(),
            filename: card.filename.clone(),
            original_path: card.path.to_string_lossy().into_owned(),
            file_type: card.file_type,
            category: card.category,
            size_kb: card.size_kb,
            strategy: strategy
                .map(|s| s.recommended_approach)
                .unwrap_or(Approach::ChunkEmbed),
            tree_path,
            converted_path,
            indexed_at: Utc::now().to_rfc3339(),
            summary: strategy.map(|s| s.summary.clone()).unwrap_or_default(),
            tags: strategy.map(|s| s.tags.clone()).unwrap_or_default(),
            doc_nature: strategy.map(|s| s.doc_nature.clone()).unwrap_or_default(),
            sampled: card.sampled,
            related: None,
        };

        match self.sources.iter_mut().find(|s| s.id == card.id) {
            Some(existing) => *existing = entry.clone(),
            None => self.sources.push(entry.clone()),
        }
        entry
    }

    /// Find a source entry by ID.
    pub fn find(&self, id: &str) -> Option<&CatalogEntry> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Find a source entry by original filename.
    pub fn find_by_filename(&self, filename: &str) -> Option<&CatalogEntry> {
        self.sources.iter().find(|s| s.filename == filename)
    }

    /// Remove a source by ID. Returns `true` if an entry was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        self.sources.len() != before
    }

    /// List sources, optionally filtered by category and/or tag.
    pub fn list(&self, category: Option<Category>, tag: Option<&str>) -> Vec<&CatalogEntry> {
        self.sources
            .iter()
            .filter(|s| category.is_none_or(|c| s.category == c))
            .filter(|s| tag.is_none_or(|t| s.tags.iter().any(|st| st == t)))
            .collect()
    }

    /// Aggregate counts for the `status` command.
    pub fn summary(&self) -> CatalogSummary {
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        for source in &self.sources {
            *by_category.entry(source.category.to_string()).or_default() += 1;
        }
        CatalogSummary {
            version: self.version.clone(),
            last_updated: self.last_updated.clone(),
            total_sources: self.sources.len(),
            by_category,
            sampled_count: self.sources.iter().filter(|s| s.sampled).count(),
        }
    }
}
