pub mod catalog;
pub mod config;
pub mod converters;
pub mod detect;
pub mod error;
pub mod ingest;
pub mod links;
pub mod llm;
pub mod logging;
pub mod sample;
pub mod store;
pub mod tree;
pub mod vector;

pub use error::Error;

// Re-export key public types for convenience.
pub use catalog::{Catalog, CatalogEntry, CatalogSummary};
pub use config::Config;
pub use detect::{Category, FileCard, FileType};
pub use ingest::{IngestOptions, IngestReport};
pub use sample::{Approach, Strategy};
pub use tree::{Node, Tree};
pub use vector::SearchHit;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tracing::{debug, info};

use crate::llm::LlmClient;
use crate::vector::embedder::{create_embedder, Embedder};
use crate::vector::index::VectorIndex;

/// Content of one tree node resolved to bytes on disk.
#[derive(Debug, Clone, Serialize)]
pub struct NodeContent {
    pub source_id: String,
    pub node_id: String,
    pub title: String,
    pub summary: String,
    pub content_ref: Option<String>,
    pub content: String,
}

/// One converted file of a source, as returned by [`MetaHub::read_all`].
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub name: String,
    pub content: String,
}

/// All converted content of a source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceContent {
    pub source_id: String,
    pub files: Vec<FileContent>,
    pub total_files: usize,
}

/// Primary library handle for a metahub store.
///
/// Writers (ingest, link) assume exclusive access to the store directory;
/// readers (search, tree navigation, content reads) only need complete
/// files, which every write path guarantees via atomic rename.
pub struct MetaHub {
    config: Config,
    /// Lazily created so read-only operations never require embedding
    /// credentials.
    embedder: OnceLock<Arc<dyn Embedder>>,
    llm: Option<Arc<LlmClient>>,
}

impl MetaHub {
    /// Open a store rooted at the given directory.
    ///
    /// Loads `config.json` and probes for LLM credentials; the collaborator
    /// stays disabled when none are configured.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        Ok(Self::open_with_config(config))
    }

    /// Open a store with an explicit configuration. Useful for testing.
    pub fn open_with_config(config: Config) -> Self {
        let llm = match LlmClient::from_config(&config, config.store_root()) {
            Ok(client) => Some(Arc::new(client)),
            Err(Error::AuthMissing) => {
                debug!("no llm credentials, heuristic strategies only");
                None
            }
            Err(e) => {
                debug!(error = %e, "llm client unavailable");
                None
            }
        };

        Self {
            config,
            embedder: OnceLock::new(),
            llm,
        }
    }

    /// Initialize a new store: create the directory skeleton and write a
    /// default `config.json`.
    pub fn init(root: &Path) -> Result<Config> {
        std::fs::create_dir_all(root)?;
        let config = Config::load(root)?;
        store::bootstrap(&config)?;
        config.save()?;
        info!(root = %root.display(), "store initialized");
        Ok(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store_root(&self) -> &Path {
        self.config.store_root()
    }

    fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        if let Some(embedder) = self.embedder.get() {
            return Ok(Arc::clone(embedder));
        }
        let created: Arc<dyn Embedder> = Arc::from(create_embedder(&self.config)?);
        let _ = self.embedder.set(Arc::clone(&created));
        Ok(created)
    }

    /// Ingest a file or directory into the store.
    pub async fn ingest(&self, input: &Path, options: &IngestOptions) -> Result<IngestReport> {
        let mut catalog = Catalog::load(&self.config.catalog_path())?;
        store::bootstrap(&self.config)?;

        // The embedder is only needed when vectors are updated.
        let embedder = if options.skip_vectors {
            None
        } else {
            Some(self.embedder()?)
        };

        ingest::ingest(
            input,
            &self.config,
            &mut catalog,
            embedder.as_deref(),
            self.llm.as_deref(),
            options,
        )
        .await
    }

    /// Tier-1 search: rank catalog sources by similarity to the query.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let embedder = self.embedder()?;
        let index = VectorIndex::new(self.config.vector_store_path());
        index.search(query, top_k, embedder.as_ref()).await
    }

    /// Load the tree index for a source, or `None` if it has none.
    pub fn get_tree(&self, source_id: &str) -> Result<Option<Tree>> {
        tree::load_tree(&self.config.tree_path(source_id))
    }

    /// Find a node within a source's tree, or `None` if absent.
    pub fn get_node(&self, source_id: &str, node_id: &str) -> Result<Option<Node>> {
        Ok(self
            .get_tree(source_id)?
            .and_then(|tree| tree::find_node(&tree, node_id).cloned()))
    }

    /// Read the content a tree node references, resolving `content_ref`
    /// against the store root. JSON artifacts are pretty-printed when they
    /// parse.
    pub fn read_node(&self, source_id: &str, node_id: &str) -> Result<NodeContent> {
        let tree = self.get_tree(source_id)?.ok_or_else(|| Error::SourceNotFound {
            id: source_id.to_string(),
        })?;
        let node = tree::find_node(&tree, node_id).ok_or_else(|| Error::NodeNotFound {
            source_id: source_id.to_string(),
            node_id: node_id.to_string(),
        })?;

        let content = match node.content_ref.as_deref() {
            Some(content_ref) => {
                let path = self.store_root().join(content_ref);
                if path.is_file() {
                    read_pretty(&path)?
                } else {
                    String::new()
                }
            }
            None => String::new(),
        };

        Ok(NodeContent {
            source_id: source_id.to_string(),
            node_id: node_id.to_string(),
            title: node.title.clone(),
            summary: node.summary.clone(),
            content_ref: node.content_ref.clone(),
            content,
        })
    }

    /// Read any file under the store by store-root-relative path.
    pub fn read_file(&self, relative_path: &str) -> Result<String> {
        let path = self.store_root().join(relative_path);
        if !path.is_file() {
            return Err(Error::StoreFileNotFound(relative_path.to_string()));
        }
        read_pretty(&path)
    }

    /// Read every converted file of a source, sorted by name. Unreadable
    /// files yield a `"(unreadable)"` record instead of failing the call.
    pub fn read_all(&self, source_id: &str) -> Result<SourceContent> {
        let source_dir = self.config.converted_dir_for(source_id);
        if !source_dir.is_dir() {
            return Err(Error::SourceNotFound {
                id: source_id.to_string(),
            });
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&source_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let files: Vec<FileContent> = paths
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let content = match std::fs::read(path) {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(_) => "(unreadable)".to_string(),
                };
                FileContent { name, content }
            })
            .collect();

        Ok(SourceContent {
            source_id: source_id.to_string(),
            total_files: files.len(),
            files,
        })
    }

    /// Human-readable tree pretty-print for a source.
    pub fn tree_summary(&self, source_id: &str) -> Result<Option<String>> {
        Ok(self.get_tree(source_id)?.map(|t| tree::tree_summary(&t)))
    }

    /// Run the cross-source linking pass and persist the updated catalog.
    /// Returns the number of links attached.
    pub async fn link(&self, min_similarity: f64, max_links: usize) -> Result<usize> {
        let mut catalog = Catalog::load(&self.config.catalog_path())?;

        let index = VectorIndex::new(self.config.vector_store_path());
        let embeddings = index.vectors(self.config.embedding.dimensions)?;

        let total = links::link_sources(&mut catalog, &embeddings, min_similarity, max_links);
        catalog.save(&self.config.catalog_path())?;
        Ok(total)
    }

    /// Remove a source from the catalog. Derived artifacts are left for a
    /// separate GC pass.
    pub fn remove_source(&self, source_id: &str) -> Result<bool> {
        let mut catalog = Catalog::load(&self.config.catalog_path())?;
        let removed = catalog.remove(source_id);
        if removed {
            catalog.save(&self.config.catalog_path())?;
        }
        Ok(removed)
    }

    /// Load the current catalog.
    pub fn catalog(&self) -> Result<Catalog> {
        Catalog::load(&self.config.catalog_path())
    }

    /// Aggregate catalog counts for the `status` command.
    pub fn catalog_summary(&self) -> Result<CatalogSummary> {
        Ok(self.catalog()?.summary())
    }
}

/// Read a file as lossy UTF-8; `.json` files are pretty-printed when they
/// parse, returned verbatim otherwise.
fn read_pretty(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    if path.extension().is_some_and(|ext| ext == "json") {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                return Ok(pretty);
            }
        }
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_pretty_formats_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{\"b\":1,\"a\":[2,3]}").unwrap();

        let pretty = read_pretty(&path).unwrap();
        assert!(pretty.contains("\n"));
        assert!(pretty.contains("\"a\""));
    }

    #[test]
    fn read_pretty_passes_through_invalid_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(read_pretty(&path).unwrap(), "{ not json");
    }

    #[test]
    fn read_pretty_leaves_text_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, "{\"looks\": \"like json\"}").unwrap();
        assert_eq!(read_pretty(&path).unwrap(), "{\"looks\": \"like json\"}");
    }

    #[test]
    fn init_creates_layout() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("store");
        MetaHub::init(&root).unwrap();

        assert!(root.join("config.json").is_file());
        assert!(root.join("inbox").is_dir());
        assert!(root.join("converted").is_dir());
        assert!(root.join("tree_index").is_dir());
        assert!(root.join("vector_store").is_dir());
    }
}
