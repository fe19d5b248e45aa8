//! Ingest orchestration.
//!
//! Drives detect → sample → convert → catalog → tree per file, then saves
//! the catalog and updates the vector index once at the end. A single file
//! never aborts the batch: converter and LLM failures degrade to
//! deterministic fallbacks, unsupported types are counted and skipped.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogEntry};
use crate::config::Config;
use crate::converters::{self, ConverterResult};
use crate::detect::{detect_directory, detect_file, Category};
use crate::error::{Error, Result};
use crate::llm::LlmClient;
use crate::sample::sample_file;
use crate::store::{read_json, relative_to_store, write_atomic, write_json_atomic};
use crate::tree::build_tree_for_source;
use crate::vector::embedder::Embedder;
use crate::vector::index::VectorIndex;

/// Options controlling a batch ingest.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Skip the vector index update at the end.
    pub skip_vectors: bool,
    /// Compare content hashes against `hash_index.json` and skip files
    /// whose content has not changed since the last ingest.
    pub incremental: bool,
}

/// Result of a batch ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Files that made it into the catalog.
    pub processed: usize,
    /// Files skipped (unsupported type, detection failure, or unchanged).
    pub skipped: usize,
    /// Fatal failures (vector index update).
    pub failed: usize,
    /// Source IDs processed in input order.
    pub source_ids: Vec<String>,
    /// Total vectors in the index after the update, when it ran.
    pub vectors_total: Option<usize>,
}

/// Outcome of ingesting one file.
enum IngestOutcome {
    Processed(Box<CatalogEntry>),
    Skipped,
}

/// Run the full ingest pipeline on a file or directory.
pub async fn ingest(
    input: &Path,
    config: &Config,
    catalog: &mut Catalog,
    embedder: Option<&dyn Embedder>,
    llm: Option<&LlmClient>,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let files: Vec<PathBuf> = if input.is_file() {
        vec![input.to_path_buf()]
    } else if input.is_dir() {
        detect_directory(input)?.into_iter().map(|c| c.path).collect()
    } else {
        return Err(Error::InputNotFound {
            path: input.to_path_buf(),
        });
    };

    info!(store = %config.store_root().display(), files = files.len(), "ingest starting");

    let mut report = IngestReport {
        processed: 0,
        skipped: 0,
        failed: 0,
        source_ids: Vec::new(),
        vectors_total: None,
    };

    // Incremental mode: hash every input and drop the unchanged ones.
    // Changed files lose their old catalog entry before re-ingest.
    let mut hash_index = load_hash_index(&config.hash_index_path())?;
    let mut changed_or_removed = 0usize;
    let mut to_process: Vec<PathBuf> = Vec::new();
    let mut new_hashes: Vec<(String, String)> = Vec::new();

    for file in files {
        let path_key = file.to_string_lossy().into_owned();
        let current_hash = match compute_file_hash(&file) {
            Ok(h) => h,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "could not hash file");
                report.skipped += 1;
                continue;
            }
        };

        if options.incremental {
            match hash_index.get(&path_key) {
                Some(stored) if *stored == current_hash => {
                    debug!(path = %file.display(), "unchanged, skipping");
                    report.skipped += 1;
                    continue;
                }
                Some(_) => {
                    // Content changed: retire the old entry so the new
                    // source ID replaces it cleanly.
                    let old_ids: Vec<String> = catalog
                        .sources
                        .iter()
                        .filter(|s| s.original_path == path_key)
                        .map(|s| s.id.clone())
                        .collect();
                    for id in old_ids {
                        catalog.remove(&id);
                        changed_or_removed += 1;
                    }
                }
                None => {}
            }
        }

        new_hashes.push((path_key, current_hash));
        to_process.push(file);
    }

    for file in &to_process {
        match ingest_one(file, config, catalog, llm).await {
            IngestOutcome::Processed(entry) => {
                report.processed += 1;
                report.source_ids.push(entry.id);
            }
            IngestOutcome::Skipped => report.skipped += 1,
        }
    }

    catalog.save(&config.catalog_path())?;
    debug!(sources = catalog.sources.len(), "catalog saved");

    // The hash index records every file we just (re)ingested.
    if !new_hashes.is_empty() {
        for (path, hash) in new_hashes {
            hash_index.insert(path, hash);
        }
        save_hash_index(&config.hash_index_path(), &hash_index)?;
    }

    // Vector index update: exactly once, after all tree writes and the
    // catalog save. Incremental ingests without retired entries only need
    // an append; anything else gets a full rebuild.
    if !options.skip_vectors && report.processed > 0 {
        if let Some(embedder) = embedder {
            let index = VectorIndex::new(config.vector_store_path());
            let result = if options.incremental && changed_or_removed == 0 {
                index
                    .add(&catalog.sources, embedder, config.embedding.batch_size)
                    .await
                    .map(|stats| stats.num_vectors)
            } else {
                index
                    .build(&catalog.sources, embedder, config.embedding.batch_size)
                    .await
                    .map(|stats| stats.num_vectors)
            };
            match result {
                Ok(total) => report.vectors_total = Some(total),
                Err(e) => {
                    warn!(error = %e, "vector index update failed");
                    report.failed += 1;
                }
            }
        }
    }

    info!(
        processed = report.processed,
        skipped = report.skipped,
        failed = report.failed,
        "ingest complete"
    );
    Ok(report)
}

/// Ingest a single file through the per-file pipeline.
async fn ingest_one(
    path: &Path,
    config: &Config,
    catalog: &mut Catalog,
    llm: Option<&LlmClient>,
) -> IngestOutcome {
    let mut card = match detect_file(path) {
        Ok(card) => card,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "detection failed");
            return IngestOutcome::Skipped;
        }
    };

    if matches!(
        card.category,
        Category::Archive | Category::Image | Category::Unknown
    ) {
        debug!(path = %path.display(), file_type = %card.file_type, "unsupported type, skipping");
        return IngestOutcome::Skipped;
    }

    sample_file(&mut card, llm).await;

    let output_dir = config.converted_dir_for(&card.id);
    let converter_result = match converters::convert_file(
        &card.path,
        card.file_type,
        card.category,
        &output_dir,
    ) {
        Ok(Some(result)) => Some(result),
        Ok(None) => {
            debug!(path = %path.display(), "no converter registered, raw-text fallback");
            raw_text_fallback(&card.path, &output_dir)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "converter failed, raw-text fallback");
            raw_text_fallback(&card.path, &output_dir)
        }
    };

    if let Some(ref result) = converter_result {
        card.pages = result.pages;
        card.sheets = result.sheets.as_ref().map(Vec::len);
    }

    let entry = catalog.add_source(
        &card,
        relative_to_store(&output_dir, config.store_root()),
        relative_to_store(&config.tree_path(&card.id), config.store_root()),
    );

    match build_tree_for_source(&entry, config, converter_result.as_ref(), llm).await {
        Ok(tree) => debug!(source = %entry.id, nodes = tree.node_count(), "tree built"),
        Err(e) => warn!(source = %entry.id, error = %e, "tree build failed"),
    }

    IngestOutcome::Processed(Box::new(entry))
}

/// Fallback conversion: the whole file decoded as lossy UTF-8, written to
/// `full.txt`.
fn raw_text_fallback(path: &Path, output_dir: &Path) -> Option<ConverterResult> {
    let bytes = std::fs::read(path).ok()?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let full_path = output_dir.join("full.txt");
    write_atomic(&full_path, text.as_bytes()).ok()?;
    Some(ConverterResult {
        text,
        output_files: vec![full_path],
        ..Default::default()
    })
}

/// SHA-256 of file contents, streamed in 8 KiB chunks.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Load `hash_index.json`, or an empty map when absent.
pub fn load_hash_index(path: &Path) -> Result<HashMap<String, String>> {
    if path.is_file() {
        read_json(path)
    } else {
        Ok(HashMap::new())
    }
}

/// Persist the hash index atomically.
pub fn save_hash_index(path: &Path, hash_index: &HashMap<String, String>) -> Result<()> {
    write_json_atomic(path, hash_index)
}
