//! Store filesystem layout and atomic write helpers.
//!
//! Every persistent artifact (catalog, trees, vector metadata, hash index,
//! converted files) goes through `write_atomic` / `write_json_atomic` so a
//! reader never observes a partially written file.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};

/// Write bytes atomically: write to a `.tmp` sibling, fsync, then rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_sibling(path);
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Serialize a value as 2-space-indented JSON with a trailing newline and
/// write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json =
        serde_json::to_string_pretty(value).map_err(|e| Error::Serialization(e.to_string()))?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        Error::Serialization(format!("invalid JSON in {}: {e}", path.display()))
    })
}

/// Create the store directory skeleton (inbox, converted, tree_index,
/// vector_store) under the configured root.
pub fn bootstrap(config: &Config) -> Result<()> {
    for dir in [
        config.inbox_path(),
        config.converted_path(),
        config.tree_index_path(),
        config.vector_store_path(),
    ] {
        fs::create_dir_all(&dir)?;
    }
    Ok(())
}

/// Express `path` relative to the store root using forward slashes.
///
/// All paths recorded in the catalog and in tree `content_ref`s use this
/// form so a store can be moved or mounted elsewhere.
pub fn relative_to_store(path: &Path, store_root: &Path) -> String {
    let rel = path.strip_prefix(store_root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn write_atomic_leaves_no_tmp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        write_atomic(&path, b"{}").unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["out.json"]);
    }

    #[test]
    fn json_roundtrip_has_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        write_json_atomic(&path, &serde_json::json!({"k": 1})).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value["k"], 1);
    }

    #[test]
    fn read_json_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json").unwrap();
        let result: Result<serde_json::Value> = read_json(&path);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/store");
        let path = Path::new("/store/converted/src_ab/full.txt");
        assert_eq!(relative_to_store(path, root), "converted/src_ab/full.txt");
    }

    #[test]
    fn relative_of_outside_path_is_preserved() {
        let root = Path::new("/store");
        let path = Path::new("converted/src_ab/full.md");
        assert_eq!(relative_to_store(path, root), "converted/src_ab/full.md");
    }
}
