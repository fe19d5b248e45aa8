//! Format-specific converters.
//!
//! Each converter extracts structure from one file format and writes the
//! derived artifacts into `converted/<source_id>/`. Converters expose two
//! capabilities, `convert` and `get_sample`; dispatch is by file type with
//! a category fallback. Converter failures are handled by the ingest
//! orchestrator (raw-text fallback), not here.

pub mod markdown;
pub mod pdf;
pub mod xlsx;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect::{Category, FileType};
use crate::error::Result;

/// Maximum characters returned by samples and the raw-text sample fallback.
pub const SAMPLE_MAX_CHARS: usize = 2000;

/// A heading-delimited section of a document-like source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// Heading level, 1..=6.
    pub level: usize,
    /// 0-based line of the heading itself.
    pub line_start: usize,
    /// 0-based exclusive end line (start of the next section).
    pub line_end: usize,
}

/// Per-sheet extraction of a spreadsheet source. Serialized verbatim as
/// `sheet_<name>.json` in the converted directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetInfo {
    pub name: String,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub column_count: usize,
    /// First rows as header → value maps (at most 5).
    pub sample_rows: Vec<BTreeMap<String, serde_json::Value>>,
    /// First-column values of up to 20 rows, used for navigation hints.
    #[serde(default)]
    pub row_labels: Vec<String>,
}

/// Structural output of a converter. The populated optional fields
/// discriminate the shape: `sections` for document-like sources,
/// `pages`/`page_texts` for PDFs, `sheets` for spreadsheets, none for the
/// raw-text fallback.
#[derive(Debug, Clone, Default)]
pub struct ConverterResult {
    /// Full extracted text.
    pub text: String,
    pub sections: Option<Vec<Section>>,
    pub pages: Option<usize>,
    /// `(page_num, text)` pairs, 1-based.
    pub page_texts: Option<Vec<(usize, String)>>,
    pub sheets: Option<Vec<SheetInfo>>,
    /// Paths written under the output directory.
    pub output_files: Vec<PathBuf>,
}

/// Capability set every converter implements.
pub trait Converter: Sync {
    /// Extract structure from `path`, writing derived artifacts into
    /// `output_dir`.
    fn convert(&self, path: &Path, output_dir: &Path) -> Result<ConverterResult>;

    /// Extract a short text sample for the strategist.
    fn get_sample(&self, path: &Path) -> Result<String>;
}

/// Look up the converter for a file type, falling back by category
/// (plain text reuses the markdown converter).
pub fn converter_for(file_type: FileType, category: Category) -> Option<&'static dyn Converter> {
    match file_type {
        FileType::Pdf => Some(&pdf::PdfConverter),
        FileType::Xlsx => Some(&xlsx::XlsxConverter),
        FileType::Markdown => Some(&markdown::MarkdownConverter),
        _ if category == Category::Text => Some(&markdown::MarkdownConverter),
        _ => None,
    }
}

/// Convert a file with its registered converter. Returns `None` when no
/// converter is registered for the type; the orchestrator then applies the
/// raw-text fallback.
pub fn convert_file(
    path: &Path,
    file_type: FileType,
    category: Category,
    output_dir: &Path,
) -> Result<Option<ConverterResult>> {
    match converter_for(file_type, category) {
        Some(converter) => converter.convert(path, output_dir).map(Some),
        None => Ok(None),
    }
}

/// Get a sample for the strategist. Without a registered converter the
/// first [`SAMPLE_MAX_CHARS`] of the file are returned as lossy UTF-8.
pub fn get_sample(path: &Path, file_type: FileType, category: Category) -> String {
    if let Some(converter) = converter_for(file_type, category) {
        if let Ok(sample) = converter.get_sample(path) {
            return sample;
        }
    }
    raw_sample(path)
}

/// Lossy UTF-8 head of a file, used when no converter applies or a
/// converter's sampler fails.
pub fn raw_sample(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            truncate_chars(&text, SAMPLE_MAX_CHARS)
        }
        Err(_) => "[Could not read file content]".to_string(),
    }
}

/// Truncate a string to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
