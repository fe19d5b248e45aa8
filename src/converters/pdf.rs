//! PDF → text converter.
//!
//! Extracts text per page with `lopdf`, falling back to whole-document
//! extraction via `pdf-extract` (with form feeds marking page breaks) for
//! documents lopdf cannot read. Persists `full.txt` plus `pages_S-E.txt`
//! chunks of five pages for tree leaf references.

use std::path::Path;

use crate::converters::{truncate_chars, Converter, ConverterResult, SAMPLE_MAX_CHARS};
use crate::error::{Error, Result};
use crate::store::write_atomic;

/// Pages per `pages_S-E.txt` chunk (and per tree leaf).
pub const PAGE_CHUNK_SIZE: usize = 5;

/// Pages included in the strategist sample.
const SAMPLE_MAX_PAGES: usize = 2;

pub struct PdfConverter;

impl Converter for PdfConverter {
    fn convert(&self, path: &Path, output_dir: &Path) -> Result<ConverterResult> {
        let page_texts = extract_pages(path)?;
        let num_pages = page_texts.len();

        let full_text = page_texts
            .iter()
            .map(|(page_num, text)| format!("--- PAGE {page_num} ---\n{text}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut output_files = Vec::new();

        let full_path = output_dir.join("full.txt");
        write_atomic(&full_path, full_text.as_bytes())?;
        output_files.push(full_path);

        for chunk in page_texts.chunks(PAGE_CHUNK_SIZE) {
            let start = chunk[0].0;
            let end = chunk[chunk.len() - 1].0;
            let chunk_text = chunk
                .iter()
                .map(|(page_num, text)| format!("--- PAGE {page_num} ---\n{text}"))
                .collect::<Vec<_>>()
                .join("\n\n");
            let chunk_path = output_dir.join(format!("pages_{start}-{end}.txt"));
            write_atomic(&chunk_path, chunk_text.as_bytes())?;
            output_files.push(chunk_path);
        }

        Ok(ConverterResult {
            text: full_text,
            pages: Some(num_pages),
            page_texts: Some(page_texts),
            output_files,
            ..Default::default()
        })
    }

    /// Sample = first two pages, capped at ~2000 characters.
    fn get_sample(&self, path: &Path) -> Result<String> {
        let page_texts = extract_pages(path)?;

        let mut parts = Vec::new();
        let mut total_chars = 0usize;
        for (page_num, text) in page_texts.iter().take(SAMPLE_MAX_PAGES) {
            parts.push(format!("[Page {page_num}]\n{text}"));
            total_chars += text.chars().count();
            if total_chars >= SAMPLE_MAX_CHARS {
                break;
            }
        }

        let sample = parts.join("\n\n");
        if sample.chars().count() > SAMPLE_MAX_CHARS {
            let mut truncated = truncate_chars(&sample, SAMPLE_MAX_CHARS);
            truncated.push_str("\n[...truncated]");
            return Ok(truncated);
        }
        Ok(sample)
    }
}

/// Extract per-page text as 1-based `(page_num, text)` pairs.
///
/// lopdf gives true page boundaries; when it cannot read the document (or
/// finds no text at all) the whole document is extracted with
/// `pdf-extract` and split on its form-feed page separators. A document
/// with no extractable text yields zero pages.
fn extract_pages(path: &Path) -> Result<Vec<(usize, String)>> {
    if let Ok(doc) = lopdf::Document::load(path) {
        let page_numbers: Vec<u32> = doc.get_pages().keys().cloned().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());
        let mut any_text = false;
        for &num in &page_numbers {
            let text = doc
                .extract_text(&[num])
                .unwrap_or_default()
                .trim_matches('\n')
                .to_string();
            if !text.trim().is_empty() {
                any_text = true;
            }
            pages.push((num as usize, text));
        }
        if any_text {
            return Ok(pages);
        }
    }

    let bytes = std::fs::read(path)?;
    let raw = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| Error::Converter {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(split_pages(&raw))
}

/// Split extracted text into pages on form-feed boundaries. A document
/// with no extractable text at all yields zero pages.
fn split_pages(raw: &str) -> Vec<(usize, String)> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split('\u{0C}')
        .enumerate()
        .map(|(i, text)| (i + 1, text.trim_matches('\n').to_string()))
        .collect()
}
