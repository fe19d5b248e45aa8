//! Markdown / plain-text converter.
//!
//! Pass-through conversion: the full content is written to `full.md`,
//! headings are parsed into a section list with exact line ranges, and
//! each section is additionally written as `section_<safe_title>.md` so
//! tree leaves can reference individual sections.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::converters::{truncate_chars, Converter, ConverterResult, Section, SAMPLE_MAX_CHARS};
use crate::error::{Error, Result};
use crate::store::write_atomic;

pub struct MarkdownConverter;

fn heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid heading regex"))
}

impl Converter for MarkdownConverter {
    fn convert(&self, path: &Path, output_dir: &Path) -> Result<ConverterResult> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Converter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let lines: Vec<&str> = content.split('\n').collect();
        let sections = extract_sections(&lines);

        let mut output_files = Vec::new();

        let full_path = output_dir.join("full.md");
        write_atomic(&full_path, content.as_bytes())?;
        output_files.push(full_path);

        for section in &sections {
            let section_text = lines[section.line_start..section.line_end].join("\n");
            let section_path = output_dir.join(format!("section_{}.md", safe_title(&section.title)));
            write_atomic(&section_path, section_text.as_bytes())?;
            output_files.push(section_path);
        }

        Ok(ConverterResult {
            text: content,
            sections: Some(sections),
            output_files,
            ..Default::default()
        })
    }

    /// Sample = table of contents built from the headings plus the first
    /// ~2000 characters of content.
    fn get_sample(&self, path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Converter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let lines: Vec<&str> = content.split('\n').collect();
        let sections = extract_sections(&lines);

        let mut toc = vec!["[Table of Contents]".to_string()];
        for section in &sections {
            let indent = "  ".repeat(section.level.saturating_sub(1));
            toc.push(format!("{indent}- {}", section.title));
        }

        let mut preview = truncate_chars(&content, SAMPLE_MAX_CHARS);
        if content.chars().count() > SAMPLE_MAX_CHARS {
            preview.push_str("\n[...truncated]");
        }

        Ok(format!("{}\n\n[Content Preview]\n{preview}", toc.join("\n")))
    }
}

/// Parse `^#{1,6} <title>` headings into a section list. Each section runs
/// from its heading line to the next heading (or end of file).
pub fn extract_sections(lines: &[&str]) -> Vec<Section> {
    let pattern = heading_pattern();

    let headings: Vec<(usize, usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            pattern.captures(line).map(|caps| {
                let level = caps[1].len();
                let title = caps[2].trim().to_string();
                (i, level, title)
            })
        })
        .collect();

    headings
        .iter()
        .enumerate()
        .map(|(idx, (line_start, level, title))| {
            let line_end = headings
                .get(idx + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(lines.len());
            Section {
                title: title.clone(),
                level: *level,
                line_start: *line_start,
                line_end,
            }
        })
        .collect()
}

/// Filesystem-safe slug for a section title: lowercase, alphanumeric runs
/// separated by single underscores, capped at 50 characters.
///
/// Used for both writing `section_*.md` files and resolving tree leaf
/// `content_ref`s, so the two always agree.
pub fn safe_title(title: &str) -> String {
    let mut out = String::new();
    let mut last_was_sep = true;
    for ch in title.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
        if out.len() >= 50 {
            break;
        }
    }
    out.trim_end_matches('_').to_string()
}
