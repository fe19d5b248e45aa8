//! Per-source hierarchical tree indexes.
//!
//! A tree maps one source to a navigable hierarchy whose leaves reference
//! converted content fragments on disk. Trees are built from converter
//! output by shape-specific heuristics (document, schema, symbol), with an
//! optional LLM-generated variant that falls back to the heuristics on any
//! validation failure.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::CatalogEntry;
use crate::config::Config;
use crate::converters::markdown::{extract_sections, safe_title};
use crate::converters::pdf::PAGE_CHUNK_SIZE;
use crate::converters::xlsx::{safe_sheet_name, sheet_hint};
use crate::converters::{ConverterResult, Section, SheetInfo};
use crate::detect::Category;
use crate::error::Result;
use crate::llm::LlmClient;
use crate::sample::Approach;
use crate::store::{read_json, relative_to_store, write_json_atomic};

/// A node in a source tree. Leaves may carry a store-root-relative
/// `content_ref`; schema-tree nodes additionally retain headers and row
/// labels for navigation hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    pub title: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_labels: Vec<String>,
}

impl Node {
    fn new(node_id: String, title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            node_id,
            title: title.into(),
            summary: summary.into(),
            hint: None,
            preview: None,
            children: Vec::new(),
            content_ref: None,
            headers: Vec::new(),
            row_labels: Vec::new(),
        }
    }
}

/// A complete per-source tree index, persisted as
/// `tree_index/<source_id>.tree.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub id: String,
    pub root: Node,
}

impl Tree {
    /// Total node count including the root.
    pub fn node_count(&self) -> usize {
        fn count(node: &Node) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }
}

/// Build the tree index for a source and write it to
/// `tree_index/<id>.tree.json`.
///
/// With an LLM configured a single generation request is attempted first;
/// any failure degrades to the deterministic heuristic. The write is
/// atomic.
pub async fn build_tree_for_source(
    entry: &CatalogEntry,
    config: &Config,
    converter_result: Option<&ConverterResult>,
    llm: Option<&LlmClient>,
) -> Result<Tree> {
    let source_dir = config.converted_dir_for(&entry.id);

    // Re-read structure from converted artifacts when the caller has no
    // in-memory converter result (e.g. rebuilding a tree later).
    let reread;
    let result = match converter_result {
        Some(r) => Some(r),
        None if source_dir.is_dir() => {
            reread = read_converted_structure(&source_dir);
            Some(&reread)
        }
        None => None,
    };

    let tree = match llm {
        Some(client) => match build_tree_with_llm(entry, config, &source_dir, client).await {
            Ok(tree) => tree,
            Err(e) => {
                warn!(source = %entry.id, error = %e, "llm tree generation failed, using heuristic");
                build_tree_heuristic(entry, config, &source_dir, result)
            }
        },
        None => build_tree_heuristic(entry, config, &source_dir, result),
    };

    let tree_path = config.tree_path(&entry.id);
    write_json_atomic(&tree_path, &tree)?;
    debug!(source = %entry.id, nodes = tree.node_count(), "tree written");
    Ok(tree)
}

/// Load a tree index from disk, or `None` if no tree exists.
pub fn load_tree(path: &Path) -> Result<Option<Tree>> {
    if path.is_file() {
        read_json(path).map(Some)
    } else {
        Ok(None)
    }
}

/// Depth-first search for a node by ID.
pub fn find_node<'a>(tree: &'a Tree, node_id: &str) -> Option<&'a Node> {
    fn search<'a>(node: &'a Node, node_id: &str) -> Option<&'a Node> {
        if node.node_id == node_id {
            return Some(node);
        }
        node.children.iter().find_map(|c| search(c, node_id))
    }
    search(&tree.root, node_id)
}

/// Flat indented pretty-print of a tree for agent reasoning:
/// `[node_id] title  → content_ref` lines with one-line summaries for
/// non-root nodes.
pub fn tree_summary(tree: &Tree) -> String {
    let mut lines = vec![
        format!("Source: {}", tree.id),
        format!("Title: {}", tree.root.title),
        format!("Summary: {}", tree.root.summary),
        String::new(),
        "Tree Structure:".to_string(),
    ];

    fn walk(node: &Node, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        let mut line = format!("{indent}[{}] {}", node.node_id, node.title);
        if let Some(ref content_ref) = node.content_ref {
            line.push_str(&format!("  → {content_ref}"));
        }
        lines.push(line);

        if depth > 0 && !node.summary.is_empty() {
            let short: String = node.summary.chars().take(100).collect();
            lines.push(format!("{indent}     {short}"));
        }

        for child in &node.children {
            walk(child, depth + 1, lines);
        }
    }

    walk(&tree.root, 0, &mut lines);
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Heuristic builders
// ---------------------------------------------------------------------------

fn build_tree_heuristic(
    entry: &CatalogEntry,
    config: &Config,
    source_dir: &Path,
    result: Option<&ConverterResult>,
) -> Tree {
    match (entry.strategy, entry.category) {
        (Approach::SchemaIndex, _) | (_, Category::Spreadsheet) => {
            build_schema_tree(entry, config, source_dir, result)
        }
        (Approach::SymbolIndex, _) | (_, Category::Code) => {
            build_symbol_tree(entry, config, source_dir)
        }
        _ => build_document_tree(entry, config, source_dir, result),
    }
}

/// Tree for document-like sources: heading hierarchy when sections are
/// known, page chunks for PDFs, otherwise one leaf per converted file.
fn build_document_tree(
    entry: &CatalogEntry,
    config: &Config,
    source_dir: &Path,
    result: Option<&ConverterResult>,
) -> Tree {
    let summary = if entry.summary.is_empty() {
        format!("File: {}", entry.filename)
    } else {
        entry.summary.clone()
    };

    let children = match result {
        Some(r) if r.sections.as_ref().is_some_and(|s| !s.is_empty()) => {
            sections_to_nodes(r.sections.as_deref().unwrap_or_default(), config, source_dir)
        }
        Some(r) if r.page_texts.as_ref().is_some_and(|p| !p.is_empty()) => {
            pages_to_nodes(r.page_texts.as_deref().unwrap_or_default(), config, source_dir)
        }
        _ if source_dir.is_dir() => files_to_nodes(config, source_dir),
        _ => Vec::new(),
    };

    Tree {
        id: entry.id.clone(),
        root: Node {
            children,
            ..Node::new("n0".to_string(), entry.filename.clone(), summary)
        },
    }
}

/// Convert heading sections into a hierarchy. A stack of `(level, path)`
/// pairs tracks the current ancestry: each new section pops entries with
/// an equal or deeper level, then attaches under the surviving top (or the
/// root). Node IDs follow section order.
fn sections_to_nodes(sections: &[Section], config: &Config, source_dir: &Path) -> Vec<Node> {
    let mut roots: Vec<Node> = Vec::new();
    // Stack of (level, index-path into `roots`).
    let mut stack: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut counter = 0usize;

    for section in sections {
        counter += 1;
        let mut node = Node::new(
            format!("n{counter}"),
            section.title.clone(),
            format!(
                "Section: {} (lines {}-{})",
                section.title, section.line_start, section.line_end
            ),
        );

        let candidate = source_dir.join(format!("section_{}.md", safe_title(&section.title)));
        if candidate.is_file() {
            node.content_ref = Some(relative_to_store(&candidate, config.store_root()));
        }

        while stack.last().is_some_and(|(level, _)| *level >= section.level) {
            stack.pop();
        }

        let path = match stack.last() {
            Some((_, parent_path)) => {
                let parent = node_at_path_mut(&mut roots, parent_path);
                parent.children.push(node);
                let mut path = parent_path.clone();
                path.push(parent.children.len() - 1);
                path
            }
            None => {
                roots.push(node);
                vec![roots.len() - 1]
            }
        };
        stack.push((section.level, path));
    }

    roots
}

fn node_at_path_mut<'a>(roots: &'a mut Vec<Node>, path: &[usize]) -> &'a mut Node {
    let mut node = &mut roots[path[0]];
    for &idx in &path[1..] {
        node = &mut node.children[idx];
    }
    node
}

/// Group PDF pages into leaves of [`PAGE_CHUNK_SIZE`] pages each, titled
/// `"Pages S-E"` and summarized by joined page previews.
fn pages_to_nodes(
    page_texts: &[(usize, String)],
    config: &Config,
    source_dir: &Path,
) -> Vec<Node> {
    page_texts
        .chunks(PAGE_CHUNK_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let start = chunk[0].0;
            let end = chunk[chunk.len() - 1].0;

            let preview_parts: Vec<String> = chunk
                .iter()
                .filter_map(|(_, text)| {
                    let snippet: String =
                        text.chars().take(100).collect::<String>().replace('\n', " ");
                    let snippet = snippet.trim().to_string();
                    (!snippet.is_empty()).then_some(snippet)
                })
                .collect();
            let preview: String = preview_parts.join("; ").chars().take(200).collect();
            let summary = if preview.is_empty() {
                format!("Pages {start} to {end}")
            } else {
                preview
            };

            let mut node = Node::new(format!("n{}", i + 1), format!("Pages {start}-{end}"), summary);
            let candidate = source_dir.join(format!("pages_{start}-{end}.txt"));
            if candidate.is_file() {
                node.content_ref = Some(relative_to_store(&candidate, config.store_root()));
            }
            node
        })
        .collect()
}

/// One leaf per converted file, skipping the `full.*` artifacts, in sorted
/// order.
fn files_to_nodes(config: &Config, source_dir: &Path) -> Vec<Node> {
    let mut files: Vec<std::path::PathBuf> = std::fs::read_dir(source_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default();
    files.sort();

    files
        .iter()
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().into_owned());
            !matches!(name.as_deref(), Some("full.txt") | Some("full.md"))
        })
        .enumerate()
        .map(|(i, path)| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let title = title_case(&stem.replace('_', " "));

            let mut node = Node::new(format!("n{}", i + 1), title, format!("Content from {name}"));
            node.content_ref = Some(relative_to_store(path, config.store_root()));
            node
        })
        .collect()
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tree for tabular sources: one child per sheet carrying headers, row
/// labels, a navigation hint, and a preview of the first sample row.
fn build_schema_tree(
    entry: &CatalogEntry,
    config: &Config,
    source_dir: &Path,
    result: Option<&ConverterResult>,
) -> Tree {
    let base_summary = if entry.summary.is_empty() {
        format!("Spreadsheet: {}", entry.filename)
    } else {
        entry.summary.clone()
    };

    let sheets = result.and_then(|r| r.sheets.as_deref());

    let children = match sheets {
        Some(sheets) => sheets
            .iter()
            .enumerate()
            .map(|(i, sheet)| sheet_to_node(i, sheet, config, source_dir))
            .collect(),
        None if source_dir.is_dir() => files_to_nodes(config, source_dir),
        None => Vec::new(),
    };

    let sheet_count = sheets.map(<[SheetInfo]>::len).unwrap_or(0);
    let total_rows: usize = sheets
        .map(|s| s.iter().map(|sheet| sheet.row_count).sum())
        .unwrap_or(0);

    Tree {
        id: entry.id.clone(),
        root: Node {
            children,
            ..Node::new(
                "n0".to_string(),
                entry.filename.clone(),
                format!("{base_summary} ({sheet_count} sheets, {total_rows} total rows)"),
            )
        },
    }
}

fn sheet_to_node(index: usize, sheet: &SheetInfo, config: &Config, source_dir: &Path) -> Node {
    let mut summary = format!(
        "{} rows, {} columns.",
        sheet.row_count, sheet.column_count
    );
    if !sheet.headers.is_empty() {
        let shown: Vec<&str> = sheet.headers.iter().take(8).map(String::as_str).collect();
        summary.push_str(&format!(" Headers: {}", shown.join(", ")));
        if sheet.headers.len() > 8 {
            summary.push_str(&format!(" (+{} more)", sheet.headers.len() - 8));
        }
    }

    let mut node = Node::new(
        format!("n{}", index + 1),
        format!("Sheet: {}", sheet.name),
        summary,
    );
    node.hint = Some(sheet_hint(sheet));
    node.headers = sheet.headers.clone();
    node.row_labels = sheet.row_labels.iter().take(10).cloned().collect();

    // Prefer the markdown artifact over the JSON one.
    let safe_name = safe_sheet_name(&sheet.name);
    for candidate in [
        source_dir.join(format!("sheet_{safe_name}.md")),
        source_dir.join(format!("sheet_{safe_name}.json")),
    ] {
        if candidate.is_file() {
            node.content_ref = Some(relative_to_store(&candidate, config.store_root()));
            break;
        }
    }

    if let Some(first_row) = sheet.sample_rows.first() {
        let preview: Vec<String> = sheet
            .headers
            .iter()
            .filter_map(|h| first_row.get(h).map(|v| (h, v)))
            .take(4)
            .map(|(h, v)| format!("{h}: {}", preview_value(v)))
            .collect();
        if !preview.is_empty() {
            node.preview = Some(preview.join(", "));
        }
    }

    node
}

fn preview_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Flat symbol tree for code sources: one leaf per top-level class or
/// function definition. The root references the first converted file.
fn build_symbol_tree(entry: &CatalogEntry, config: &Config, source_dir: &Path) -> Tree {
    let summary = if entry.summary.is_empty() {
        format!("Code: {}", entry.filename)
    } else {
        entry.summary.clone()
    };

    let mut root = Node::new("n0".to_string(), entry.filename.clone(), summary);

    if source_dir.is_dir() {
        let mut files: Vec<std::path::PathBuf> = std::fs::read_dir(source_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file())
                    .collect()
            })
            .unwrap_or_default();
        files.sort();

        if let Some(first) = files.first() {
            root.content_ref = Some(relative_to_store(first, config.store_root()));
            if let Ok(text) = std::fs::read_to_string(first) {
                root.children = parse_code_symbols(&text);
            }
        }
    }

    Tree {
        id: entry.id.clone(),
        root,
    }
}

fn symbol_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"^class\s+(\w+)").expect("valid regex"), "Class"),
            (Regex::new(r"^def\s+(\w+)").expect("valid regex"), "Function"),
            (
                Regex::new(r"^async\s+def\s+(\w+)").expect("valid regex"),
                "Async Function",
            ),
        ]
    })
}

/// Parse top-level symbols from code text. Only definitions at the start
/// of a line count; nesting is not attempted.
fn parse_code_symbols(text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut counter = 0usize;

    for (line_idx, line) in text.lines().enumerate() {
        for (pattern, kind) in symbol_patterns() {
            if let Some(caps) = pattern.captures(line) {
                counter += 1;
                let name = &caps[1];
                nodes.push(Node::new(
                    format!("n{counter}"),
                    format!("{kind}: {name}"),
                    format!("{kind} '{name}' at line {}", line_idx + 1),
                ));
                break;
            }
        }
    }

    nodes
}

// ---------------------------------------------------------------------------
// LLM-assisted variant
// ---------------------------------------------------------------------------

const TREE_SYSTEM_PROMPT: &str = r#"You are a document indexing expert. Your job is to produce a hierarchical tree index of a document.

You MUST respond with valid JSON only — no explanations, no markdown, just the JSON object.

The JSON tree follows this schema:
{
  "id": "<source_id>",
  "root": {
    "node_id": "n0",
    "title": "<document title>",
    "summary": "<1-2 sentence summary of the entire document>",
    "children": [
      {
        "node_id": "n1",
        "title": "<section title>",
        "summary": "<1-2 sentence summary of this section>",
        "children": [],
        "content_ref": "<relative path to content file, or null>"
      }
    ]
  }
}

Rules:
- Every node must have: node_id, title, summary, children
- Leaf nodes should have content_ref pointing to the converted file
- Node IDs use dotted notation: n1, n1.1, n1.2, n2, etc.
- Keep summaries concise but informative
- Aim for 2-3 levels of depth for typical documents
- Group related content logically"#;

async fn build_tree_with_llm(
    entry: &CatalogEntry,
    config: &Config,
    source_dir: &Path,
    client: &LlmClient,
) -> Result<Tree> {
    let mut content_files = Vec::new();
    if source_dir.is_dir() {
        let mut paths: Vec<std::path::PathBuf> = std::fs::read_dir(source_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        for path in paths {
            content_files.push(relative_to_store(&path, config.store_root()));
        }
    }

    let sample = structure_sample(source_dir);
    let file_list = if content_files.is_empty() {
        "(none)".to_string()
    } else {
        content_files
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let prompt = format!(
        "Build a tree index for this document.\n\n\
         **Source ID:** {}\n\
         **Filename:** {}\n\
         **Type:** {}\n\
         **Strategy:** {}\n\n\
         **Available content files:**\n{file_list}\n\n\
         **Document sample/structure:**\n```\n{}\n```\n\n\
         Respond with the tree JSON only.",
        entry.id,
        entry.filename,
        entry.file_type,
        entry.strategy,
        sample.chars().take(3000).collect::<String>(),
    );

    let value = client.send_json(TREE_SYSTEM_PROMPT, &prompt, 4096).await?;

    let root_value = value
        .get("root")
        .cloned()
        .ok_or_else(|| crate::Error::Llm("tree response missing 'root'".to_string()))?;

    // Deserialization enforces the required node fields at every level.
    let root: Node = serde_json::from_value(root_value)
        .map_err(|e| crate::Error::Llm(format!("tree response malformed: {e}")))?;

    let mut tree = Tree {
        id: entry.id.clone(),
        root,
    };
    sanitize_llm_tree(&mut tree, config.store_root());
    if let Err(duplicate) = check_unique_ids(&tree) {
        return Err(crate::Error::Llm(format!(
            "tree response violates node-id uniqueness: {duplicate}"
        )));
    }
    Ok(tree)
}

/// Enforce resolvable invariants on an LLM-generated tree: the root ID is
/// pinned to `n0` and content refs that do not resolve under the store
/// root are dropped. ID uniqueness is checked separately by the caller.
fn sanitize_llm_tree(tree: &mut Tree, store_root: &Path) {
    tree.root.node_id = "n0".to_string();

    fn walk(node: &mut Node, store_root: &Path) {
        if let Some(ref content_ref) = node.content_ref {
            if !store_root.join(content_ref).is_file() {
                node.content_ref = None;
            }
        }
        for child in &mut node.children {
            walk(child, store_root);
        }
    }
    walk(&mut tree.root, store_root);
}

/// Text sample showing document structure, fed to the LLM tree prompt.
fn structure_sample(source_dir: &Path) -> String {
    if !source_dir.is_dir() {
        return "(no converted files available)".to_string();
    }

    for name in ["full.txt", "full.md"] {
        let path = source_dir.join(name);
        if path.is_file() {
            if let Ok(text) = std::fs::read_to_string(&path) {
                return text.chars().take(2000).collect();
            }
        }
    }

    let mut paths: Vec<std::path::PathBuf> = std::fs::read_dir(source_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default();
    paths.sort();

    let mut parts = Vec::new();
    for path in paths {
        if let Ok(text) = std::fs::read_to_string(&path) {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            parts.push(format!("[{name}]\n{}", text.chars().take(1000).collect::<String>()));
        }
        if parts.len() >= 3 {
            break;
        }
    }

    if parts.is_empty() {
        "(empty)".to_string()
    } else {
        parts.join("\n\n")
    }
}

/// Infer a converter-result shape from previously converted artifacts.
fn read_converted_structure(source_dir: &Path) -> ConverterResult {
    let mut result = ConverterResult::default();

    let mut paths: Vec<std::path::PathBuf> = std::fs::read_dir(source_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default();
    paths.sort();
    result.output_files = paths.clone();

    let names: Vec<String> = paths
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();

    if names.iter().any(|n| n.starts_with("sheet_") && n.ends_with(".json")) {
        let mut sheets = Vec::new();
        for path in &paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.starts_with("sheet_") && name.ends_with(".json") {
                if let Ok(sheet) = read_json::<SheetInfo>(path) {
                    sheets.push(sheet);
                }
            }
        }
        result.sheets = Some(sheets);
    } else if names.iter().any(|n| n.starts_with("pages_") && n.ends_with(".txt")) {
        let mut page_texts = Vec::new();
        for path in &paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(range) = name
                .strip_prefix("pages_")
                .and_then(|rest| rest.strip_suffix(".txt"))
            {
                let mut bounds = range.splitn(2, '-');
                let start: Option<usize> = bounds.next().and_then(|s| s.parse().ok());
                let end: Option<usize> = bounds.next().and_then(|s| s.parse().ok());
                if let Some(start) = start {
                    let end = end.unwrap_or(start);
                    for page in start..=end {
                        page_texts.push((page, String::new()));
                    }
                }
            }
        }
        result.pages = Some(page_texts.len());
        result.page_texts = Some(page_texts);
    } else if names.iter().any(|n| n == "full.md") {
        if let Ok(text) = std::fs::read_to_string(source_dir.join("full.md")) {
            let lines: Vec<&str> = text.split('\n').collect();
            result.sections = Some(extract_sections(&lines));
            result.text = text;
        }
    }

    result
}

/// Check the well-formedness invariants of a tree: root ID `n0`, unique
/// node IDs throughout. Returns the duplicate ID on violation.
pub fn check_unique_ids(tree: &Tree) -> std::result::Result<(), String> {
    let mut seen = std::collections::HashSet::new();

    fn walk(
        node: &Node,
        seen: &mut std::collections::HashSet<String>,
    ) -> std::result::Result<(), String> {
        if !seen.insert(node.node_id.clone()) {
            return Err(node.node_id.clone());
        }
        for child in &node.children {
            walk(child, seen)?;
        }
        Ok(())
    }

    if tree.root.node_id != "n0" {
        return Err(format!("root node_id is {}, expected n0", tree.root.node_id));
    }
    walk(&tree.root, &mut seen)
}
