use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use metahub::catalog::CatalogEntry;
use metahub::config::{Config, EmbedderKind};
use metahub::converters::{ConverterResult, SheetInfo};
use metahub::tree::{build_tree_for_source, check_unique_ids};
use metahub::{Approach, FileType, IngestOptions, MetaHub};
use tempfile::TempDir;

fn store_config(root: &Path) -> Config {
    let mut config = Config::for_root(root);
    config.embedding.provider = EmbedderKind::Mock;
    config.embedding.dimensions = 128;
    config
}

fn entry(id: &str, filename: &str, file_type: FileType, strategy: Approach) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        filename: filename.to_string(),
        original_path: format!("/inbox/{filename}"),
        file_type,
        category: file_type.category(),
        size_kb: 1.0,
        strategy,
        tree_path: format!("tree_index/{id}.tree.json"),
        converted_path: format!("converted/{id}"),
        indexed_at: String::new(),
        summary: format!("File: {filename}"),
        tags: Vec::new(),
        doc_nature: String::new(),
        sampled: true,
        related: None,
    }
}

// ---------------------------------------------------------------------------
// Scenario: a 12-page PDF chunks into three page-range leaves
// ---------------------------------------------------------------------------

#[tokio::test]
async fn twelve_page_pdf_yields_three_chunk_leaves() {
    let store = TempDir::new().unwrap();
    let config = store_config(store.path());
    let source = entry("src_pdf0000001", "report.pdf", FileType::Pdf, Approach::TreeIndex);

    let source_dir = config.converted_dir_for(&source.id);
    fs::create_dir_all(&source_dir).unwrap();
    for range in ["1-5", "6-10", "11-12"] {
        fs::write(source_dir.join(format!("pages_{range}.txt")), "chunk").unwrap();
    }

    let page_texts: Vec<(usize, String)> = (1..=12)
        .map(|n| (n, format!("text of page {n}")))
        .collect();
    let result = ConverterResult {
        pages: Some(12),
        page_texts: Some(page_texts),
        ..Default::default()
    };

    let tree = build_tree_for_source(&source, &config, Some(&result), None)
        .await
        .unwrap();

    assert_eq!(tree.root.children.len(), 3);
    let titles: Vec<&str> = tree.root.children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Pages 1-5", "Pages 6-10", "Pages 11-12"]);

    let refs: Vec<&str> = tree
        .root
        .children
        .iter()
        .map(|c| c.content_ref.as_deref().unwrap())
        .collect();
    assert!(refs[0].ends_with("pages_1-5.txt"));
    assert!(refs[1].ends_with("pages_6-10.txt"));
    assert!(refs[2].ends_with("pages_11-12.txt"));

    check_unique_ids(&tree).unwrap();
    assert!(store.path().join("tree_index/src_pdf0000001.tree.json").is_file());
}

#[tokio::test]
async fn single_page_pdf_yields_one_leaf() {
    let store = TempDir::new().unwrap();
    let config = store_config(store.path());
    let source = entry("src_pdf0000002", "one.pdf", FileType::Pdf, Approach::TreeIndex);

    let result = ConverterResult {
        pages: Some(1),
        page_texts: Some(vec![(1, "the only page".to_string())]),
        ..Default::default()
    };

    let tree = build_tree_for_source(&source, &config, Some(&result), None)
        .await
        .unwrap();
    assert_eq!(tree.root.children.len(), 1);
    assert_eq!(tree.root.children[0].title, "Pages 1-1");
}

#[tokio::test]
async fn empty_pdf_yields_root_only() {
    let store = TempDir::new().unwrap();
    let config = store_config(store.path());
    let source = entry("src_pdf0000003", "empty.pdf", FileType::Pdf, Approach::TreeIndex);

    let result = ConverterResult {
        pages: Some(0),
        page_texts: Some(Vec::new()),
        ..Default::default()
    };

    let tree = build_tree_for_source(&source, &config, Some(&result), None)
        .await
        .unwrap();
    assert_eq!(tree.root.node_id, "n0");
    assert!(tree.root.children.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario: markdown heading hierarchy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn markdown_sections_nest_by_heading_level() {
    let store = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    fs::write(inbox.path().join("doc.md"), "# A\n## A.1\n## A.2\n# B\n").unwrap();

    let hub = MetaHub::open_with_config(store_config(store.path()));
    let report = hub
        .ingest(&inbox.path().join("doc.md"), &IngestOptions::default())
        .await
        .unwrap();
    let id = &report.source_ids[0];

    let tree = hub.get_tree(id).unwrap().unwrap();
    check_unique_ids(&tree).unwrap();

    // Node count equals heading count (plus the root).
    assert_eq!(tree.node_count(), 5);

    assert_eq!(tree.root.children.len(), 2);
    let a = &tree.root.children[0];
    let b = &tree.root.children[1];
    assert_eq!(a.title, "A");
    assert_eq!(b.title, "B");
    assert_eq!(a.children.len(), 2);
    assert_eq!(a.children[0].title, "A.1");
    assert_eq!(a.children[1].title, "A.2");

    // Leaves reference the per-section artifacts written by the converter.
    assert!(a.content_ref.as_deref().unwrap().ends_with("section_a.md"));
    assert!(a.children[0].content_ref.as_deref().unwrap().ends_with("section_a_1.md"));
    assert!(a.children[1].content_ref.as_deref().unwrap().ends_with("section_a_2.md"));
    assert!(b.content_ref.as_deref().unwrap().ends_with("section_b.md"));
}

#[tokio::test]
async fn markdown_without_headings_yields_root_only() {
    let store = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    fs::write(inbox.path().join("flat.md"), "no headings here\njust prose\n").unwrap();

    let hub = MetaHub::open_with_config(store_config(store.path()));
    let report = hub
        .ingest(&inbox.path().join("flat.md"), &IngestOptions::default())
        .await
        .unwrap();

    let tree = hub.get_tree(&report.source_ids[0]).unwrap().unwrap();
    // Only full.md exists in the converted dir, which the file-listing
    // fallback skips.
    assert!(tree.root.children.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario: spreadsheet schema tree
// ---------------------------------------------------------------------------

fn sheet(name: &str, headers: &[&str], row_count: usize, labels: &[&str]) -> SheetInfo {
    SheetInfo {
        name: name.to_string(),
        headers: headers.iter().map(|h| h.to_string()).collect(),
        row_count,
        column_count: headers.len(),
        sample_rows: Vec::new(),
        row_labels: labels.iter().map(|l| l.to_string()).collect(),
    }
}

#[tokio::test]
async fn two_sheet_workbook_builds_schema_tree() {
    let store = TempDir::new().unwrap();
    let config = store_config(store.path());
    let source = entry(
        "src_xlsx000001",
        "sales.xlsx",
        FileType::Xlsx,
        Approach::SchemaIndex,
    );

    let source_dir = config.converted_dir_for(&source.id);
    fs::create_dir_all(&source_dir).unwrap();
    fs::write(source_dir.join("sheet_north_america.md"), "# Sheet").unwrap();
    fs::write(source_dir.join("sheet_north_america.json"), "{}").unwrap();
    fs::write(source_dir.join("sheet_europe.md"), "# Sheet").unwrap();

    let mut north = sheet(
        "North America",
        &["date", "product", "amount"],
        100,
        &["2025-01-01", "2025-01-02", "2025-01-03", "2025-01-04", "2025-01-05"],
    );
    north.sample_rows = vec![BTreeMap::from([
        ("date".to_string(), serde_json::json!("2025-01-01")),
        ("product".to_string(), serde_json::json!("widget")),
        ("amount".to_string(), serde_json::json!(120)),
    ])];
    let europe = sheet("Europe", &[], 0, &[]);

    let result = ConverterResult {
        sheets: Some(vec![north, europe]),
        ..Default::default()
    };

    let tree = build_tree_for_source(&source, &config, Some(&result), None)
        .await
        .unwrap();

    assert!(tree.root.summary.contains("2 sheets, 100 total rows"));
    assert_eq!(tree.root.children.len(), 2);

    let na = &tree.root.children[0];
    assert_eq!(na.title, "Sheet: North America");
    assert!(na.summary.starts_with("100 rows, 3 columns."));
    let hint = na.hint.as_deref().unwrap();
    assert!(hint.contains("Sheet: North America"));
    assert!(hint.contains("date/product/amount"));
    // Markdown preferred over JSON for the content ref.
    assert!(na.content_ref.as_deref().unwrap().ends_with("sheet_north_america.md"));
    assert_eq!(na.headers, vec!["date", "product", "amount"]);
    assert_eq!(na.row_labels.len(), 5);
    assert!(na.preview.as_deref().unwrap().contains("date: 2025-01-01"));

    let eu = &tree.root.children[1];
    assert_eq!(eu.title, "Sheet: Europe");
    assert!(eu.summary.starts_with("0 rows, 0 columns"));
}

// ---------------------------------------------------------------------------
// Symbol tree via the full pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn code_file_builds_flat_symbol_tree() {
    let store = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    fs::write(
        inbox.path().join("service.py"),
        "class AuthService:\n    def login(self):\n        pass\n\ndef make_service():\n    return AuthService()\n\nasync def refresh_tokens():\n    pass\n",
    )
    .unwrap();

    let hub = MetaHub::open_with_config(store_config(store.path()));
    let report = hub
        .ingest(&inbox.path().join("service.py"), &IngestOptions::default())
        .await
        .unwrap();
    let id = &report.source_ids[0];

    let catalog = hub.catalog().unwrap();
    assert_eq!(catalog.find(id).unwrap().strategy, Approach::SymbolIndex);

    let tree = hub.get_tree(id).unwrap().unwrap();
    check_unique_ids(&tree).unwrap();

    let titles: Vec<&str> = tree.root.children.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Class: AuthService",
            "Function: make_service",
            "Async Function: refresh_tokens"
        ]
    );
    // Flat: no nesting is attempted for symbols.
    assert!(tree.root.children.iter().all(|c| c.children.is_empty()));
    // The root references the converted text.
    assert!(tree.root.content_ref.as_deref().unwrap().ends_with("full.txt"));
}

// ---------------------------------------------------------------------------
// Fallback and dispatch details
// ---------------------------------------------------------------------------

#[tokio::test]
async fn category_drives_dispatch_when_strategy_disagrees() {
    // A spreadsheet keeps its schema tree even under a generic strategy.
    let store = TempDir::new().unwrap();
    let config = store_config(store.path());
    let source = entry(
        "src_xlsx000002",
        "data.xlsx",
        FileType::Xlsx,
        Approach::TreeIndex,
    );

    let result = ConverterResult {
        sheets: Some(vec![sheet("Only", &["a"], 1, &["r"])]),
        ..Default::default()
    };
    let tree = build_tree_for_source(&source, &config, Some(&result), None)
        .await
        .unwrap();
    assert!(tree.root.summary.contains("1 sheets, 1 total rows"));
}

#[tokio::test]
async fn document_tree_without_structure_lists_converted_files() {
    let store = TempDir::new().unwrap();
    let config = store_config(store.path());
    let source = entry("src_doc0000001", "misc.txt", FileType::Text, Approach::TreeIndex);

    let source_dir = config.converted_dir_for(&source.id);
    fs::create_dir_all(&source_dir).unwrap();
    fs::write(source_dir.join("full.txt"), "everything").unwrap();
    fs::write(source_dir.join("appendix_notes.txt"), "notes").unwrap();

    let tree = build_tree_for_source(&source, &config, None, None).await.unwrap();

    assert_eq!(tree.root.children.len(), 1);
    assert_eq!(tree.root.children[0].title, "Appendix Notes");
    assert!(tree.root.children[0]
        .content_ref
        .as_deref()
        .unwrap()
        .ends_with("appendix_notes.txt"));
}
