//! File type detection and classification.
//!
//! Classifies files using three signals: the extension map, magic bytes,
//! and content heuristics over the first 500 bytes. Produces a [`FileCard`]
//! per file with a deterministic source ID.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{Error, Result};
use crate::sample::Strategy;

/// Number of header bytes read for magic and content detection.
const HEADER_LEN: usize = 500;

/// Every file type the detector can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    // Documents
    Pdf,
    Docx,
    Doc,
    Rtf,
    Odt,
    // Spreadsheets
    Xlsx,
    Xls,
    Csv,
    Tsv,
    Ods,
    // Markdown / text
    Markdown,
    Text,
    Rst,
    // Code
    Python,
    Javascript,
    Typescript,
    Java,
    Go,
    Rust,
    Ruby,
    Php,
    C,
    Cpp,
    CHeader,
    CppHeader,
    Csharp,
    Swift,
    Kotlin,
    Shell,
    // Web
    Html,
    Css,
    Xml,
    Json,
    Yaml,
    Toml,
    // Skipped categories
    Image,
    Archive,
    Unknown,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Doc => "doc",
            FileType::Rtf => "rtf",
            FileType::Odt => "odt",
            FileType::Xlsx => "xlsx",
            FileType::Xls => "xls",
            FileType::Csv => "csv",
            FileType::Tsv => "tsv",
            FileType::Ods => "ods",
            FileType::Markdown => "markdown",
            FileType::Text => "text",
            FileType::Rst => "rst",
            FileType::Python => "python",
            FileType::Javascript => "javascript",
            FileType::Typescript => "typescript",
            FileType::Java => "java",
            FileType::Go => "go",
            FileType::Rust => "rust",
            FileType::Ruby => "ruby",
            FileType::Php => "php",
            FileType::C => "c",
            FileType::Cpp => "cpp",
            FileType::CHeader => "c_header",
            FileType::CppHeader => "cpp_header",
            FileType::Csharp => "csharp",
            FileType::Swift => "swift",
            FileType::Kotlin => "kotlin",
            FileType::Shell => "shell",
            FileType::Html => "html",
            FileType::Css => "css",
            FileType::Xml => "xml",
            FileType::Json => "json",
            FileType::Yaml => "yaml",
            FileType::Toml => "toml",
            FileType::Image => "image",
            FileType::Archive => "archive",
            FileType::Unknown => "unknown",
        }
    }

    /// The category grouping for this file type.
    pub fn category(&self) -> Category {
        use FileType::*;
        match self {
            Pdf | Docx | Doc | Rtf | Odt => Category::Document,
            Xlsx | Xls | Csv | Tsv | Ods => Category::Spreadsheet,
            Markdown | Text | Rst => Category::Text,
            Python | Javascript | Typescript | Java | Go | Rust | Ruby | Php | C | Cpp
            | CHeader | CppHeader | Csharp | Swift | Kotlin | Shell => Category::Code,
            Html | Css | Xml | Json | Yaml | Toml => Category::Web,
            Image => Category::Image,
            Archive => Category::Archive,
            Unknown => Category::Unknown,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse grouping used for strategy selection and converter fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Document,
    Spreadsheet,
    Text,
    Code,
    Web,
    Image,
    Archive,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Document => "document",
            Category::Spreadsheet => "spreadsheet",
            Category::Text => "text",
            Category::Code => "code",
            Category::Web => "web",
            Category::Image => "image",
            Category::Archive => "archive",
            Category::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient record describing a detected file, before and after sampling.
#[derive(Debug, Clone)]
pub struct FileCard {
    /// Deterministic source ID (`src_<10-hex>`).
    pub id: String,
    pub filename: String,
    /// Absolute path to the original file.
    pub path: PathBuf,
    pub file_type: FileType,
    pub category: Category,
    /// File size in KB, rounded to one decimal.
    pub size_kb: f64,
    /// Whether the strategist has run for this card.
    pub sampled: bool,
    pub strategy: Option<Strategy>,
    /// Page count, filled by the PDF converter.
    pub pages: Option<usize>,
    /// Sheet count, filled by the spreadsheet converter.
    pub sheets: Option<usize>,
}

/// Detect the type of a single file and produce its card.
///
/// Fails only if the path is not a regular readable file.
pub fn detect_file(path: &Path) -> Result<FileCard> {
    let metadata = std::fs::metadata(path).map_err(|_| Error::NotAFile {
        path: path.to_path_buf(),
    })?;
    if !metadata.is_file() {
        return Err(Error::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let size_bytes = metadata.len();
    let size_kb = (size_bytes as f64 / 1024.0 * 10.0).round() / 10.0;

    let mut header = Vec::with_capacity(HEADER_LEN);
    File::open(path)?
        .take(HEADER_LEN as u64)
        .read_to_end(&mut header)?;

    let ext_type = detect_by_extension(path);
    let magic_type = detect_by_magic(&header);
    let content_type = detect_by_content(&header, ext_type);

    let file_type = resolve_type(ext_type, magic_type, content_type);
    let category = file_type.category();

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(FileCard {
        id: generate_id(&filename, size_bytes, mtime_ns(&metadata)),
        filename,
        path: path.to_path_buf(),
        file_type,
        category,
        size_kb,
        sampled: false,
        strategy: None,
        pages: None,
        sheets: None,
    })
}

/// Detect all regular files in a directory (non-recursive, sorted by name,
/// dotfiles skipped). Entries that cannot be detected are logged and skipped.
pub fn detect_directory(dir: &Path) -> Result<Vec<FileCard>> {
    if !dir.is_dir() {
        return Err(Error::InputNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    let mut cards = Vec::new();
    for entry in entries {
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with('.') || !entry.is_file() {
            continue;
        }
        match detect_file(&entry) {
            Ok(card) => cards.push(card),
            Err(e) => warn!(path = %entry.display(), error = %e, "could not detect file"),
        }
    }
    Ok(cards)
}

/// Deterministic source ID from `(filename, size, mtime_ns)`.
///
/// The same file at the same size and mtime always yields the same ID;
/// touching or rewriting the file yields a new one.
fn generate_id(filename: &str, size: u64, mtime_ns: u128) -> String {
    let key = format!("{filename}:{size}:{mtime_ns}");
    let digest = Sha256::digest(key.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("src_{}", &hex[..10])
}

fn mtime_ns(metadata: &std::fs::Metadata) -> u128 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

fn detect_by_extension(path: &Path) -> Option<FileType> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    let file_type = match ext.as_str() {
        "pdf" => FileType::Pdf,
        "docx" => FileType::Docx,
        "doc" => FileType::Doc,
        "rtf" => FileType::Rtf,
        "odt" => FileType::Odt,
        "xlsx" => FileType::Xlsx,
        "xls" => FileType::Xls,
        "csv" => FileType::Csv,
        "tsv" => FileType::Tsv,
        "ods" => FileType::Ods,
        "md" | "markdown" => FileType::Markdown,
        "txt" => FileType::Text,
        "rst" => FileType::Rst,
        "py" => FileType::Python,
        "js" | "jsx" => FileType::Javascript,
        "ts" | "tsx" => FileType::Typescript,
        "java" => FileType::Java,
        "go" => FileType::Go,
        "rs" => FileType::Rust,
        "rb" => FileType::Ruby,
        "php" => FileType::Php,
        "c" => FileType::C,
        "cpp" => FileType::Cpp,
        "h" => FileType::CHeader,
        "hpp" => FileType::CppHeader,
        "cs" => FileType::Csharp,
        "swift" => FileType::Swift,
        "kt" => FileType::Kotlin,
        "sh" | "bash" | "zsh" => FileType::Shell,
        "html" | "htm" => FileType::Html,
        "css" => FileType::Css,
        "xml" => FileType::Xml,
        "json" => FileType::Json,
        "yaml" | "yml" => FileType::Yaml,
        "toml" => FileType::Toml,
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tiff" | "webp" => FileType::Image,
        "zip" | "tar" | "gz" => FileType::Archive,
        _ => return None,
    };
    Some(file_type)
}

/// Magic-byte signal. `ZipBased` and `Ole` are container hints, not final
/// types; resolution disambiguates them against the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MagicType {
    Pdf,
    ZipBased,
    Ole,
    Image,
}

fn detect_by_magic(header: &[u8]) -> Option<MagicType> {
    const MAGICS: &[(&[u8], MagicType)] = &[
        (b"%PDF", MagicType::Pdf),
        (b"PK\x03\x04", MagicType::ZipBased),
        (b"\xd0\xcf\x11\xe0", MagicType::Ole),
        (b"\x89PNG", MagicType::Image),
        (b"\xff\xd8\xff", MagicType::Image),
        (b"GIF8", MagicType::Image),
    ];
    MAGICS
        .iter()
        .find(|(magic, _)| header.starts_with(magic))
        .map(|(_, t)| *t)
}

fn detect_by_content(header: &[u8], ext_type: Option<FileType>) -> Option<FileType> {
    if header.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(header);
    let text = text.trim_start();

    // CSV/TSV heuristic: at least two non-empty lines among the first five
    // with an identical separator count of two or more.
    let lines: Vec<&str> = text.split('\n').take(5).collect();
    if lines.len() >= 2 {
        if has_consistent_separator(&lines, ',') {
            return Some(FileType::Csv);
        }
        if has_consistent_separator(&lines, '\t') {
            return Some(FileType::Tsv);
        }
    }

    if text.starts_with('#') || text.starts_with("---\n") {
        return Some(FileType::Markdown);
    }
    if text.starts_with('{') || text.starts_with('[') {
        return Some(FileType::Json);
    }
    if text.starts_with("<?xml") || text.starts_with("<!DOCTYPE") || text.starts_with("<html") {
        return match ext_type {
            Some(FileType::Html) => Some(FileType::Html),
            Some(FileType::Xml) => Some(FileType::Xml),
            _ => Some(FileType::Xml),
        };
    }

    None
}

fn has_consistent_separator(lines: &[&str], sep: char) -> bool {
    let counts: Vec<usize> = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.matches(sep).count())
        .collect();
    counts.len() >= 2 && counts[0] >= 2 && counts.iter().all(|c| *c == counts[0])
}

/// Resolve the final type from the three detection signals.
///
/// ZIP-based magic refines via the extension (xlsx vs docx); otherwise the
/// extension wins, then magic (containers excluded), then content.
fn resolve_type(
    ext_type: Option<FileType>,
    magic_type: Option<MagicType>,
    content_type: Option<FileType>,
) -> FileType {
    if magic_type == Some(MagicType::ZipBased) {
        if let Some(ext) = ext_type {
            if matches!(
                ext,
                FileType::Xlsx | FileType::Docx | FileType::Odt | FileType::Ods
            ) {
                return ext;
            }
        }
    }

    if let Some(ext) = ext_type {
        return ext;
    }

    match magic_type {
        Some(MagicType::Pdf) => return FileType::Pdf,
        Some(MagicType::Image) => return FileType::Image,
        _ => {}
    }

    content_type.unwrap_or(FileType::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn extension_detection_basic() {
        assert_eq!(detect_by_extension(Path::new("a.pdf")), Some(FileType::Pdf));
        assert_eq!(detect_by_extension(Path::new("a.MD")), Some(FileType::Markdown));
        assert_eq!(detect_by_extension(Path::new("a.xlsx")), Some(FileType::Xlsx));
        assert_eq!(detect_by_extension(Path::new("a.weird")), None);
        assert_eq!(detect_by_extension(Path::new("noext")), None);
    }

    #[test]
    fn magic_detection_basic() {
        assert_eq!(detect_by_magic(b"%PDF-1.7 ..."), Some(MagicType::Pdf));
        assert_eq!(detect_by_magic(b"PK\x03\x04rest"), Some(MagicType::ZipBased));
        assert_eq!(detect_by_magic(b"\xd0\xcf\x11\xe0old"), Some(MagicType::Ole));
        assert_eq!(detect_by_magic(b"\x89PNG\r\n"), Some(MagicType::Image));
        assert_eq!(detect_by_magic(b"plain text"), None);
    }

    #[test]
    fn content_detects_csv() {
        let header = b"date,product,amount\n2025-01-01,widget,10\n2025-01-02,gadget,20\n";
        assert_eq!(detect_by_content(header, None), Some(FileType::Csv));
    }

    #[test]
    fn content_rejects_inconsistent_commas() {
        let header = b"one,two\nthree,four,five\n";
        assert_eq!(detect_by_content(header, None), None);
    }

    #[test]
    fn content_requires_two_nonempty_lines() {
        let header = b"a,b,c,d\n";
        assert_eq!(detect_by_content(header, None), None);
    }

    #[test]
    fn content_detects_tsv() {
        let header = b"a\tb\tc\n1\t2\t3\n";
        assert_eq!(detect_by_content(header, None), Some(FileType::Tsv));
    }

    #[test]
    fn content_detects_markdown_and_json() {
        assert_eq!(detect_by_content(b"# Title\nbody", None), Some(FileType::Markdown));
        assert_eq!(detect_by_content(b"{\"k\": 1}", None), Some(FileType::Json));
        assert_eq!(detect_by_content(b"[1, 2]", None), Some(FileType::Json));
    }

    #[test]
    fn content_detects_xml_respecting_extension() {
        assert_eq!(detect_by_content(b"<?xml version=\"1.0\"?>", None), Some(FileType::Xml));
        assert_eq!(
            detect_by_content(b"<!DOCTYPE html>", Some(FileType::Html)),
            Some(FileType::Html)
        );
    }

    #[test]
    fn resolution_zip_magic_prefers_office_extension() {
        assert_eq!(
            resolve_type(Some(FileType::Xlsx), Some(MagicType::ZipBased), None),
            FileType::Xlsx
        );
        assert_eq!(
            resolve_type(Some(FileType::Docx), Some(MagicType::ZipBased), None),
            FileType::Docx
        );
    }

    #[test]
    fn resolution_extension_wins_over_magic() {
        assert_eq!(
            resolve_type(Some(FileType::Text), Some(MagicType::Pdf), None),
            FileType::Text
        );
    }

    #[test]
    fn resolution_magic_when_no_extension() {
        assert_eq!(resolve_type(None, Some(MagicType::Pdf), None), FileType::Pdf);
        // Container magics never resolve on their own.
        assert_eq!(
            resolve_type(None, Some(MagicType::ZipBased), None),
            FileType::Unknown
        );
        assert_eq!(resolve_type(None, Some(MagicType::Ole), None), FileType::Unknown);
    }

    #[test]
    fn resolution_falls_back_to_content_then_unknown() {
        assert_eq!(resolve_type(None, None, Some(FileType::Csv)), FileType::Csv);
        assert_eq!(resolve_type(None, None, None), FileType::Unknown);
    }

    #[test]
    fn categories_match_type_table() {
        assert_eq!(FileType::Pdf.category(), Category::Document);
        assert_eq!(FileType::Xlsx.category(), Category::Spreadsheet);
        assert_eq!(FileType::Markdown.category(), Category::Text);
        assert_eq!(FileType::Python.category(), Category::Code);
        assert_eq!(FileType::Json.category(), Category::Web);
        assert_eq!(FileType::Image.category(), Category::Image);
        assert_eq!(FileType::Archive.category(), Category::Archive);
        assert_eq!(FileType::Unknown.category(), Category::Unknown);
    }

    #[test]
    fn source_id_is_deterministic() {
        let a = generate_id("report.pdf", 1024, 123_456_789);
        let b = generate_id("report.pdf", 1024, 123_456_789);
        assert_eq!(a, b);
        assert!(a.starts_with("src_"));
        assert_eq!(a.len(), 4 + 10);
    }

    #[test]
    fn source_id_changes_with_inputs() {
        let base = generate_id("report.pdf", 1024, 1);
        assert_ne!(base, generate_id("report.pdf", 1025, 1));
        assert_ne!(base, generate_id("report.pdf", 1024, 2));
        assert_ne!(base, generate_id("other.pdf", 1024, 1));
    }

    #[test]
    fn detect_file_produces_card() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "# Notes\n\nSome content.\n").unwrap();

        let card = detect_file(&path).unwrap();
        assert_eq!(card.file_type, FileType::Markdown);
        assert_eq!(card.category, Category::Text);
        assert_eq!(card.filename, "notes.md");
        assert!(!card.sampled);
        assert!(card.strategy.is_none());
        assert!(card.id.starts_with("src_"));
    }

    #[test]
    fn detect_file_same_file_same_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stable.txt");
        fs::write(&path, "stable content").unwrap();

        let first = detect_file(&path).unwrap();
        let second = detect_file(&path).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn detect_file_rejects_directory() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            detect_file(dir.path()),
            Err(Error::NotAFile { .. })
        ));
    }

    #[test]
    fn detect_directory_skips_dotfiles_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.md"), "# B").unwrap();
        fs::write(dir.path().join("a.md"), "# A").unwrap();
        fs::write(dir.path().join(".hidden"), "secret").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let cards = detect_directory(dir.path()).unwrap();
        let names: Vec<&str> = cards.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }

    #[test]
    fn detect_directory_empty_is_ok() {
        let dir = TempDir::new().unwrap();
        let cards = detect_directory(dir.path()).unwrap();
        assert!(cards.is_empty());
    }
}
