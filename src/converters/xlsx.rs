//! Spreadsheet → Markdown/JSON converter.
//!
//! Reads workbooks with `calamine`. Row 0 of each sheet is treated as the
//! header row (missing cells become `col_<i>`), the rest as data. Emits a
//! combined `full.md` with one markdown table per sheet, plus per-sheet
//! `sheet_<name>.md` and `sheet_<name>.json` artifacts for tree leaves and
//! structured access.

use std::collections::BTreeMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::Value;

use crate::converters::{Converter, ConverterResult, SheetInfo};
use crate::error::{Error, Result};
use crate::store::{write_atomic, write_json_atomic};

/// Data rows retained in `sample_rows`.
const SAMPLE_ROWS: usize = 5;

/// First-column labels retained for hint generation.
const MAX_ROW_LABELS: usize = 20;

pub struct XlsxConverter;

impl Converter for XlsxConverter {
    fn convert(&self, path: &Path, output_dir: &Path) -> Result<ConverterResult> {
        let extracted = read_sheets(path)?;

        let markdown_content = extracted
            .iter()
            .map(|(sheet, table)| full_sheet_markdown(sheet, table.as_deref()))
            .collect::<Vec<_>>()
            .join("\n");

        let mut output_files = Vec::new();

        let full_path = output_dir.join("full.md");
        write_atomic(&full_path, markdown_content.as_bytes())?;
        output_files.push(full_path);

        for (sheet, _) in &extracted {
            let safe_name = safe_sheet_name(&sheet.name);

            let json_path = output_dir.join(format!("sheet_{safe_name}.json"));
            write_json_atomic(&json_path, sheet)?;
            output_files.push(json_path);

            let md_path = output_dir.join(format!("sheet_{safe_name}.md"));
            write_atomic(&md_path, sheet_sample_markdown(sheet).as_bytes())?;
            output_files.push(md_path);
        }

        let sheets: Vec<SheetInfo> = extracted.into_iter().map(|(sheet, _)| sheet).collect();

        Ok(ConverterResult {
            text: markdown_content,
            sheets: Some(sheets),
            output_files,
            ..Default::default()
        })
    }

    /// Sample = sheet names, headers, row counts, and the first five data
    /// rows of each sheet.
    fn get_sample(&self, path: &Path) -> Result<String> {
        let mut workbook = open_workbook_auto(path).map_err(|e| Error::Converter {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        let mut parts = Vec::new();

        for sheet_name in &sheet_names {
            let range = match workbook.worksheet_range(sheet_name) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if range.is_empty() {
                parts.push(format!("[Sheet: {sheet_name}]\n(empty)"));
                continue;
            }

            let rows: Vec<Vec<String>> = range
                .rows()
                .map(|row| row.iter().map(cell_to_string).collect())
                .collect();

            parts.push(format!("[Sheet: {sheet_name}]"));
            parts.push(format!("Headers: {}", rows[0].join(" | ")));
            parts.push(format!("Total rows: {}", rows.len() - 1));
            for row in rows.iter().skip(1).take(SAMPLE_ROWS) {
                parts.push(format!("  {}", row.join(" | ")));
            }
        }

        Ok(parts.join("\n"))
    }
}

/// Read every sheet into a [`SheetInfo`] plus its rendered full-data
/// markdown table (`None` for empty sheets).
fn read_sheets(path: &Path) -> Result<Vec<(SheetInfo, Option<String>)>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| Error::Converter {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::new();

    for sheet_name in &sheet_names {
        let range = match workbook.worksheet_range(sheet_name) {
            Ok(r) => r,
            Err(_) => continue,
        };

        if range.is_empty() {
            sheets.push((
                SheetInfo {
                    name: sheet_name.clone(),
                    ..Default::default()
                },
                None,
            ));
            continue;
        }

        let all_rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();

        let headers: Vec<String> = all_rows[0]
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Data::Empty => format!("col_{i}"),
                other => cell_to_string(other),
            })
            .collect();

        let data_rows = &all_rows[1..];

        let sample_rows: Vec<BTreeMap<String, Value>> = data_rows
            .iter()
            .take(SAMPLE_ROWS)
            .map(|row| {
                headers
                    .iter()
                    .zip(row.iter())
                    .map(|(header, cell)| (header.clone(), cell_to_value(cell)))
                    .collect()
            })
            .collect();

        let row_labels: Vec<String> = data_rows
            .iter()
            .take(MAX_ROW_LABELS)
            .filter_map(|row| row.first().map(cell_to_string))
            .collect();

        let string_rows: Vec<Vec<String>> = data_rows
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        let table = render_table(&headers, &string_rows);

        sheets.push((
            SheetInfo {
                name: sheet_name.clone(),
                column_count: headers.len(),
                row_count: data_rows.len(),
                headers,
                sample_rows,
                row_labels,
            },
            Some(table),
        ));
    }

    Ok(sheets)
}

/// Markdown block for a sheet in the combined `full.md`: heading, column
/// hint line, and the full-data table.
fn full_sheet_markdown(sheet: &SheetInfo, table: Option<&str>) -> String {
    match table {
        Some(table) => format!(
            "# Sheet: {}\n\n_Columns: {}_\n\n{table}\n",
            sheet.name,
            sheet.headers.join(", ")
        ),
        None => format!("# Sheet: {}\n\n(empty sheet)\n", sheet.name),
    }
}

/// Markdown for a single `sheet_<name>.md` artifact: sample rows plus a
/// trailer noting how many rows were omitted.
pub fn sheet_sample_markdown(sheet: &SheetInfo) -> String {
    if sheet.headers.is_empty() {
        return format!("# Sheet: {}\n\n(empty sheet)\n", sheet.name);
    }

    let rows: Vec<Vec<String>> = sheet
        .sample_rows
        .iter()
        .map(|row| {
            sheet
                .headers
                .iter()
                .map(|h| row.get(h).map(value_to_cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let mut out = format!(
        "# Sheet: {}\n\n_Columns: {}_\n\n{}",
        sheet.name,
        sheet.headers.join(", "),
        render_table(&sheet.headers, &rows)
    );

    if sheet.row_count > sheet.sample_rows.len() {
        let remaining = sheet.row_count - sheet.sample_rows.len();
        out.push_str(&format!("\n\n_({remaining} more rows)_"));
    }
    out.push('\n');
    out
}

/// One-line navigation hint for a sheet, e.g.
/// `"Sheet: Revenue, contains Q1, Q2, Q3... (12 rows), columns: date/product/amount"`.
pub fn sheet_hint(sheet: &SheetInfo) -> String {
    let mut parts = vec![format!("Sheet: {}", sheet.name)];

    if !sheet.row_labels.is_empty() {
        if sheet.row_labels.len() <= 4 {
            parts.push(format!("contains {} data", sheet.row_labels.join(", ")));
        } else {
            let first_few = sheet.row_labels[..3].join(", ");
            parts.push(format!("contains {first_few}... ({} rows)", sheet.row_count));
        }
    }

    if !sheet.headers.is_empty() {
        if sheet.headers.len() <= 5 {
            parts.push(format!("columns: {}", sheet.headers.join("/")));
        } else {
            let main_cols = sheet.headers[..4].join("/");
            parts.push(format!(
                "columns: {main_cols} (+{} more)",
                sheet.headers.len() - 4
            ));
        }
    }

    parts.join(", ")
}

/// Filesystem-safe sheet name: lowercase with `/` and spaces replaced by
/// underscores. Shared with the tree builder for `content_ref` resolution.
pub fn safe_sheet_name(name: &str) -> String {
    name.to_lowercase().replace(['/', ' '], "_")
}

fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("| {} |", headers.join(" | ")));
    lines.push(format!("|{}|", vec!["---"; headers.len()].join("|")));
    for row in rows {
        lines.push(format!("| {} |", row.join(" | ")));
    }
    lines.join("\n")
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                format!("{f:.4}")
                    .trim_end_matches('0')
                    .trim_end_matches('.')
                    .to_string()
            }
        }
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#ERR:{e:?}"),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Data::Bool(b) => Value::Bool(*b),
        other => Value::String(cell_to_string(other)),
    }
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet(name: &str, headers: &[&str], rows: usize, labels: &[&str]) -> SheetInfo {
        SheetInfo {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            row_count: rows,
            column_count: headers.len(),
            sample_rows: Vec::new(),
            row_labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn safe_sheet_name_lowercases_and_replaces() {
        assert_eq!(safe_sheet_name("North America"), "north_america");
        assert_eq!(safe_sheet_name("Q1/Q2"), "q1_q2");
        assert_eq!(safe_sheet_name("plain"), "plain");
    }

    #[test]
    fn hint_few_labels_and_columns() {
        let s = sheet("Revenue", &["date", "product", "amount"], 3, &["Q1", "Q2", "Q3"]);
        let hint = sheet_hint(&s);
        assert!(hint.contains("Sheet: Revenue"));
        assert!(hint.contains("contains Q1, Q2, Q3 data"));
        assert!(hint.contains("columns: date/product/amount"));
    }

    #[test]
    fn hint_many_labels_elides() {
        let s = sheet("Big", &["a"], 12, &["r1", "r2", "r3", "r4", "r5"]);
        let hint = sheet_hint(&s);
        assert!(hint.contains("contains r1, r2, r3... (12 rows)"));
    }

    #[test]
    fn hint_many_columns_elides() {
        let s = sheet("Wide", &["a", "b", "c", "d", "e", "f"], 1, &[]);
        let hint = sheet_hint(&s);
        assert!(hint.contains("columns: a/b/c/d (+2 more)"));
    }

    #[test]
    fn sample_markdown_lists_sample_rows_and_trailer() {
        let mut s = sheet("Data", &["x", "y"], 10, &[]);
        s.sample_rows = vec![
            [("x".to_string(), json!(1)), ("y".to_string(), json!("a"))]
                .into_iter()
                .collect(),
            [("x".to_string(), json!(2)), ("y".to_string(), json!("b"))]
                .into_iter()
                .collect(),
        ];
        let md = sheet_sample_markdown(&s);
        assert!(md.contains("# Sheet: Data"));
        assert!(md.contains("_Columns: x, y_"));
        assert!(md.contains("| x | y |"));
        assert!(md.contains("| 1 | a |"));
        assert!(md.contains("_(8 more rows)_"));
    }

    #[test]
    fn empty_sheet_markdown() {
        let s = sheet("Empty", &[], 0, &[]);
        assert!(sheet_sample_markdown(&s).contains("(empty sheet)"));
        assert!(full_sheet_markdown(&s, None).contains("(empty sheet)"));
    }

    #[test]
    fn cell_to_string_formats() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("hi".into())), "hi");
        assert_eq!(cell_to_string(&Data::Int(42)), "42");
        assert_eq!(cell_to_string(&Data::Float(1500.0)), "1500");
        assert_eq!(cell_to_string(&Data::Float(0.25)), "0.25");
        assert_eq!(cell_to_string(&Data::Bool(true)), "TRUE");
    }

    #[test]
    fn cell_to_value_preserves_types() {
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
        assert_eq!(cell_to_value(&Data::Int(7)), json!(7));
        assert_eq!(cell_to_value(&Data::Bool(false)), json!(false));
        assert_eq!(cell_to_value(&Data::String("s".into())), json!("s"));
    }

    #[test]
    fn render_table_shape() {
        let table = render_table(
            &["a".to_string(), "b".to_string()],
            &[vec!["1".to_string(), "2".to_string()]],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "| a | b |");
        assert_eq!(lines[1], "|---|---|");
        assert_eq!(lines[2], "| 1 | 2 |");
    }

    #[test]
    fn full_markdown_includes_columns_line() {
        let s = sheet("S", &["a", "b"], 1, &[]);
        let md = full_sheet_markdown(&s, Some("| a | b |\n|---|---|\n| 1 | 2 |"));
        assert!(md.contains("_Columns: a, b_"));
        assert!(md.contains("| 1 | 2 |"));
    }
}
