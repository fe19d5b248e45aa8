//! Sampling and strategy selection.
//!
//! The strategist examines a content sample and decides how a document
//! should be indexed. With an LLM configured it asks for a structured
//! strategy; otherwise (or on any failure) a deterministic heuristic maps
//! the file's category to an indexing approach.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::converters;
use crate::detect::{Category, FileCard};
use crate::llm::LlmClient;

/// The four indexing approaches a strategy can recommend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    TreeIndex,
    SchemaIndex,
    SymbolIndex,
    ChunkEmbed,
}

impl Approach {
    pub fn as_str(&self) -> &'static str {
        match self {
            Approach::TreeIndex => "tree_index",
            Approach::SchemaIndex => "schema_index",
            Approach::SymbolIndex => "symbol_index",
            Approach::ChunkEmbed => "chunk_embed",
        }
    }
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indexing strategy for one source: approach, summary, and tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub doc_nature: String,
    #[serde(default)]
    pub has_structure: bool,
    pub recommended_approach: Approach,
    #[serde(default)]
    pub key_sections: Vec<String>,
    #[serde(default)]
    pub estimated_nodes: u32,
    #[serde(default)]
    pub special_handling: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

const STRATEGY_SYSTEM_PROMPT: &str = r#"You are a document analysis expert working for a knowledge indexing system.

Your job: examine a sample of a document and decide the best indexing strategy.

You MUST respond with valid JSON only — no explanations, no markdown, just the JSON object.

The JSON schema you must follow:
{
  "doc_nature": "<string: what kind of document this is, e.g. financial_report, api_docs, meeting_notes, sales_data, source_code>",
  "has_structure": <boolean: does the document have clear hierarchical structure?>,
  "recommended_approach": "<one of: tree_index, schema_index, symbol_index, chunk_embed>",
  "key_sections": ["<list of main sections or topics found>"],
  "estimated_nodes": <integer: estimated number of tree nodes for indexing>,
  "special_handling": "<string or null: any special processing notes>",
  "summary": "<string: 1-2 sentence summary of the document's content and purpose>",
  "tags": ["<list of 3-5 topic tags>"]
}

Strategy decision guide:
- tree_index: Documents with hierarchical structure (headings, ToC, sections). PDFs with chapters, structured markdown, documentation.
- schema_index: Tabular/spreadsheet data. Excel files, CSVs with consistent columns.
- symbol_index: Code files with functions, classes, imports.
- chunk_embed: Flat unstructured text without clear sections. Notes, transcripts, plain text."#;

/// Run the full sampling pipeline for one file card.
///
/// Extracts a sample via the type's converter, asks the LLM for a strategy
/// when available, and falls back to the heuristic on absence or any
/// failure. Marks the card as sampled.
pub async fn sample_file(card: &mut FileCard, llm: Option<&LlmClient>) {
    let sample = converters::get_sample(&card.path, card.file_type, card.category);

    let strategy = match llm {
        Some(client) => match request_strategy(client, card, &sample).await {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(file = %card.filename, error = %e, "llm sampling failed, using heuristic");
                fallback_strategy(card)
            }
        },
        None => fallback_strategy(card),
    };

    card.sampled = true;
    card.strategy = Some(strategy);
}

/// Ask the LLM for a strategy and validate the response shape.
async fn request_strategy(
    client: &LlmClient,
    card: &FileCard,
    sample: &str,
) -> crate::Result<Strategy> {
    let prompt = format!(
        "Analyze this document sample and return the indexing strategy as JSON.\n\n\
         **File info:**\n\
         - Filename: {}\n\
         - Type: {}\n\
         - Category: {}\n\
         - Size: {} KB\n\n\
         **Document sample:**\n```\n{}\n```\n\n\
         Respond with the strategy JSON only.",
        card.filename, card.file_type, card.category, card.size_kb, sample
    );

    let value = client.send_json(STRATEGY_SYSTEM_PROMPT, &prompt, 1024).await?;

    // The three load-bearing fields must be present and well-formed; the
    // rest defaults.
    for field in ["doc_nature", "recommended_approach", "summary"] {
        if value.get(field).and_then(|v| v.as_str()).is_none() {
            return Err(crate::Error::Llm(format!(
                "strategy response missing field '{field}'"
            )));
        }
    }

    let strategy: Strategy = serde_json::from_value(value)
        .map_err(|e| crate::Error::Llm(format!("strategy response malformed: {e}")))?;
    debug!(file = %card.filename, approach = %strategy.recommended_approach, "llm strategy accepted");
    Ok(strategy)
}

/// Deterministic strategy used when no LLM is available.
pub fn fallback_strategy(card: &FileCard) -> Strategy {
    let approach = match card.category {
        Category::Document | Category::Text | Category::Web => Approach::TreeIndex,
        Category::Spreadsheet => Approach::SchemaIndex,
        Category::Code => Approach::SymbolIndex,
        _ => Approach::ChunkEmbed,
    };

    let has_structure = matches!(
        card.category,
        Category::Document | Category::Spreadsheet | Category::Code | Category::Text
    );

    Strategy {
        doc_nature: format!("{}_{}", card.category, card.file_type),
        has_structure,
        recommended_approach: approach,
        key_sections: Vec::new(),
        estimated_nodes: 5,
        special_handling: Some("Fallback strategy — no LLM available for sampling".to_string()),
        summary: format!(
            "File: {} ({}, {:.1} KB)",
            card.filename, card.file_type, card.size_kb
        ),
        tags: vec![card.category.to_string(), card.file_type.to_string()],
    }
}
