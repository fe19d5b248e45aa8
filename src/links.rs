//! Cross-source linking.
//!
//! An optional pass over the catalog that scores every pair of sources by
//! a blend of keyword overlap and embedding similarity, then attaches the
//! strongest peers to each entry as `related`. Not run automatically by
//! ingest; exposed as an explicit operation.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::vector::cosine_similarity;

/// Weight of the keyword Jaccard score in the combined similarity.
const KEYWORD_WEIGHT: f64 = 0.4;

/// Weight of the embedding cosine score in the combined similarity.
const EMBEDDING_WEIGHT: f64 = 0.6;

/// Tokens shorter than this are never keywords.
const MIN_KEYWORD_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "need", "dare", "ought", "used", "to", "of", "in", "for", "on", "with", "at", "by",
    "from", "as", "into", "through", "and", "or", "but", "if", "because", "until", "while",
    "this", "that", "these", "those", "it", "its",
];

/// One related peer of a source, with its score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedSource {
    pub id: String,
    pub filename: String,
    pub score: f64,
    pub keyword_sim: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_sim: Option<f64>,
}

/// Extract keywords: lowercase alphanumeric tokens longer than
/// [`MIN_KEYWORD_LEN`], minus stopwords.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|word| word.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|clean| clean.len() > MIN_KEYWORD_LEN && !STOPWORDS.contains(&clean.as_str()))
        .collect()
}

/// Jaccard similarity of two keyword sets.
pub fn keyword_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Compute related-source lists for every catalog entry.
///
/// Combined score = `0.4 * jaccard + 0.6 * cosine` when an embedding pair
/// is available, keyword-only otherwise. Each source keeps its top
/// `max_links` peers scoring at least `min_similarity`.
pub fn find_related(
    catalog: &Catalog,
    embeddings: &HashMap<String, Vec<f32>>,
    min_similarity: f64,
    max_links: usize,
) -> HashMap<String, Vec<RelatedSource>> {
    let sources = &catalog.sources;
    if sources.len() < 2 {
        return HashMap::new();
    }

    let keywords: HashMap<&str, HashSet<String>> = sources
        .iter()
        .map(|s| {
            let text = format!("{} {}", s.summary, s.tags.join(" "));
            (s.id.as_str(), extract_keywords(&text))
        })
        .collect();

    let mut related = HashMap::with_capacity(sources.len());

    for source in sources {
        let mut peers: Vec<RelatedSource> = Vec::new();

        for other in sources {
            if other.id == source.id {
                continue;
            }

            let kw_sim = keyword_similarity(&keywords[source.id.as_str()], &keywords[other.id.as_str()]);

            let emb_sim = match (embeddings.get(&source.id), embeddings.get(&other.id)) {
                (Some(a), Some(b)) => {
                    let cos = cosine_similarity(a, b) as f64;
                    (cos > 0.0).then_some(cos)
                }
                _ => None,
            };

            let combined = match emb_sim {
                Some(cos) => KEYWORD_WEIGHT * kw_sim + EMBEDDING_WEIGHT * cos,
                None => kw_sim,
            };

            if combined >= min_similarity {
                peers.push(RelatedSource {
                    id: other.id.clone(),
                    filename: other.filename.clone(),
                    score: round3(combined),
                    keyword_sim: round3(kw_sim),
                    embedding_sim: emb_sim.map(round3),
                });
            }
        }

        peers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        peers.truncate(max_links);
        related.insert(source.id.clone(), peers);
    }

    related
}

/// Compute links and attach them to the catalog entries. Returns the total
/// number of links attached.
pub fn link_sources(
    catalog: &mut Catalog,
    embeddings: &HashMap<String, Vec<f32>>,
    min_similarity: f64,
    max_links: usize,
) -> usize {
    let related = find_related(catalog, embeddings, min_similarity, max_links);
    let total: usize = related.values().map(Vec::len).sum();

    for source in &mut catalog.sources {
        if let Some(peers) = related.get(&source.id) {
            source.related = Some(peers.clone());
        }
    }

    info!(links = total, sources = related.len(), "cross-source links computed");
    total
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{FileCard, FileType};
    use crate::sample::fallback_strategy;
    use std::path::PathBuf;

    fn catalog_with(summaries: &[(&str, &str, &[&str])]) -> Catalog {
        let mut catalog = Catalog::new();
        for (id, summary, tags) in summaries {
            let mut card = FileCard {
                id: id.to_string(),
                filename: format!("{id}.md"),
                path: PathBuf::from(format!("/inbox/{id}.md")),
                file_type: FileType::Markdown,
                category: FileType::Markdown.category(),
                size_kb: 1.0,
                sampled: false,
                strategy: None,
                pages: None,
                sheets: None,
            };
            let mut strategy = fallback_strategy(&card);
            strategy.summary = summary.to_string();
            strategy.tags = tags.iter().map(|t| t.to_string()).collect();
            card.strategy = Some(strategy);
            card.sampled = true;
            catalog.add_source(&card, String::new(), String::new());
        }
        catalog
    }

    #[test]
    fn keywords_filter_short_and_stopwords() {
        let kw = extract_keywords("The quarterly revenue report for the sales team");
        assert!(kw.contains("quarterly"));
        assert!(kw.contains("revenue"));
        assert!(kw.contains("report"));
        assert!(kw.contains("sales"));
        assert!(kw.contains("team"));
        assert!(!kw.contains("the"));
        assert!(!kw.contains("for"));
    }

    #[test]
    fn keywords_strip_punctuation() {
        let kw = extract_keywords("revenue, expenses; (guidance)");
        assert!(kw.contains("revenue"));
        assert!(kw.contains("expenses"));
        assert!(kw.contains("guidance"));
    }

    #[test]
    fn jaccard_basic_properties() {
        let a: HashSet<String> = ["alpha", "beta"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["beta", "gamma"].iter().map(|s| s.to_string()).collect();
        let sim = keyword_similarity(&a, &b);
        assert!((sim - 1.0 / 3.0).abs() < 1e-9);

        assert_eq!(keyword_similarity(&a, &HashSet::new()), 0.0);
        assert!((keyword_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn find_related_keyword_only() {
        let catalog = catalog_with(&[
            ("src_aaaa000000", "quarterly revenue figures finance", &["finance"]),
            ("src_bbbb000000", "quarterly revenue breakdown finance", &["finance"]),
            ("src_cccc000000", "kubernetes cluster networking", &["infra"]),
        ]);

        let related = find_related(&catalog, &HashMap::new(), 0.1, 5);
        let a_peers = &related["src_aaaa000000"];
        assert_eq!(a_peers.len(), 1);
        assert_eq!(a_peers[0].id, "src_bbbb000000");
        assert!(a_peers[0].embedding_sim.is_none());
        assert!(a_peers[0].score > 0.3);

        assert!(related["src_cccc000000"].is_empty());
    }

    #[test]
    fn find_related_blends_embeddings() {
        let catalog = catalog_with(&[
            ("src_aaaa000000", "shared topic words here", &[]),
            ("src_bbbb000000", "shared topic words there", &[]),
        ]);

        let mut embeddings = HashMap::new();
        embeddings.insert("src_aaaa000000".to_string(), vec![1.0, 0.0]);
        embeddings.insert("src_bbbb000000".to_string(), vec![1.0, 0.0]);

        let related = find_related(&catalog, &embeddings, 0.1, 5);
        let peer = &related["src_aaaa000000"][0];
        assert_eq!(peer.embedding_sim, Some(1.0));
        // 0.4 * jaccard + 0.6 * 1.0, so the embedding term dominates.
        assert!(peer.score > 0.6);
    }

    #[test]
    fn find_related_respects_max_links() {
        let catalog = catalog_with(&[
            ("src_aaaa000000", "common words everywhere always", &[]),
            ("src_bbbb000000", "common words everywhere always", &[]),
            ("src_cccc000000", "common words everywhere always", &[]),
            ("src_dddd000000", "common words everywhere always", &[]),
        ]);

        let related = find_related(&catalog, &HashMap::new(), 0.1, 2);
        assert_eq!(related["src_aaaa000000"].len(), 2);
    }

    #[test]
    fn find_related_single_source_is_empty() {
        let catalog = catalog_with(&[("src_aaaa000000", "alone here", &[])]);
        assert!(find_related(&catalog, &HashMap::new(), 0.1, 5).is_empty());
    }

    #[test]
    fn link_sources_attaches_related() {
        let mut catalog = catalog_with(&[
            ("src_aaaa000000", "quarterly revenue figures finance", &[]),
            ("src_bbbb000000", "quarterly revenue breakdown finance", &[]),
        ]);

        let total = link_sources(&mut catalog, &HashMap::new(), 0.1, 5);
        assert_eq!(total, 2);
        let related = catalog.sources[0].related.as_ref().unwrap();
        assert_eq!(related[0].id, "src_bbbb000000");
    }

    #[test]
    fn scores_are_rounded() {
        assert_eq!(round3(0.123456), 0.123);
        assert_eq!(round3(1.0 / 3.0), 0.333);
    }
}
