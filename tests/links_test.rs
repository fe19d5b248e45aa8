use std::fs;
use std::path::Path;

use metahub::config::{Config, EmbedderKind};
use metahub::{IngestOptions, MetaHub};
use tempfile::TempDir;

fn store_config(root: &Path) -> Config {
    let mut config = Config::for_root(root);
    config.embedding.provider = EmbedderKind::Mock;
    config.embedding.dimensions = 256;
    config
}

#[tokio::test]
async fn link_pass_attaches_related_sources_and_persists() {
    let store = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    // Two files with shared vocabulary in their names (which flows into the
    // fallback summaries and embeddings), one unrelated.
    fs::write(inbox.path().join("quarterly_revenue_report.md"), "# Revenue\n").unwrap();
    fs::write(inbox.path().join("quarterly_revenue_forecast.md"), "# Forecast\n").unwrap();
    fs::write(inbox.path().join("zoo_animal_care.md"), "# Zoo\n").unwrap();

    let hub = MetaHub::open_with_config(store_config(store.path()));
    let report = hub.ingest(inbox.path(), &IngestOptions::default()).await.unwrap();
    assert_eq!(report.processed, 3);

    let total = hub.link(0.1, 5).await.unwrap();
    assert!(total >= 2, "the two revenue documents must link to each other");

    // Links are persisted into the catalog.
    let catalog = hub.catalog().unwrap();
    let report_entry = catalog
        .sources
        .iter()
        .find(|s| s.filename == "quarterly_revenue_report.md")
        .unwrap();
    let related = report_entry.related.as_ref().unwrap();
    assert!(!related.is_empty());
    assert_eq!(related[0].filename, "quarterly_revenue_forecast.md");
    assert!(related[0].score > 0.0);
    assert!(related[0].embedding_sim.is_some());
}

#[tokio::test]
async fn link_scores_blend_keywords_and_embeddings() {
    let store = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    fs::write(inbox.path().join("alpha_metrics_dashboard.md"), "# Alpha\n").unwrap();
    fs::write(inbox.path().join("alpha_metrics_summary.md"), "# Alpha\n").unwrap();

    let hub = MetaHub::open_with_config(store_config(store.path()));
    hub.ingest(inbox.path(), &IngestOptions::default()).await.unwrap();
    hub.link(0.05, 3).await.unwrap();

    let catalog = hub.catalog().unwrap();
    for source in &catalog.sources {
        let related = source.related.as_ref().unwrap();
        assert_eq!(related.len(), 1);
        let peer = &related[0];
        assert!(peer.keyword_sim > 0.0, "shared summary tokens are keywords");
        let emb = peer.embedding_sim.expect("embeddings available after ingest");
        let expected = 0.4 * peer.keyword_sim + 0.6 * emb;
        assert!((peer.score - expected).abs() < 0.002, "combined score formula");
    }
}

#[tokio::test]
async fn linking_a_single_source_attaches_nothing() {
    let store = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    fs::write(inbox.path().join("lonely.md"), "# Alone\n").unwrap();

    let hub = MetaHub::open_with_config(store_config(store.path()));
    hub.ingest(inbox.path(), &IngestOptions::default()).await.unwrap();

    let total = hub.link(0.1, 5).await.unwrap();
    assert_eq!(total, 0);

    let catalog = hub.catalog().unwrap();
    assert!(catalog.sources[0].related.is_none());
}

#[tokio::test]
async fn linking_without_vectors_uses_keywords_only() {
    let store = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    fs::write(inbox.path().join("project_budget_notes.md"), "# Budget\n").unwrap();
    fs::write(inbox.path().join("project_budget_plan.md"), "# Plan\n").unwrap();

    let hub = MetaHub::open_with_config(store_config(store.path()));
    let options = IngestOptions {
        skip_vectors: true,
        ..Default::default()
    };
    hub.ingest(inbox.path(), &options).await.unwrap();

    let total = hub.link(0.1, 5).await.unwrap();
    assert!(total >= 2);

    let catalog = hub.catalog().unwrap();
    let related = catalog.sources[0].related.as_ref().unwrap();
    assert!(related[0].embedding_sim.is_none(), "keyword-only without an index");
}
