use colored::Colorize;

use metahub::{CatalogSummary, IngestReport, NodeContent, SearchHit, SourceContent};

/// Render an ASCII score bar: `filled` of `total` segments.
pub fn render_bar(filled: usize, total: usize) -> String {
    let filled = filled.min(total);
    format!("{}{}", "█".repeat(filled), "░".repeat(total - filled))
}

/// Print Tier-1 search results with score bars and source IDs.
pub fn print_search_results(results: &[SearchHit], query: &str) {
    if results.is_empty() {
        println!(
            "  {} No results found for {} — is the index built?",
            "✗".red().bold(),
            format!("\"{query}\"").yellow()
        );
        return;
    }

    println!(
        "{} {} result{} for {}\n",
        "Search:".bold(),
        results.len().to_string().bold(),
        if results.len() == 1 { "" } else { "s" },
        format!("\"{query}\"").yellow()
    );

    for r in results {
        let filled = (r.score.clamp(0.0, 1.0) * 10.0).round() as usize;
        println!(
            "  {} {} {} {}",
            format!("#{}", r.rank).bold(),
            render_bar(filled, 10),
            format!("{:.3}", r.score).yellow(),
            r.filename.bold()
        );
        println!("     {} {}", "ID:".dimmed(), r.id);
        if !r.summary.is_empty() {
            let short: String = r.summary.chars().take(80).collect();
            println!("     {short}");
        }
        println!();
    }
}

/// Print the outcome of a batch ingest.
pub fn print_ingest_report(report: &IngestReport) {
    println!(
        "\n  {} {} processed, {} skipped, {} failed",
        if report.failed == 0 {
            "✓".green().bold()
        } else {
            "✗".red().bold()
        },
        report.processed.to_string().bold(),
        report.skipped,
        report.failed
    );
    if let Some(total) = report.vectors_total {
        println!("  {} {} vectors", "Index:".dimmed(), total);
    }
    for id in &report.source_ids {
        println!("    {}", id.dimmed());
    }
}

/// Print resolved node content: header lines then the raw content.
pub fn print_node_content(content: &NodeContent) {
    println!("[{}] {}", content.node_id.bold(), content.title.bold());
    if !content.summary.is_empty() {
        println!("{} {}", "Summary:".dimmed(), content.summary);
    }
    if let Some(ref content_ref) = content.content_ref {
        println!("{} {}", "File:".dimmed(), content_ref);
    }
    println!("\n{}", content.content);
}

/// Print every converted file of a source, truncating long content.
pub fn print_source_content(content: &SourceContent) {
    println!(
        "Source: {} — {} file{}\n",
        content.source_id.bold(),
        content.total_files,
        if content.total_files == 1 { "" } else { "s" }
    );
    for file in &content.files {
        println!("{}", format!("--- {} ---", file.name).bold());
        let shown: String = file.content.chars().take(2000).collect();
        println!("{shown}");
        if file.content.chars().count() > 2000 {
            println!(
                "{}",
                format!("[...truncated, {} chars total]", file.content.chars().count()).dimmed()
            );
        }
        println!();
    }
}

/// Print the catalog summary for `status`.
pub fn print_status(summary: &CatalogSummary) {
    println!("{}", "Store status".bold());
    println!("  {} {}", "Version:".dimmed(), summary.version);
    println!("  {} {}", "Updated:".dimmed(), summary.last_updated);
    println!(
        "  {} {} ({} sampled)",
        "Sources:".dimmed(),
        summary.total_sources.to_string().bold(),
        summary.sampled_count
    );
    for (category, count) in &summary.by_category {
        println!("    {category}: {count}");
    }
}

/// Print the result of the linking pass.
pub fn print_link_report(total_links: usize) {
    println!(
        "  {} {} cross-source link{} attached",
        "✓".green().bold(),
        total_links.to_string().bold(),
        if total_links == 1 { "" } else { "s" }
    );
}

/// Print confirmation after `init`.
pub fn print_init_success(root: &str) {
    println!("  {} Store initialized at {}", "✓".green().bold(), root.bold());
}
