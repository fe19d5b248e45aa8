mod format;

use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use metahub::{IngestOptions, MetaHub};

/// metahub — hybrid document knowledge index
#[derive(Parser)]
#[command(name = "metahub", about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug for this crate; -vvv trace for everything)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file or directory into the store
    Ingest(IngestArgs),

    /// Tier-1 semantic search over indexed sources
    Search(SearchArgs),

    /// Tier-2: show a source's tree index or a specific node
    Retrieve(RetrieveArgs),

    /// Read converted content referenced by a tree node
    Read(ReadArgs),

    /// Compute cross-source links and attach them to the catalog
    Link(LinkArgs),

    /// Show catalog summary
    Status(StatusArgs),

    /// Initialize a new store directory
    Init(InitArgs),
}

#[derive(Parser)]
struct IngestArgs {
    /// Path to a file or directory to ingest
    input: PathBuf,

    /// Path to the store root
    #[arg(long, default_value = ".")]
    store: PathBuf,

    /// Skip the vector index update
    #[arg(long)]
    no_vectors: bool,

    /// Skip files whose content hash is unchanged since the last ingest
    #[arg(long)]
    incremental: bool,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,
}

#[derive(Parser)]
struct SearchArgs {
    /// Natural language search query
    query: String,

    /// Number of results to return
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Path to the store root
    #[arg(long, default_value = ".")]
    store: PathBuf,

    /// Output results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct RetrieveArgs {
    /// Source ID (e.g. src_a1b2c3d4e5)
    source_id: String,

    /// Show a specific node instead of the whole tree
    #[arg(long)]
    node: Option<String>,

    /// Path to the store root
    #[arg(long, default_value = ".")]
    store: PathBuf,

    /// Output as JSON
    #[arg(long, conflicts_with = "summary")]
    json: bool,

    /// Show the readable tree summary (default for whole trees)
    #[arg(long)]
    summary: bool,
}

#[derive(Parser)]
struct ReadArgs {
    /// Source ID
    source_id: String,

    /// Tree node ID to read
    node_id: Option<String>,

    /// Read a specific file by store-relative path
    #[arg(long, conflicts_with = "node_id")]
    file: Option<String>,

    /// Read all converted content for this source
    #[arg(long, conflicts_with_all = ["node_id", "file"])]
    all: bool,

    /// Path to the store root
    #[arg(long, default_value = ".")]
    store: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct LinkArgs {
    /// Path to the store root
    #[arg(long, default_value = ".")]
    store: PathBuf,

    /// Minimum combined similarity for a link
    #[arg(long, default_value_t = 0.1)]
    min_similarity: f64,

    /// Maximum links kept per source
    #[arg(long, default_value_t = 5)]
    max_links: usize,
}

#[derive(Parser)]
struct StatusArgs {
    /// Path to the store root
    #[arg(long, default_value = ".")]
    store: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct InitArgs {
    /// Path to the store root
    #[arg(long, default_value = ".")]
    store: PathBuf,
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(std::io::stdout(), value)?;
    writeln!(std::io::stdout())?;
    Ok(())
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    metahub::logging::init(cli.verbose)?;

    match cli.command {
        Commands::Ingest(args) => {
            let hub = MetaHub::open(&args.store)?;
            let options = IngestOptions {
                skip_vectors: args.no_vectors,
                incremental: args.incremental,
            };
            let report = hub.ingest(&args.input, &options).await?;
            if !args.quiet {
                format::print_ingest_report(&report);
            }
            return Ok(if report.failed == 0 { 0 } else { 1 });
        }
        Commands::Search(args) => {
            let hub = MetaHub::open(&args.store)?;
            let results = hub.search(&args.query, args.top_k).await?;
            if args.json {
                print_json(&results)?;
            } else {
                format::print_search_results(&results, &args.query);
            }
        }
        Commands::Retrieve(args) => {
            let hub = MetaHub::open(&args.store)?;

            if let Some(ref node_id) = args.node {
                let Some(node) = hub.get_node(&args.source_id, node_id)? else {
                    eprintln!("Node {node_id} not found in source {}", args.source_id);
                    return Ok(1);
                };
                print_json(&node)?;
            } else {
                let Some(tree) = hub.get_tree(&args.source_id)? else {
                    eprintln!("Tree not found for source {}", args.source_id);
                    return Ok(1);
                };
                // The readable summary is the default rendering; --json
                // switches to the raw tree.
                if args.json && !args.summary {
                    print_json(&tree)?;
                } else {
                    println!("{}", metahub::tree::tree_summary(&tree));
                }
            }
        }
        Commands::Read(args) => {
            let hub = MetaHub::open(&args.store)?;

            if let Some(ref relative) = args.file {
                let content = hub.read_file(relative)?;
                println!("{content}");
            } else if args.all {
                let content = hub.read_all(&args.source_id)?;
                if args.json {
                    print_json(&content)?;
                } else {
                    format::print_source_content(&content);
                }
            } else if let Some(ref node_id) = args.node_id {
                let content = hub.read_node(&args.source_id, node_id)?;
                if args.json {
                    print_json(&content)?;
                } else {
                    format::print_node_content(&content);
                }
            } else {
                eprintln!("Specify a node ID, --file <path>, or --all");
                return Ok(1);
            }
        }
        Commands::Link(args) => {
            let hub = MetaHub::open(&args.store)?;
            let total = hub.link(args.min_similarity, args.max_links).await?;
            format::print_link_report(total);
        }
        Commands::Status(args) => {
            let hub = MetaHub::open(&args.store)?;
            let summary = hub.catalog_summary()?;
            if args.json {
                print_json(&summary)?;
            } else {
                format::print_status(&summary);
            }
        }
        Commands::Init(args) => {
            MetaHub::init(&args.store)?;
            format::print_init_success(&args.store.display().to_string());
        }
    }

    Ok(0)
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}
