//! Cartograph CLI - code knowledge graph queries.
//!
//! Usage:
//!   cartograph ingest batch.json             # Store an extractor batch
//!   cartograph search <query>                # Search symbols
//!   cartograph callers <id> --depth 2        # Who calls a method
//!   cartograph resolve Save --kind method --in OrderServiceExtended
//!   cartograph stats --version v2            # Graph statistics
//!   cartograph daemon                        # Serve queries over a socket
//!
//! When a daemon is running for the root, commands are forwarded to it;
//! otherwise they run in-process against the configured store.

use anyhow::{bail, Context, Result};
use cartograph::daemon::{is_daemon_running, process_request, send_request, start_daemon, Request, Response};
use cartograph::{Config, ExtractorBatch, KnowledgeBase, NodeKind, SearchQuery};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cartograph")]
#[command(about = "Cartograph - versioned code knowledge graph", long_about = None)]
struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Version tag to query (default: configured default, else all versions)
    #[arg(long, global = true)]
    version: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an extractor batch (JSON file, or - for stdin)
    Ingest {
        file: PathBuf,
    },

    /// Search for symbols by name
    Search {
        query: String,

        /// Restrict to one node kind (class, interface, method, ...)
        #[arg(short, long)]
        kind: Option<NodeKind>,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        namespace: Option<String>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one node
    Node { id: String },

    /// Who calls a method
    Callers {
        id: String,

        /// How many hops to traverse
        #[arg(short, long)]
        depth: Option<usize>,

        /// Also follow calls dispatched through interfaces
        #[arg(long)]
        indirect: bool,
    },

    /// What a method calls
    Callees {
        id: String,

        #[arg(short, long)]
        depth: Option<usize>,

        #[arg(long)]
        indirect: bool,
    },

    /// Ancestors and descendants of a type
    Inheritance {
        id: String,

        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Types implementing an interface
    Implementations { id: String },

    /// Resolve a name to a single node
    Resolve {
        name: String,

        #[arg(short, long, default_value = "method")]
        kind: NodeKind,

        /// Containing type name (methods)
        #[arg(long = "in")]
        containing_type: Option<String>,

        #[arg(long)]
        namespace: Option<String>,
    },

    /// Show graph statistics
    Stats,

    /// List known version tags
    Versions,

    /// Remove everything ingested from a source file
    Delete { source_file: String },

    /// Inspect or control the query cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Run the daemon in the foreground
    Daemon,

    /// Stop a running daemon
    Stop,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Hit/miss counters
    Stats,
    /// Drop cached results (for --version only, if given)
    Clear,
    /// Enable caching
    On,
    /// Disable caching
    Off,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cartograph=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let root = cli.root;
    let version = cli.version;

    let request = match cli.command {
        Commands::Daemon => return run_daemon(&root).await,
        Commands::Stop => return stop_daemon(&root).await,

        Commands::Ingest { file } => Request::Ingest {
            batch: read_batch(&file)?,
        },
        Commands::Search {
            query,
            kind,
            project,
            namespace,
            limit,
        } => {
            let mut q = SearchQuery::new(query);
            q.kind = kind;
            q.project = project;
            q.namespace = namespace;
            q.limit = limit;
            Request::Search { query: q, version }
        }
        Commands::Node { id } => Request::Node { id, version },
        Commands::Callers {
            id,
            depth,
            indirect,
        } => Request::Callers {
            id,
            max_depth: depth,
            include_indirect: indirect,
            version,
        },
        Commands::Callees {
            id,
            depth,
            indirect,
        } => Request::Callees {
            id,
            max_depth: depth,
            include_indirect: indirect,
            version,
        },
        Commands::Inheritance { id, depth } => Request::Inheritance {
            id,
            max_depth: depth,
            version,
        },
        Commands::Implementations { id } => Request::Implementations { id, version },
        Commands::Resolve {
            name,
            kind,
            containing_type,
            namespace,
        } => Request::Resolve {
            name,
            kind,
            containing_type,
            namespace,
            version,
        },
        Commands::Stats => Request::Stats { version },
        Commands::Versions => Request::Versions,
        Commands::Delete { source_file } => Request::DeleteSource { source_file },
        Commands::Cache { action } => match action {
            CacheAction::Stats => Request::CacheStats,
            CacheAction::Clear => Request::CacheInvalidate { version },
            CacheAction::On => Request::CacheToggle { enabled: true },
            CacheAction::Off => Request::CacheToggle { enabled: false },
        },
    };

    let response = if is_daemon_running(&root) {
        send_request(&root, &request).await?
    } else {
        let kb = open(&root).await?;
        process_request(request, &kb).await
    };

    print_response(response)
}

async fn open(root: &Path) -> Result<KnowledgeBase> {
    let config = Config::load_or_default(root)
        .with_context(|| format!("loading config under {}", root.display()))?;
    Ok(KnowledgeBase::open(root, config).await?)
}

fn read_batch(file: &Path) -> Result<ExtractorBatch> {
    let text = if file == Path::new("-") {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?
    };
    Ok(ExtractorBatch::from_json(&text)?)
}

fn print_response(response: Response) -> Result<()> {
    match response {
        Response::Ok { data } => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        Response::Error { message } => bail!(message),
        Response::Pong => {
            println!("pong");
            Ok(())
        }
        Response::Goodbye => {
            println!("daemon stopped");
            Ok(())
        }
    }
}

async fn run_daemon(root: &Path) -> Result<()> {
    if is_daemon_running(root) {
        bail!("daemon already running for {}", root.display());
    }
    let kb = Arc::new(open(root).await?);
    start_daemon(root, kb).await
}

async fn stop_daemon(root: &Path) -> Result<()> {
    if !is_daemon_running(root) {
        println!("daemon not running");
        return Ok(());
    }
    print_response(send_request(root, &Request::Shutdown).await?)
}
