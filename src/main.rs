use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use connect_config::AppConfig;
use connect_core::{FigmaUrl, NodeId};
use connect_fetch::{Fetcher, RequestWatcher};
use connect_store::{
    format_age, generate_layout, stale_after, CacheSummary, LayoutStyle, RequestQueue, Store,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "connect")]
#[command(about = "Figma Code Connect preview bridge", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./connect.yaml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, action = clap::ArgAction::SetTrue, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch Code Connect data for a node id (28:1289 or 28-1289)
    Fetch {
        node_id: String,

        /// Treat the node as a frame and extract its child components
        #[arg(long, action = clap::ArgAction::SetTrue)]
        frame: bool,
    },

    /// Fetch Code Connect data for the node in a Figma URL
    FetchUrl {
        url: String,

        #[arg(long, action = clap::ArgAction::SetTrue)]
        frame: bool,
    },

    /// Show the cached component, frame and pending requests
    List,

    /// Process fetch requests as they appear
    Watch,

    /// Serve the cached data over HTTP
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Render a preview component from the current frame
    Layout {
        /// Card-per-component layout instead of the detailed one
        #[arg(long, action = clap::ArgAction::SetTrue)]
        simple: bool,

        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_json) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            println!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Fetch { node_id, frame } => {
            let Ok(node_id) = NodeId::parse(&node_id) else {
                println!("❌ Invalid node id: {node_id}");
                println!("   Expected a form like 28:1289 or 28-1289");
                return Ok(ExitCode::FAILURE);
            };
            fetch(&config, node_id, frame).await
        }
        Commands::FetchUrl { url, frame } => {
            println!("🔗 Parsing Figma URL: {url}");
            let Some(parsed) = FigmaUrl::parse(&url) else {
                println!("❌ Invalid Figma URL format");
                println!("   Expected format: https://www.figma.com/design/<fileKey>/<name>?node-id=<id>");
                return Ok(ExitCode::FAILURE);
            };
            println!("📍 Extracted node ID: {}", parsed.node_id);
            fetch(&config, parsed.node_id, frame).await
        }
        Commands::List => list(&config).await,
        Commands::Watch => watch(&config).await,
        Commands::Serve { port } => {
            let mut config = config;
            if let Some(port) = port {
                config.server.port = port;
            }
            println!("🚀 Serving on http://{}", config.listen_addr());
            connect_server::serve(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Layout { simple, out } => layout(&config, simple, out).await,
    }
}

async fn build_fetcher(config: &AppConfig) -> Fetcher {
    let bridge = connect_mcp::connect_bridge(config.bridge.server.as_ref()).await;
    Fetcher::new(Arc::from(bridge), Store::new(&config.paths.data_dir)).with_client(&config.bridge)
}

async fn fetch(config: &AppConfig, node_id: NodeId, frame: bool) -> Result<ExitCode> {
    let fetcher = build_fetcher(config).await;

    let error = if frame {
        println!("🔗 Fetching frame data for: {node_id}");
        let saved = fetcher.fetch_frame_and_save(&node_id).await?;
        println!("💾 Saved to: {}", saved.path.display());
        println!("📊 Children: {}", saved.result.children.len());
        println!("✅ Valid components: {}", saved.result.valid_children());
        saved.result.error
    } else {
        println!("🔗 Fetching Code Connect data for node: {node_id}");
        let saved = fetcher.fetch_and_save(&node_id).await?;
        println!("💾 Saved to: {}", saved.path.display());
        println!("📊 Published: {}", saved.result.published);
        saved.result.error
    };

    match error {
        None => Ok(ExitCode::SUCCESS),
        Some(e) => {
            println!("❌ Failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn list(config: &AppConfig) -> Result<ExitCode> {
    let store = Store::new(&config.paths.data_dir);
    let queue = RequestQueue::new(&config.paths.data_dir);
    let summary = CacheSummary::collect(&store, &queue).await?;

    if summary.is_empty() {
        println!("📄 No cached data in {}", config.paths.data_dir.display());
        println!("   Run a fetch command first.");
        return Ok(ExitCode::SUCCESS);
    }

    let now = Utc::now();
    let stale = |timestamp: DateTime<Utc>| {
        if now.signed_duration_since(timestamp) >= stale_after() {
            " (stale)"
        } else {
            ""
        }
    };

    if let Some(component) = &summary.component {
        println!("🔹 Current component: {}", component.node_id);
        println!(
            "   Status: {}",
            if component.published { "✅ Published" } else { "❌ Not Published" }
        );
        println!("   Updated: {}{}", format_age(component.timestamp, now), stale(component.timestamp));
        if let Some(error) = &component.error {
            println!("   Error: {error}");
        }
        println!();
    }

    if let Some(frame) = &summary.frame {
        println!("🔹 Current frame: {}", frame.frame_node_id);
        println!(
            "   Components: {} ({} with code)",
            frame.children.len(),
            frame.valid_children()
        );
        println!("   Updated: {}{}", format_age(frame.timestamp, now), stale(frame.timestamp));
        println!();
    }

    println!("📥 Pending requests: {}", summary.pending_requests);
    Ok(ExitCode::SUCCESS)
}

async fn watch(config: &AppConfig) -> Result<ExitCode> {
    let fetcher = build_fetcher(config).await;
    if !fetcher.bridge_available() {
        println!("⚠️  Design bridge unavailable; requests will be saved with an error");
    }

    let queue = RequestQueue::new(&config.paths.data_dir);
    println!("👀 Watching for requests in: {}", queue.dir().display());
    println!("🔄 Press Ctrl+C to stop.");

    RequestWatcher::new(Arc::new(fetcher), queue, config.watch.settle_ms)
        .run()
        .await?;

    println!("👋 Watcher stopped");
    Ok(ExitCode::SUCCESS)
}

async fn layout(config: &AppConfig, simple: bool, out: Option<PathBuf>) -> Result<ExitCode> {
    let store = Store::new(&config.paths.data_dir);
    let Some(frame) = store.current_frame().await else {
        println!("❌ No current frame found");
        println!("   Run: connect fetch <frameNodeId> --frame");
        return Ok(ExitCode::FAILURE);
    };

    let style = if simple { LayoutStyle::Simple } else { LayoutStyle::Detailed };
    let source = generate_layout(&frame, style);

    match out {
        Some(path) => {
            tokio::fs::write(&path, source)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Layout for frame {} written to {:?}", frame.frame_node_id, path);
            println!("✅ Layout written to {}", path.display());
        }
        None => print!("{source}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let filter = if verbose { "debug" } else { "info" };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let (plain, structured) = if json {
        (
            None,
            Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(plain)
        .with(structured)
        .try_init()?;

    Ok(())
}
