//! Chronicle - persistent multi-character village simulation
//!
//! Entry point: runs the turn loop alongside the read-only web viewer, or
//! inspects and initializes worlds.

use anyhow::Context;
use chronicle_core::{
    api::ApiServer, EmbeddingService, HashEmbeddingService, MemoryStore, RunFlag, SqliteStore,
    World, WorldConfig,
};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{self, EnvFilter};

/// Get the default database path using XDG_DATA_HOME standard
fn get_default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chronicle")
        .join("world.db")
}

#[derive(Parser)]
#[command(name = "chronicle")]
#[command(about = "Persistent turn-based village of LLM-driven characters", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Database path
    #[arg(long, env = "CHRONICLE_DB_PATH", global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the world and its web viewer
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Viewer address, overriding the configuration
        #[arg(long)]
        addr: Option<String>,

        /// Run the simulation without the web viewer
        #[arg(long)]
        no_server: bool,
    },

    /// Show the current turn, characters and fact counts
    Status {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    InitConfig {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<WorldConfig> {
    match path {
        Some(path) => WorldConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(WorldConfig::with_default_characters()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Use the chosen level for our crates, WARN for noisy dependencies
    let level = level.as_str().to_lowercase();
    let filter = EnvFilter::new(format!(
        "chronicle={level},chronicle_core={level},tower_http={level},hyper=warn,reqwest=warn,ort=warn"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("Chronicle v{} starting...", env!("CARGO_PKG_VERSION"));

    let db_path = cli.db_path.unwrap_or_else(get_default_db_path);

    match cli.command {
        Commands::Run {
            config,
            addr,
            no_server,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(addr) = addr {
                config.server.addr = addr
                    .parse::<SocketAddr>()
                    .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", addr, e))?;
            }
            run_world(config, &db_path, no_server).await
        }
        Commands::Status { config } => {
            let config = load_config(config.as_deref())?;
            show_status(&config, &db_path).await
        }
        Commands::InitConfig { path, force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            WorldConfig::with_default_characters().to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

async fn run_world(config: WorldConfig, db_path: &Path, no_server: bool) -> anyhow::Result<()> {
    info!("World database: {}", db_path.display());

    let addr = config.server.addr;
    let world = World::open(config, db_path).await?;
    world.bootstrap().await?;

    let flag = RunFlag::new();

    let signal_flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, finishing the current turn");
            signal_flag.stop();
        }
    });

    let turn_loop = world.turn_loop(flag.clone());
    let loop_flag = flag.clone();
    let loop_handle = tokio::spawn(async move {
        let result = turn_loop.run().await;
        // The viewer goes down with the world
        loop_flag.stop();
        result
    });

    if !no_server {
        let server = ApiServer::new(addr, world.store());
        if let Err(e) = server.serve(flag.clone()).await {
            error!("Web viewer failed: {}", e);
            flag.stop();
        }
    }

    match loop_handle.await? {
        Ok(last_turn) => {
            info!("World saved at turn {}", last_turn);
            Ok(())
        }
        Err(e) => {
            error!("World stopped on storage failure: {}", e);
            Err(e.into())
        }
    }
}

async fn show_status(config: &WorldConfig, db_path: &Path) -> anyhow::Result<()> {
    if !db_path.exists() {
        anyhow::bail!("No world at {} (run `chronicle run` first)", db_path.display());
    }

    // Status only reads, so nothing here is ever embedded
    let embeddings: Arc<dyn EmbeddingService> =
        Arc::new(HashEmbeddingService::new(config.embedding.dimensions()));
    let store = SqliteStore::open(db_path, embeddings).await?;

    let stats = store.stats().await?;
    println!("World: {}", db_path.display());
    println!("Turn: {}", stats.current_turn);
    println!("Events: {}", store.event_count().await?);
    println!("Facts: {}", stats.facts);
    println!();

    for character in store.characters().await? {
        let facts = store.fact_count(&character.name).await?;
        println!(
            "{} ({} facts, reflection from turn {})",
            character.name, facts, character.last_updated_turn
        );
        println!("  {}", character.reflection);
    }

    Ok(())
}
