//! clusterplace daemon
//!
//! Composition root: resolves placements against the cluster registry and
//! owns the restart policy applied when the registry becomes available.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clusterplace_core::{DaemonConfig, LoggingConfig, Placement, WatchdogConfig};
use clusterplace_registry::{ClusterRegistry, KubeRegistry};
use clusterplace_scheduler::{to_place_local, PlacementResolver, RegistryWatchdog};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Exit status used to ask the supervisor for a restart
const RESTART_EXIT_CODE: i32 = 1;

/// clusterplaced - cluster placement resolution for multi-cluster scheduling
#[derive(Parser, Debug)]
#[command(name = "clusterplaced")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Kubernetes API server URL serving the cluster registry (overrides the config file)
    #[arg(long, global = true)]
    cluster_url: Option<String>,

    /// Kubeconfig context to use (overrides the config file)
    #[arg(long, global = true)]
    context: Option<String>,

    /// Log level or filter directive (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a placement file (TOML or JSON) into target clusters
    Resolve {
        /// Placement document
        placement: PathBuf,
    },

    /// Watch for the cluster registry and exit once it becomes available
    Watch,
}

/// Output of the resolve command
#[derive(Debug, Serialize)]
struct ResolveOutput {
    local: bool,
    clusters: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DaemonConfig::from_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(url) = args.cluster_url {
        config.registry.cluster_url = Some(url);
    }
    if let Some(context) = args.context {
        config.registry.context = Some(context);
    }
    config.validate()?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging)?;

    info!("Starting clusterplaced v{}", env!("CARGO_PKG_VERSION"));

    let registry: Arc<dyn ClusterRegistry> = Arc::new(KubeRegistry::from_config(&config.registry).await?);
    info!(
        cluster_url = config.registry.cluster_url.as_deref().unwrap_or("<kubeconfig>"),
        context = config.registry.context.as_deref().unwrap_or("<current>"),
        namespace = config.registry.namespace.as_deref().unwrap_or("<all>"),
        "Using cluster registry"
    );

    match args.command {
        Commands::Resolve { placement } => resolve(registry, &placement).await,
        Commands::Watch => watch_registry(registry, &config.watchdog).await,
    }
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    let writer = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(writer);

    let installed = if config.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to set subscriber: {}", e))
}

fn load_placement(path: &Path) -> Result<Placement> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read placement file {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let placement = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };

    Ok(placement)
}

async fn resolve(registry: Arc<dyn ClusterRegistry>, path: &Path) -> Result<()> {
    let placement = load_placement(path)?;
    let resolver = PlacementResolver::new(registry);

    let resolved = resolver.resolve_placement(&placement).await?;
    let mut clusters: Vec<String> = resolved.into_keys().collect();
    clusters.sort();

    let output = ResolveOutput {
        local: to_place_local(Some(&placement)),
        clusters,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

async fn watch_registry(registry: Arc<dyn ClusterRegistry>, config: &WatchdogConfig) -> Result<()> {
    if !config.enabled {
        info!("Registry watchdog disabled");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = RegistryWatchdog::from_config(registry, config)?
        .start(shutdown_rx, || {
            error!("Cluster registry is now available, exiting for restart");
            std::process::exit(RESTART_EXIT_CODE);
        })
        .await;

    let Some(handle) = handle else {
        info!("Cluster registry already available, nothing to watch");
        return Ok(());
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    let _ = shutdown_tx.send(true);
    let outcome = handle.await?;
    info!(?outcome, "Registry watchdog stopped");

    Ok(())
}
