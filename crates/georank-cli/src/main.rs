use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use georank_core::domain::{ObservedState, ProductId};
use georank_core::impls::{FileAnalyticsStore, HttpAnalysisClient, InMemoryCredentials, LogNoticeSink};
use georank_core::observability::init_tracing;
use georank_core::ports::{AnalyticsStore, Clock, SystemClock};
use georank_core::{AnalysisWatcher, AppConfig, WatcherBuilder};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "GeoRank analysis watcher")]
struct Args {
    /// Path to config.toml (missing file means defaults).
    #[arg(long, short, default_value = "georank.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the latest analysis of a product until it resolves.
    Watch {
        product: String,
        /// Only accept a completion newer than now.
        #[arg(long)]
        new_analysis: bool,
    },
    /// Ask the backend for a fresh analysis, then watch it.
    Regenerate { product: String },
    /// Print the last completed analysis from the local cache.
    ShowCached { product: String },
    /// Load and validate the config, then exit.
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config).map_err(|e| e.to_string())?;
    config.apply_env();
    config.validate().map_err(|e| e.to_string())?;
    init_tracing(&config.logging.level).map_err(|e| e.to_string())?;

    match args.command {
        Command::ValidateConfig => {
            println!("ok: config validated at {}", args.config.display());
            Ok(())
        }
        Command::ShowCached { product } => {
            let store = FileAnalyticsStore::new(&config.cache.path);
            let cached = store
                .load(&ProductId::new(product.as_str()))
                .await
                .map_err(|e| e.to_string())?;
            match cached {
                Some(record) => print_json(&record),
                None => Err(format!("no cached analysis for {product}")),
            }
        }
        Command::Watch {
            product,
            new_analysis,
        } => {
            let (watcher, credentials) = build_watcher(&config)?;
            let product = ProductId::new(product.as_str());
            let mut updates = watcher.subscribe();
            if new_analysis {
                let trigger = SystemClock.now_epoch_ms();
                watcher
                    .start_new_analysis(product, trigger)
                    .map_err(|e| e.to_string())?;
            } else {
                watcher.start(product).map_err(|e| e.to_string())?;
            }
            follow(watcher, &mut updates, &credentials).await
        }
        Command::Regenerate { product } => {
            let (watcher, credentials) = build_watcher(&config)?;
            let mut updates = watcher.subscribe();
            watcher
                .regenerate(ProductId::new(product.as_str()))
                .await
                .map_err(|e| e.to_string())?;
            info!(%product, "regeneration accepted");
            follow(watcher, &mut updates, &credentials).await
        }
    }
}

fn build_watcher(config: &AppConfig) -> Result<(AnalysisWatcher, Arc<InMemoryCredentials>), String> {
    let token = std::env::var(georank_core::config::ENV_TOKEN)
        .ok()
        .filter(|t| !t.trim().is_empty());
    let credentials = Arc::new(InMemoryCredentials::new(token));

    let client = HttpAnalysisClient::new(
        config.api.base_url.clone(),
        config.request_timeout(),
        config.api.history_limit,
    )
    .map_err(|e| e.to_string())?;

    let watcher = WatcherBuilder::new()
        .policy(config.policy())
        .client(Arc::new(client))
        .credentials(credentials.clone())
        .store(Arc::new(FileAnalyticsStore::new(&config.cache.path)))
        .notices(Arc::new(LogNoticeSink))
        .build()
        .map_err(|e| e.to_string())?;
    Ok((watcher, credentials))
}

/// Print every observed change until the session stops analyzing or Ctrl-C.
async fn follow(
    watcher: AnalysisWatcher,
    updates: &mut tokio::sync::watch::Receiver<ObservedState>,
    credentials: &InMemoryCredentials,
) -> Result<(), String> {
    let outcome = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break Err("watcher stopped unexpectedly".to_string());
                }
                let state = updates.borrow_and_update().clone();
                print_json(&state)?;
                if !state.is_analyzing {
                    break Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(());
            }
        }
    };
    watcher.shutdown_and_join().await;

    if credentials.invalidations() > 0 {
        return Err(format!(
            "credential rejected; set {} to a valid token",
            georank_core::config::ENV_TOKEN
        ));
    }
    outcome
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}
