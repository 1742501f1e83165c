//! Spawner Demo
//!
//! Binds a `SpawnConfig` from `settings.json`, optionally merged with a
//! `settings.<context>.json` overlay, registers the spawners as singletons
//! and runs a batch of tokio tasks through them.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package spawner
//! cargo run --package spawner -- --context burst
//! SERVICE_COLLECTION_ENV=burst cargo run --package spawner
//! cargo run --package spawner -- --spawn-amount 12
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser};
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tracing::{debug, info};
use trellis::config::{ConfigInput, merge_documents};
use trellis::logging;
use trellis::prelude::*;

#[derive(Debug, Parser)]
#[command(about = "Spawn a configured batch of tasks")]
struct Cli {
    /// Base settings file.
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/settings.json"))]
    config: PathBuf,

    /// Overlay context, e.g. `burst` for `settings.burst.json`.
    #[arg(long)]
    context: Option<String>,

    /// Overrides `spawner.spawn_amount`.
    #[arg(long)]
    spawn_amount: Option<u32>,
}

// ============================================================================
// Services
// ============================================================================

#[derive(Debug, ConfigSchema)]
#[config(crate = "trellis::config")]
struct SpawnConfig {
    name: Option<String>,
    spawn_amount: Option<u32>,
    delay_ms: Option<u64>,
}

/// Spawns single tasks; shared by everything that needs one.
#[derive(Injectable)]
#[inject(crate = "trellis::core")]
struct Spawner {
    config: Arc<SpawnConfig>,
    #[inject(default)]
    spawned: AtomicUsize,
}

impl Spawner {
    fn spawn(&self, tasks: &mut JoinSet<usize>) {
        let id = self.spawned.fetch_add(1, Ordering::SeqCst);
        let name = self.config.name.clone().unwrap_or_else(|| "task".to_string());
        let delay = Duration::from_millis(self.config.delay_ms.unwrap_or_default() * (id as u64 % 4 + 1));

        tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(task = %format!("{name}-{id}"), ?delay, "Task finished");
            id
        });
    }
}

#[derive(Injectable)]
#[inject(crate = "trellis::core")]
struct MassiveSpawner {
    spawner: Arc<Spawner>,
}

impl MassiveSpawner {
    async fn run(&self) -> Result<usize> {
        let amount = self.spawner.config.spawn_amount.unwrap_or(1);
        let mut tasks = JoinSet::new();
        for _ in 0..amount {
            self.spawner.spawn(&mut tasks);
        }

        let mut finished = 0;
        while let Some(result) = tasks.join_next().await {
            result?;
            finished += 1;
        }
        Ok(finished)
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let mut context = ConfigurationContext::new(&cli.config);
    if let Some(name) = &cli.context {
        context = context.target_context(name.as_str());
    }
    logging::init_from_section(&context.get_section("logging")?)?;

    // Command-line values win over the file.
    let file_settings = context
        .get_section("spawner")?
        .into_settings()
        .unwrap_or_else(|| json!({}));
    let overrides = Value::Object(Namespace::from(&matches).into_mapping()?);
    let settings = merge_documents(file_settings, overrides)?;

    let mut services = ServiceCollection::new();
    services
        .configure::<SpawnConfig>(settings)?
        .singleton::<Spawner>()?
        .singleton::<MassiveSpawner>()?;

    let provider = services.build_service_provider();
    info!("{}", provider.stats());

    let massive = provider.get_service::<MassiveSpawner>()?;
    let finished = massive.run().await?;

    let spawner = provider.get_service::<Spawner>()?;
    info!(
        finished,
        spawned = spawner.spawned.load(Ordering::SeqCst),
        context = context.target().unwrap_or("none"),
        "All tasks finished"
    );
    Ok(())
}
