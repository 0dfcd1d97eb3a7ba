use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use signal_sim::app::{self, InitialTraffic};
use signal_sim::config::AppConfig;
use signal_sim::simulation::{Scenario, SpawnRequest, TrafficWorld};

#[derive(Parser)]
#[command(name = "signal_sim")]
#[command(about = "Intersection traffic simulation synchronized with a signal controller")]
struct Cli {
    /// TOML config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Controller base address
    #[arg(long)]
    controller: Option<String>,

    /// Intersection identifier
    #[arg(long)]
    intersection: Option<String>,

    /// Traffic preset to spawn at startup
    #[arg(long)]
    scenario: Option<Scenario>,

    /// Vehicles to spawn at startup as "north,south,east,west"
    #[arg(long, conflicts_with = "scenario")]
    spawn: Option<SpawnRequest>,

    /// Poll only, without the streaming channel
    #[arg(long)]
    no_stream: bool,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Run without a controller for a fixed number of ticks
    #[arg(long)]
    offline: bool,

    /// Number of simulation ticks to run in offline mode
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds (offline mode)
    #[arg(long, default_value = "0.05")]
    delta: f32,
}

impl Cli {
    fn app_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(url) = &self.controller {
            config.sync.base_url = url.clone();
        }
        if let Some(id) = &self.intersection {
            config.sync.intersection = id.clone();
        }
        if self.no_stream {
            config.sync.streaming = false;
        }
        if self.seed.is_some() {
            config.simulation.seed = self.seed;
        }
        Ok(config)
    }

    fn initial_traffic(&self, config: &AppConfig) -> InitialTraffic {
        if let Some(request) = self.spawn {
            return InitialTraffic(Some(request));
        }
        InitialTraffic(self.scenario.map(|scenario| {
            // Draw from a throwaway world so seeded runs pick the same preset counts
            let mut world = TrafficWorld::new(config.simulation.clone());
            SpawnRequest(world.scenario_counts(scenario))
        }))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn,signal_sim=info"))
        .init();

    let cli = Cli::parse();
    let config = cli.app_config()?;
    let initial = cli.initial_traffic(&config);

    if cli.offline {
        app::run_headless(&config, initial, cli.ticks, cli.delta);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;
    runtime.block_on(app::run_live(config, initial))
}
