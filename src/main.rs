//! scapes - dedicated overworld server
//!
//! Opens (or creates) a world, runs the environment and condition tasks and
//! saves periodically until interrupted.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use config::{ServerConfig, DEFAULT_CONFIG_PATH};
use scapes_core::WorldSeed;
use scapes_server::{EnvironmentConfig, Outbox, OutboxReceiver, WorldConfig, WorldServer};
use tracing::{info, trace, warn};

#[derive(Debug, Parser)]
#[command(name = "scapes-server", version, about = "Scapes overworld server")]
struct Cli {
    /// Server configuration file (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Seed for a newly created world
    #[arg(long)]
    seed: Option<u64>,
    /// Run this many environment ticks without a real-time loop, save and exit
    #[arg(long)]
    ticks: Option<u64>,
    /// Delete the world's save directory before opening it
    #[arg(long)]
    reset: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting scapes-server v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut server_config = ServerConfig::load_from_path(&cli.config);
    if cli.seed.is_some() {
        server_config.seed = cli.seed;
    }

    let world_dir = server_config.world_dir();
    if cli.reset && world_dir.exists() {
        warn!(dir = %world_dir.display(), "resetting world");
        std::fs::remove_dir_all(&world_dir)
            .with_context(|| format!("remove {}", world_dir.display()))?;
    }

    let world_config = world_config(&server_config);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(run(server_config, world_config, cli.ticks))
}

fn world_config(config: &ServerConfig) -> WorldConfig {
    let seed = config.seed.unwrap_or_else(rand::random);
    let environment = EnvironmentConfig {
        tick_period: 1.0 / config.tick_rate.max(1) as f64,
        ..EnvironmentConfig::with_day_length(config.day_length_seconds)
    };
    WorldConfig {
        name: config.world_name.clone(),
        seed: WorldSeed(seed),
        save_root: config.world_dir(),
        environment,
        load_radius: config.load_radius,
        chunk_cache: config.chunk_cache,
    }
}

async fn run(config: ServerConfig, world_config: WorldConfig, ticks: Option<u64>) -> Result<()> {
    let (outbox, outgoing) = Outbox::channel();
    let tick_period = world_config.environment.tick_period;
    let world = tokio::task::spawn_blocking(move || WorldServer::open(world_config, outbox))
        .await
        .context("world loader panicked")??;
    let world = Arc::new(world);
    info!(
        world = world.name(),
        seed = world.seed().0,
        spawn = ?world.spawn(),
        "world ready"
    );
    let drain = tokio::spawn(drain_outgoing(outgoing));

    if let Some(ticks) = ticks {
        for _ in 0..ticks {
            world.tick_environment(tick_period);
        }
        info!(ticks, steps = world.simulation_count(), "offline run finished");
    } else {
        world.start();
        let mut autosave =
            tokio::time::interval(Duration::from_secs(config.save_interval_seconds.max(1)));
        autosave.tick().await;
        loop {
            tokio::select! {
                _ = autosave.tick() => {
                    if let Err(err) = world.save() {
                        warn!(error = %err, "autosave failed");
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(err) = signal {
                        warn!(error = %err, "failed to listen for ctrl-c");
                    }
                    info!("shutdown requested");
                    break;
                }
            }
        }
    }

    world.shutdown()?;
    drain.abort();
    Ok(())
}

/// Without a transport attached, outgoing packets are only traced.
async fn drain_outgoing(mut outgoing: OutboxReceiver) {
    while let Some((recipient, msg)) = outgoing.recv().await {
        trace!(?recipient, ?msg, "outgoing packet");
    }
}
