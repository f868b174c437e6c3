//! # rover_app
//!
//! Runs the robot swarm simulation.
//!
//! ## Startup Sequence
//!
//! 1. Load the configuration file (if any) and apply command-line overrides.
//! 2. Build the simulation context and the demonstration scene.
//! 3. Run the fixed-timestep tick loop for the configured number of ticks.
//! 4. Optionally write a snapshot of the world.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rover_app::{SimConfig, SimContext, TickConfig, TickLoop, scene};
use rover_processor::ProcessorType;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rover_app", about = "Robot swarm simulation")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run (0 = unlimited)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Execution backend: serial, cpu or gpu
    #[arg(short, long)]
    processor: Option<ProcessorType>,

    /// Clones per robot prototype
    #[arg(long)]
    clones: Option<u32>,

    /// Write a MessagePack snapshot of the world here after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

impl Args {
    fn sim_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => SimConfig::default(),
        };
        if let Some(ticks) = self.ticks {
            config.max_ticks = ticks;
        }
        if let Some(processor) = self.processor {
            config.processor = processor;
        }
        if let Some(clones) = self.clones {
            config.clones = clones;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rover_app=info".parse()?))
        .init();

    let args = Args::parse();
    let config = args.sim_config()?;
    info!(
        processor = %config.processor,
        robots = config.robots,
        clones = config.clones,
        "rover simulation starting"
    );

    let mut context = SimContext::new(&config)?;
    scene::build(&mut context, &config)?;

    let mut tick_loop = TickLoop::new(TickConfig::from(&config), context);
    tick_loop.run()?;

    if let Some(path) = &args.snapshot {
        let bytes = tick_loop.context().data.save()?;
        std::fs::write(path, &bytes)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        info!(path = %path.display(), bytes = bytes.len(), "snapshot written");
    }

    info!(ticks = tick_loop.tick_id(), "rover simulation finished");
    Ok(())
}
