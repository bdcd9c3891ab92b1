mod sim;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use proxim_level::MapDocument;
use proxim_stream::{LodConfig, LodThresholds, StreamConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "proxim-cli", about = "Proximity streaming tools: LOD tiers and deferred spawning")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Print the tier each distance falls into
    Classify {
        distances: Vec<f32>,
        /// Comma-separated ascending thresholds
        #[arg(short, long, value_delimiter = ',')]
        thresholds: Option<Vec<f32>>,
        /// Sort and deduplicate thresholds instead of rejecting them
        #[arg(long)]
        normalize: bool,
    },
    /// Validate a YAML stream config
    Check { config: PathBuf },
    /// Walk an observer through a level and report streaming behavior
    Simulate {
        /// JSON map; a synthetic grid level is used when omitted
        #[arg(long)]
        map: Option<PathBuf>,
        /// YAML stream config
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "600")]
        steps: u32,
        /// Step length in milliseconds
        #[arg(long, default_value = "50")]
        dt_ms: u64,
        /// Observer speed in world units per second
        #[arg(long, default_value = "6")]
        speed: f32,
        /// Side of the synthetic grid
        #[arg(long, default_value = "40")]
        grid: u32,
        /// Spacing of the synthetic grid
        #[arg(long, default_value = "5")]
        spacing: f32,
        /// World units per map tile
        #[arg(long, default_value = "1")]
        tile_size: f32,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<StreamConfig> {
    match path {
        Some(path) => StreamConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(StreamConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("proxim-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", proxim_common::crate_info());
            println!("kernel: {}", proxim_kernel::crate_info());
            println!("stream: {}", proxim_stream::crate_info());
            println!("level: {}", proxim_level::crate_info());
        }
        Commands::Classify {
            distances,
            thresholds,
            normalize,
        } => {
            let bounds = thresholds.unwrap_or_else(|| LodConfig::default().thresholds);
            let thresholds = if normalize {
                LodThresholds::normalized(bounds)?
            } else {
                LodThresholds::new(bounds)?
            };
            println!("thresholds: {:?}", thresholds.bounds());
            for distance in distances {
                println!("{distance:>10.2} -> {}", thresholds.classify(distance));
            }
        }
        Commands::Check { config } => {
            let loaded = StreamConfig::load(&config).with_context(|| format!("checking {}", config.display()))?;
            let lod = loaded.lod.validate()?;
            let spawn = loaded.spawn.validate()?;
            println!("{}: OK", config.display());
            println!(
                "  lod: cell_size={} thresholds={:?} interval={:?} movement={} teleport={:?} discontinuity={:?}",
                lod.cell_size,
                lod.thresholds.bounds(),
                lod.interval,
                lod.movement_threshold,
                lod.teleport_distance,
                lod.discontinuity
            );
            println!(
                "  spawn: near={} activation={} interval={:?} cap={}",
                spawn.near_radius, spawn.activation_radius, spawn.interval, spawn.per_tick_cap
            );
        }
        Commands::Simulate {
            map,
            config,
            steps,
            dt_ms,
            speed,
            grid,
            spacing,
            tile_size,
        } => {
            let config = load_config(config.as_ref())?;
            let level = match &map {
                Some(path) => MapDocument::load(path)
                    .and_then(|doc| doc.to_placements(tile_size))
                    .with_context(|| format!("loading map {}", path.display()))?,
                None => sim::synthetic_level(grid, spacing),
            };
            println!(
                "Simulating '{}': {} placements, spawn at {:?}",
                level.name,
                level.total(),
                level.spawn_point
            );

            let options = sim::SimOptions {
                steps,
                dt: Duration::from_millis(dt_ms),
                speed,
                report_every: (steps / 10).max(1),
            };
            let report = sim::run(level, &config, &options)?;

            println!(
                "{}: after {} steps observer at {:?}{}, {} of {} placements live ({} at load)",
                report.level,
                report.steps,
                report.observer,
                if report.arrived { " (arrived)" } else { "" },
                report.live_entities,
                report.placements,
                report.primed
            );
            println!("{}", report.lod);
            println!("{}", report.spawn);
            for (tier, count) in &report.tiers {
                println!("  {:>8}: {count}", tier.to_string());
            }
        }
    }

    Ok(())
}
