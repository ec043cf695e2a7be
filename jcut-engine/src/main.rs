//! JCut simulator (jcut-sim) - Main entry point
//!
//! Plays an audio file, or a synthetic speech-like pattern, through a simulated
//! playback element with the silence-skipping engine attached, then prints how
//! much time was saved.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use jcut_common::{Settings, StrategyKind};
use jcut_engine::sim::{SimOptions, SimulatedElement, SimulatedMedia, SimulationRun};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Length of the synthetic pattern played when no input is given (s)
const SYNTHETIC_DURATION: f64 = 60.0;
const SYNTHETIC_SAMPLE_RATE: u32 = 16_000;

/// Command-line arguments for jcut-sim
#[derive(Parser, Debug)]
#[command(name = "jcut-sim")]
#[command(about = "Simulate silence skipping over an audio file")]
#[command(version)]
struct Args {
    /// Audio file to play (synthetic speech-like pattern if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long, env = "JCUT_CONFIG")]
    config: Option<PathBuf>,

    /// Strategy: stretching, cloning or always_sounded
    #[arg(short, long)]
    strategy: Option<StrategyKind>,

    #[arg(long)]
    silence_speed: Option<f64>,

    #[arg(long)]
    sounded_speed: Option<f64>,

    /// Simulated seek latency of the element (ms)
    #[arg(long, default_value = "0")]
    seek_latency_ms: f64,

    /// Print the final telemetry record as JSON
    #[arg(long)]
    json: bool,
}

fn build_settings(args: &Args) -> Result<Settings> {
    let mut settings =
        Settings::load_or_default(args.config.as_deref()).context("Failed to load settings")?;
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }
    if let Some(speed) = args.silence_speed {
        settings.silence_speed = speed;
    }
    if let Some(speed) = args.sounded_speed {
        settings.sounded_speed = speed;
    }
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jcut_engine=info,jcut_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting JCut simulator (jcut-sim) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let settings = build_settings(&args)?;

    let media = match &args.input {
        Some(path) => SimulatedMedia::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            info!("No input given, playing {:.0}s synthetic pattern", SYNTHETIC_DURATION);
            SimulatedMedia::speech_like(SYNTHETIC_SAMPLE_RATE, SYNTHETIC_DURATION)
        }
    };
    let duration = media.duration();

    let options = SimOptions {
        seek_latency: args.seek_latency_ms.max(0.0) / 1000.0,
        ..SimOptions::default()
    };
    let element = SimulatedElement::new(media, options);
    let mut run = SimulationRun::attach(element, settings);
    info!(
        "Playing {:.1}s with {} strategy",
        duration,
        run.controller().active_strategy()
    );

    // Real time can never exceed the intrinsic duration at the lowest accepted speed
    let ended = run.run_until_ended(duration * 100.0 + 1.0);
    if !ended {
        anyhow::bail!("Playback did not reach the end of the media");
    }

    let telemetry = run.controller().telemetry();
    let totals = run.finish();

    if args.json {
        let text = serde_json::to_string_pretty(&telemetry).context("Failed to encode telemetry")?;
        println!("{}", text);
    }
    println!("Played in:        {:8.2}s", telemetry.context_time);
    println!("At sounded speed: {:8.2}s", totals.would_have_lasted_if_sounded);
    println!("Saved:            {:8.2}s", totals.saved_vs_sounded);
    println!("Saved vs 1x:      {:8.2}s", totals.saved_vs_intrinsic);

    info!("Simulation complete");
    Ok(())
}
