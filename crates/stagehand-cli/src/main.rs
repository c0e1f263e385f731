//! Stagehand CLI - desktop integration hooks for staged app bundles.
//!
//! This binary wraps the stagehand-core library so package-manager hooks
//! (and humans debugging them) can drive the integration lifecycle for one
//! staged bundle at a time.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stagehand_core::config::SystemConfig;
use stagehand_core::{
    ApplyReport, BundleManifest, ElevationPolicy, Integrator, Stage, SystemPaths,
};
use std::path::PathBuf;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Desktop integration hooks for staged Linux app bundles")]
#[command(version)]
struct Args {
    /// Bundle manifest (defaults to stagehand.json inside the stage)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Staged bundle directory
    #[arg(long)]
    stage: PathBuf,

    /// Install prefix holding bin/ and the receipt
    #[arg(long)]
    prefix: PathBuf,

    /// Override the home directory (for tests and chroots)
    #[arg(long)]
    home: Option<PathBuf>,

    /// Elevation mechanism: auto, sudo, pkexec or disabled
    #[arg(long, default_value = "auto", value_parser = parse_elevation)]
    elevation: ElevationPolicy,

    /// Verbose debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare the staged desktop entry before artifacts are placed
    Preflight,
    /// Place artifacts, write the receipt and refresh icon caches
    Postflight,
    /// Remove elevated artifacts while escalation is still possible
    UninstallPreflight,
    /// Remove user-owned artifacts, the policy script and the receipt
    UninstallPostflight,
    /// Delete the user data the bundle declares for zapping
    Zap,
    /// Print the bundle's caveats, if any
    Caveats,
    /// Print the computed placement plan as JSON
    Plan,
}

fn parse_elevation(s: &str) -> std::result::Result<ElevationPolicy, String> {
    ElevationPolicy::from_str(s).ok_or_else(|| {
        format!("unknown elevation policy '{s}' (expected auto, sudo, pkexec or disabled)")
    })
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let manifest_path = args
        .manifest
        .unwrap_or_else(|| args.stage.join(SystemConfig::MANIFEST_FILE_NAME));
    let manifest = BundleManifest::load(&manifest_path)
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;
    let stage = Stage::open(&args.stage)
        .with_context(|| format!("opening stage {}", args.stage.display()))?;
    let paths = match &args.home {
        Some(home) => SystemPaths::rooted(home, &args.prefix),
        None => SystemPaths::discover(&args.prefix)?,
    };

    debug!(
        "Bundle {} v{} staged at {}",
        manifest.token,
        manifest.version,
        stage.root().display()
    );
    let integrator = Integrator::new(manifest, stage, paths, args.elevation);

    match args.command {
        Command::Preflight => {
            integrator.preflight()?;
            info!("Preflight complete");
        }
        Command::Postflight => {
            let report = integrator.postflight()?;
            summarize("Install", &report);
        }
        Command::UninstallPreflight => {
            let report = integrator.uninstall_preflight()?;
            summarize("Elevated cleanup", &report);
        }
        Command::UninstallPostflight => {
            let report = integrator.uninstall_postflight()?;
            summarize("Uninstall", &report);
        }
        Command::Zap => {
            let removed = integrator.zap()?;
            info!("Zapped {} user data path(s)", removed.len());
            for path in &removed {
                debug!("Removed {}", path.display());
            }
        }
        Command::Caveats => match integrator.caveats() {
            // Caveats go to stdout so hooks can capture them verbatim.
            Some(text) => println!("{text}"),
            None => debug!("Bundle declares no caveats"),
        },
        Command::Plan => {
            let plan = integrator.plan()?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
    }

    Ok(())
}

/// Log the outcome of a run. Warnings are surfaced but never fatal.
fn summarize(verb: &str, report: &ApplyReport) {
    info!(
        "{} finished: {} placed, {} removed, {} skipped",
        verb,
        report.placed.len(),
        report.removed.len(),
        report.skipped.len()
    );
    for warning in &report.warnings {
        warn!("{warning}");
    }
}
