//! Offline AOI project export.
//!
//! Loads the boundary catalog and writes a generated administrative project
//! straight to disk, for operators who do not need the server running.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use aoibox::aoi::generate_project;
use aoibox::boundary::load_catalog;
use aoibox::config::Config;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "export")]
#[command(about = "Generate an AOI project file for a municipality")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// ISO country code, e.g. ES
    #[arg(long)]
    country: String,

    /// Region code within the country
    #[arg(long)]
    region: String,

    /// Municipality name (case and accent insensitive)
    #[arg(long)]
    city: String,

    /// Output path; defaults to the generated filename in the current directory
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = Config::load_from_file(&args.config)?;
    let catalog = load_catalog(&config)?;

    let project = generate_project(&catalog, &args.country, &args.region, &args.city)?;

    let out = args.out.unwrap_or_else(|| PathBuf::from(&project.filename));
    let json = serde_json::to_string_pretty(&project.geojson)?;
    std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;

    info!(
        features = project.feature_count,
        path = %out.display(),
        "project written"
    );
    Ok(())
}
