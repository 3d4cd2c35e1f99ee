use std::env;
use std::fs;
use std::process;

use anyhow::{Context, Result};
use tracing::{info, Level};
use visual_review::compare::{compare, Bitmap, CompareConfig};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("usage: compare_local <base.png> <current.png> [threshold]");
        process::exit(2);
    }

    let mut config = CompareConfig::default();
    if let Some(raw) = args.get(2) {
        config.threshold = raw
            .parse()
            .with_context(|| format!("Invalid threshold '{raw}' (expected 0-255)"))?;
    }

    let base = load(&args[0])?;
    let current = load(&args[1])?;
    info!("base   : {}x{} ({})", base.width(), base.height(), args[0]);
    info!("current: {}x{} ({})", current.width(), current.height(), args[1]);

    let result = compare(&base, &current, &config);
    let differing = result.mask.differing_pixels();
    let total = result.width() as usize * result.height() as usize;
    info!(
        "{} of {} pixels differ ({:.2}%) at threshold {}",
        differing,
        total,
        differing as f64 * 100.0 / total as f64,
        config.threshold
    );

    if result.regions.is_empty() {
        info!(
            "No regions above the {}-pixel noise floor",
            config.min_region_pixels
        );
        return Ok(());
    }

    info!("{} changed regions:", result.regions.len());
    for (index, region) in result.regions.iter().enumerate() {
        info!(
            "  #{:<3} rows {:>5}-{:<5} cols {:>5}-{:<5} {:>8} px",
            index + 1,
            region.min_row,
            region.max_row,
            region.min_col,
            region.max_col,
            region.pixel_count
        );
    }

    Ok(())
}

fn load(path: &str) -> Result<Bitmap> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {path}"))?;
    Bitmap::decode(&bytes).with_context(|| format!("Failed to decode {path}"))
}
