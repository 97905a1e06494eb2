use anyhow::{bail, Context, Result};
use calibration::storage::{read_cache_file, CALIBRATION_IDENT, CALIBRATION_VERSION};
use calibration::{CalibrationCache, CalibrationEntry, DeviceId, TokenReader};
use clap::Parser;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Inspect a calibration cache file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a .cal calibration cache file
    file: PathBuf,

    /// Emit a machine-readable JSON summary
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct EntrySummary {
    channels: u32,
    depth: u32,
    lines: u32,
    pixels: u32,
    calibrated_at: u64,
    frontend: String,
    frontend_registers: usize,
    sensor: String,
    sensor_registers: usize,
    shading_columns: u32,
}

impl EntrySummary {
    fn from_entry(entry: &CalibrationEntry) -> Self {
        Self {
            channels: entry.params.channels,
            depth: entry.params.depth,
            lines: entry.params.lines,
            pixels: entry.params.pixels,
            calibrated_at: entry.calibrated_at,
            frontend: entry.frontend.kind.to_string(),
            frontend_registers: entry.frontend.regs.len(),
            sensor: entry.sensor.kind.to_string(),
            sensor_registers: entry.sensor.custom_regs.len(),
            shading_columns: entry.shading.average_size(),
        }
    }
}

/// Read the header manually so files written for any device can be opened.
fn read_any_device(path: &Path) -> Result<(DeviceId, CalibrationCache)> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut r = TokenReader::new(BufReader::new(file));

    let ident = r.ident()?;
    if ident != CALIBRATION_IDENT {
        bail!("{} is not a calibration cache file", path.display());
    }
    let version = r.u32()?;
    if version != CALIBRATION_VERSION {
        bail!("unsupported calibration format version {version}");
    }
    let device = DeviceId::new(r.u16()?, r.u16()?, r.u16()?);

    // Re-read through the normal path now that the identity is known.
    let file = File::open(path)?;
    let cache = read_cache_file(BufReader::new(file), &device)?
        .context("calibration header changed between reads")?;
    Ok((device, cache))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let (device, cache) = read_any_device(&args.file)?;

    if args.json {
        let summaries: Vec<EntrySummary> = cache.iter().map(EntrySummary::from_entry).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("Calibration cache {}", args.file.display());
    println!("Device:  {device}");
    println!("Entries: {}\n", cache.len());

    for (index, entry) in cache.iter().enumerate() {
        let summary = EntrySummary::from_entry(entry);
        println!(
            "[{index}] {}ch depth={} {}x{} px",
            summary.channels, summary.depth, summary.pixels, summary.lines
        );
        println!("    calibrated at: {}", summary.calibrated_at);
        println!(
            "    frontend:      {} ({} registers)",
            summary.frontend, summary.frontend_registers
        );
        println!(
            "    sensor:        {} ({} registers)",
            summary.sensor, summary.sensor_registers
        );
        println!("    shading:       {} columns", summary.shading_columns);
    }

    Ok(())
}
