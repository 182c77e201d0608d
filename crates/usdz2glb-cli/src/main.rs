//! usdz2glb - Convert USDZ models to GLB through headless Blender
//!
//! Thin command-line front end over `usdz2glb-core`: parse arguments, run
//! the conversion, print the result.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use usdz2glb_core::{convert, ConvertOptions, ExportSettings, DEFAULT_BLENDER_PATH};

#[derive(Parser)]
#[command(
    name = "usdz2glb",
    version,
    about = "Convert USDZ models to GLB using Blender in headless batch mode",
    long_about = "Converts a USDZ file to GLB by running Blender in the background with an\n\
                  injected Python script. Blender performs the actual import, Draco mesh\n\
                  compression, and material export; this tool only drives it and verifies\n\
                  that the output file was written.",
    after_help = "EXAMPLES:\n  \
                  # Convert next to the input (writes model.glb)\n  \
                  usdz2glb model.usdz\n\n  \
                  # Explicit output path, maximum compression\n  \
                  usdz2glb model.usdz out/web.glb --draco-level 10\n\n  \
                  # No Draco compression, custom Blender install\n  \
                  usdz2glb model.usdz --no-draco --blender /opt/blender/blender"
)]
struct Cli {
    /// Input USDZ file
    input: PathBuf,

    /// Output GLB file (default: input path with .glb extension)
    output: Option<PathBuf>,

    /// Path to the Blender binary
    #[arg(long, default_value = DEFAULT_BLENDER_PATH)]
    blender: PathBuf,

    /// Disable Draco mesh compression
    #[arg(long)]
    no_draco: bool,

    /// Draco compression level, 0 (fastest) to 10 (smallest)
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(0..=10))]
    draco_level: u8,

    /// Material export mode
    #[arg(long, value_enum, default_value = "export")]
    materials: MaterialsArg,

    /// Kill Blender if it runs longer than this many seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Overwrite the output file if it already exists
    #[arg(short, long)]
    force: bool,

    /// Print what would run without invoking Blender
    #[arg(long)]
    dry_run: bool,

    /// Keep the generated Blender control script for inspection
    #[arg(long)]
    keep_script: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
enum MaterialsArg {
    /// Export full materials
    Export,
    /// Placeholder material slots only
    Placeholder,
    /// Strip materials
    None,
}

impl From<MaterialsArg> for usdz2glb_core::MaterialMode {
    fn from(arg: MaterialsArg) -> Self {
        match arg {
            MaterialsArg::Export => Self::Export,
            MaterialsArg::Placeholder => Self::Placeholder,
            MaterialsArg::None => Self::None,
        }
    }
}

/// Derive the output path when none was given: same directory, `.glb`
/// extension (`menu/dish.usdz` -> `menu/dish.glb`).
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("glb")
}

/// Format bytes as human-readable size (e.g., "1.52 MB")
#[allow(clippy::cast_precision_loss)] // f64 sufficient for display purposes
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    if output.exists() && !cli.force {
        bail!(
            "output file {} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let options = ConvertOptions {
        blender_path: cli.blender.clone(),
        timeout: Duration::from_secs(cli.timeout),
        keep_script: cli.keep_script,
        export: ExportSettings {
            draco_compression: !cli.no_draco,
            draco_level: cli.draco_level,
            materials: cli.materials.into(),
        },
    };

    if cli.dry_run {
        println!(
            "Would convert {} -> {}",
            cli.input.display(),
            output.display()
        );
        println!(
            "  blender: {} (timeout {}s)",
            options.blender_path.display(),
            cli.timeout
        );
        if options.export.draco_compression {
            println!("  draco: level {}", options.export.draco_level);
        } else {
            println!("  draco: disabled");
        }
        return Ok(());
    }

    match convert(&cli.input, &output, &options) {
        Ok(report) => {
            if !cli.quiet {
                println!(
                    "{} {} ({})",
                    "Converted:".green().bold(),
                    report.output_path.display(),
                    format_bytes(report.size_bytes)
                );
                if cli.verbose {
                    println!(
                        "  {} in {:.1}s",
                        report.blender_version,
                        report.elapsed.as_secs_f64()
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {e}", "Conversion failed:".red().bold());
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("menu/dish.usdz")),
            PathBuf::from("menu/dish.glb")
        );
        assert_eq!(
            default_output_path(Path::new("model")),
            PathBuf::from("model.glb")
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(1_594_884), "1.52 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
