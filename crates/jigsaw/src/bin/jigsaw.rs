use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use jigsaw::builder::{Arrangement, BuildLevel, BuildParams, ThresholdProcessor};
use jigsaw::convert::{load_mask, load_rgb};
use jigsaw::core::PieceKind;
use jigsaw::session::{solve, SolveConfig};

#[derive(Parser)]
#[command(name = "jigsaw", version, about = "Calibrate and solve jigsaw puzzle boards")]
struct Cli {
    /// Verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Emit JSON log lines (with the `tracing` feature).
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Template,
    Regular,
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Arrangement,
    Adjacent,
    Gridded,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a calibration record from a solved-puzzle image.
    Calibrate {
        #[arg(long)]
        image: PathBuf,
        /// Piece mask; pixels brighter than `--mask-level` are foreground.
        /// Without it the image is thresholded directly.
        #[arg(long)]
        mask: Option<PathBuf>,
        #[arg(long, default_value_t = 127)]
        mask_level: u8,
        /// Luma threshold used when no mask is given.
        #[arg(long, default_value_t = 20.0)]
        threshold: f32,
        #[arg(long, value_enum, default_value = "template")]
        kind: KindArg,
        #[arg(long, value_enum, default_value = "adjacent")]
        level: LevelArg,
        /// JSON file with `BuildParams` overrides.
        #[arg(long)]
        params: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Plan moves of a measured board onto a calibration.
    Solve {
        /// JSON `SolveConfig`.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Calibrate {
            image,
            mask,
            mask_level,
            threshold,
            kind,
            level,
            params,
            out,
        } => {
            let mut build = match params {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => BuildParams::default(),
            };
            build.piece_kind = match kind {
                KindArg::Template => PieceKind::Template,
                KindArg::Regular => PieceKind::Regular,
            };
            let level = match level {
                LevelArg::Arrangement => BuildLevel::Arrangement,
                LevelArg::Adjacent => BuildLevel::Adjacent,
                LevelArg::Gridded => BuildLevel::Gridded,
            };

            let rgb = load_rgb(&image)?;
            let arrangement = match mask {
                Some(path) => {
                    let mask = load_mask(path, mask_level)?;
                    Arrangement::from_image_and_mask(&rgb, &mask, &build, level)?
                }
                None => {
                    let processor = ThresholdProcessor {
                        level: threshold,
                        invert: false,
                    };
                    Arrangement::from_image_processing(&rgb, &processor, None, &build, level)?
                }
            };
            arrangement.save(&out)?;
            println!(
                "calibrated {} pieces ({:?}) -> {}",
                arrangement.solution().len(),
                arrangement.level(),
                out.display()
            );
        }
        Commands::Solve { config } => {
            let config = SolveConfig::load_json(config)?;
            let report = solve(&config)?;
            match &config.output_path {
                Some(path) => {
                    report.write_json(path)?;
                    println!(
                        "{:?} after {} turns -> {}",
                        report.state,
                        report.turns.len(),
                        path.display()
                    );
                }
                None => println!("{}", report.to_json()?),
            }
        }
    }
    Ok(())
}

/// `RUST_LOG` controls the level under `tracing`; `--verbose` otherwise.
fn init_logging(verbose: bool, json: bool) {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        jigsaw::core::init_tracing(json);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = json;
        let level = if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        let _ = jigsaw::core::init_with_level(level);
    }
}
