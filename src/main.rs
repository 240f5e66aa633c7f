use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use erp_composer::cable::Origin;
use erp_composer::composer::compose_project;
use erp_composer::io::{load_cable_from_json, load_pattern_file, load_project_from_json, write_json};
use erp_composer::metrics::CutMetrics;
use erp_composer::pattern::CutType;

#[derive(Parser, Debug)]
#[command(name = "erp-composer", about = "Compose antenna arrays into ERP patterns")]
struct Args {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a project file and print or write the result bundle
    Compose {
        project: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the metrics of a raw pattern file
    Metrics {
        pattern: PathBuf,
        #[arg(long, value_enum, default_value_t = Cut::Hrp)]
        cut: Cut,
    },
    /// Feeder loss of a cable at one frequency
    CableLoss {
        /// Cable or attenuation-curve JSON file
        cable: PathBuf,
        #[arg(short, long)]
        frequency_mhz: f64,
        #[arg(short, long)]
        length_m: f64,
        /// Connector losses in dB, repeatable
        #[arg(short, long)]
        connector_db: Vec<f64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Cut {
    Hrp,
    Vrp,
}

impl From<Cut> for CutType {
    fn from(cut: Cut) -> Self {
        match cut {
            Cut::Hrp => CutType::Hrp,
            Cut::Vrp => CutType::Vrp,
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Compose { project, output } => {
            let loaded = load_project_from_json(&project)?;
            let result = compose_project(&loaded)
                .with_context(|| format!("composition of {} failed", project.display()))?;
            info!(
                peak_erp_dbw = result.erp.peak_erp_dbw(),
                peak_azimuth_deg = ?result.erp.peak_azimuth_deg(),
                "ERP ready"
            );
            match output {
                Some(path) => {
                    write_json(&result, &path)?;
                    info!("result written to {}", path.display());
                }
                None => print_json(&result)?,
            }
        }
        Command::Metrics { pattern, cut } => {
            let p = load_pattern_file(&pattern, cut.into())?;
            print_json(&CutMetrics::evaluate(&p.angles(), &p.amplitudes()))?;
        }
        Command::CableLoss {
            cable,
            frequency_mhz,
            length_m,
            connector_db,
        } => {
            let cable = load_cable_from_json(&cable)?;
            let loss = cable.loss(frequency_mhz, length_m, &connector_db)?;
            if loss.interpolation.origin == Origin::SinglePoint {
                info!("{} has a single-point curve, treat the result as an estimate", cable.name);
            }
            print_json(&loss)?;
        }
    }
    Ok(())
}
