use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use imgarbor::core::cost::CostMatrix;
use imgarbor::core::materialize::materialize;
use imgarbor::core::model::ArborescenceModel;
use imgarbor::core::raster::load_sources;
use imgarbor::core::reconstruct::reconstruct_all;
use imgarbor::core::solution::load_report;

#[derive(Parser)]
#[command(
    name = "imgarbor",
    about = "Store same-size image sets as diff chains chosen by a minimum-arborescence ILP"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Measure standalone and pairwise diff encoding costs, writing the cost
    /// matrix to stdout
    Cost {
        /// Input images, all with identical dimensions
        images: Vec<PathBuf>,
    },

    /// Read a cost matrix from stdin and write the arborescence model in MPS
    /// form to stdout
    Model {
        /// Maximum diff steps between any image and its root; 0 = unconstrained
        #[arg(long, default_value_t = 0)]
        hops: usize,
    },

    /// Turn a solver solution report into per-image artifacts and chain records
    Materialize {
        /// Solver solution report (variable, value, magnitude per line)
        #[arg(short, long)]
        solution: Option<PathBuf>,

        /// Output directory for artifacts and chain records
        #[arg(short, long, default_value = "output")]
        out: PathBuf,

        /// Cost matrix file naming the original images in order
        matrix: Option<PathBuf>,
    },

    /// Rebuild full rasters from chain records
    Reconstruct {
        /// Output directory for reconstructed images
        #[arg(short, long, default_value = "reconstructed")]
        out: PathBuf,

        /// Chain record files
        records: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Cost { images } => run_cost(images),
        Command::Model { hops } => run_model(hops),
        Command::Materialize {
            solution,
            out,
            matrix,
        } => {
            let (Some(solution), Some(matrix)) = (solution, matrix) else {
                println!("usage: imgarbor materialize -s solution.txt [-o output_dir] matrix.txt");
                return Ok(());
            };
            run_materialize(&solution, &matrix, &out)
        }
        Command::Reconstruct { out, records } => {
            if records.is_empty() {
                println!("usage: imgarbor reconstruct [-o output_dir] input1.chain input2.chain ...");
                return Ok(());
            }
            run_reconstruct(&records, &out)
        }
    }
}

fn run_cost(images: Vec<PathBuf>) -> Result<()> {
    if images.len() < 2 {
        println!("usage: imgarbor cost input1.png input2.png ... [> matrix.txt]");
        return Ok(());
    }

    let start = Instant::now();
    let rasters = load_sources(&images)?;
    info!(
        "loaded {} images ({}x{})",
        rasters.len(),
        rasters[0].width(),
        rasters[0].height()
    );

    let names: Vec<String> = images.iter().map(|p| p.display().to_string()).collect();
    let matrix = CostMatrix::compute(names, &rasters)?;
    info!(
        "scanned {} pairs in {:.2}s",
        matrix.n() * matrix.n(),
        start.elapsed().as_secs_f64()
    );

    let stdout = std::io::stdout();
    matrix
        .write_to(stdout.lock())
        .context("writing cost matrix to stdout")?;
    Ok(())
}

fn run_model(hops: usize) -> Result<()> {
    let stdin = std::io::stdin();
    let matrix = CostMatrix::parse(stdin.lock()).context("reading cost matrix from stdin")?;
    let model = ArborescenceModel::with_hop_limit(&matrix, hops)?;
    info!(
        "emitting {} model for {} nodes",
        if hops == 0 {
            "unconstrained".to_string()
        } else {
            format!("{hops}-hop")
        },
        matrix.n()
    );

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());
    model.write_mps(&mut out).context("writing model to stdout")?;
    out.flush().context("writing model to stdout")?;
    Ok(())
}

fn run_materialize(solution: &PathBuf, matrix_path: &PathBuf, out: &PathBuf) -> Result<()> {
    let matrix = CostMatrix::load(matrix_path)?;
    let rasters = load_sources(matrix.names())?;
    let parents = load_report(solution, matrix.n())?;

    std::fs::create_dir_all(out)
        .with_context(|| format!("creating output directory {}", out.display()))?;
    materialize(&rasters, matrix.names(), &parents, out)?;
    Ok(())
}

fn run_reconstruct(records: &[PathBuf], out: &PathBuf) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("creating output directory {}", out.display()))?;
    reconstruct_all(records, out)?;
    Ok(())
}
