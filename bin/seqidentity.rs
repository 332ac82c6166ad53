use std::env;
use std::path::PathBuf;
use std::time::Instant;

use clap::error::ErrorKind;
use clap::Parser;
use log::info;

use nucleid_identity::runner::{PairwiseRunner, TrainingMode};

/// Default sequences per streamed block.
const DEFAULT_BLOCK_SIZE: usize = 10_000;

#[derive(Parser, Debug)]
#[clap(name = "seqidentity")]
#[clap(
    about = "Predicts pairwise DNA identity scores without alignment.",
    long_about = None
)]
struct Args {
    /// database file in FASTA format
    #[clap(short = 'd')]
    database: Option<PathBuf>,
    /// query file; without it every database pair is scored once
    #[clap(short = 'q')]
    query: Option<PathBuf>,
    /// output file with one `query  db  score` record per pair
    #[clap(short = 'o')]
    output: Option<PathBuf>,
    /// report pairs at or above this identity (0 reports everything)
    #[clap(short = 't', default_value_t = 0.0)]
    threshold: f64,
    /// number of cores
    #[clap(short = 'c')]
    cores: Option<usize>,
    /// mode: r (regression, scores) or c (classification, same/different)
    #[clap(short = 'm', default_value = "r")]
    mode: String,
    /// relax the reporting threshold by the predictor error -- y or n
    #[clap(short = 'r', default_value = "y")]
    relax: String,
    /// sequences per streamed block
    #[clap(short = 'b', default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
    /// save the trained model to this file
    #[clap(short = 's')]
    save_model: Option<PathBuf>,
    /// load a model from this file instead of training
    #[clap(short = 'z')]
    load_model: Option<PathBuf>,
}

fn bail_usage(message: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("\tRerun with -h to see the help message.");
    std::process::exit(1);
}

fn main() -> anyhow::Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            std::process::exit(0);
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let Some(database) = args.database.as_deref() else {
        bail_usage("please provide a database file in FASTA format (-d)");
    };
    let Some(output) = args.output.as_deref() else {
        bail_usage("please provide an output file (-o)");
    };
    if !(0.0..=1.0).contains(&args.threshold) {
        bail_usage("please provide a threshold between 0.00 and 1.00");
    }
    let mode = match args.mode.as_str() {
        "r" => TrainingMode::Regression,
        "c" => TrainingMode::Classification,
        other => bail_usage(&format!("-m expects r or c, received '{}'", other)),
    };
    let relax = match args.relax.as_str() {
        "y" => true,
        "n" => false,
        other => bail_usage(&format!("-r expects y or n, received '{}'", other)),
    };

    let cores = args.cores.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    info!("Database file: {}", database.display());
    if let Some(query) = &args.query {
        info!("Query file: {}", query.display());
    }
    info!("Output file: {}", output.display());
    info!("Threshold: {}", args.threshold);
    info!("Cores: {}", cores);

    let start = Instant::now();
    let runner = PairwiseRunner::new(cores, args.block_size, mode, args.threshold, relax);
    match &args.query {
        None => runner.align_all_vs_all(
            database,
            output,
            args.save_model.as_deref(),
            args.load_model.as_deref(),
        )?,
        Some(query) => runner.align_query_vs_db(
            database,
            query,
            output,
            args.save_model.as_deref(),
            args.load_model.as_deref(),
        )?,
    }
    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
