use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use log::info;

use nucleid_cluster::bandwidth::estimate_threshold;
use nucleid_cluster::config::ClusterConfig;
use nucleid_cluster::mean_shift_large::MeanShiftLarge;
use nucleid_cluster::ClusterError;
use nucleid_identity::calculator::IdentityCalculator;
use nucleid_identity::config::TrainingConfig;
use nucleid_identity::generator::SyntheticDataGenerator;
use nucleid_seq::kmer::{HistCell, HistWidth};

/// Thresholds beyond this switch the predictor to exact histogram matching.
const EXACT_MATCH_CUTOFF: f64 = 0.99;

#[derive(Parser, Debug)]
#[clap(name = "cluster_dna")]
#[clap(about = "Clusters DNA sequences using alignment-free identity scores.", long_about = None)]
struct Args {
    /// database file in FASTA format
    #[clap(short = 'd')]
    database: Option<PathBuf>,
    /// output file; each line holds cluster number, header, score with the center, C/M/E/O
    #[clap(short = 'o')]
    output: Option<PathBuf>,
    /// threshold identity score for cluster membership (estimated when absent)
    #[clap(short = 't')]
    threshold: Option<f64>,
    /// assign every sequence to a cluster regardless of the threshold -- y or n
    #[clap(short = 'a', default_value = "n")]
    assign_all: String,
    /// number of cores
    #[clap(short = 'c')]
    cores: Option<usize>,
    /// relax the threshold by the predictor error in the final assignment -- y or n
    #[clap(short = 'r', default_value = "y")]
    relax: String,
    /// evaluate cluster quality -- y or n
    #[clap(short = 'e', default_value = "n")]
    evaluate: String,
    /// all-vs-all block size, 1000 to 46340
    #[clap(short = 'b')]
    block_size: Option<usize>,
    /// read block size
    #[clap(short = 'v')]
    v_block_size: Option<usize>,
    /// number of data passes, 2 to 10
    #[clap(short = 'p')]
    pass_num: Option<usize>,
    /// print the license note and exit -- y
    #[clap(short = 'l', default_value = "n")]
    license: String,
}

fn yes_no(value: &str, flag: char) -> bool {
    match value {
        "y" => true,
        "n" => false,
        other => {
            eprintln!(
                "Error: -{} expects y or n, received '{}'. Rerun with -h to see the help message.",
                flag, other
            );
            std::process::exit(1);
        }
    }
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

    if yes_no(&args.license, 'l') {
        println!("cluster_dna is distributed under the Apache License, Version 2.0.");
        println!("It comes WITHOUT ANY WARRANTY, to the extent permitted by law.");
        return Ok(());
    }

    let Some(database) = args.database.as_deref() else {
        bail_usage("please provide a database file in FASTA format (-d)");
    };
    let Some(output) = args.output.as_deref() else {
        bail_usage("please provide an output file (-o)");
    };
    if let Some(t) = args.threshold {
        if !(0.0..=1.0).contains(&t) {
            bail_usage("please provide a threshold between 0.00 and 1.00");
        }
    }
    if let Some(b) = args.block_size {
        if !(ClusterConfig::MIN_BLOCK_SIZE..=ClusterConfig::MAX_MATRIX_SIZE).contains(&b) {
            bail_usage("please provide an all-vs-all block size between 1,000 and 46,340");
        }
    }
    let block_size = args.block_size.unwrap_or(ClusterConfig::BLOCK_SIZE);
    if let Some(v) = args.v_block_size {
        if v < block_size {
            bail_usage("please provide a read block size >= the all-vs-all block size");
        }
    }
    if let Some(p) = args.pass_num {
        if !(ClusterConfig::MIN_PASS_NUM..=ClusterConfig::MAX_PASS_NUM).contains(&p) {
            bail_usage("please provide a number of data passes between 2 and 10");
        }
    }

    let cores = args.cores.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    let config = ClusterConfig {
        block_size,
        v_block_size: args.v_block_size.unwrap_or(ClusterConfig::V_BLOCK_SIZE),
        pass_num: args.pass_num.unwrap_or(ClusterConfig::PASS_NUM),
        assign_all: yes_no(&args.assign_all, 'a'),
        evaluate: yes_no(&args.evaluate, 'e'),
        relax: yes_no(&args.relax, 'r'),
        thread_num: cores,
        ..ClusterConfig::default()
    };
    config.validate()?;

    let training = TrainingConfig::default();
    let threshold = match args.threshold {
        Some(t) => {
            info!("Provided threshold: {}", t);
            t
        }
        None => {
            let estimate = estimate_threshold(database, cores, &training)?;
            info!("Calculated threshold: {:.4}", estimate);
            estimate
        }
    };

    info!("Database file: {}", database.display());
    info!("Output file: {}", output.display());
    info!("Cores: {}", cores);
    info!("Block size for all vs. all: {}", config.block_size);
    info!("Block size for reading sequences: {}", config.v_block_size);
    info!("Number of data passes: {}", config.pass_num);
    info!("Assign all: {}", if config.assign_all { "yes" } else { "no" });

    let start = Instant::now();
    let mut generator = SyntheticDataGenerator::from_file(database, threshold, cores, training)
        .context("building the training data")?;

    match HistWidth::for_max_length(generator.max_length()) {
        HistWidth::B8 => {
            info!("A histogram entry is 8 bits");
            cluster::<i8>(database, output, &mut generator, threshold, &config)?;
        }
        HistWidth::B16 => {
            info!("A histogram entry is 16 bits");
            cluster::<i16>(database, output, &mut generator, threshold, &config)?;
        }
        HistWidth::B32 => {
            info!("A histogram entry is 32 bits");
            cluster::<i32>(database, output, &mut generator, threshold, &config)?;
        }
        HistWidth::B64 => {
            info!("A histogram entry is 64 bits");
            cluster::<i64>(database, output, &mut generator, threshold, &config)?;
        }
    }
    info!("Finished in {:?}", start.elapsed());
    Ok(())
}

fn cluster<V: HistCell>(
    database: &Path,
    output: &Path,
    generator: &mut SyntheticDataGenerator,
    threshold: f64,
    config: &ClusterConfig,
) -> Result<(), ClusterError> {
    let calculator: IdentityCalculator<V> = if threshold > EXACT_MATCH_CUTOFF {
        // Near-deduplication: histogram equality replaces prediction.
        let mut calculator = IdentityCalculator::from_generator(
            generator,
            config.thread_num,
            EXACT_MATCH_CUTOFF,
            true,
            false,
            None,
        )?;
        calculator.set_exact_only(true);
        calculator
    } else {
        IdentityCalculator::from_generator(
            generator,
            config.thread_num,
            threshold,
            true,
            true,
            None,
        )?
    };

    MeanShiftLarge::new(database, &calculator, threshold, config).run(output)
}
