use std::path::Path;

use log::info;

use nucleid_identity::calculator::IdentityCalculator;
use nucleid_identity::config::TrainingConfig;
use nucleid_identity::generator::SyntheticDataGenerator;
use nucleid_math::nearly_equal;
use nucleid_seq::kmer::{HistCell, HistWidth};
use nucleid_seq::sequence::{count_sequences, FastaBlockReader};

use crate::config::ClusterConfig;
use crate::errors::ClusterError;

/// Assumed smallest cluster size; the top scores per row feed the estimator.
const MIN_CLUSTER_SIZE: usize = 5;

/// Estimates the clustering threshold from the data itself.
///
/// A temporary predictor is trained at a fixed bandwidth threshold; on up to three
/// sampled blocks the all-vs-all identity matrix is computed, the top scores of every
/// row are pooled (self-scores dropped), and a two-component one-dimensional clustering
/// splits the pool into a high and a low mode. The estimate descends from the minority
/// mode's mean by 0, 1 or 2 standard deviations depending on how large a fraction of
/// the data one block covers; the cutoffs of 5% and 25% are inherited and tunable in
/// principle. The final threshold is the median of the per-block estimates.
pub fn estimate_threshold(
    db: &Path,
    thread_num: usize,
    training: &TrainingConfig,
) -> Result<f64, ClusterError> {
    info!("Estimating the threshold ...");
    let mut generator = SyntheticDataGenerator::from_file(
        db,
        ClusterConfig::BANDWIDTH_THRESHOLD,
        thread_num,
        training.clone(),
    )?;

    let threshold = match HistWidth::for_max_length(generator.max_length()) {
        HistWidth::B8 => estimate_with::<i8>(db, thread_num, &mut generator),
        HistWidth::B16 => estimate_with::<i16>(db, thread_num, &mut generator),
        HistWidth::B32 => estimate_with::<i32>(db, thread_num, &mut generator),
        HistWidth::B64 => estimate_with::<i64>(db, thread_num, &mut generator),
    }?;

    if !(0.0..=1.0).contains(&threshold) {
        return Err(ClusterError::EstimationFailed {
            reason: format!("estimated threshold {} is outside [0, 1]", threshold),
        });
    }
    Ok(threshold)
}

fn estimate_with<V: HistCell>(
    db: &Path,
    thread_num: usize,
    generator: &mut SyntheticDataGenerator,
) -> Result<f64, ClusterError> {
    let sequence_count = count_sequences(db)?;
    if sequence_count == 0 {
        return Err(ClusterError::EmptyInput {
            stage: "threshold estimation",
        });
    }
    let observed_fraction = ClusterConfig::BANDWIDTH_BLOCK as f64 / sequence_count as f64;
    let sigmas = if observed_fraction > 0.25 {
        2.0
    } else if observed_fraction > 0.05 {
        1.0
    } else {
        0.0
    };

    let calculator: IdentityCalculator<V> = IdentityCalculator::from_generator(
        generator,
        thread_num,
        ClusterConfig::BANDWIDTH_THRESHOLD,
        false,
        false,
        None,
    )?;

    let mut reader = FastaBlockReader::open(db, ClusterConfig::BANDWIDTH_BLOCK)?;
    let mut guesses: Vec<f64> = Vec::new();

    if observed_fraction < 1.0 {
        for iteration in 0..ClusterConfig::BANDWIDTH_ITERATIONS {
            if !reader.is_reading() {
                break;
            }
            let block = reader.read_block()?;
            // A short trailing block would bias the estimate.
            if iteration > 0 && block.len() < ClusterConfig::BANDWIDTH_BLOCK {
                break;
            }
            let scores = top_scores_of_block(&calculator, block, thread_num)?;
            let modes = two_means(&scores);
            let guess = two_means_with_deviations(&scores, modes, sigmas);
            info!("Estimated threshold {}: {:.4}", iteration, guess);
            guesses.push(guess);
        }
    } else {
        // One block covers everything; take the mean minus three deviations.
        let block = reader.read_block()?;
        let scores = top_scores_of_block(&calculator, block, thread_num)?;
        let mean = mean_of(&scores);
        let deviation = std_dev_of(&scores, mean);
        let minimum = scores.iter().copied().fold(f64::INFINITY, f64::min);
        guesses.push((mean - 3.0 * deviation).max(minimum));
    }

    match guesses.len() {
        0 => Err(ClusterError::EstimationFailed {
            reason: String::from("no block produced an estimate"),
        }),
        1 => Ok(guesses[0]),
        2 => Ok((guesses[0] + guesses[1]) / 2.0),
        _ => {
            let mut sorted = guesses.clone();
            sorted.sort_by(|a, b| b.total_cmp(a));
            Ok(sorted[sorted.len() / 2])
        }
    }
}

/// All-vs-all on one block, then the top scores of every row with the self 1s removed.
fn top_scores_of_block<V: HistCell>(
    calculator: &IdentityCalculator<V>,
    block: Vec<nucleid_seq::sequence::Sequence>,
    thread_num: usize,
) -> Result<Vec<f64>, ClusterError> {
    let data = calculator.unpack_block(block, thread_num)?;
    let matrix = calculator.score_all_vs_all(&data, thread_num)?;
    let rows = matrix.rows();

    let mut pool: Vec<f64> = Vec::with_capacity(rows * MIN_CLUSTER_SIZE);
    for r in 0..rows {
        let mut row: Vec<f64> = matrix.row(r).to_vec();
        row.sort_by(|a, b| b.total_cmp(a));
        pool.extend(row.into_iter().take(MIN_CLUSTER_SIZE));
    }

    // Every row contributed its own diagonal 1; drop exactly that many.
    let mut dropped = 0;
    let mut scores = Vec::with_capacity(pool.len());
    for score in pool {
        if dropped < rows && score == 1.0 {
            dropped += 1;
        } else {
            scores.push(score);
        }
    }
    Ok(scores)
}

/// Plain two-means over scalars, initialized at the extremes.
/// Returns `(m1, m2, s1, s2)`.
pub fn two_means(scores: &[f64]) -> (f64, f64, f64, f64) {
    let mut m1 = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let mut m2 = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut low: Vec<f64> = Vec::new();
    let mut high: Vec<f64> = Vec::new();
    let mut unchanged = 0;
    let mut history = (-1.0, -1.0);
    for _ in 0..100 {
        low.clear();
        high.clear();
        for &score in scores {
            if (m1 - score).abs() < (m2 - score).abs() {
                low.push(score);
            } else {
                high.push(score);
            }
        }
        if low.len() <= 1 || high.len() <= 1 {
            break;
        }
        m1 = mean_of(&low);
        m2 = mean_of(&high);

        if nearly_equal(m1, history.0) && nearly_equal(m2, history.1) {
            unchanged += 1;
            if unchanged == 3 {
                break;
            }
        }
        history = (m1, m2);
    }

    let s1 = std_dev_of(&low, m1);
    let s2 = std_dev_of(&high, m2);
    (m1, m2, s1, s2)
}

/// Variance-scaled two-means refinement; the guess descends from the minority mode.
pub fn two_means_with_deviations(scores: &[f64], init: (f64, f64, f64, f64), sigmas: f64) -> f64 {
    let (mut m1, mut m2, mut s1, mut s2) = init;
    s1 = s1.max(0.005);
    s2 = s2.max(0.005);

    let mut low: Vec<f64> = Vec::new();
    let mut high: Vec<f64> = Vec::new();
    let mut unchanged = 0;
    let mut history = (-1.0, -1.0);
    for _ in 0..100 {
        low.clear();
        high.clear();
        for &score in scores {
            if (m1 - score).abs() / s1 < (m2 - score).abs() / s2 {
                low.push(score);
            } else {
                high.push(score);
            }
        }
        if low.len() <= 1 || high.len() <= 1 {
            break;
        }
        m1 = mean_of(&low);
        m2 = mean_of(&high);
        s1 = std_dev_of(&low, m1).max(0.005);
        s2 = std_dev_of(&high, m2).max(0.005);

        if nearly_equal(m1, history.0) && nearly_equal(m2, history.1) {
            unchanged += 1;
            if unchanged == 3 {
                break;
            }
        }
        history = (m1, m2);
    }

    let p1 = low.len() as f64 / scores.len() as f64;
    let p2 = high.len() as f64 / scores.len() as f64;
    let d1 = std_dev_of(&low, m1);
    let d2 = std_dev_of(&high, m2);

    // The minority mode carries the estimate.
    if p1 < p2 {
        m1 - sigmas * d1
    } else {
        m2 - sigmas * d2
    }
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev_of(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum / values.len() as f64).sqrt()
}
