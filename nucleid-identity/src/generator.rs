use std::path::Path;

use log::{debug, info};

use nucleid_math::Matrix;
use nucleid_seq::kmer::{
    block_composition, build_monomers, HistCell, HistWidth, KmerHistogram, ALPHABET_SIZE,
};
use nucleid_seq::mutate::Mutator;
use nucleid_seq::sequence::{FastaBlockReader, Sequence};

use crate::config::TrainingConfig;
use crate::errors::IdentityError;
use crate::statistics::{Statistician, STAT_COUNT};

/// Synthesizes a labeled training table from a block of reference sequences.
///
/// Each reference is mutated at known rates drawn from two schedules, one above the
/// clustering threshold and one between the minimum identity and the threshold; the full
/// statistic bank of every (reference, mutant) pair becomes a feature row and the
/// mutator-reported identity its label. `k` is estimated from the mean sequence length as
/// `ceil(log4(mean)) − k_relax`, clamped to at least 2.
pub struct SyntheticDataGenerator {
    block: Vec<Sequence>,
    k: usize,
    hist_size: usize,
    max_length: u64,
    composition: [f64; ALPHABET_SIZE],
    threshold: f64,
    thread_num: usize,
    config: TrainingConfig,
    features: Option<Matrix>,
    labels: Option<Matrix>,
}

impl SyntheticDataGenerator {
    /// Builds training data for all-vs-all scoring or clustering of one file.
    pub fn from_file(
        path: impl AsRef<Path>,
        threshold: f64,
        thread_num: usize,
        config: TrainingConfig,
    ) -> Result<SyntheticDataGenerator, IdentityError> {
        config.validate()?;
        let mut reader = FastaBlockReader::open(path, config.block_size)?;
        let block = reader.read_block()?;
        if block.is_empty() {
            return Err(IdentityError::EmptyInput {
                stage: "training block",
            });
        }

        // The length was estimated from a subset, not the entire set.
        let max_length = 2 * block.iter().map(|s| s.len()).max().unwrap_or(0) as u64;

        let mut generator = Self::assemble(block, max_length, threshold, thread_num, config)?;
        generator.generate()?;
        Ok(generator)
    }

    /// Builds training data for query-vs-db scoring: the training block mixes both sets
    /// and, above a positive threshold, keeps only references whose lengths could ever
    /// reach the threshold against a query.
    pub fn from_db_and_query(
        db_path: impl AsRef<Path>,
        query_path: impl AsRef<Path>,
        threshold: f64,
        thread_num: usize,
        config: TrainingConfig,
    ) -> Result<SyntheticDataGenerator, IdentityError> {
        config.validate()?;
        let mut query_reader = FastaBlockReader::open(query_path, config.block_size)?;
        let query_block = query_reader.read_block()?;

        let mut db_reader = FastaBlockReader::open(db_path, config.block_size)?;
        let mut block = db_reader.read_block()?;
        block.extend(query_block.iter().cloned());
        if block.is_empty() {
            return Err(IdentityError::EmptyInput {
                stage: "training block",
            });
        }

        let max_length;
        if threshold > 0.0 && !query_block.is_empty() {
            let shortest = query_block.iter().map(|s| s.len()).min().unwrap_or(0);
            let longest = query_block.iter().map(|s| s.len()).max().unwrap_or(0);
            let min_keep = (shortest as f64 * threshold) as usize;
            let max_keep = (longest as f64 / threshold) as usize;
            block.retain(|s| s.len() >= min_keep && s.len() <= max_keep);
            if block.is_empty() {
                return Err(IdentityError::EmptyInput {
                    stage: "training block after length filtering",
                });
            }
            max_length = max_keep as u64;
        } else {
            max_length = 2 * block.iter().map(|s| s.len()).max().unwrap_or(0) as u64;
        }

        let mut generator = Self::assemble(block, max_length, threshold, thread_num, config)?;
        generator.generate()?;
        Ok(generator)
    }

    fn assemble(
        block: Vec<Sequence>,
        max_length: u64,
        threshold: f64,
        thread_num: usize,
        config: TrainingConfig,
    ) -> Result<SyntheticDataGenerator, IdentityError> {
        let mean_length =
            (block.iter().map(|s| s.len()).sum::<usize>() as f64 / block.len() as f64).round();
        let mut k = (mean_length.ln() / (ALPHABET_SIZE as f64).ln()).ceil() as i64
            - config.k_relax as i64;
        if k < 2 {
            debug!("Estimated k of {} is too small; clamping to 2", k);
            k = 2;
        }
        let k = k as usize;
        let hist_size = ALPHABET_SIZE.pow(k as u32);
        info!(
            "Training block: {} sequences, mean length {}, k = {}, histogram size {}",
            block.len(),
            mean_length,
            k,
            hist_size
        );

        let composition = block_composition(&block);
        Ok(SyntheticDataGenerator {
            block,
            k,
            hist_size,
            max_length,
            composition,
            threshold,
            thread_num: thread_num.max(1),
            config,
            features: None,
            labels: None,
        })
    }

    fn generate(&mut self) -> Result<(), IdentityError> {
        match HistWidth::for_max_length(self.max_length) {
            HistWidth::B8 => self.generate_with::<i8>(),
            HistWidth::B16 => self.generate_with::<i16>(),
            HistWidth::B32 => self.generate_with::<i32>(),
            HistWidth::B64 => self.generate_with::<i64>(),
        }
    }

    /// Builds the (rows × statistics) feature table and the single-column label table.
    fn generate_with<V: HistCell>(&mut self) -> Result<(), IdentityError> {
        info!("Generating training data");
        let can_generate_negatives = self.threshold != 0.0;

        // Mutation rates above the threshold, in steps of one percent.
        let mut positive_rates: Vec<f64> = Vec::new();
        let mut rate = 0.99;
        while rate >= self.threshold {
            positive_rates.push(1.0 - rate);
            rate -= 0.01;
        }
        // Mutation rates between the minimum identity and the threshold.
        let mut negative_rates: Vec<f64> = Vec::new();
        if can_generate_negatives {
            let mut rate = self.threshold - 0.01;
            while rate >= self.config.min_id {
                negative_rates.push(1.0 - rate);
                rate -= 0.01;
            }
        }
        if positive_rates.is_empty() {
            return Err(IdentityError::ConfigurationInvalid {
                reason: format!("threshold {} leaves no positive mutation rates", self.threshold),
            });
        }

        let actual = self.block.len();
        let desired = self.config.block_size;
        let mut copy_num = self.config.mut_per_template / 2;
        if actual < desired {
            copy_num = (copy_num as f64 * desired as f64 / actual as f64) as usize;
        }
        let row_num = 2 * copy_num * actual;
        if !can_generate_negatives {
            copy_num *= 2;
        }

        let k_table = KmerHistogram::<V>::new(self.k)?;
        let keys = k_table.keys_digit_format();

        struct TemplateRows {
            first_row: usize,
            rows: Vec<(Vec<f64>, f64)>,
        }

        let block = &self.block;
        let config = &self.config;
        let composition = &self.composition;
        let hist_size = self.hist_size;
        let k = self.k;
        let k_table = &k_table;
        let keys = &keys;
        let positive_rates = &positive_rates;
        let negative_rates = &negative_rates;

        let build_template = move |i: usize| -> Result<TemplateRows, IdentityError> {
            let template = &block[i];
            let mut mutator =
                Mutator::new(template.seq(), config.max_block, i as u64, config.min_block)?;
            if config.single_point {
                mutator.enable_single_point();
            }
            if config.block {
                mutator.enable_block();
            }
            if config.translocation {
                mutator.enable_translocation();
            }
            if config.inversion {
                mutator.enable_inversion();
            }

            let h1 = k_table.build(template)?;
            let mono1 = build_monomers(template)?;

            let mut rows = Vec::with_capacity(2 * copy_num);
            let mut schedule = |rates: &[f64]| -> Result<(), IdentityError> {
                for j in 0..copy_num {
                    let rate = rates[(i * copy_num + j) % rates.len()];
                    let (mutated, identity) = mutator.mutate(rate)?;
                    let copy =
                        Sequence::from_attrs(format!("{}|copy", template.description()), mutated);
                    let h2 = k_table.build(&copy)?;
                    let mono2 = build_monomers(&copy)?;
                    let statistician = Statistician::new(
                        hist_size, k, &h1, &h2, &mono1, &mono2, composition, keys,
                    )?;
                    let mut stats = Vec::with_capacity(STAT_COUNT);
                    statistician.calculate_all(&mut stats)?;
                    rows.push((stats, identity));
                }
                Ok(())
            };

            schedule(positive_rates)?;
            if can_generate_negatives {
                schedule(negative_rates)?;
            }

            let first_row = if can_generate_negatives {
                2 * i * copy_num
            } else {
                i * copy_num
            };
            Ok(TemplateRows { first_row, rows })
        };

        // Static partition of the templates across the workers.
        let threads = self.thread_num.clamp(1, actual);
        let chunk = actual.div_ceil(threads);
        let build_template = &build_template;
        let mut per_template: Vec<Result<TemplateRows, IdentityError>> = Vec::with_capacity(actual);
        std::thread::scope(|scope| {
            let mut handles = Vec::new();
            for start in (0..actual).step_by(chunk) {
                let end = (start + chunk).min(actual);
                handles.push(
                    scope.spawn(move || (start..end).map(build_template).collect::<Vec<_>>()),
                );
            }
            for handle in handles {
                match handle.join() {
                    Ok(part) => per_template.extend(part),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
        });

        let mut feature_table = Matrix::zeros(row_num, STAT_COUNT);
        let mut label_table = Matrix::zeros(row_num, 1);
        for result in per_template {
            let template_rows = result?;
            for (offset, (stats, identity)) in template_rows.rows.into_iter().enumerate() {
                let r = template_rows.first_row + offset;
                feature_table.set_row(r, &stats)?;
                label_table[(r, 0)] = identity;
            }
        }

        self.features = Some(feature_table);
        self.labels = Some(label_table);
        Ok(())
    }

    /// The feature table; `None` after [clear_data](Self::clear_data).
    pub fn features(&self) -> Option<&Matrix> {
        self.features.as_ref()
    }

    /// The label column; `None` after [clear_data](Self::clear_data).
    pub fn labels(&self) -> Option<&Matrix> {
        self.labels.as_ref()
    }

    /// Releases the training tables once the predictor is built.
    pub fn clear_data(&mut self) {
        self.features = None;
        self.labels = None;
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn hist_size(&self) -> usize {
        self.hist_size
    }

    pub fn max_length(&self) -> u64 {
        self.max_length
    }

    pub fn composition(&self) -> [f64; ALPHABET_SIZE] {
        self.composition
    }
}
