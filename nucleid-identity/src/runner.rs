use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use log::info;

use nucleid_io::{format_sig4, out_writer};
use nucleid_seq::kmer::{HistCell, HistWidth};
use nucleid_seq::sequence::{FastaBlockReader, Sequence};
use nucleid_seq::SequenceError;

use crate::calculator::{run_partitioned, IdentityCalculator, SequenceData};
use crate::config::TrainingConfig;
use crate::errors::IdentityError;
use crate::generator::SyntheticDataGenerator;
use crate::model_io::ModelFile;
use crate::pipeline::{train_classifier, train_regressor, TrainedPipeline};
use crate::statistics::Statistician;

/// How many read-ahead blocks the reader may buffer before it backs off.
pub const QUEUE_CAPACITY: usize = 1000;
/// How long a starved scorer waits before checking the queue again.
const RECV_BACKOFF: Duration = Duration::from_secs(1);

/// Whether the pairwise tool predicts a score or a same/different answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingMode {
    Regression,
    Classification,
}

/// Drives streaming pairwise scoring: block A against itself and against every later
/// block B, with the B blocks read ahead on a dedicated thread.
///
/// The reader fills a bounded queue; the scoring side drains it with a one-second
/// back-off. While the reader is busy one worker stays reserved for it; the moment the
/// file is exhausted that worker rejoins the scoring pool.
pub struct PairwiseRunner {
    worker_num: usize,
    block_size: usize,
    mode: TrainingMode,
    threshold: f64,
    can_relax: bool,
    config: TrainingConfig,
}

impl PairwiseRunner {
    pub fn new(
        worker_num: usize,
        block_size: usize,
        mode: TrainingMode,
        threshold: f64,
        can_relax: bool,
    ) -> PairwiseRunner {
        PairwiseRunner {
            worker_num: worker_num.max(2),
            block_size,
            mode,
            threshold,
            can_relax,
            config: TrainingConfig::default(),
        }
    }

    /// Replaces the training configuration, e.g. to shrink the synthetic data set.
    pub fn with_training(mut self, config: TrainingConfig) -> PairwiseRunner {
        self.config = config;
        self
    }

    /// Scores every unordered pair of one file exactly once.
    pub fn align_all_vs_all(
        &self,
        file_in: &Path,
        file_out: &Path,
        model_save: Option<&Path>,
        model_load: Option<&Path>,
    ) -> Result<(), IdentityError> {
        self.run(file_in, None, file_out, model_save, model_load)
    }

    /// Scores every query sequence against the whole database.
    pub fn align_query_vs_db(
        &self,
        db: &Path,
        query: &Path,
        file_out: &Path,
        model_save: Option<&Path>,
        model_load: Option<&Path>,
    ) -> Result<(), IdentityError> {
        self.run(db, Some(query), file_out, model_save, model_load)
    }

    fn run(
        &self,
        db: &Path,
        query: Option<&Path>,
        file_out: &Path,
        model_save: Option<&Path>,
        model_load: Option<&Path>,
    ) -> Result<(), IdentityError> {
        if (model_save.is_some() || model_load.is_some()) && self.mode == TrainingMode::Classification
        {
            return Err(IdentityError::ConfigurationInvalid {
                reason: String::from("model files carry regression models only"),
            });
        }

        let (trained, k, hist_size, max_length, composition);
        if let Some(model_path) = model_load {
            let model = ModelFile::read(model_path)?;
            info!("Loaded model: k = {}, error = {}", model.k, model.abs_error);
            k = model.k;
            hist_size = model.hist_size;
            max_length = model.max_length;
            composition = model.composition;
            trained = TrainedPipeline {
                features: model.features,
                classification: false,
                abs_error: model.abs_error,
                sqr_error: 0.0,
                accuracy: 0.0,
                sensitivity: 0.0,
                specificity: 0.0,
            };
        } else {
            let mut generator = match query {
                None => SyntheticDataGenerator::from_file(
                    db,
                    self.threshold,
                    self.worker_num,
                    self.config.clone(),
                )?,
                Some(query) => SyntheticDataGenerator::from_db_and_query(
                    db,
                    query,
                    self.threshold,
                    self.worker_num,
                    self.config.clone(),
                )?,
            };
            let features = generator.features().ok_or(IdentityError::EmptyInput {
                stage: "pairwise training",
            })?;
            let labels = generator.labels().ok_or(IdentityError::EmptyInput {
                stage: "pairwise training",
            })?;
            trained = match self.mode {
                TrainingMode::Regression => {
                    info!("Mode is regression");
                    // Regression alone must learn the whole identity range.
                    train_regressor(features, labels, 0.0, self.worker_num, generator.k())?
                }
                TrainingMode::Classification => {
                    info!("Mode is classification");
                    train_classifier(
                        features,
                        labels,
                        self.threshold,
                        self.worker_num,
                        generator.k(),
                        1.0,
                    )?
                }
            };
            k = generator.k();
            hist_size = generator.hist_size();
            max_length = generator.max_length();
            composition = generator.composition();

            if let Some(path) = model_save {
                ModelFile {
                    k,
                    hist_size,
                    abs_error: trained.abs_error,
                    max_length,
                    composition,
                    features: trained.features.clone(),
                }
                .write(path)?;
            }
            generator.clear_data();
        }

        info!("Calculating the identity scores; this step may take a long time");
        match HistWidth::for_max_length(max_length) {
            HistWidth::B8 => self.stream::<i8>(db, query, file_out, &trained, k, hist_size, composition),
            HistWidth::B16 => {
                self.stream::<i16>(db, query, file_out, &trained, k, hist_size, composition)
            }
            HistWidth::B32 => {
                self.stream::<i32>(db, query, file_out, &trained, k, hist_size, composition)
            }
            HistWidth::B64 => {
                self.stream::<i64>(db, query, file_out, &trained, k, hist_size, composition)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn stream<V: HistCell>(
        &self,
        db: &Path,
        query: Option<&Path>,
        file_out: &Path,
        trained: &TrainedPipeline,
        k: usize,
        hist_size: usize,
        composition: [f64; 4],
    ) -> Result<(), IdentityError> {
        // The runner prunes and relaxes on its own, so the calculator is built without
        // skipping or relaxation.
        let calculator = IdentityCalculator::<V>::from_pipeline(
            trained, k, hist_size, composition, self.threshold, false, false,
        )?;
        let error = if self.can_relax {
            info!("Relaxing the threshold by {}", trained.abs_error);
            trained.abs_error
        } else {
            0.0
        };
        let relax_threshold = self.threshold - error;

        let out_name = file_out.to_string_lossy();
        let mut out = out_writer(&out_name, false)?;

        let query_path = query.unwrap_or(db);
        let all_vs_all = query.is_none();
        let mut query_reader = FastaBlockReader::open(query_path, self.block_size)?;

        while query_reader.is_reading() {
            let block_a = query_reader.read_block()?;
            if block_a.is_empty() {
                break;
            }
            let data_a = calculator.unpack_block(block_a, self.worker_num)?;

            if all_vs_all {
                // Within a block each unordered pair appears once.
                self.score_within(&calculator, &data_a, relax_threshold, &mut *out)?;
                if !query_reader.is_reading() {
                    break;
                }
                let db_reader = FastaBlockReader::open_at(
                    db,
                    self.block_size,
                    query_reader.position(),
                    query_reader.max_len(),
                )?;
                self.score_against_stream(
                    &calculator,
                    &data_a,
                    db_reader,
                    relax_threshold,
                    &mut *out,
                )?;
            } else {
                let db_reader = FastaBlockReader::open(db, self.block_size)?;
                self.score_against_stream(
                    &calculator,
                    &data_a,
                    db_reader,
                    relax_threshold,
                    &mut *out,
                )?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Scores the upper triangle of one block.
    fn score_within<V: HistCell>(
        &self,
        calculator: &IdentityCalculator<V>,
        data: &SequenceData<V>,
        relax_threshold: f64,
        out: &mut dyn Write,
    ) -> Result<(), IdentityError> {
        let size = data.len();
        for i in 0..size {
            let targets: Vec<usize> = (i + 1..size).collect();
            let records =
                self.score_row(calculator, data, i, data, &targets, relax_threshold, self.worker_num)?;
            write_records(out, &data.headers[i], data, &records)?;
        }
        Ok(())
    }

    /// Scores block A against every block the reader yields, reading ahead on a thread.
    fn score_against_stream<V: HistCell>(
        &self,
        calculator: &IdentityCalculator<V>,
        data_a: &SequenceData<V>,
        mut reader: FastaBlockReader,
        relax_threshold: f64,
        out: &mut dyn Write,
    ) -> Result<(), IdentityError> {
        let reader_done = AtomicBool::new(false);
        let reader_done = &reader_done;
        let (tx, rx) = bounded::<Vec<Sequence>>(QUEUE_CAPACITY);

        let mut process_result: Result<(), IdentityError> = Ok(());
        let read_result = std::thread::scope(
            |scope| -> Result<Result<(), SequenceError>, IdentityError> {
                let reader_handle = scope.spawn(move || -> Result<(), SequenceError> {
                    while reader.is_reading() {
                        let block = reader.read_block()?;
                        if tx.send(block).is_err() {
                            break;
                        }
                    }
                    reader_done.store(true, Ordering::Release);
                    Ok(())
                });

                loop {
                    match rx.recv_timeout(RECV_BACKOFF) {
                        Ok(block) => {
                            // One worker is reserved while the reader is still going.
                            let workers = if reader_done.load(Ordering::Acquire) {
                                self.worker_num
                            } else {
                                self.worker_num - 1
                            };
                            if let Err(e) =
                                self.score_block_pair(calculator, data_a, block, relax_threshold, workers, out)
                            {
                                process_result = Err(e);
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                drop(rx);

                match reader_handle.join() {
                    Ok(result) => Ok(result),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            },
        )?;

        process_result?;
        read_result?;
        Ok(())
    }

    fn score_block_pair<V: HistCell>(
        &self,
        calculator: &IdentityCalculator<V>,
        data_a: &SequenceData<V>,
        block_b: Vec<Sequence>,
        relax_threshold: f64,
        workers: usize,
        out: &mut dyn Write,
    ) -> Result<(), IdentityError> {
        let data_b = calculator.unpack_block(block_b, workers)?;
        let targets: Vec<usize> = (0..data_b.len()).collect();
        for i in 0..data_a.len() {
            let records =
                self.score_row(calculator, data_a, i, &data_b, &targets, relax_threshold, workers)?;
            write_records(out, &data_a.headers[i], &data_b, &records)?;
        }
        Ok(())
    }

    /// Scores one sequence of A against selected sequences of B, in parallel, returning
    /// the indices and scores that clear the relaxed threshold.
    #[allow(clippy::too_many_arguments)]
    fn score_row<V: HistCell>(
        &self,
        calculator: &IdentityCalculator<V>,
        data_a: &SequenceData<V>,
        i: usize,
        data_b: &SequenceData<V>,
        targets: &[usize],
        relax_threshold: f64,
        workers: usize,
    ) -> Result<Vec<(usize, f64)>, IdentityError> {
        let threshold = self.threshold;
        let k1 = &data_a.k_hists[i];
        let mono1 = &data_a.mono_hists[i];
        let l1 = data_a.lengths[i];

        let score_one = move |&j: &usize| -> Result<Option<(usize, f64)>, IdentityError> {
            let l2 = data_b.lengths[j];
            let ratio = Statistician::<V>::identity_minimum(l1, l2);
            // An identity at or above the threshold is impossible for this pair.
            if ratio < threshold {
                return Ok(None);
            }
            let score = calculator.score_pair(
                k1,
                &data_b.k_hists[j],
                mono1,
                &data_b.mono_hists[j],
                ratio,
                l1,
                l2,
            )?;
            if score >= relax_threshold {
                Ok(Some((j, score)))
            } else {
                Ok(None)
            }
        };

        let rows = run_partitioned(targets, workers, &score_one)?;
        Ok(rows.into_iter().flatten().collect())
    }
}

fn write_records<V>(
    out: &mut dyn Write,
    header_a: &str,
    data_b: &SequenceData<V>,
    records: &[(usize, f64)],
) -> Result<(), IdentityError> {
    for &(j, score) in records {
        let clamped = score.clamp(0.0, 1.0);
        writeln!(
            out,
            "{}\t{}\t{}",
            header_a,
            data_b.headers[j],
            format_sig4(clamped)
        )?;
    }
    Ok(())
}
