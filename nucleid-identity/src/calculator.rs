use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use nucleid_math::Matrix;
use nucleid_seq::kmer::{build_monomers, HistCell, KmerHistogram, ALPHABET_SIZE};
use nucleid_seq::sequence::Sequence;
use nucleid_seq::SequenceError;

use crate::errors::IdentityError;
use crate::generator::SyntheticDataGenerator;
use crate::model_io::ModelFile;
use crate::pipeline::{self, train_regressor, TrainedPipeline};
use crate::predictor::GlmPredictor;
use crate::statistics::Statistician;

/// The histograms of one unpacked block: an arena the clusters and scorers index into.
///
/// Sequence bodies are dropped as soon as their histograms are built; what remains per
/// sequence is its k-mer histogram, monomer histogram, header and length.
pub struct SequenceData<V> {
    pub k_hists: Vec<Vec<V>>,
    pub mono_hists: Vec<Vec<u64>>,
    pub headers: Vec<String>,
    pub lengths: Vec<usize>,
}

impl<V> SequenceData<V> {
    /// An arena with no sequences.
    pub fn empty() -> SequenceData<V> {
        SequenceData {
            k_hists: Vec::new(),
            mono_hists: Vec::new(),
            headers: Vec::new(),
            lengths: Vec::new(),
        }
    }

    /// Number of sequences in the arena.
    pub fn len(&self) -> usize {
        self.k_hists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.k_hists.is_empty()
    }

    /// Moves the sequences of `other` into this arena.
    pub fn append(&mut self, mut other: SequenceData<V>) {
        self.k_hists.append(&mut other.k_hists);
        self.mono_hists.append(&mut other.mono_hists);
        self.headers.append(&mut other.headers);
        self.lengths.append(&mut other.lengths);
    }
}

/// Everything needed to score identity between two histogram pairs.
///
/// Built either by training on a generator's synthetic data or from a serialized model.
/// The threshold is relaxed by the predictor's absolute error when requested; `can_skip`
/// turns on the cheap length-ratio rejection, and the exact mode replaces prediction by
/// histogram equality for near-duplicate detection at thresholds above 0.99.
pub struct IdentityCalculator<V> {
    threshold: f64,
    abs_error: f64,
    /// flipped off for evaluation passes that need every score computed
    can_skip: AtomicBool,
    exact_only: bool,
    predictor: GlmPredictor,
    /// statistic-bank indices of the single features, in scratch order
    single_stats: Vec<usize>,
    feature_count: usize,
    k: usize,
    k_hist_size: usize,
    composition: [f64; ALPHABET_SIZE],
    keys: Vec<u8>,
    k_table: KmerHistogram<V>,
}

impl<V: HistCell> IdentityCalculator<V> {
    /// Trains a regression model on the generator's data and packages it.
    ///
    /// When `model_path` is given, the trained model is serialized there before the
    /// training tables are released.
    pub fn from_generator(
        generator: &mut SyntheticDataGenerator,
        thread_num: usize,
        threshold: f64,
        can_skip: bool,
        can_relax: bool,
        model_path: Option<&Path>,
    ) -> Result<IdentityCalculator<V>, IdentityError> {
        let features = generator.features().ok_or(IdentityError::EmptyInput {
            stage: "training (feature table already released)",
        })?;
        let labels = generator.labels().ok_or(IdentityError::EmptyInput {
            stage: "training (label table already released)",
        })?;

        // The regressor learns the whole identity range, hence threshold zero here.
        let trained = train_regressor(features, labels, 0.0, thread_num, generator.k())?;

        if let Some(path) = model_path {
            let model = ModelFile {
                k: generator.k(),
                hist_size: generator.hist_size(),
                abs_error: trained.abs_error,
                max_length: generator.max_length(),
                composition: generator.composition(),
                features: trained.features.clone(),
            };
            model.write(path)?;
        }

        let calculator = Self::assemble(
            &trained,
            generator.k(),
            generator.hist_size(),
            generator.composition(),
            threshold,
            can_skip,
            can_relax,
        )?;
        generator.clear_data();
        Ok(calculator)
    }

    /// Packages an already-trained pipeline without touching any generator state.
    pub fn from_pipeline(
        trained: &TrainedPipeline,
        k: usize,
        k_hist_size: usize,
        composition: [f64; ALPHABET_SIZE],
        threshold: f64,
        can_skip: bool,
        can_relax: bool,
    ) -> Result<IdentityCalculator<V>, IdentityError> {
        Self::assemble(
            trained,
            k,
            k_hist_size,
            composition,
            threshold,
            can_skip,
            can_relax,
        )
    }

    /// Packages a previously serialized model.
    pub fn from_model(
        model: &ModelFile,
        threshold: f64,
        can_skip: bool,
        can_relax: bool,
    ) -> Result<IdentityCalculator<V>, IdentityError> {
        let trained = TrainedPipeline {
            features: model.features.clone(),
            classification: false,
            abs_error: model.abs_error,
            sqr_error: 0.0,
            accuracy: 0.0,
            sensitivity: 0.0,
            specificity: 0.0,
        };
        Self::assemble(
            &trained,
            model.k,
            model.hist_size,
            model.composition,
            threshold,
            can_skip,
            can_relax,
        )
    }

    fn assemble(
        trained: &TrainedPipeline,
        k: usize,
        k_hist_size: usize,
        composition: [f64; ALPHABET_SIZE],
        threshold: f64,
        can_skip: bool,
        can_relax: bool,
    ) -> Result<IdentityCalculator<V>, IdentityError> {
        let threshold = if can_relax {
            threshold - trained.abs_error
        } else {
            threshold
        };
        let predictor = GlmPredictor::from_features(&trained.features, trained.classification)?;
        let feature_count = predictor.feature_count();
        let single_stats = pipeline::single_stat_indices(&trained.features);
        let k_table = KmerHistogram::<V>::new(k)?;
        let keys = k_table.keys_digit_format();

        Ok(IdentityCalculator {
            threshold,
            abs_error: trained.abs_error,
            can_skip: AtomicBool::new(can_skip),
            exact_only: false,
            predictor,
            single_stats,
            feature_count,
            k,
            k_hist_size,
            composition,
            keys,
            k_table,
        })
    }

    /// Switches to the exact-match fast path: identical histograms score 1, all else 0.
    /// Meant for near-deduplication at thresholds above 0.99.
    pub fn set_exact_only(&mut self, yes: bool) {
        self.exact_only = yes;
    }

    /// The predictor's absolute error on held-out data.
    pub fn error(&self) -> f64 {
        self.abs_error
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn k_hist_size(&self) -> usize {
        self.k_hist_size
    }

    pub fn mono_hist_size(&self) -> usize {
        ALPHABET_SIZE
    }

    /// The working threshold (already relaxed when relaxation is on).
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn can_skip(&self) -> bool {
        self.can_skip.load(Ordering::Relaxed)
    }

    pub fn set_can_skip(&self, yes: bool) {
        self.can_skip.store(yes, Ordering::Relaxed);
    }

    /// The length ratio of a pair; an identity score can never exceed it.
    pub fn ratio(l1: usize, l2: usize) -> f64 {
        Statistician::<V>::identity_minimum(l1, l2)
    }

    /// Builds the histogram arena of a block, consuming the sequences.
    ///
    /// Histogram construction is data-parallel over the block; a histogram of all zeros
    /// is fatal because it means the sequence held no countable k-mer at all.
    pub fn unpack_block(
        &self,
        block: Vec<Sequence>,
        thread_num: usize,
    ) -> Result<SequenceData<V>, IdentityError> {
        let headers: Vec<String> = block.iter().map(|s| s.description().to_owned()).collect();
        let lengths: Vec<usize> = block.iter().map(|s| s.len()).collect();

        let k_table = &self.k_table;
        let build_one = move |sequence: &Sequence| -> Result<(Vec<V>, Vec<u64>), IdentityError> {
            let k_hist = k_table.build(sequence)?;
            let mono_hist = build_monomers(sequence)?;
            if k_hist.iter().all(|&c| c == V::zero()) || mono_hist.iter().all(|&c| c == 0) {
                return Err(IdentityError::Sequence(SequenceError::AllZeroHistogram {
                    header: sequence.description().to_owned(),
                }));
            }
            Ok((k_hist, mono_hist))
        };

        let built = run_partitioned(&block, thread_num, &build_one)?;
        drop(block);

        let mut k_hists = Vec::with_capacity(built.len());
        let mut mono_hists = Vec::with_capacity(built.len());
        for (k_hist, mono_hist) in built {
            k_hists.push(k_hist);
            mono_hists.push(mono_hist);
        }
        Ok(SequenceData {
            k_hists,
            mono_hists,
            headers,
            lengths,
        })
    }

    /// One vs. one score on raw histograms.
    ///
    /// Applies the skip mode (length bound below threshold scores 0), clamps the result
    /// into `[0, ratio]` and zeroes scores under the threshold when skipping is on.
    pub fn score_pair(
        &self,
        k1: &[V],
        k2: &[V],
        mono1: &[u64],
        mono2: &[u64],
        ratio: f64,
        l1: usize,
        l2: usize,
    ) -> Result<f64, IdentityError> {
        if self.can_skip() && Statistician::<V>::identity_minimum(l1, l2) < self.threshold {
            return Ok(0.0);
        }
        if self.exact_only {
            return Ok(if k1 == k2 { 1.0 } else { 0.0 });
        }

        let statistician = Statistician::new(
            self.k_hist_size,
            self.k,
            k1,
            k2,
            mono1,
            mono2,
            &self.composition,
            &self.keys,
        )?;
        let mut data = Vec::with_capacity(self.feature_count);
        statistician.calculate(&self.single_stats, &mut data)?;
        data.resize(self.feature_count, 0.0);
        let mut result = self.predictor.calculate_identity(&mut data);

        // An identity score cannot exceed the length ratio.
        if result > ratio {
            result = ratio;
        }
        if (self.can_skip() && result < self.threshold) || result < 0.0 {
            result = 0.0;
        }
        Ok(result)
    }

    /// One vs. many, parallel over the many.
    pub fn score_one_vs_many(
        &self,
        k1: &[V],
        mono1: &[u64],
        l1: usize,
        data: &SequenceData<V>,
        targets: &[usize],
        thread_num: usize,
    ) -> Result<Vec<f64>, IdentityError> {
        let score_one = move |&i: &usize| -> Result<f64, IdentityError> {
            let l2 = data.lengths[i];
            let ratio = Self::ratio(l1, l2);
            if self.can_skip() && ratio < self.threshold {
                Ok(0.0)
            } else {
                self.score_pair(
                    k1,
                    &data.k_hists[i],
                    mono1,
                    &data.mono_hists[i],
                    ratio,
                    l1,
                    l2,
                )
            }
        };
        run_partitioned(targets, thread_num, &score_one)
    }

    /// One vs. an explicit list of histograms (e.g. cluster means), parallel.
    #[allow(clippy::too_many_arguments)]
    pub fn score_one_vs_hists(
        &self,
        k1: &[V],
        mono1: &[u64],
        l1: usize,
        k_list: &[&[V]],
        mono_list: &[&[u64]],
        len_list: &[usize],
        thread_num: usize,
    ) -> Result<Vec<f64>, IdentityError> {
        let indices: Vec<usize> = (0..k_list.len()).collect();
        let score_one = move |&i: &usize| -> Result<f64, IdentityError> {
            let l2 = len_list[i];
            let ratio = Self::ratio(l1, l2);
            if self.can_skip() && ratio < self.threshold {
                Ok(0.0)
            } else {
                self.score_pair(k1, k_list[i], mono1, mono_list[i], ratio, l1, l2)
            }
        };
        run_partitioned(&indices, thread_num, &score_one)
    }

    /// All vs. all within one arena; the result is symmetric with a unit diagonal.
    /// Each row's upper triangle is computed in parallel and mirrored.
    pub fn score_all_vs_all(
        &self,
        data: &SequenceData<V>,
        thread_num: usize,
    ) -> Result<Matrix, IdentityError> {
        let size = data.len();
        let mut matrix = Matrix::zeros(size, size);
        for i in 0..size {
            matrix[(i, i)] = 1.0;
        }

        for i in 0..size {
            let targets: Vec<usize> = (i + 1..size).collect();
            let row = self.score_one_vs_many(
                &data.k_hists[i],
                &data.mono_hists[i],
                data.lengths[i],
                data,
                &targets,
                thread_num,
            )?;
            for (j, value) in targets.into_iter().zip(row) {
                matrix[(i, j)] = value;
                matrix[(j, i)] = value;
            }
        }
        Ok(matrix)
    }
}

/// Applies `work` to every item with a static partition over `thread_num` workers,
/// preserving order and propagating the first error.
pub fn run_partitioned<T, R, E>(
    items: &[T],
    thread_num: usize,
    work: &(dyn Fn(&T) -> Result<R, E> + Sync),
) -> Result<Vec<R>, E>
where
    T: Sync,
    R: Send,
    E: Send,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let threads = thread_num.clamp(1, items.len());
    if threads == 1 {
        return items.iter().map(work).collect();
    }

    let chunk = items.len().div_ceil(threads);
    let mut results: Vec<Result<R, E>> = Vec::with_capacity(items.len());
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for part in items.chunks(chunk) {
            handles.push(scope.spawn(move || part.iter().map(work).collect::<Vec<_>>()));
        }
        for handle in handles {
            match handle.join() {
                Ok(part) => results.extend(part),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    });
    results.into_iter().collect()
}
