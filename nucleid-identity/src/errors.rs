use thiserror::Error;

use nucleid_math::MathError;
use nucleid_seq::SequenceError;

#[derive(Debug, Error)]
#[non_exhaustive]
/// Errors that may be thrown while computing statistics, training or applying the predictor
pub enum IdentityError {
    #[error("General I/O error occurred while reading or writing identity data")]
    /// I/O failure on a sequence, model or result file
    Io(#[from] std::io::Error),

    #[error(transparent)]
    /// A sequence-layer failure
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    /// A matrix or model-fitting failure
    Math(#[from] MathError),

    #[error("Statistic index {index} does not name any statistic")]
    /// A statistic was selected by an index outside the bank
    UnknownStatistic {
        /// the failing index
        index: i64,
    },

    #[error("The model references a feature named '{name}' that was never defined")]
    /// A squared or paired feature points at an absent component
    UnknownFeature {
        /// the unresolved component name
        name: String,
    },

    #[error("Malformed model file at line {line}: {reason}")]
    /// The model file violates the serialization contract
    ModelFormat {
        /// 1-based line number
        line: usize,
        /// what went wrong
        reason: String,
    },

    #[error("Histogram mean is zero for '{header}'; cannot compute statistics on it")]
    /// A histogram with a zero mean reached the statistician
    DegenerateHistogram {
        /// header of the degenerate sequence
        header: String,
    },

    #[error("{statistic}: a vector norm or denominator collapsed to zero")]
    /// A statistic hit a division that is undefined for this pair
    DegenerateStatistic {
        /// the failing statistic
        statistic: &'static str,
    },

    #[error("Invalid configuration: {reason}")]
    /// A tuning knob is outside its documented range
    ConfigurationInvalid {
        /// what is out of range
        reason: String,
    },

    #[error("No usable sequences at stage: {stage}")]
    /// A stage that requires data received none
    EmptyInput {
        /// the starving stage
        stage: &'static str,
    },
}
