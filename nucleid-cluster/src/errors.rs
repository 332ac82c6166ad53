use thiserror::Error;

use nucleid_identity::IdentityError;
use nucleid_math::MathError;
use nucleid_seq::SequenceError;

#[derive(Debug, Error)]
#[non_exhaustive]
/// Errors that may be thrown while clustering
pub enum ClusterError {
    #[error("General I/O error occurred while reading sequences or writing clusters")]
    /// I/O failure on the database or result file
    Io(#[from] std::io::Error),

    #[error(transparent)]
    /// A sequence-layer failure
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    /// An identity-prediction failure
    Identity(#[from] IdentityError),

    #[error(transparent)]
    /// A matrix failure during evaluation
    Math(#[from] MathError),

    #[error("A weighted shift needs an up-to-date identity list")]
    /// shift was called on a cluster whose identity list is stale
    StaleIdentityList,

    #[error("A weighted shift with prior contributions needs the accumulated old mean")]
    /// the old mean was never committed although old contributions exist
    MissingOldMean,

    #[error("The reservoir still holds {size} points at the end of a pass")]
    /// the pass loop failed to drain the reservoir
    ReservoirNotEmpty {
        /// left-over point count
        size: usize,
    },

    #[error("A center matrix of side {size} exceeds the limit of {limit}")]
    /// the all-centers matrix would not fit the configured bound
    MatrixTooLarge { size: usize, limit: usize },

    #[error("Invalid configuration: {reason}")]
    /// A tuning knob is outside its documented range
    ConfigurationInvalid {
        /// what is out of range
        reason: String,
    },

    #[error("Could not estimate a clustering threshold: {reason}")]
    /// threshold auto-estimation produced nothing usable
    EstimationFailed {
        /// why the estimate is unusable
        reason: String,
    },

    #[error("No usable sequences at stage: {stage}")]
    /// A stage that requires data received none
    EmptyInput {
        /// the starving stage
        stage: &'static str,
    },
}
