use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
/// Errors that may be thrown while reading, encoding or mutating DNA sequences
pub enum SequenceError {
    #[error("General I/O error occurred while reading a sequence file")]
    /// I/O error occurred while reading a sequence file
    Io(#[from] std::io::Error),

    #[error("Invalid nucleotide symbol '{symbol}' in sequence: {header}")]
    /// A symbol outside the accepted DNA alphabet has been found
    InvalidSymbol {
        /// the offending character
        symbol: char,
        /// header of the sequence that contains it
        header: String,
    },

    #[error("Sequence '{header}' contains no valid segment; at least one non-N stretch is required")]
    /// Every position of the sequence is an unknown base
    EmptyInput {
        /// header of the degenerate sequence
        header: String,
    },

    #[error("A k-mer histogram contains only zeros for sequence: {header}")]
    /// All histogram cells are zero, which indicates degenerate input
    AllZeroHistogram {
        /// header of the degenerate sequence
        header: String,
    },

    #[error("A k-mer count turned negative; the {width}-bit histogram cell is too narrow")]
    /// A counter wrapped around its signed capacity
    HistogramOverflow {
        /// width of the histogram cell in bits
        width: u32,
    },

    #[error("k must be at least 1, but {k} was requested")]
    /// The requested k-mer length is out of range
    InvalidK {
        /// the requested k-mer length
        k: usize,
    },

    #[error("Mutation rate must be within [0, 1], but received {rate}")]
    /// The requested mutation rate is out of range
    InvalidMutationRate {
        /// the requested rate
        rate: f64,
    },

    #[error("No mutation types were enabled before calling mutate()")]
    /// The mutation model has an empty set of enabled mutation types
    NoMutationsEnabled,

    #[error("Block size bounds must satisfy 2 <= min <= max, but received [{min}, {max}]")]
    /// The mutation block-size bounds are invalid
    InvalidBlockBounds {
        /// requested minimum block length
        min: usize,
        /// requested maximum block length
        max: usize,
    },

    #[error("Mutation position {index} fell outside every valid segment")]
    /// Internal consistency failure of the mutation planner
    PositionOutsideSegments {
        /// the failing position
        index: usize,
    },
}
