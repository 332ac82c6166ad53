use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
/// Errors that may be thrown by matrix algebra, model fitting or feature selection
pub enum MathError {
    #[error("{operation}: operand shapes {left_rows}x{left_cols} and {right_rows}x{right_cols} do not match")]
    /// Two operands have incompatible shapes
    DimensionMismatch {
        /// the failing operation
        operation: &'static str,
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("Cannot invert a singular matrix")]
    /// Gauss-Jordan elimination could not reduce the matrix to the identity
    Singular,

    #[error("Cannot take the inverse of a non-square {rows}x{cols} matrix")]
    /// Inversion was requested for a rectangular matrix
    NotSquare { rows: usize, cols: usize },

    #[error("Index {index} is out of range for a matrix with {size} {axis}")]
    /// A row or column index exceeds the matrix extent
    IndexOutOfRange {
        /// the failing index
        index: usize,
        /// number of rows or columns available
        size: usize,
        /// "rows" or "columns"
        axis: &'static str,
    },

    #[error("A matrix operation requires at least one row and one column")]
    /// The operand holds no data at all
    EmptyMatrix,

    #[error("A feature-subset node must hold a strictly increasing index list")]
    /// The node constructor received an unsorted or duplicated index list
    UnsortedNode,

    #[error("The open set is empty; the best-first search cannot continue")]
    /// findOptimum was called with nothing left to explore
    EmptyOpenSet,

    #[error("Labels and predictions have different row counts: {expected} vs {found}")]
    /// An evaluation metric received mismatched inputs
    LabelCountMismatch { expected: usize, found: usize },
}
