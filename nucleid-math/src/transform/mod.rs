//! The trainable column transforms of the feature pipeline

mod expander;
mod normalizer;
mod sim_converter;

pub use expander::*;
pub use normalizer::*;
pub use sim_converter::*;

use crate::errors::MathError;
use crate::feature::Feature;
use crate::matrix::Matrix;

/// A fitted, stateless column transform.
///
/// Each stage of the pipeline consumes a matrix and the feature records describing its
/// columns, and emits a transformed matrix plus an updated feature list.
pub trait Transformer {
    /// Applies the transform to a matrix with the same column layout it was fitted on.
    fn transform(&self, m: &Matrix) -> Result<Matrix, MathError>;

    /// The feature records after this transform, with their flags updated.
    fn feature_list(&self) -> Vec<Feature>;
}
