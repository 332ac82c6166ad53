use crate::errors::MathError;
use crate::feature::Feature;
use crate::matrix::Matrix;
use crate::transform::Transformer;

/// Turns normalized distance columns into similarities with `x → 1 − x`.
///
/// The `is_converted` flag on the feature record keeps the stage idempotent: a column is
/// converted at most once no matter how often the pipeline runs over it.
pub struct SimConverter {
    features: Vec<Feature>,
}

impl SimConverter {
    /// Remembers which columns still need conversion.
    pub fn fit(features: &[Feature]) -> SimConverter {
        SimConverter {
            features: features.to_vec(),
        }
    }
}

impl Transformer for SimConverter {
    fn transform(&self, m: &Matrix) -> Result<Matrix, MathError> {
        if m.cols() != self.features.len() {
            return Err(MathError::DimensionMismatch {
                operation: "sim converter transform",
                left_rows: m.rows(),
                left_cols: m.cols(),
                right_rows: 1,
                right_cols: self.features.len(),
            });
        }
        let mut t = m.clone();
        for (c, feature) in self.features.iter().enumerate() {
            if feature.is_distance && !feature.is_converted {
                for r in 0..m.rows() {
                    t[(r, c)] = 1.0 - m[(r, c)];
                }
            }
        }
        Ok(t)
    }

    fn feature_list(&self) -> Vec<Feature> {
        let mut features = self.features.clone();
        for f in features.iter_mut() {
            if f.is_distance {
                f.is_converted = true;
            }
        }
        features
    }
}
