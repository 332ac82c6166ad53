use log::warn;

use crate::errors::MathError;
use crate::feature::Feature;
use crate::matrix::{nearly_equal, Matrix};
use crate::transform::Transformer;

/// Normalizes marked columns to `[0, 1]` using the minima and maxima observed at fit time.
///
/// Columns whose feature record already carries `is_normalized` are left alone, which makes
/// the stage safe to run twice (the pipeline normalizes once before and once after
/// expansion). Values outside the observed bounds are clamped. A column with a single
/// observed value is mapped to all zeros.
pub struct Normalizer {
    features: Vec<Feature>,
}

impl Normalizer {
    /// Observes the bounds of every not-yet-normalized column.
    pub fn fit(m: &Matrix, features: &[Feature]) -> Result<Normalizer, MathError> {
        if m.rows() == 0 || m.cols() == 0 {
            return Err(MathError::EmptyMatrix);
        }
        if m.cols() != features.len() {
            return Err(MathError::DimensionMismatch {
                operation: "normalizer fit",
                left_rows: m.rows(),
                left_cols: m.cols(),
                right_rows: 1,
                right_cols: features.len(),
            });
        }

        let mut features = features.to_vec();
        for (c, feature) in features.iter_mut().enumerate() {
            if feature.is_normalized {
                continue;
            }
            let mut min = m[(0, c)];
            let mut max = min;
            for r in 1..m.rows() {
                let v = m[(r, c)];
                if v < min {
                    min = v;
                }
                if v > max {
                    max = v;
                }
            }
            feature.norm_min = min;
            feature.norm_max = max;
        }
        Ok(Normalizer { features })
    }
}

impl Transformer for Normalizer {
    fn transform(&self, m: &Matrix) -> Result<Matrix, MathError> {
        if m.cols() != self.features.len() {
            return Err(MathError::DimensionMismatch {
                operation: "normalizer transform",
                left_rows: m.rows(),
                left_cols: m.cols(),
                right_rows: 1,
                right_cols: self.features.len(),
            });
        }
        let mut t = m.clone();
        for (c, feature) in self.features.iter().enumerate() {
            if feature.is_normalized {
                continue;
            }
            let min = feature.norm_min;
            let span = feature.norm_max - min;
            if nearly_equal(span, 0.0) {
                warn!(
                    "Column {} ('{}') holds a single value; normalized to zero",
                    c, feature.name
                );
                for r in 0..m.rows() {
                    t[(r, c)] = 0.0;
                }
                continue;
            }
            for r in 0..m.rows() {
                t[(r, c)] = ((m[(r, c)] - min) / span).clamp(0.0, 1.0);
            }
        }
        Ok(t)
    }

    fn feature_list(&self) -> Vec<Feature> {
        let mut features = self.features.clone();
        for f in features.iter_mut() {
            f.is_normalized = true;
        }
        features
    }
}
