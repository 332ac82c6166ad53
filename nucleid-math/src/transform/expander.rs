use crate::errors::MathError;
use crate::feature::{Feature, FeatureKind};
use crate::matrix::Matrix;
use crate::transform::Transformer;

/// Expands a table of single statistics into singles ∥ squares ∥ pairs.
///
/// With `n` singles the output has `2n + (2n choose 2)` columns: every single, its square,
/// and the products of all column pairs over the singles and squares. A pair cell is the
/// product of two already-expanded cells, so a pair of a square and a single composes
/// consistently.
pub struct FeatureExpander {
    features: Vec<Feature>,
    single_count: usize,
}

impl FeatureExpander {
    /// Builds the expanded feature list from the singles describing `m`'s columns.
    pub fn fit(m: &Matrix, singles: &[Feature]) -> Result<FeatureExpander, MathError> {
        let single_count = m.cols();
        if single_count != singles.len() {
            return Err(MathError::DimensionMismatch {
                operation: "expander fit",
                left_rows: m.rows(),
                left_cols: m.cols(),
                right_rows: 1,
                right_cols: singles.len(),
            });
        }

        let both = 2 * single_count;
        let paired_count = both * (both - 1) / 2;
        let mut features: Vec<Feature> = Vec::with_capacity(both + paired_count);

        for (i, single) in singles.iter().enumerate() {
            let mut f = single.clone();
            f.table_index = i;
            features.push(f);
        }
        for c in 0..single_count {
            let mut f = Feature::squared(&features[c]);
            f.table_index = features.len();
            features.push(f);
        }
        for c1 in 0..both - 1 {
            for c2 in c1 + 1..both {
                let mut f = Feature::paired(&features[c1], &features[c2]);
                f.table_index = features.len();
                features.push(f);
            }
        }

        Ok(FeatureExpander {
            features,
            single_count,
        })
    }
}

impl Transformer for FeatureExpander {
    fn transform(&self, m: &Matrix) -> Result<Matrix, MathError> {
        if m.cols() != self.single_count {
            return Err(MathError::DimensionMismatch {
                operation: "expander transform",
                left_rows: m.rows(),
                left_cols: m.cols(),
                right_rows: 1,
                right_cols: self.single_count,
            });
        }

        let rows = m.rows();
        let cols = self.features.len();
        let mut t = Matrix::zeros(rows, cols);
        for (i, feature) in self.features.iter().enumerate() {
            match feature.kind {
                FeatureKind::Single { .. } => {
                    for r in 0..rows {
                        t[(r, i)] = m[(r, i)];
                    }
                }
                FeatureKind::Squared { component } => {
                    for r in 0..rows {
                        let v = m[(r, component)];
                        t[(r, i)] = v * v;
                    }
                }
                FeatureKind::Paired { first, second } => {
                    // Pairs read the expanded table, so squares compose.
                    for r in 0..rows {
                        t[(r, i)] = t[(r, first)] * t[(r, second)];
                    }
                }
            }
        }
        Ok(t)
    }

    fn feature_list(&self) -> Vec<Feature> {
        self.features.clone()
    }
}
