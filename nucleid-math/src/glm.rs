use crate::errors::MathError;
use crate::matrix::Matrix;

/// Output function of a fitted linear model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Raw linear response, used for regression.
    Linear,
    /// Thresholded at 0.5, used for classification.
    Binary,
}

/// A general linear model fitted by pseudo-inverse.
///
/// Given a feature matrix `F` (bias column included) and a label column `l`, the weights
/// solve the normal equations: `w = pinv(FᵀF) Fᵀ l`.
#[derive(Debug, Clone)]
pub struct Glm {
    weights: Vec<f64>,
    output: Output,
}

impl Glm {
    fn fit(features: &Matrix, labels: &Matrix, output: Output) -> Result<Glm, MathError> {
        let t = features.transpose();
        let s = t.times(features)?;
        let w = s.pseudo_inverse()?.times(&t)?.times(labels)?;
        Ok(Glm {
            weights: w.as_slice().to_vec(),
            output,
        })
    }

    /// Fits a regression model with a linear output.
    pub fn regressor(features: &Matrix, labels: &Matrix) -> Result<Glm, MathError> {
        Glm::fit(features, labels, Output::Linear)
    }

    /// Fits a classification model whose output is thresholded at 0.5.
    pub fn classifier(features: &Matrix, labels: &Matrix) -> Result<Glm, MathError> {
        Glm::fit(features, labels, Output::Binary)
    }

    /// Applies the model, producing one label row per feature row.
    pub fn transform(&self, features: &Matrix) -> Result<Matrix, MathError> {
        if features.cols() != self.weights.len() {
            return Err(MathError::DimensionMismatch {
                operation: "glm transform",
                left_rows: features.rows(),
                left_cols: features.cols(),
                right_rows: self.weights.len(),
                right_cols: 1,
            });
        }
        let mut labels = Matrix::zeros(features.rows(), 1);
        for r in 0..features.rows() {
            let mut y = 0.0;
            for (c, w) in self.weights.iter().enumerate() {
                y += features[(r, c)] * w;
            }
            labels[(r, 0)] = match self.output {
                Output::Linear => y,
                Output::Binary => {
                    if y >= 0.5 {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
        }
        Ok(labels)
    }

    /// The fitted weights; the bias is first when the bias column was first.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Evaluation metrics for fitted models.
pub mod evaluator {
    use super::*;
    use crate::matrix::nearly_equal;

    fn check_rows(o: &Matrix, p: &Matrix) -> Result<usize, MathError> {
        if o.rows() != p.rows() {
            return Err(MathError::LabelCountMismatch {
                expected: o.rows(),
                found: p.rows(),
            });
        }
        Ok(o.rows())
    }

    /// Fraction of predictions equal to the original labels.
    pub fn acc(o: &Matrix, p: &Matrix) -> Result<f64, MathError> {
        let n = check_rows(o, p)?;
        let hits = (0..n)
            .filter(|&i| nearly_equal(o[(i, 0)], p[(i, 0)]))
            .count();
        Ok(hits as f64 / n as f64)
    }

    fn fraction_for_label(o: &Matrix, p: &Matrix, label: f64) -> Result<f64, MathError> {
        let n = check_rows(o, p)?;
        let mut total = 0.0;
        let mut hits = 0.0;
        for i in 0..n {
            if nearly_equal(o[(i, 0)], label) {
                total += 1.0;
                if nearly_equal(o[(i, 0)], p[(i, 0)]) {
                    hits += 1.0;
                }
            }
        }
        Ok(hits / total)
    }

    /// Fraction of positive labels that were recovered.
    pub fn sens(o: &Matrix, p: &Matrix) -> Result<f64, MathError> {
        fraction_for_label(o, p, 1.0)
    }

    /// Fraction of negative labels that were recovered.
    pub fn spec(o: &Matrix, p: &Matrix) -> Result<f64, MathError> {
        fraction_for_label(o, p, 0.0)
    }

    /// Mean absolute error.
    pub fn mae(o: &Matrix, p: &Matrix) -> Result<f64, MathError> {
        let n = check_rows(o, p)?;
        let sum: f64 = (0..n).map(|i| (o[(i, 0)] - p[(i, 0)]).abs()).sum();
        Ok(sum / n as f64)
    }

    /// Mean squared error.
    pub fn mse(o: &Matrix, p: &Matrix) -> Result<f64, MathError> {
        let n = check_rows(o, p)?;
        let sum: f64 = (0..n).map(|i| (o[(i, 0)] - p[(i, 0)]).powi(2)).sum();
        Ok(sum / n as f64)
    }
}
