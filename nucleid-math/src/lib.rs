//! `nucleid-math` provides the numeric building blocks of the identity predictor:
//! a dense [`Matrix`](crate::Matrix) with a Gauss-Jordan pseudo-inverse, linear models
//! fitted by normal equations ([`Glm`](crate::Glm)), evaluation metrics, the
//! [`Feature`](crate::Feature) records of the trainable pipeline, the column transforms
//! (normalize, distance→similarity, expand) and the best-first feature-subset search.

mod errors;
mod feature;
mod glm;
mod matrix;

pub mod selection;
pub mod transform;

pub use errors::MathError;
pub use feature::{compact_features, mark_selected, Feature, FeatureKind, BIAS_NAME};
pub use glm::{evaluator, Glm, Output};
pub use matrix::{nearly_equal, Matrix};
