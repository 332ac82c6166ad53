use nucleid_math::{Feature, FeatureKind};

use crate::errors::IdentityError;

/// The packaged inference state of a trained identity model.
///
/// Construction flattens a compact feature list (bias first) into plain arrays so a
/// single prediction is a handful of passes over a scratch slice: clamp-normalize the
/// singles, flip distances into similarities, multiply out squares and pairs, normalize
/// those, then take the weighted sum. A classification model additionally thresholds at
/// 0.5.
#[derive(Debug, Clone)]
pub struct GlmPredictor {
    classification: bool,
    single_count: usize,
    feature_count: usize,
    bias: f64,
    mins: Vec<f64>,
    /// `norm_max - norm_min` per feature; a zero span maps the value to zero
    spans: Vec<f64>,
    distance_indices: Vec<usize>,
    /// component pair of every composed feature, aligned to `single_count..feature_count`
    expansions: Vec<(usize, usize)>,
    /// (feature index, weight) of every selected feature
    selected: Vec<(usize, f64)>,
}

impl GlmPredictor {
    /// Packages a compact feature list whose first entry is the bias pseudo-feature.
    /// Component indices inside the list are relative to the remainder (bias removed).
    pub fn from_features(features: &[Feature], classification: bool) -> Result<Self, IdentityError> {
        let Some((bias_feature, rest)) = features.split_first() else {
            return Err(IdentityError::EmptyInput {
                stage: "predictor construction (no features)",
            });
        };
        if !bias_feature.is_bias() {
            return Err(IdentityError::UnknownFeature {
                name: format!("expected the bias first, found '{}'", bias_feature.name),
            });
        }

        let feature_count = rest.len();
        let mut mins = Vec::with_capacity(feature_count);
        let mut spans = Vec::with_capacity(feature_count);
        let mut distance_indices = Vec::new();
        let mut selected = Vec::new();
        let mut single_count = 0;

        for (i, f) in rest.iter().enumerate() {
            mins.push(f.norm_min);
            spans.push(f.norm_max - f.norm_min);
            if f.component_count() == 0 {
                single_count += 1;
            }
            if f.is_distance {
                distance_indices.push(i);
            }
            if f.is_selected {
                selected.push((i, f.weight));
            }
        }

        let mut expansions = Vec::with_capacity(feature_count - single_count);
        for f in &rest[single_count..] {
            match f.kind {
                FeatureKind::Squared { component } => expansions.push((component, component)),
                FeatureKind::Paired { first, second } => expansions.push((first, second)),
                FeatureKind::Single { .. } => {
                    return Err(IdentityError::UnknownFeature {
                        name: format!("single feature '{}' after the composed section", f.name),
                    })
                }
            }
        }

        Ok(GlmPredictor {
            classification,
            single_count,
            feature_count,
            bias: bias_feature.weight,
            mins,
            spans,
            distance_indices,
            expansions,
            selected,
        })
    }

    /// Number of features the scratch slice must hold.
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// How many leading entries of the scratch slice are raw statistics.
    pub fn single_count(&self) -> usize {
        self.single_count
    }

    /// Runs inference in place over `data`, whose first [single_count](Self::single_count)
    /// entries hold the raw single statistics; the rest is scratch.
    pub fn calculate_identity(&self, data: &mut [f64]) -> f64 {
        // Normalize and trim the singles.
        for i in 0..self.single_count {
            data[i] = self.normalize(i, data[i]);
        }

        // Convert distances to similarities.
        for &i in &self.distance_indices {
            data[i] = 1.0 - data[i];
        }

        // Multiply out squares and pairs, then normalize them too.
        for (slot, &(c1, c2)) in self.expansions.iter().enumerate() {
            let i = self.single_count + slot;
            data[i] = data[c1] * data[c2];
        }
        for i in self.single_count..self.feature_count {
            data[i] = self.normalize(i, data[i]);
        }

        let mut result = self.bias;
        for &(i, w) in &self.selected {
            result += w * data[i];
        }

        if self.classification {
            if result >= 0.5 {
                1.0
            } else {
                0.0
            }
        } else {
            result
        }
    }

    fn normalize(&self, i: usize, value: f64) -> f64 {
        let span = self.spans[i];
        if span.abs() < f64::EPSILON {
            return 0.0;
        }
        ((value - self.mins[i]) / span).clamp(0.0, 1.0)
    }
}
