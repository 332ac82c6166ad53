/// How a feature value is computed at inference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Direct output of one statistic, identified by its function index.
    Single {
        /// index into the statistic bank
        stat_index: usize,
    },
    /// Square of one component feature.
    Squared {
        /// table index of the component
        component: usize,
    },
    /// Product of two component features (singles or squares).
    Paired {
        /// table index of the first component
        first: usize,
        /// table index of the second component
        second: usize,
    },
}

/// One column of the training table, together with everything the inference pipeline
/// needs to reproduce its value: normalization bounds, distance-to-similarity conversion,
/// selection state and the fitted weight.
///
/// Squared and paired features reference their components by table index; the list is
/// always ordered singles, then squares, then pairs, and `table_index` matches the
/// position of the feature in its list. The pseudo-feature named `constant` is the bias
/// term and is never selected.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// feature name; squares are `X^2`, pairs are `X x Y`
    pub name: String,
    pub kind: FeatureKind,
    /// distance statistics are converted to similarities before fitting
    pub is_distance: bool,
    pub is_normalized: bool,
    /// observed minimum of the column
    pub norm_min: f64,
    /// observed maximum of the column
    pub norm_max: f64,
    /// position of this feature in its list
    pub table_index: usize,
    pub is_selected: bool,
    /// true when an unselected feature is a component of a selected one
    pub is_needed: bool,
    pub is_converted: bool,
    pub weight: f64,
}

/// Name of the bias pseudo-feature.
pub const BIAS_NAME: &str = "constant";

impl Feature {
    /// A single-statistic feature.
    pub fn single(stat_index: usize, name: &str, is_distance: bool) -> Feature {
        Feature {
            name: String::from(name),
            kind: FeatureKind::Single { stat_index },
            is_distance,
            is_normalized: false,
            norm_min: 0.0,
            norm_max: 0.0,
            table_index: 0,
            is_selected: false,
            is_needed: false,
            is_converted: false,
            weight: 0.0,
        }
    }

    /// The square of the feature at `component`.
    pub fn squared(component: &Feature) -> Feature {
        Feature {
            name: format!("{}^2", component.name),
            kind: FeatureKind::Squared {
                component: component.table_index,
            },
            is_distance: false,
            ..Feature::single(0, "", false)
        }
    }

    /// The product of the features at `first` and `second`.
    pub fn paired(first: &Feature, second: &Feature) -> Feature {
        Feature {
            name: format!("{} x {}", first.name, second.name),
            kind: FeatureKind::Paired {
                first: first.table_index,
                second: second.table_index,
            },
            is_distance: false,
            ..Feature::single(0, "", false)
        }
    }

    /// The bias pseudo-feature.
    pub fn bias() -> Feature {
        Feature::single(usize::MAX, BIAS_NAME, true)
    }

    /// True for the bias pseudo-feature.
    pub fn is_bias(&self) -> bool {
        self.name == BIAS_NAME
    }

    /// Number of component features: 0, 1 or 2.
    pub fn component_count(&self) -> usize {
        match self.kind {
            FeatureKind::Single { .. } => 0,
            FeatureKind::Squared { .. } => 1,
            FeatureKind::Paired { .. } => 2,
        }
    }
}

/// Marks the feature at `index` selected and flags its components as needed,
/// following squared components down to their singles.
pub fn mark_selected(features: &mut [Feature], index: usize) {
    features[index].is_selected = true;
    match features[index].kind {
        FeatureKind::Single { .. } => {}
        FeatureKind::Squared { component } => mark_needed(features, component),
        FeatureKind::Paired { first, second } => {
            mark_needed(features, first);
            mark_needed(features, second);
        }
    }
}

fn mark_needed(features: &mut [Feature], index: usize) {
    features[index].is_needed = true;
    if let FeatureKind::Squared { component } = features[index].kind {
        mark_needed(features, component);
    }
}

/// Keeps selected and needed features only, remapping component references and table
/// indices onto the compact list.
pub fn compact_features(features: &[Feature]) -> Vec<Feature> {
    let mut index_map = vec![usize::MAX; features.len()];
    let mut kept: Vec<Feature> = Vec::new();
    for (old_index, feature) in features.iter().enumerate() {
        if feature.is_selected || feature.is_needed {
            index_map[old_index] = kept.len();
            kept.push(feature.clone());
        }
    }
    for (new_index, feature) in kept.iter_mut().enumerate() {
        feature.table_index = new_index;
        feature.kind = match feature.kind {
            FeatureKind::Single { stat_index } => FeatureKind::Single { stat_index },
            FeatureKind::Squared { component } => FeatureKind::Squared {
                component: index_map[component],
            },
            FeatureKind::Paired { first, second } => FeatureKind::Paired {
                first: index_map[first],
                second: index_map[second],
            },
        };
    }
    kept
}
