use once_cell::sync::Lazy;

use nucleid_math::Feature;

use crate::statistics::Stat;

/// The single-feature templates of the whole statistic bank, one per statistic, with
/// `table_index` matching the feature's column in the raw training table.
static STATISTIC_FEATURES: Lazy<Vec<Feature>> = Lazy::new(|| {
    let mut features: Vec<Feature> = Stat::ALL
        .iter()
        .map(|&stat| Feature::single(stat.index(), stat.name(), stat.is_distance()))
        .collect();
    for (i, f) in features.iter_mut().enumerate() {
        f.table_index = i;
    }
    features
});

/// A fresh copy of the statistic-bank feature list.
pub fn statistic_features() -> Vec<Feature> {
    STATISTIC_FEATURES.clone()
}

/// The training-table column of the statistic named `name`, if any.
pub fn column_of(name: &str) -> Option<usize> {
    STATISTIC_FEATURES.iter().position(|f| f.name == name)
}
