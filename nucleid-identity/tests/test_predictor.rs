use nucleid_identity::predictor::GlmPredictor;
use nucleid_math::{Feature, FeatureKind};

/// bias 0.2; single d (distance, bounds [0, 10], selected w=0.3);
/// single s (similarity, bounds [0, 1], needed); squared s^2 (bounds [0, 1], selected w=0.5)
fn small_feature_list() -> Vec<Feature> {
    let mut bias = Feature::bias();
    bias.weight = 0.2;

    let mut dist = Feature::single(0, "manhattan", true);
    dist.norm_min = 0.0;
    dist.norm_max = 10.0;
    dist.is_normalized = true;
    dist.is_converted = true;
    dist.is_selected = true;
    dist.weight = 0.3;

    let mut sim = Feature::single(24, "sim_ratio", false);
    sim.norm_min = 0.0;
    sim.norm_max = 1.0;
    sim.is_normalized = true;
    sim.is_needed = true;

    let mut squared = Feature::squared(&sim);
    squared.kind = FeatureKind::Squared { component: 1 };
    squared.norm_min = 0.0;
    squared.norm_max = 1.0;
    squared.is_normalized = true;
    squared.is_selected = true;
    squared.weight = 0.5;

    let mut features = vec![bias, dist, sim, squared];
    for (i, f) in features.iter_mut().enumerate() {
        f.table_index = i;
    }
    features
}

#[test]
fn test_inference_steps() {
    let predictor = GlmPredictor::from_features(&small_feature_list(), false).unwrap();
    assert_eq!(predictor.single_count(), 2);
    assert_eq!(predictor.feature_count(), 3);

    // manhattan raw 4 → normalized 0.4 → similarity 0.6; sim_ratio raw 0.8;
    // square slot = 0.8² = 0.64; result = 0.2 + 0.3·0.6 + 0.5·0.64 = 0.7.
    let mut data = vec![4.0, 0.8, 0.0];
    let result = predictor.calculate_identity(&mut data);
    assert!((result - 0.7).abs() < 1e-12);
}

#[test]
fn test_out_of_bounds_values_are_clamped() {
    let predictor = GlmPredictor::from_features(&small_feature_list(), false).unwrap();

    // manhattan below its minimum clamps to 0, flipping to similarity 1.
    let mut data = vec![-3.0, 2.0, 0.0];
    let result = predictor.calculate_identity(&mut data);
    // sim_ratio clamps to 1, square 1: 0.2 + 0.3·1 + 0.5·1 = 1.0
    assert!((result - 1.0).abs() < 1e-12);
}

#[test]
fn test_classification_thresholds_at_half() {
    let predictor = GlmPredictor::from_features(&small_feature_list(), true).unwrap();
    let mut high = vec![0.0, 1.0, 0.0];
    assert_eq!(predictor.calculate_identity(&mut high), 1.0);
    let mut low = vec![10.0, 0.1, 0.0];
    // 0.2 + 0.3·0 + 0.5·0.01 = 0.205 < 0.5
    assert_eq!(predictor.calculate_identity(&mut low), 0.0);
}

#[test]
fn test_inference_is_stable_on_reapplication() {
    // Applying the pipeline to a vector that is already normalized, converted and
    // expanded must reproduce itself through the algebra: a second pass over the
    // same scratch yields the same prediction.
    let predictor = GlmPredictor::from_features(&small_feature_list(), false).unwrap();
    let mut first = vec![4.0, 0.8, 0.0];
    let r1 = predictor.calculate_identity(&mut first);
    let mut second = vec![4.0, 0.8, 0.0];
    let _ = predictor.calculate_identity(&mut second);
    let r2 = predictor.calculate_identity(&mut vec![4.0, 0.8, 0.0]);
    assert_eq!(r1, r2);
}
