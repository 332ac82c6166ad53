use nucleid_math::selection::{BestFirst, Goal, SearchModel};
use nucleid_math::transform::{FeatureExpander, Normalizer, SimConverter, Transformer};
use nucleid_math::{evaluator, Feature, FeatureKind, Glm, Matrix};

fn three_singles() -> Vec<Feature> {
    let mut features = vec![
        Feature::single(0, "manhattan", true),
        Feature::single(19, "intersection", false),
        Feature::single(24, "sim_ratio", false),
    ];
    for (i, f) in features.iter_mut().enumerate() {
        f.table_index = i;
    }
    features
}

#[test]
fn test_normalizer_bounds_and_clamp() {
    let m = Matrix::from_rows(vec![vec![0.0, 5.0], vec![10.0, 5.0], vec![20.0, 5.0]]).unwrap();
    let mut features = vec![
        Feature::single(0, "a", true),
        Feature::single(1, "b", true),
    ];
    features[1].table_index = 1;

    let normalizer = Normalizer::fit(&m, &features).unwrap();
    let t = normalizer.transform(&m).unwrap();
    assert_eq!(t[(0, 0)], 0.0);
    assert_eq!(t[(1, 0)], 0.5);
    assert_eq!(t[(2, 0)], 1.0);
    // Constant column collapses to zero.
    assert_eq!(t[(0, 1)], 0.0);

    // Values outside the fitted bounds are clamped at inference.
    let outside = Matrix::from_rows(vec![vec![-5.0, 5.0], vec![25.0, 5.0]]).unwrap();
    let t2 = normalizer.transform(&outside).unwrap();
    assert_eq!(t2[(0, 0)], 0.0);
    assert_eq!(t2[(1, 0)], 1.0);

    let updated = normalizer.feature_list();
    assert!(updated.iter().all(|f| f.is_normalized));
    assert_eq!(updated[0].norm_min, 0.0);
    assert_eq!(updated[0].norm_max, 20.0);
}

#[test]
fn test_sim_converter_is_idempotent_per_feature() {
    let m = Matrix::from_rows(vec![vec![0.2, 0.7]]).unwrap();
    let mut features = vec![
        Feature::single(0, "dist", true),
        Feature::single(19, "sim", false),
    ];
    features[1].table_index = 1;

    let converter = SimConverter::fit(&features);
    let t = converter.transform(&m).unwrap();
    assert!((t[(0, 0)] - 0.8).abs() < 1e-12);
    assert_eq!(t[(0, 1)], 0.7);

    // A second pass over the updated feature list must not convert again.
    let converted = converter.feature_list();
    let second = SimConverter::fit(&converted);
    let t2 = second.transform(&t).unwrap();
    assert!((t2[(0, 0)] - 0.8).abs() < 1e-12);
}

#[test]
fn test_expansion_order_and_composition() {
    let m = Matrix::from_rows(vec![vec![0.5, 0.25, 1.0]]).unwrap();
    let features = three_singles();
    let expander = FeatureExpander::fit(&m, &features).unwrap();
    let expanded = expander.feature_list();

    // singles ∥ squares ∥ pairs over (singles + squares)
    assert_eq!(expanded.len(), 3 + 3 + (6 * 5) / 2);
    assert!(expanded[..3]
        .iter()
        .all(|f| matches!(f.kind, FeatureKind::Single { .. })));
    assert!(expanded[3..6]
        .iter()
        .all(|f| matches!(f.kind, FeatureKind::Squared { .. })));
    assert!(expanded[6..]
        .iter()
        .all(|f| matches!(f.kind, FeatureKind::Paired { .. })));
    for (i, f) in expanded.iter().enumerate() {
        assert_eq!(f.table_index, i);
    }
    assert_eq!(expanded[3].name, "manhattan^2");
    assert_eq!(expanded[6].name, "manhattan x intersection");

    let t = expander.transform(&m).unwrap();
    // Squares of the singles.
    assert_eq!(t[(0, 3)], 0.25);
    assert_eq!(t[(0, 4)], 0.0625);
    // A pair of a square and a single composes on the expanded values.
    let pair_index = expanded
        .iter()
        .position(|f| f.name == "manhattan^2 x sim_ratio")
        .unwrap();
    assert_eq!(t[(0, pair_index)], 0.25 * 1.0);
}

#[test]
fn test_glm_recovers_linear_function() {
    // y = 0.25 + 0.5·x over a clean grid.
    let xs: Vec<f64> = (0..20).map(|i| i as f64 / 20.0).collect();
    let table = Matrix::from_rows(xs.iter().map(|&x| vec![x]).collect()).unwrap();
    let labels = Matrix::from_rows(xs.iter().map(|&x| vec![0.25 + 0.5 * x]).collect()).unwrap();

    let with_bias = table.append_ones_column();
    let glm = Glm::regressor(&with_bias, &labels).unwrap();
    assert!((glm.weights()[0] - 0.25).abs() < 1e-9);
    assert!((glm.weights()[1] - 0.5).abs() < 1e-9);

    let predicted = glm.transform(&with_bias).unwrap();
    assert!(evaluator::mse(&labels, &predicted).unwrap() < 1e-12);
}

#[test]
fn test_best_first_finds_linear_signal() {
    // Column 1 carries the label exactly; columns 0 and 2 are noise.
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    let mut x = 0.137f64;
    for i in 0..60 {
        x = (x * 997.0 + 0.123).fract();
        let informative = i as f64 / 60.0;
        rows.push(vec![x, informative, (x * 31.0).fract()]);
        labels.push(vec![0.8 * informative + 0.1]);
    }
    let table = Matrix::from_rows(rows).unwrap();
    let labels = Matrix::from_rows(labels).unwrap();
    let features = three_singles();

    let model = SearchModel {
        fit: &Glm::regressor,
        evaluate: &evaluator::mse,
        goal: Goal::Minimize { margin: 0.000025 },
    };
    let search = BestFirst::search(&table, &labels, &features, &model, 1, 2).unwrap();

    assert!(!search.best().list().is_empty());
    assert!(search.best().list().contains(&1));

    let selected = search.transform(&table).unwrap();
    let glm = Glm::regressor(&selected, &labels).unwrap();
    let mse = evaluator::mse(&labels, &glm.transform(&selected).unwrap()).unwrap();
    assert!(mse < 1e-6);
}

#[test]
fn test_selected_features_mark_components_needed() {
    let m = Matrix::from_rows(vec![vec![0.5, 0.25, 1.0], vec![0.1, 0.9, 0.3]]).unwrap();
    let expander = FeatureExpander::fit(&m, &three_singles()).unwrap();
    let expanded = expander.feature_list();

    // Select one pair over a square and a single by hand.
    let pair_index = expanded
        .iter()
        .position(|f| f.name == "manhattan^2 x sim_ratio")
        .unwrap();
    let search = BestFirst::from_selected(&{
        let mut fs = expanded.clone();
        nucleid_math::mark_selected(&mut fs, pair_index);
        // from_selected reads is_selected flags only; keep them.
        fs
    })
    .unwrap();
    let kept = search.feature_list();

    // The pair, its square component and the square's single must survive.
    let names: Vec<&str> = kept.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"manhattan^2 x sim_ratio"));
    assert!(names.contains(&"manhattan^2"));
    assert!(names.contains(&"manhattan"));
    assert!(names.contains(&"sim_ratio"));
    // Component references were remapped onto the compact list.
    for f in &kept {
        match f.kind {
            FeatureKind::Single { .. } => {}
            FeatureKind::Squared { component } => assert!(component < kept.len()),
            FeatureKind::Paired { first, second } => {
                assert!(first < kept.len());
                assert!(second < kept.len());
            }
        }
    }
}
