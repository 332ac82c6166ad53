use nucleid_identity::model_io::ModelFile;
use nucleid_identity::IdentityError;
use nucleid_math::{Feature, FeatureKind};

/// A compact list the trainer could have produced: bias, two singles, a square of the
/// first single and a pair of that square with the second single.
fn example_features() -> Vec<Feature> {
    let mut bias = Feature::bias();
    bias.weight = 0.1234567890123456;

    let mut manhattan = Feature::single(0, "manhattan", true);
    manhattan.is_normalized = true;
    manhattan.is_converted = true;
    manhattan.norm_min = 2.0;
    manhattan.norm_max = 310.5;
    manhattan.is_needed = true;

    let mut sim_ratio = Feature::single(24, "sim_ratio", false);
    sim_ratio.is_normalized = true;
    sim_ratio.norm_min = 0.01;
    sim_ratio.norm_max = 0.98;
    sim_ratio.is_selected = true;
    sim_ratio.weight = -0.75;

    let mut squared = Feature::squared(&manhattan);
    squared.kind = FeatureKind::Squared { component: 0 };
    squared.is_normalized = true;
    squared.norm_min = 0.0;
    squared.norm_max = 1.0;
    squared.is_needed = true;

    let mut paired = Feature::paired(&squared, &sim_ratio);
    paired.kind = FeatureKind::Paired { first: 2, second: 1 };
    paired.is_normalized = true;
    paired.norm_min = 0.0;
    paired.norm_max = 0.9;
    paired.is_selected = true;
    paired.weight = 1.5;

    let mut features = vec![bias, manhattan, sim_ratio, squared, paired];
    for (i, f) in features.iter_mut().enumerate() {
        f.table_index = i;
    }
    features
}

fn example_model() -> ModelFile {
    ModelFile {
        k: 3,
        hist_size: 64,
        abs_error: 0.03125,
        max_length: 4096,
        composition: [0.2, 0.3, 0.25, 0.25],
        features: example_features(),
    }
}

#[test]
fn test_round_trip_is_byte_equal() {
    let model = example_model();
    let text = model.to_text();
    let read_back = ModelFile::from_text(&text).unwrap();
    assert_eq!(read_back.to_text(), text);
}

#[test]
fn test_round_trip_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.model");
    let model = example_model();
    model.write(&path).unwrap();

    let read_back = ModelFile::read(&path).unwrap();
    assert_eq!(read_back.k, 3);
    assert_eq!(read_back.hist_size, 64);
    assert_eq!(read_back.abs_error, 0.03125);
    assert_eq!(read_back.max_length, 4096);
    assert_eq!(read_back.composition, [0.2, 0.3, 0.25, 0.25]);
    assert_eq!(read_back.features.len(), 5);
}

#[test]
fn test_names_and_links_survive() {
    let text = example_model().to_text();
    // Paired names use the colon form on disk.
    assert!(text.contains("manhattan^2:x:sim_ratio"));

    let read_back = ModelFile::from_text(&text).unwrap();
    let paired = &read_back.features[4];
    assert_eq!(paired.name, "manhattan^2 x sim_ratio");
    assert_eq!(
        paired.kind,
        FeatureKind::Paired { first: 2, second: 1 }
    );
    let squared = &read_back.features[3];
    assert_eq!(squared.kind, FeatureKind::Squared { component: 0 });
    assert!(read_back.features[1].is_needed);
    assert!(read_back.features[2].is_selected);
    assert_eq!(read_back.features[2].weight, -0.75);
}

#[test]
fn test_missing_component_is_unknown_feature() {
    let model = example_model();
    let mut text = String::new();
    for (i, line) in model.to_text().lines().enumerate() {
        // Drop the manhattan single; its square then dangles.
        if i != 6 {
            text.push_str(line);
            text.push('\n');
        }
    }
    match ModelFile::from_text(&text) {
        Err(IdentityError::UnknownFeature { name }) => assert_eq!(name, "manhattan"),
        other => panic!("expected UnknownFeature, got {:?}", other.map(|m| m.features.len())),
    }
}

#[test]
fn test_bad_function_index_is_unknown_statistic() {
    let text = example_model()
        .to_text()
        .replace("0\t24\tsim_ratio", "0\t18\tsim_ratio");
    assert!(matches!(
        ModelFile::from_text(&text),
        Err(IdentityError::UnknownStatistic { index: 18 })
    ));
}
