use std::io::Write as _;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use nucleid_identity::calculator::IdentityCalculator;
use nucleid_identity::config::TrainingConfig;
use nucleid_identity::generator::SyntheticDataGenerator;
use nucleid_identity::model_io::ModelFile;
use nucleid_identity::statistics::STAT_COUNT;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

fn random_sequence(rng: &mut SmallRng, length: usize) -> String {
    (0..length)
        .map(|_| BASES[rng.gen_range(0..4)] as char)
        .collect()
}

/// Six random templates around 200 bases, written as a FASTA fixture.
fn write_training_fasta() -> (tempfile::TempDir, std::path::PathBuf) {
    let mut rng = SmallRng::seed_from_u64(1234);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.fa");
    let mut file = std::fs::File::create(&path).unwrap();
    for i in 0..6 {
        let length = 180 + 8 * i;
        writeln!(file, ">template-{}", i).unwrap();
        writeln!(file, "{}", random_sequence(&mut rng, length)).unwrap();
    }
    (dir, path)
}

fn small_config() -> TrainingConfig {
    // Keep the per-template copy count at its base value for test speed.
    TrainingConfig {
        block_size: 6,
        ..TrainingConfig::default()
    }
}

#[test]
fn test_generator_shapes_and_k() {
    let (_dir, path) = write_training_fasta();
    let generator =
        SyntheticDataGenerator::from_file(&path, 0.0, 2, small_config()).unwrap();

    // Mean length ≈ 200 ⇒ k = ceil(log4(200)) − 1 = 3.
    assert_eq!(generator.k(), 3);
    assert_eq!(generator.hist_size(), 64);

    let features = generator.features().unwrap();
    let labels = generator.labels().unwrap();
    // Ten mutated copies per template (positives only at threshold zero).
    assert_eq!(features.rows(), 60);
    assert_eq!(features.cols(), STAT_COUNT);
    assert_eq!(labels.rows(), 60);
    for r in 0..labels.rows() {
        let id = labels[(r, 0)];
        assert!((0.0..=1.0).contains(&id), "label {} out of range", id);
    }
    let total: f64 = generator.composition().iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn test_trained_calculator_scores_are_sane() {
    let (_dir, path) = write_training_fasta();
    let mut generator =
        SyntheticDataGenerator::from_file(&path, 0.0, 2, small_config()).unwrap();
    let calculator: IdentityCalculator<i16> =
        IdentityCalculator::from_generator(&mut generator, 2, 0.0, false, false, None).unwrap();

    // Training tables are released once the predictor exists.
    assert!(generator.features().is_none());

    let mut reader = nucleid_seq::sequence::FastaBlockReader::open(&path, 100).unwrap();
    let block = reader.read_block().unwrap();
    let data = calculator.unpack_block(block, 2).unwrap();

    // A sequence against itself scores at the very top of the range.
    for i in 0..data.len() {
        let score = calculator
            .score_pair(
                &data.k_hists[i],
                &data.k_hists[i],
                &data.mono_hists[i],
                &data.mono_hists[i],
                1.0,
                data.lengths[i],
                data.lengths[i],
            )
            .unwrap();
        assert!(score > 0.9, "self score {} too low", score);
        assert!(score <= 1.0);
    }

    // Identity can never exceed the length ratio.
    for i in 0..data.len() {
        for j in i + 1..data.len() {
            let ratio = IdentityCalculator::<i16>::ratio(data.lengths[i], data.lengths[j]);
            let score = calculator
                .score_pair(
                    &data.k_hists[i],
                    &data.k_hists[j],
                    &data.mono_hists[i],
                    &data.mono_hists[j],
                    ratio,
                    data.lengths[i],
                    data.lengths[j],
                )
                .unwrap();
            assert!((0.0..=1.0).contains(&score));
            assert!(score <= ratio + 1e-12);
        }
    }
}

#[test]
fn test_length_bound_skips_disparate_pair() {
    let (_dir, path) = write_training_fasta();
    let mut generator =
        SyntheticDataGenerator::from_file(&path, 0.8, 2, small_config()).unwrap();
    let calculator: IdentityCalculator<i16> =
        IdentityCalculator::from_generator(&mut generator, 2, 0.8, true, false, None).unwrap();

    // Lengths 100 and 1000 bound identity at 0.1, far below the 0.8 threshold.
    let short = vec![1i16; calculator.k_hist_size()];
    let mono = vec![25u64; 4];
    let score = calculator
        .score_pair(&short, &short, &mono, &mono, 0.1, 100, 1000)
        .unwrap();
    assert_eq!(score, 0.0);
}

#[test]
fn test_exact_mode_compares_histograms() {
    let (_dir, path) = write_training_fasta();
    let mut generator =
        SyntheticDataGenerator::from_file(&path, 0.0, 2, small_config()).unwrap();
    let mut calculator: IdentityCalculator<i16> =
        IdentityCalculator::from_generator(&mut generator, 2, 0.0, false, false, None).unwrap();
    calculator.set_exact_only(true);

    let mut reader = nucleid_seq::sequence::FastaBlockReader::open(&path, 100).unwrap();
    let block = reader.read_block().unwrap();
    let data = calculator.unpack_block(block, 2).unwrap();

    let same = calculator
        .score_pair(
            &data.k_hists[0],
            &data.k_hists[0],
            &data.mono_hists[0],
            &data.mono_hists[0],
            1.0,
            data.lengths[0],
            data.lengths[0],
        )
        .unwrap();
    assert_eq!(same, 1.0);

    let different = calculator
        .score_pair(
            &data.k_hists[0],
            &data.k_hists[1],
            &data.mono_hists[0],
            &data.mono_hists[1],
            1.0,
            data.lengths[0],
            data.lengths[1],
        )
        .unwrap();
    assert_eq!(different, 0.0);
}

#[test]
fn test_saved_model_reproduces_scores() {
    let (_dir, path) = write_training_fasta();
    let model_dir = tempfile::tempdir().unwrap();
    let model_path = model_dir.path().join("identity.model");

    let mut generator =
        SyntheticDataGenerator::from_file(&path, 0.0, 2, small_config()).unwrap();
    let trained: IdentityCalculator<i16> = IdentityCalculator::from_generator(
        &mut generator,
        2,
        0.0,
        false,
        false,
        Some(&model_path),
    )
    .unwrap();

    let model = ModelFile::read(&model_path).unwrap();
    assert_eq!(model.k, trained.k());
    let loaded: IdentityCalculator<i16> =
        IdentityCalculator::from_model(&model, 0.0, false, false).unwrap();

    let mut reader = nucleid_seq::sequence::FastaBlockReader::open(&path, 100).unwrap();
    let block = reader.read_block().unwrap();
    let data = trained.unpack_block(block, 2).unwrap();

    for i in 0..data.len() {
        for j in i + 1..data.len() {
            let ratio = IdentityCalculator::<i16>::ratio(data.lengths[i], data.lengths[j]);
            let args = (
                &data.k_hists[i],
                &data.k_hists[j],
                &data.mono_hists[i],
                &data.mono_hists[j],
            );
            let a = trained
                .score_pair(args.0, args.1, args.2, args.3, ratio, data.lengths[i], data.lengths[j])
                .unwrap();
            let b = loaded
                .score_pair(args.0, args.1, args.2, args.3, ratio, data.lengths[i], data.lengths[j])
                .unwrap();
            assert!((a - b).abs() < 1e-12, "trained {} vs loaded {}", a, b);
        }
    }
}
