use std::io::Write as _;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use nucleid_identity::config::TrainingConfig;
use nucleid_identity::runner::{PairwiseRunner, TrainingMode};

fn small_runner(threshold: f64) -> PairwiseRunner {
    let training = TrainingConfig {
        block_size: 6,
        ..TrainingConfig::default()
    };
    PairwiseRunner::new(2, 3, TrainingMode::Regression, threshold, true).with_training(training)
}

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

fn write_fixture(count: usize) -> (tempfile::TempDir, std::path::PathBuf) {
    let mut rng = SmallRng::seed_from_u64(77);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.fa");
    let mut file = std::fs::File::create(&path).unwrap();
    for i in 0..count {
        let body: String = (0..200).map(|_| BASES[rng.gen_range(0..4)] as char).collect();
        writeln!(file, ">seq-{}\n{}", i, body).unwrap();
    }
    (dir, path)
}

#[test]
fn test_all_vs_all_reports_every_pair_once_at_zero_threshold() {
    let (_dir, path) = write_fixture(6);
    let out_dir = tempfile::tempdir().unwrap();
    let out_path = out_dir.path().join("scores.txt");

    let runner = small_runner(0.0);
    runner
        .align_all_vs_all(&path, &out_path, None, None)
        .unwrap();

    let output = std::fs::read_to_string(&out_path).unwrap();
    let mut pairs: Vec<(String, String)> = Vec::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 3);
        let score: f64 = fields[2].parse().unwrap();
        assert!((0.0..=1.0).contains(&score));
        pairs.push((fields[0].to_owned(), fields[1].to_owned()));
    }

    // Every unordered pair of the six sequences, each exactly once.
    assert_eq!(pairs.len(), 15);
    let mut unordered: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
        .collect();
    unordered.sort();
    unordered.dedup();
    assert_eq!(unordered.len(), 15);
}

#[test]
fn test_query_vs_db_scores_each_query_against_everything() {
    let (_dir, db_path) = write_fixture(5);
    let query_dir = tempfile::tempdir().unwrap();
    let query_path = query_dir.path().join("query.fa");
    // The query is the first database record under a new name.
    let db_text = std::fs::read_to_string(&db_path).unwrap();
    let first_record: String = db_text.lines().take(2).collect::<Vec<_>>().join("\n");
    std::fs::write(&query_path, first_record.replace(">seq-0", ">probe") + "\n").unwrap();

    let out_dir = tempfile::tempdir().unwrap();
    let out_path = out_dir.path().join("scores.txt");
    let runner = small_runner(0.0);
    runner
        .align_query_vs_db(&db_path, &query_path, &out_path, None, None)
        .unwrap();

    let output = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 5);

    // The probe is identical to seq-0, so that record scores at the top.
    let best = lines
        .iter()
        .map(|l| l.split('\t').collect::<Vec<_>>())
        .max_by(|a, b| {
            a[2].parse::<f64>()
                .unwrap()
                .total_cmp(&b[2].parse::<f64>().unwrap())
        })
        .unwrap();
    assert_eq!(best[0], "probe");
    assert_eq!(best[1], "seq-0");
    assert!(best[2].parse::<f64>().unwrap() > 0.9);
}

#[test]
fn test_model_save_and_load_round_trip() {
    let (_dir, path) = write_fixture(6);
    let out_dir = tempfile::tempdir().unwrap();
    let model_path = out_dir.path().join("pairs.model");
    let out_a = out_dir.path().join("scores_a.txt");
    let out_b = out_dir.path().join("scores_b.txt");

    let runner = small_runner(0.0);
    runner
        .align_all_vs_all(&path, &out_a, Some(&model_path), None)
        .unwrap();
    runner
        .align_all_vs_all(&path, &out_b, None, Some(&model_path))
        .unwrap();

    let a = std::fs::read_to_string(&out_a).unwrap();
    let b = std::fs::read_to_string(&out_b).unwrap();
    assert_eq!(a, b);
}
