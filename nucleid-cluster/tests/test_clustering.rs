use std::io::Write as _;

use nucleid_cluster::config::ClusterConfig;
use nucleid_cluster::mean_shift::MeanShift;
use nucleid_cluster::mean_shift_large::MeanShiftLarge;
use nucleid_identity::calculator::IdentityCalculator;
use nucleid_identity::config::TrainingConfig;
use nucleid_identity::generator::SyntheticDataGenerator;
use nucleid_seq::sequence::FastaBlockReader;

/// Two well-separated families of near-identical sequences plus the templates
/// themselves; identity within a family is high, across families low.
fn family_fasta() -> (tempfile::TempDir, std::path::PathBuf) {
    let template_a = "ATGGCGTACGTTAGCGGATTACGCTAGCATGCGATCAGGCTACGATTACGCGATCGGTACCATGGCGTAC\
                      GTTAGCGGATTACGCTAGCATGCGATCAGGCTACGATTACGCGATCGGTACC";
    let template_b = "TTTTAAAACCCCGGGGTTTTAAAACCCCGGGGTTAACCGGTTAACCGGTTTTAAAACCCCGGGGTTTTAA\
                      AACCCCGGGGTTAACCGGTTAACCGGTTTTAAAACCCCGGGGTTTTAAAACC";

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("families.fa");
    let mut file = std::fs::File::create(&path).unwrap();
    // Family A: the template and copies with single-base edits.
    writeln!(file, ">a-0\n{}", template_a).unwrap();
    for i in 1..5 {
        let mut copy: Vec<char> = template_a.chars().collect();
        copy[7 * i] = 'A';
        copy[11 * i] = 'T';
        let copy: String = copy.into_iter().collect();
        writeln!(file, ">a-{}\n{}", i, copy).unwrap();
    }
    // Family B likewise.
    writeln!(file, ">b-0\n{}", template_b).unwrap();
    for i in 1..5 {
        let mut copy: Vec<char> = template_b.chars().collect();
        copy[5 * i] = 'G';
        copy[13 * i] = 'C';
        let copy: String = copy.into_iter().collect();
        writeln!(file, ">b-{}\n{}", i, copy).unwrap();
    }
    (dir, path)
}

fn small_training() -> TrainingConfig {
    TrainingConfig {
        block_size: 10,
        ..TrainingConfig::default()
    }
}

fn trained_calculator(
    path: &std::path::Path,
    threshold: f64,
) -> IdentityCalculator<i16> {
    let mut generator =
        SyntheticDataGenerator::from_file(path, threshold, 2, small_training()).unwrap();
    IdentityCalculator::from_generator(&mut generator, 2, threshold, true, true, None).unwrap()
}

#[test]
fn test_mean_shift_separates_families() {
    let (_dir, path) = family_fasta();
    let calculator = trained_calculator(&path, 0.8);

    let mut reader = FastaBlockReader::open(&path, 100).unwrap();
    let block = reader.read_block().unwrap();
    let ms = MeanShift::cluster_block(block, &calculator, 2, 0.8, 100).unwrap();

    // The two families cannot merge: their identity is far below the threshold.
    // Block order puts family A at indices 0..5 and family B at 5..10.
    assert!(ms.cluster_count() >= 2);
    for cluster in ms.clusters() {
        assert!(cluster.assignment() > 0);
        let in_a = cluster.members().iter().filter(|&&m| m < 5).count();
        let in_b = cluster.members().len() - in_a;
        assert!(
            in_a == 0 || in_b == 0,
            "a cluster mixes both families: {:?}",
            cluster.members()
        );
    }
}

#[test]
fn test_merge_preserves_member_union() {
    let (_dir, path) = family_fasta();
    let calculator = trained_calculator(&path, 0.8);

    let mut reader = FastaBlockReader::open(&path, 100).unwrap();
    let block = reader.read_block().unwrap();
    let block_len = block.len();
    let ms = MeanShift::cluster_block(block, &calculator, 2, 0.8, 100).unwrap();

    // Every in-block member index is valid and appears in exactly one cluster's list.
    let mut seen = vec![0usize; block_len];
    for cluster in ms.clusters() {
        for &member in cluster.members() {
            assert!(member < block_len);
            seen[member] += 1;
        }
    }
    assert!(seen.iter().all(|&n| n <= 1));
}

#[test]
fn test_streaming_driver_writes_clusters() {
    let (_dir, path) = family_fasta();
    let out_dir = tempfile::tempdir().unwrap();
    let out_path = out_dir.path().join("clusters.txt");

    let calculator = trained_calculator(&path, 0.8);
    let config = ClusterConfig {
        block_size: 1000,
        v_block_size: 1000,
        pass_num: 2,
        thread_num: 2,
        ..ClusterConfig::default()
    };
    let mut driver = MeanShiftLarge::new(&path, &calculator, 0.8, &config);
    driver.run(&out_path).unwrap();

    let output = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    // Every input sequence appears exactly once.
    assert_eq!(lines.len(), 10);

    let mut ids: Vec<usize> = Vec::new();
    let mut centers = 0;
    for line in &lines {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 4);
        let id: usize = fields[0].parse().unwrap();
        ids.push(id);
        assert!(fields[2].parse::<f64>().unwrap() <= 1.0);
        if fields[3] == "C" {
            centers += 1;
        } else {
            assert!(matches!(fields[3], "M" | "E" | "O"));
        }
    }

    // Identifiers are 1-based, dense and contiguous; one center per cluster.
    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.first(), Some(&1));
    assert_eq!(*unique.last().unwrap(), unique.len());
    assert_eq!(centers, unique.len());

    // The two families never share a cluster.
    for line in &lines {
        let fields: Vec<&str> = line.split('\t').collect();
        let id = fields[0];
        let family = &fields[1][..1];
        for other in &lines {
            let other_fields: Vec<&str> = other.split('\t').collect();
            if other_fields[0] == id {
                assert_eq!(&other_fields[1][..1], family);
            }
        }
    }
}

#[test]
fn test_assign_all_gives_every_sequence_a_cluster() {
    let (_dir, path) = family_fasta();
    let out_dir = tempfile::tempdir().unwrap();
    let out_path = out_dir.path().join("clusters.txt");

    let calculator = trained_calculator(&path, 0.8);
    let config = ClusterConfig {
        block_size: 1000,
        v_block_size: 1000,
        pass_num: 2,
        thread_num: 2,
        assign_all: true,
        ..ClusterConfig::default()
    };
    let mut driver = MeanShiftLarge::new(&path, &calculator, 0.8, &config);
    driver.run(&out_path).unwrap();

    let output = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(output.lines().count(), 10);
}
