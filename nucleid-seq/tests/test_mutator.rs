use nucleid_seq::mutate::{Mutation, Mutator};
use nucleid_seq::SequenceError;

#[test]
fn test_mismatch_only_on_constant_template() {
    // A 1000-base template of A at a 1% rate: exactly 10 positions are planned,
    // each either flipped to another base or redrawn as A.
    let template = vec![b'A'; 1000];
    let mut mutator = Mutator::new(&template, 5, 42, 2).unwrap();
    mutator.enable(Mutation::Mismatch);
    let (mutated, identity) = mutator.mutate(0.01).unwrap();

    assert_eq!(mutated.len(), 1000);
    let differing = mutated.iter().filter(|&&c| c != b'A').count();
    assert!(differing <= 10);
    assert!(identity >= 0.99);
    assert!((identity - (1.0 - differing as f64 / 1000.0)).abs() < 1e-12);
}

#[test]
fn test_same_seed_same_output() {
    let template = b"ACGTACGGTCAGTACCAGGTACCATGGAACCTTAGGCCTTAA".to_vec();
    let run = |seed: u64| {
        let mut mutator = Mutator::new(&template, 5, seed, 2).unwrap();
        mutator.enable_single_point();
        mutator.enable_block();
        mutator.mutate(0.2).unwrap()
    };
    let (seq_a, id_a) = run(7);
    let (seq_b, id_b) = run(7);
    let (seq_c, _) = run(8);
    assert_eq!(seq_a, seq_b);
    assert_eq!(id_a, id_b);
    assert_ne!(seq_a, seq_c);
}

#[test]
fn test_identity_tracks_requested_rate() {
    let template: Vec<u8> = (0..2000)
        .map(|i| [b'A', b'C', b'G', b'T'][(i * 7 + i / 3) % 4])
        .collect();
    for rate in [0.05, 0.1, 0.2, 0.3] {
        let mut mutator = Mutator::new(&template, 5, 11, 2).unwrap();
        mutator.enable_single_point();
        mutator.enable_block();
        let (_, identity) = mutator.mutate(rate).unwrap();
        // One position of drift per planned mutation in the worst case.
        assert!(
            (identity - (1.0 - rate)).abs() <= rate + 0.02,
            "rate {} produced identity {}",
            rate,
            identity
        );
    }
}

#[test]
fn test_zero_rate_returns_template() {
    let template = b"ACGTACGT".to_vec();
    let mut mutator = Mutator::new(&template, 5, 3, 2).unwrap();
    mutator.enable_single_point();
    let (mutated, identity) = mutator.mutate(0.0).unwrap();
    assert_eq!(mutated, template);
    assert_eq!(identity, 1.0);
}

#[test]
fn test_translocation_requires_block_deletion() {
    let template = vec![b'G'; 400];
    let mut mutator = Mutator::new(&template, 5, 9, 2).unwrap();
    mutator.enable_translocation();
    // Must not loop forever: the first draws fall back to block deletion.
    let (_, identity) = mutator.mutate(0.1).unwrap();
    assert!((0.0..=1.0).contains(&identity));
}

#[test]
fn test_rejects_bad_configuration() {
    let template = b"ACGT".to_vec();
    assert!(matches!(
        Mutator::new(&template, 1, 0, 2),
        Err(SequenceError::InvalidBlockBounds { .. })
    ));
    let mut mutator = Mutator::new(&template, 5, 0, 2).unwrap();
    assert!(matches!(
        mutator.mutate(0.5),
        Err(SequenceError::NoMutationsEnabled)
    ));
    mutator.enable_single_point();
    assert!(matches!(
        mutator.mutate(1.5),
        Err(SequenceError::InvalidMutationRate { .. })
    ));
}
