use nucleid_seq::kmer::{build_monomers, block_composition, HistWidth, KmerHistogram};
use nucleid_seq::sequence::Sequence;
use nucleid_seq::SequenceError;

#[test]
fn test_dimer_histogram_of_acgt() {
    let table = KmerHistogram::<i8>::new(2).unwrap();
    let seq = Sequence::from_str("s", "ACGT");
    let hist = table.build(&seq).unwrap();
    assert_eq!(hist.len(), 16);

    let expected = [("AC", 1i8), ("CG", 1), ("GT", 1)];
    for (word, count) in expected {
        assert_eq!(hist[table.hash(word.as_bytes(), 0) as usize], count);
    }
    assert_eq!(hist.iter().filter(|&&c| c == 0).count(), 13);
}

#[test]
fn test_histogram_total_matches_segment_windows() {
    // Sum over cells must equal sum over segments of max(0, len - k + 1).
    let table = KmerHistogram::<i32>::new(3).unwrap();
    let seq = Sequence::from_str("s", "ACGTACNNGTNACGTT");
    let hist = table.build(&seq).unwrap();
    let total: i64 = hist.iter().map(|&c| c as i64).sum();
    let expected: i64 = seq
        .valid_segments()
        .iter()
        .map(|&(s, e)| ((e - s + 1) as i64 - 2).max(0))
        .sum();
    assert_eq!(total, expected);
}

#[test]
fn test_short_segments_contribute_nothing() {
    let table = KmerHistogram::<i16>::new(4).unwrap();
    let seq = Sequence::from_str("s", "ACGNNTGC");
    let hist = table.build(&seq).unwrap();
    assert!(hist.iter().all(|&c| c == 0));
}

#[test]
fn test_empty_input_is_fatal() {
    let table = KmerHistogram::<i16>::new(2).unwrap();
    let seq = Sequence::from_str("only-n", "NNNN");
    assert!(matches!(
        table.build(&seq),
        Err(SequenceError::EmptyInput { .. })
    ));
}

#[test]
fn test_hash_round_trip() {
    for k in [1usize, 2, 5, 9, 15] {
        let table = KmerHistogram::<i64>::new(k).unwrap();
        let word: String = "ACGTGGCATCAGTTA".chars().take(k).collect();
        let h = table.hash(word.as_bytes(), 0);
        assert_eq!(table.decode(h), word, "k = {}", k);
    }
}

#[test]
fn test_rolling_hash_equals_direct_hash() {
    let table = KmerHistogram::<i32>::new(4).unwrap();
    let seq = Sequence::from_str("s", "ACGTACGGTCAGTACCA");
    let hist = table.build(&seq).unwrap();
    // Recount directly from every window.
    let mut direct = vec![0i32; table.size()];
    let bytes = seq.seq();
    for start in 0..=bytes.len() - 4 {
        direct[table.hash(bytes, start) as usize] += 1;
    }
    assert_eq!(hist, direct);
}

#[test]
fn test_monomers_in_digit_order() {
    let seq = Sequence::from_str("s", "CCTTTAAAAGGGGG");
    let mono = build_monomers(&seq).unwrap();
    assert_eq!(mono, vec![2, 3, 4, 5]);
}

#[test]
fn test_block_composition_sums_to_one() {
    let block = vec![
        Sequence::from_str("a", "ACGT"),
        Sequence::from_str("b", "GGGGN"),
    ];
    let composition = block_composition(&block);
    let total: f64 = composition.iter().sum();
    assert!((total - 1.0).abs() < 1e-12);
    // 5 of 8 valid bases are G; G has digit 3.
    assert!((composition[3] - 5.0 / 8.0).abs() < 1e-12);
}

#[test]
fn test_width_selection() {
    assert_eq!(HistWidth::for_max_length(127), HistWidth::B8);
    assert_eq!(HistWidth::for_max_length(128), HistWidth::B16);
    assert_eq!(HistWidth::for_max_length(32_768), HistWidth::B32);
    assert_eq!(HistWidth::for_max_length(3_000_000_000), HistWidth::B64);
}

#[test]
fn test_overflow_is_reported() {
    // 200 A's make 199 AA dimers, above the i8 ceiling of 127.
    let table = KmerHistogram::<i8>::new(2).unwrap();
    let seq = Sequence::from_attrs(String::from("long-a"), vec![b'A'; 200]);
    assert!(matches!(
        table.build(&seq),
        Err(SequenceError::HistogramOverflow { width: 8 })
    ));
}
