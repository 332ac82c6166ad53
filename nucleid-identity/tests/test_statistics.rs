use nucleid_identity::statistics::{Stat, Statistician, DISTANCE_COUNT, STAT_COUNT};
use nucleid_identity::IdentityError;
use nucleid_seq::kmer::{build_monomers, KmerHistogram};
use nucleid_seq::sequence::Sequence;

const UNIFORM: [f64; 4] = [0.25, 0.25, 0.25, 0.25];

fn dimers(seq: &str) -> (Vec<i32>, Vec<u64>) {
    let table = KmerHistogram::<i32>::new(2).unwrap();
    let sequence = Sequence::from_str("s", seq);
    (
        table.build(&sequence).unwrap(),
        build_monomers(&sequence).unwrap(),
    )
}

fn statistician<'a>(
    h1: &'a [i32],
    h2: &'a [i32],
    m1: &'a [u64],
    m2: &'a [u64],
    keys: &'a [u8],
) -> Statistician<'a, i32> {
    Statistician::new(16, 2, h1, h2, m1, m2, &UNIFORM, keys).unwrap()
}

#[test]
fn test_elementary_distances() {
    let keys = KmerHistogram::<i32>::new(2).unwrap().keys_digit_format();
    let (h1, m1) = dimers("AACC");
    let (h2, m2) = dimers("AACG");
    let s = statistician(&h1, &h2, &m1, &m2, &keys);

    // AACC holds AA, AC, CC and AACG holds AA, AC, CG: one cell lost, one gained.
    assert_eq!(s.value(Stat::Manhattan).unwrap(), 2.0);
    assert!((s.value(Stat::Euclidean).unwrap() - 2.0f64.sqrt()).abs() < 1e-12);
    assert_eq!(s.value(Stat::Chebyshev).unwrap(), 1.0);
    assert_eq!(s.value(Stat::Hamming).unwrap(), 2.0 / 16.0);
}

#[test]
fn test_identical_pair_has_zero_distances() {
    let keys = KmerHistogram::<i32>::new(2).unwrap().keys_digit_format();
    let (h1, m1) = dimers("ACGTACGTAAGG");
    let (h2, m2) = dimers("ACGTACGTAAGG");
    let s = statistician(&h1, &h2, &m1, &m2, &keys);

    for stat in [
        Stat::Manhattan,
        Stat::Euclidean,
        Stat::ChiSquared,
        Stat::Chebyshev,
        Stat::Hamming,
        Stat::Minkowski,
        Stat::Emd,
        Stat::JeffreyDivergence,
        Stat::JensenShannonDivergence,
        Stat::KDivergence,
    ] {
        let value = s.value(stat).unwrap();
        assert!(
            value.abs() < 1e-9,
            "{:?} on an identical pair gave {}",
            stat,
            value
        );
    }
    assert_eq!(s.value(Stat::LengthRatio).unwrap(), 1.0);
}

#[test]
fn test_length_ratio_uses_effective_length() {
    let keys = KmerHistogram::<i32>::new(2).unwrap().keys_digit_format();
    let (h1, m1) = dimers("ACGTACGTAC");
    let (h2, m2) = dimers("ACGTA");
    let s = statistician(&h1, &h2, &m1, &m2, &keys);
    // Sum of dimer counts plus k − 1 recovers the sequence lengths.
    assert!((s.value(Stat::LengthRatio).unwrap() - 0.5).abs() < 1e-12);
}

#[test]
fn test_identity_minimum() {
    assert_eq!(Statistician::<i32>::identity_minimum(100, 1000), 0.1);
    assert_eq!(Statistician::<i32>::identity_minimum(1000, 100), 0.1);
    assert_eq!(Statistician::<i32>::identity_minimum(5, 5), 1.0);
}

#[test]
fn test_unknown_statistic_indices_fail() {
    let keys = KmerHistogram::<i32>::new(2).unwrap().keys_digit_format();
    let (h1, m1) = dimers("ACGTACGT");
    let (h2, m2) = dimers("ACGGACGT");
    let s = statistician(&h1, &h2, &m1, &m2, &keys);

    for bad in [DISTANCE_COUNT, 30, 99] {
        let mut out = Vec::new();
        assert!(matches!(
            s.calculate(&[bad], &mut out),
            Err(IdentityError::UnknownStatistic { .. })
        ));
    }
}

#[test]
fn test_calculate_all_covers_the_bank() {
    let keys = KmerHistogram::<i32>::new(2).unwrap().keys_digit_format();
    let (h1, m1) = dimers("ACGTACGTTTGACCA");
    let (h2, m2) = dimers("ACGTACGGTTGACGA");
    let s = statistician(&h1, &h2, &m1, &m2, &keys);

    let mut out = Vec::new();
    s.calculate_all(&mut out).unwrap();
    assert_eq!(out.len(), STAT_COUNT);
    assert!(out.iter().all(|v| v.is_finite()));
}

#[test]
fn test_selected_subset_keeps_order() {
    let keys = KmerHistogram::<i32>::new(2).unwrap().keys_digit_format();
    let (h1, m1) = dimers("ACGTACGTTTGACCA");
    let (h2, m2) = dimers("ACGTACGGTTGACGA");
    let s = statistician(&h1, &h2, &m1, &m2, &keys);

    let subset = [
        Stat::LengthRatio.index(),
        Stat::Manhattan.index(),
        Stat::SimRatio.index(),
    ];
    let mut out = Vec::new();
    s.calculate(&subset, &mut out).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], s.value(Stat::LengthRatio).unwrap());
    assert_eq!(out[1], s.value(Stat::Manhattan).unwrap());
    assert_eq!(out[2], s.value(Stat::SimRatio).unwrap());
}

#[test]
fn test_stat_indices_match_the_contract() {
    assert_eq!(Stat::Manhattan.index(), 0);
    assert_eq!(Stat::Rre.index(), 17);
    assert_eq!(Stat::Intersection.index(), 19);
    assert_eq!(Stat::D2Star.index(), 29);
    assert_eq!(Stat::from_index(27).unwrap(), Stat::LengthRatio);
    assert!(Stat::from_index(18).is_err());
    assert!(Stat::from_index(-1).is_err());
}
