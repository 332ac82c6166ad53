use nucleid_cluster::bandwidth::{two_means, two_means_with_deviations};

/// A synthetic bimodal score set: a broad low mode and a tight high mode.
fn bimodal() -> Vec<f64> {
    let mut scores = Vec::new();
    for i in 0..200 {
        scores.push(0.30 + 0.10 * ((i % 21) as f64 / 20.0));
    }
    for i in 0..50 {
        scores.push(0.90 + 0.05 * ((i % 11) as f64 / 10.0));
    }
    scores
}

#[test]
fn test_two_means_recovers_both_modes() {
    let scores = bimodal();
    let (m1, m2, s1, s2) = two_means(&scores);
    assert!((m1 - 0.35).abs() < 0.03, "low mode at {}", m1);
    assert!((m2 - 0.925).abs() < 0.03, "high mode at {}", m2);
    assert!(s1 > 0.0 && s2 > 0.0);
}

#[test]
fn test_estimate_descends_from_minority_mode() {
    let scores = bimodal();
    let init = two_means(&scores);
    // The high mode is the minority here; the guess sits at or just below it.
    let at_mode = two_means_with_deviations(&scores, init, 0.0);
    assert!((at_mode - 0.925).abs() < 0.03);

    let one_sigma = two_means_with_deviations(&scores, init, 1.0);
    assert!(one_sigma < at_mode);
    assert!(one_sigma > 0.8);

    let two_sigma = two_means_with_deviations(&scores, init, 2.0);
    assert!(two_sigma < one_sigma);
}
