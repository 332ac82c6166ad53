use log::{debug, warn};

use nucleid_seq::kmer::{HistCell, ALPHABET_SIZE};

use crate::errors::IdentityError;

/// The statistic bank, numbered as persisted in model files.
///
/// Indices 0–17 are distances, index 18 is the distance-count sentinel and stays
/// unassigned, indices 19–29 are similarities. The numbering is part of the model-file
/// contract and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Manhattan = 0,
    Euclidean = 1,
    ChiSquared = 2,
    Chebyshev = 3,
    Hamming = 4,
    Minkowski = 5,
    Cosine = 6,
    Correlation = 7,
    BrayCurtis = 8,
    SquaredChord = 9,
    Hellinger = 10,
    CumulativeDiff = 11,
    Emd = 12,
    KlConditional = 13,
    KDivergence = 14,
    JeffreyDivergence = 15,
    JensenShannonDivergence = 16,
    Rre = 17,
    Intersection = 19,
    Kulczynski1 = 20,
    Kulczynski2 = 21,
    CovarianceR = 22,
    HarmonicMeanR = 23,
    SimRatio = 24,
    MarkovR = 25,
    SimMM = 26,
    LengthRatio = 27,
    D2SR = 28,
    D2Star = 29,
}

/// Number of distance statistics; also the sentinel index that no statistic carries.
pub const DISTANCE_COUNT: usize = 18;
/// One past the largest statistic index.
pub const INDEX_LIMIT: usize = 30;
/// How many statistics the bank holds.
pub const STAT_COUNT: usize = 29;

impl Stat {
    /// Every statistic in index order.
    pub const ALL: [Stat; STAT_COUNT] = [
        Stat::Manhattan,
        Stat::Euclidean,
        Stat::ChiSquared,
        Stat::Chebyshev,
        Stat::Hamming,
        Stat::Minkowski,
        Stat::Cosine,
        Stat::Correlation,
        Stat::BrayCurtis,
        Stat::SquaredChord,
        Stat::Hellinger,
        Stat::CumulativeDiff,
        Stat::Emd,
        Stat::KlConditional,
        Stat::KDivergence,
        Stat::JeffreyDivergence,
        Stat::JensenShannonDivergence,
        Stat::Rre,
        Stat::Intersection,
        Stat::Kulczynski1,
        Stat::Kulczynski2,
        Stat::CovarianceR,
        Stat::HarmonicMeanR,
        Stat::SimRatio,
        Stat::MarkovR,
        Stat::SimMM,
        Stat::LengthRatio,
        Stat::D2SR,
        Stat::D2Star,
    ];

    /// Resolves a persisted index back to its statistic.
    pub fn from_index(index: i64) -> Result<Stat, IdentityError> {
        let valid = (0..INDEX_LIMIT as i64).contains(&index) && index != DISTANCE_COUNT as i64;
        if !valid {
            return Err(IdentityError::UnknownStatistic { index });
        }
        Ok(Stat::ALL[if index < DISTANCE_COUNT as i64 {
            index as usize
        } else {
            index as usize - 1
        }])
    }

    /// The persisted index of this statistic.
    pub fn index(self) -> usize {
        self as usize
    }

    /// True for the distance half of the bank.
    pub fn is_distance(self) -> bool {
        self.index() < DISTANCE_COUNT
    }

    /// The persisted name of this statistic.
    pub fn name(self) -> &'static str {
        match self {
            Stat::Manhattan => "manhattan",
            Stat::Euclidean => "euclidean",
            Stat::ChiSquared => "chi_squared",
            Stat::Chebyshev => "chebyshev",
            Stat::Hamming => "hamming",
            Stat::Minkowski => "minkowski",
            Stat::Cosine => "cosine",
            Stat::Correlation => "correlation",
            Stat::BrayCurtis => "bray_curtis",
            Stat::SquaredChord => "squared_chord",
            Stat::Hellinger => "hellinger",
            Stat::CumulativeDiff => "cumulative_difference",
            Stat::Emd => "emd",
            Stat::KlConditional => "kl_conditional",
            Stat::KDivergence => "k_divergence",
            Stat::JeffreyDivergence => "jeffrey_divergence",
            Stat::JensenShannonDivergence => "jensen_shannon_divergence",
            Stat::Rre => "rre",
            Stat::Intersection => "intersection",
            Stat::Kulczynski1 => "kulczynski_1",
            Stat::Kulczynski2 => "kulczynski_2",
            Stat::CovarianceR => "covariance_r",
            Stat::HarmonicMeanR => "harmonic_mean_r",
            Stat::SimRatio => "sim_ratio",
            Stat::MarkovR => "markov_r",
            Stat::SimMM => "simMM",
            Stat::LengthRatio => "length_ratio",
            Stat::D2SR => "d2_s_r",
            Stat::D2Star => "d2_star",
        }
    }
}

/// Computes any statistic of the bank for one histogram pair.
///
/// The statistician is built once per pair; construction precomputes the histogram means,
/// the pseudo-count-1 probability vectors and the rounded element-wise mean histogram,
/// which several statistics share. Everything else is a pure function of the borrowed
/// data.
pub struct Statistician<'a, V> {
    hist_size: usize,
    k: usize,
    h1: &'a [V],
    h2: &'a [V],
    mono1: &'a [u64],
    mono2: &'a [u64],
    /// background model over C, T, A, G
    background: &'a [f64],
    /// cell indices in digit form, `hist_size · k` entries
    keys: &'a [u8],
    mean1: f64,
    mean2: f64,
    p1: Vec<f64>,
    p2: Vec<f64>,
    mean_hist: Vec<f64>,
}

impl<'a, V: HistCell> Statistician<'a, V> {
    pub fn new(
        hist_size: usize,
        k: usize,
        h1: &'a [V],
        h2: &'a [V],
        mono1: &'a [u64],
        mono2: &'a [u64],
        background: &'a [f64],
        keys: &'a [u8],
    ) -> Result<Self, IdentityError> {
        let mean1 = mean_of(h1);
        let mean2 = mean_of(h2);
        if mean1 == 0.0 || mean2 == 0.0 {
            return Err(IdentityError::DegenerateHistogram {
                header: String::from("<histogram with zero mean>"),
            });
        }

        let s1 = sum_of(h1) + hist_size as f64;
        let s2 = sum_of(h2) + hist_size as f64;
        let mut p1 = Vec::with_capacity(hist_size);
        let mut p2 = Vec::with_capacity(hist_size);
        let mut mean_hist = Vec::with_capacity(hist_size);
        for i in 0..hist_size {
            let a: f64 = h1[i].as_();
            let b: f64 = h2[i].as_();
            p1.push((a + 1.0) / s1);
            p2.push((b + 1.0) / s2);
            mean_hist.push(((a + b) / 2.0).round());
        }

        Ok(Statistician {
            hist_size,
            k,
            h1,
            h2,
            mono1,
            mono2,
            background,
            keys,
            mean1,
            mean2,
            p1,
            p2,
            mean_hist,
        })
    }

    /// The cheapest possible bound on identity: two sequences cannot be more alike
    /// than their length ratio.
    pub fn identity_minimum(l1: usize, l2: usize) -> f64 {
        let (shorter, longer) = if l1 < l2 { (l1, l2) } else { (l2, l1) };
        shorter as f64 / longer.max(1) as f64
    }

    /// Computes the statistics named by `indices`, in order, appending to `out`.
    pub fn calculate(&self, indices: &[usize], out: &mut Vec<f64>) -> Result<(), IdentityError> {
        out.reserve(indices.len());
        for &i in indices {
            let stat = Stat::from_index(i as i64)?;
            out.push(self.value(stat)?);
        }
        Ok(())
    }

    /// Computes the whole bank in index order.
    pub fn calculate_all(&self, out: &mut Vec<f64>) -> Result<(), IdentityError> {
        out.reserve(STAT_COUNT);
        for stat in Stat::ALL {
            out.push(self.value(stat)?);
        }
        Ok(())
    }

    /// Computes one statistic.
    pub fn value(&self, stat: Stat) -> Result<f64, IdentityError> {
        Ok(match stat {
            Stat::Manhattan => self.manhattan(),
            Stat::Euclidean => self.euclidean(),
            Stat::ChiSquared => self.chi_squared(),
            Stat::Chebyshev => self.chebyshev(),
            Stat::Hamming => self.hamming(),
            Stat::Minkowski => self.minkowski(),
            Stat::Cosine => self.cosine()?,
            Stat::Correlation => self.correlation()?,
            Stat::BrayCurtis => self.bray_curtis()?,
            Stat::SquaredChord => self.squared_chord(),
            Stat::Hellinger => self.hellinger(),
            Stat::CumulativeDiff => self.cumulative_difference(),
            Stat::Emd => self.emd(),
            Stat::KlConditional => self.kl_conditional(),
            Stat::KDivergence => self.k_divergence(),
            Stat::JeffreyDivergence => self.jeffrey_divergence(),
            Stat::JensenShannonDivergence => self.jensen_shannon_divergence(),
            Stat::Rre => self.rre(),
            Stat::Intersection => self.intersection(),
            Stat::Kulczynski1 => self.kulczynski_1(),
            Stat::Kulczynski2 => self.kulczynski_2(),
            Stat::CovarianceR => self.covariance_r(),
            Stat::HarmonicMeanR => self.harmonic_mean_r(),
            Stat::SimRatio => self.sim_ratio()?,
            Stat::MarkovR => self.markov_r(),
            Stat::SimMM => self.sim_mm(),
            Stat::LengthRatio => self.length_ratio(),
            Stat::D2SR => self.d2_s_r()?,
            Stat::D2Star => self.d2_star()?,
        })
    }

    fn pairs(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        (0..self.hist_size).map(|i| (self.h1[i].as_(), self.h2[i].as_()))
    }

    fn manhattan(&self) -> f64 {
        self.pairs().map(|(a, b)| (a - b).abs()).sum()
    }

    fn euclidean(&self) -> f64 {
        self.pairs().map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt()
    }

    fn chi_squared(&self) -> f64 {
        // Cells where both counts are zero are skipped.
        self.pairs()
            .filter(|&(a, b)| a > 0.0 || b > 0.0)
            .map(|(a, b)| (a - b) * (a - b) / (a + b))
            .sum()
    }

    fn chebyshev(&self) -> f64 {
        self.pairs().map(|(a, b)| (a - b).abs()).fold(0.0, f64::max)
    }

    fn hamming(&self) -> f64 {
        let differing = self.pairs().filter(|&(a, b)| a != b).count();
        differing as f64 / self.hist_size as f64
    }

    fn minkowski(&self) -> f64 {
        self.pairs()
            .map(|(a, b)| {
                let z = (a - b).abs();
                z * z * z
            })
            .sum::<f64>()
            .cbrt()
    }

    fn cosine_helper(v1: &[f64], v2: &[f64], statistic: &'static str) -> Result<f64, IdentityError> {
        let dot: f64 = v1.iter().zip(v2).map(|(a, b)| a * b).sum();
        let n1 = v1.iter().map(|a| a * a).sum::<f64>().sqrt();
        let n2 = v2.iter().map(|a| a * a).sum::<f64>().sqrt();
        if n1 == 0.0 || n2 == 0.0 {
            return Err(IdentityError::DegenerateStatistic { statistic });
        }
        Ok(1.0 - dot / (n1 * n2))
    }

    fn cosine(&self) -> Result<f64, IdentityError> {
        let v1: Vec<f64> = self.h1.iter().map(|&a| a.as_()).collect();
        let v2: Vec<f64> = self.h2.iter().map(|&a| a.as_()).collect();
        Self::cosine_helper(&v1, &v2, "cosine")
    }

    fn correlation(&self) -> Result<f64, IdentityError> {
        let m1 = self.mean1.round();
        let m2 = self.mean2.round();
        let v1: Vec<f64> = self.h1.iter().map(|&a| a.as_() - m1).collect();
        let v2: Vec<f64> = self.h2.iter().map(|&a| a.as_() - m2).collect();
        Self::cosine_helper(&v1, &v2, "correlation")
    }

    fn bray_curtis(&self) -> Result<f64, IdentityError> {
        let mut num = 0.0;
        let mut denom = 0.0;
        for (a, b) in self.pairs() {
            num += (a - b).abs();
            denom += a + b;
        }
        if denom == 0.0 {
            return Err(IdentityError::DegenerateStatistic {
                statistic: "bray_curtis",
            });
        }
        Ok(num / denom)
    }

    fn squared_chord(&self) -> f64 {
        self.pairs()
            .map(|(a, b)| a + b - 2.0 * (a * b).sqrt())
            .sum()
    }

    fn hellinger(&self) -> f64 {
        let d: f64 = self
            .pairs()
            .map(|(a, b)| {
                let n1 = a / self.mean1;
                let n2 = b / self.mean2;
                n1 + n2 - 2.0 * (n1 * n2).sqrt()
            })
            .sum();
        (2.0 * d).sqrt()
    }

    fn cumulative_difference(&self) -> f64 {
        let mut c1 = 0.0;
        let mut c2 = 0.0;
        let mut total = 0.0;
        for (a, b) in self.pairs() {
            c1 += a;
            c2 += b;
            total += (c1 - c2).abs();
        }
        total
    }

    fn emd(&self) -> f64 {
        let mut cumulative = 0.0;
        let mut emd = 0.0;
        for i in 0..self.hist_size {
            cumulative += self.p1[i] - self.p2[i];
            emd += cumulative.abs();
        }
        emd
    }

    fn kl_conditional(&self) -> f64 {
        let a = ALPHABET_SIZE as f64;
        let mut sum4_1 = a;
        let mut sum4_2 = a;
        let mut outer_1 = 0.0;
        let mut outer_2 = 0.0;

        for i in 0..self.hist_size {
            let h1: f64 = self.h1[i].as_();
            let h2: f64 = self.h2[i].as_();
            sum4_1 += h1;
            sum4_2 += h2;

            if i % ALPHABET_SIZE == ALPHABET_SIZE - 1 {
                let mut inner_1 = 0.0;
                let mut inner_2 = 0.0;
                for j in i + 1 - ALPHABET_SIZE..=i {
                    let c1 = (self.h1[j].as_() + 1.0) / sum4_1;
                    let c2 = (self.h2[j].as_() + 1.0) / sum4_2;
                    let lg = (c1 / c2).ln();
                    inner_1 += c1 * lg;
                    inner_2 += -c2 * lg;
                }
                outer_1 += sum4_1 * inner_1;
                outer_2 += sum4_2 * inner_2;
                sum4_1 = a;
                sum4_2 = a;
            }
        }

        let left = outer_1 / (sum_of(self.h1) + self.hist_size as f64);
        let right = outer_2 / (sum_of(self.h2) + self.hist_size as f64);
        (left + right) / 2.0
    }

    fn k_divergence(&self) -> f64 {
        // Asymmetric, so both directions against the average are taken.
        let mut d1 = 0.0;
        let mut d2 = 0.0;
        for i in 0..self.hist_size {
            let avg = (self.p1[i] + self.p2[i]) / 2.0;
            d1 += self.p1[i] * (self.p1[i] / avg).ln();
            d2 += self.p2[i] * (self.p2[i] / avg).ln();
        }
        (d1 + d2) / 2.0
    }

    fn jeffrey_divergence(&self) -> f64 {
        (0..self.hist_size)
            .map(|i| (self.p1[i] - self.p2[i]) * (self.p1[i] / self.p2[i]).ln())
            .sum()
    }

    fn kl_helper(o1: &[f64], o2: &[f64]) -> f64 {
        o1.iter().zip(o2).map(|(a, b)| a * (a / b).ln()).sum()
    }

    fn jensen_shannon_divergence(&self) -> f64 {
        let s: f64 = self.mean_hist.iter().sum::<f64>() + self.hist_size as f64;
        let p: Vec<f64> = self.mean_hist.iter().map(|m| (m + 1.0) / s).collect();
        (Self::kl_helper(&self.p1, &p) + Self::kl_helper(&self.p2, &p)) / 2.0
    }

    fn rre(&self) -> f64 {
        let mut d1 = 0.0;
        let mut d2 = 0.0;
        for block in (0..self.hist_size).step_by(ALPHABET_SIZE) {
            let mut sum1 = ALPHABET_SIZE as f64;
            let mut sum2 = ALPHABET_SIZE as f64;
            for j in 0..ALPHABET_SIZE {
                sum1 += self.h1[block + j].as_();
                sum2 += self.h2[block + j].as_();
            }
            for j in 0..ALPHABET_SIZE {
                let m1 = (self.h1[block + j].as_() + 1.0) / sum1;
                let m2 = (self.h2[block + j].as_() + 1.0) / sum2;
                let both = m1 + m2;
                d1 += m1 * (2.0 * m1 / both).ln();
                d2 += m2 * (2.0 * m2 / both).ln();
            }
        }
        (d1 + d2) / 2.0
    }

    fn intersection(&self) -> f64 {
        self.pairs()
            .filter(|&(a, b)| a + b != 0.0)
            .map(|(a, b)| 2.0 * a.min(b) / (a + b))
            .sum()
    }

    fn kulczynski_1(&self) -> f64 {
        let delta = 1.0 / self.hist_size as f64;
        self.pairs()
            .filter(|&(a, b)| a > 0.0 || b > 0.0)
            .map(|(a, b)| (delta + a.min(b)) / (delta + (a - b).abs()))
            .sum()
    }

    fn kulczynski_2(&self) -> f64 {
        let overlap: f64 = self.pairs().map(|(a, b)| a.min(b)).sum();
        let mu = self.hist_size as f64 * (self.mean1 + self.mean2) / (2.0 * self.mean1 * self.mean2);
        mu * overlap
    }

    fn covariance_helper(t1: &[f64], t2: &[f64], m1: f64, m2: f64) -> f64 {
        let n = t1.len() as f64;
        t1.iter()
            .zip(t2)
            .map(|(a, b)| (a - m1) * (b - m2))
            .sum::<f64>()
            / n
    }

    fn covariance_r(&self) -> f64 {
        let v1: Vec<f64> = self.h1.iter().map(|&a| a.as_()).collect();
        let v2: Vec<f64> = self.h2.iter().map(|&a| a.as_()).collect();
        let mean_overall = self.mean_hist.iter().sum::<f64>() / self.hist_size as f64;
        let num = Self::covariance_helper(&v1, &v2, self.mean1, self.mean2);
        let denom =
            Self::covariance_helper(&self.mean_hist, &self.mean_hist, mean_overall, mean_overall);
        if denom.abs() < f64::EPSILON {
            warn!("covariance_r: a sequence is too short; similarity is assigned zero");
            0.0
        } else {
            num / denom
        }
    }

    fn harmonic_helper(t1: &[f64], t2: &[f64]) -> f64 {
        2.0 * t1
            .iter()
            .zip(t2)
            .filter(|&(&a, &b)| a > 0.0 || b > 0.0)
            .map(|(&a, &b)| a * b / (a + b))
            .sum::<f64>()
    }

    fn harmonic_mean_r(&self) -> f64 {
        let v1: Vec<f64> = self.h1.iter().map(|&a| a.as_()).collect();
        let v2: Vec<f64> = self.h2.iter().map(|&a| a.as_()).collect();
        let num = Self::harmonic_helper(&v1, &v2);
        let denom = Self::harmonic_helper(&self.mean_hist, &self.mean_hist);
        if denom.abs() < f64::EPSILON {
            warn!("harmonic_mean_r: a sequence is too short; similarity is assigned zero");
            0.0
        } else {
            num / denom
        }
    }

    fn sim_ratio(&self) -> Result<f64, IdentityError> {
        let mut dot = 0.0;
        let mut norm = 0.0;
        for (a, b) in self.pairs() {
            dot += a * b;
            let diff = a - b;
            norm += diff * diff;
        }
        let denom = dot + norm.sqrt();
        if denom == 0.0 {
            return Err(IdentityError::DegenerateStatistic {
                statistic: "sim_ratio",
            });
        }
        Ok(dot / denom)
    }

    fn markov_helper(&self, t1: &[V], t2: &[V]) -> f64 {
        let mut total = 0.0;
        for block in (0..self.hist_size).step_by(ALPHABET_SIZE) {
            let mut sum1 = ALPHABET_SIZE as f64;
            let mut sum2 = ALPHABET_SIZE as f64;
            for j in 0..ALPHABET_SIZE {
                sum1 += t1[block + j].as_();
                sum2 += t2[block + j].as_();
            }
            let lsum1 = sum1.ln();
            let lsum2 = sum2.ln();
            for j in 0..ALPHABET_SIZE {
                let a: f64 = t1[block + j].as_();
                let b: f64 = t2[block + j].as_();
                // Each sequence scored under the other's first-order model.
                total += b * ((a + 1.0).ln() - lsum1);
                total += a * ((b + 1.0).ln() - lsum2);
            }
        }
        total / 2.0
    }

    fn markov_r(&self) -> f64 {
        // Log scale, so the self-similarity baseline is subtracted, not divided.
        self.markov_helper(self.h1, self.h2)
            - 0.5 * (self.markov_helper(self.h1, self.h1) + self.markov_helper(self.h2, self.h2))
    }

    fn sim_mm(&self) -> f64 {
        let mut one_under_one = 0.0;
        let mut one_under_two = 0.0;
        let mut two_under_one = 0.0;
        let mut two_under_two = 0.0;

        for block in (0..self.hist_size).step_by(ALPHABET_SIZE) {
            let mut sum1 = ALPHABET_SIZE as f64;
            let mut sum2 = ALPHABET_SIZE as f64;
            for j in 0..ALPHABET_SIZE {
                sum1 += self.h1[block + j].as_();
                sum2 += self.h2[block + j].as_();
            }
            let lsum1 = sum1.ln();
            let lsum2 = sum2.ln();
            for j in 0..ALPHABET_SIZE {
                let a: f64 = self.h1[block + j].as_();
                let b: f64 = self.h2[block + j].as_();
                let score1 = (a + 1.0).ln() - lsum1;
                let score2 = (b + 1.0).ln() - lsum2;
                one_under_one += a * score1;
                one_under_two += a * score2;
                two_under_one += b * score1;
                two_under_two += b * score2;
            }
        }

        let l1 = sum_of(self.h1);
        let l2 = sum_of(self.h2);
        let mut r = (1.0 / l2) * (two_under_one / two_under_two).ln();
        r += (1.0 / l1) * (one_under_two / one_under_one).ln();
        r /= 2.0;
        1.0 - r.exp()
    }

    fn length_ratio(&self) -> f64 {
        let l1 = sum_of(self.h1) + (self.k - 1) as f64;
        let l2 = sum_of(self.h2) + (self.k - 1) as f64;
        l1.min(l2) / l1.max(l2)
    }

    /// Shared core of d2_s: counts adjusted by expectations under the background model.
    fn d2_s_helper(&self, t1: &[f64], t2: &[f64]) -> Result<f64, IdentityError> {
        let l1: f64 = t1.iter().sum();
        let l2: f64 = t2.iter().sum();
        if l1 == 0.0 || l2 == 0.0 {
            return Err(IdentityError::DegenerateStatistic { statistic: "d2_s" });
        }

        let mut d2 = 0.0;
        for i in 0..self.hist_size {
            let mut e1 = l1;
            let mut e2 = l2;
            for j in 0..self.k {
                let digit = self.keys[i * self.k + j] as usize;
                e1 *= self.background[digit];
                e2 *= self.background[digit];
            }
            let a1 = t1[i] - e1;
            let a2 = t2[i] - e2;
            let denom = (a1 * a1 + a2 * a2).sqrt();
            if denom.abs() >= f64::EPSILON {
                d2 += a1 * a2 / denom;
            } else {
                debug!("d2_s: skipped a cell with zero adjusted counts");
            }
        }
        Ok(d2)
    }

    fn d2_s_r(&self) -> Result<f64, IdentityError> {
        let v1: Vec<f64> = self.h1.iter().map(|&a| a.as_()).collect();
        let v2: Vec<f64> = self.h2.iter().map(|&a| a.as_()).collect();
        Ok(self.d2_s_helper(&v1, &v2)? / self.d2_s_helper(&self.mean_hist, &self.mean_hist)?)
    }

    fn d2_star(&self) -> Result<f64, IdentityError> {
        let s1: u64 = self.mono1.iter().sum();
        let s2: u64 = self.mono2.iter().sum();
        if s1 == 0 || s2 == 0 {
            return Err(IdentityError::DegenerateStatistic { statistic: "d2_star" });
        }

        // Probability vector estimated from the pair's own monomer composition.
        let total = (s1 + s2) as f64;
        let mut p = [0.0f64; ALPHABET_SIZE];
        for i in 0..ALPHABET_SIZE {
            p[i] = (self.mono1[i] as f64 + self.mono2[i] as f64 + 1.0)
                / (total + ALPHABET_SIZE as f64);
        }

        let l1 = sum_of(self.h1);
        let l2 = sum_of(self.h2);
        if l1 == 0.0 || l2 == 0.0 {
            return Err(IdentityError::DegenerateStatistic { statistic: "d2_star" });
        }
        let l = (l1 * l2).sqrt();

        let mut d2 = 0.0;
        for i in 0..self.hist_size {
            let mut e1 = l1;
            let mut e2 = l2;
            let mut e = l;
            for j in 0..self.k {
                let digit = self.keys[i * self.k + j] as usize;
                e1 *= self.background[digit];
                e2 *= self.background[digit];
                e *= p[digit];
            }
            let a1 = self.h1[i].as_() - e1;
            let a2 = self.h2[i].as_() - e2;
            if e.abs() >= f64::EPSILON {
                d2 += a1 * a2 / e;
            } else {
                debug!("d2_star: skipped a cell with zero expectation");
            }
        }
        Ok(d2)
    }
}

fn mean_of<V: HistCell>(h: &[V]) -> f64 {
    sum_of(h) / h.len() as f64
}

fn sum_of<V: HistCell>(h: &[V]) -> f64 {
    h.iter().map(|&c| {
        let v: f64 = c.as_();
        v
    }).sum()
}
