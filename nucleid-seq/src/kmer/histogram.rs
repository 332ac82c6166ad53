use num_traits::{AsPrimitive, FromPrimitive, PrimInt, Signed, ToPrimitive, WrappingAdd};

use crate::errors::SequenceError;
use crate::sequence::{Sequence, UNKNOWN};

/// Number of letters in the DNA alphabet.
pub const ALPHABET_SIZE: usize = 4;

/// Digit codes of the four bases; everything else is invalid.
const DIGIT_OF: [u8; 128] = {
    let mut d = [u8::MAX; 128];
    d[b'C' as usize] = 0;
    d[b'T' as usize] = 1;
    d[b'A' as usize] = 2;
    d[b'G' as usize] = 3;
    d
};

/// Letter of each digit code, inverse of the digit table.
const BASE_OF: [u8; ALPHABET_SIZE] = [b'C', b'T', b'A', b'G'];

/// A histogram cell wide enough for the data at hand.
///
/// Counts are kept in the smallest signed integer that fits the longest sequence, so an
/// overflow shows up as a negative cell and is reported instead of silently wrapping.
/// The width is fixed once per run, before any histogram is built.
pub trait HistCell:
    PrimInt
    + Signed
    + WrappingAdd
    + FromPrimitive
    + ToPrimitive
    + AsPrimitive<f64>
    + Send
    + Sync
    + std::fmt::Debug
    + 'static
{
    /// Bit width, used in overflow diagnostics.
    const BITS: u32;
}

impl HistCell for i8 {
    const BITS: u32 = 8;
}
impl HistCell for i16 {
    const BITS: u32 = 16;
}
impl HistCell for i32 {
    const BITS: u32 = 32;
}
impl HistCell for i64 {
    const BITS: u32 = 64;
}

/// The four supported histogram cell widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistWidth {
    B8,
    B16,
    B32,
    B64,
}

impl HistWidth {
    /// Chooses the narrowest signed width that can count up to `max_length`.
    ///
    /// # Example
    /// ```rust
    /// use nucleid_seq::kmer::HistWidth;
    /// assert_eq!(HistWidth::for_max_length(100), HistWidth::B8);
    /// assert_eq!(HistWidth::for_max_length(1000), HistWidth::B16);
    /// assert_eq!(HistWidth::for_max_length(100_000), HistWidth::B32);
    /// ```
    pub fn for_max_length(max_length: u64) -> HistWidth {
        if max_length <= i8::MAX as u64 {
            HistWidth::B8
        } else if max_length <= i16::MAX as u64 {
            HistWidth::B16
        } else if max_length <= i32::MAX as u64 {
            HistWidth::B32
        } else {
            HistWidth::B64
        }
    }
}

/// Builds dense k-mer count vectors from DNA sequences.
///
/// A k-mer hashes to `Σ digit(s[j+i]) · 4^(k-1-i)` with digits C=0, T=1, A=2, G=3; the
/// histogram is indexed by that base-4 value and therefore has `4^k` cells. Hashing rolls
/// along each maximal unknown-free segment; segments shorter than `k` contribute nothing.
pub struct KmerHistogram<V> {
    k: usize,
    /// powers of four: `bases[i] = 4^(k-1-i)`
    bases: Vec<u64>,
    size: usize,
    _cell: std::marker::PhantomData<V>,
}

impl<V: HistCell> KmerHistogram<V> {
    /// Creates a builder for histograms of `4^k` cells.
    pub fn new(k: usize) -> Result<Self, SequenceError> {
        if k < 1 || k > 31 {
            return Err(SequenceError::InvalidK { k });
        }
        let bases: Vec<u64> = (0..k).map(|i| 4u64.pow((k - 1 - i) as u32)).collect();
        let size = 4usize.pow(k as u32);
        Ok(KmerHistogram {
            k,
            bases,
            size,
            _cell: std::marker::PhantomData,
        })
    }

    /// The k-mer length of this builder.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of cells, i.e. `4^k`.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Hash of the k-length window starting at `start`; the window must hold valid bases only.
    pub fn hash(&self, seq: &[u8], start: usize) -> u64 {
        let mut index = 0u64;
        for i in 0..self.k {
            index += self.bases[i] * DIGIT_OF[seq[start + i] as usize] as u64;
        }
        index
    }

    /// Inverts [hash](Self::hash): reconstructs the k-mer string of a cell index.
    ///
    /// # Example
    /// ```rust
    /// use nucleid_seq::kmer::KmerHistogram;
    /// let table = KmerHistogram::<i32>::new(3).unwrap();
    /// let h = table.hash(b"ACG", 0);
    /// assert_eq!(table.decode(h), "ACG");
    /// ```
    pub fn decode(&self, mut hash: u64) -> String {
        let mut word = vec![0u8; self.k];
        for i in (0..self.k).rev() {
            word[i] = BASE_OF[(hash % 4) as usize];
            hash /= 4;
        }
        String::from_utf8(word).unwrap_or_default()
    }

    /// Builds the dense count vector for one sequence.
    ///
    /// Fails with [EmptyInput](SequenceError::EmptyInput) when the sequence has no valid
    /// segment at all and with [HistogramOverflow](SequenceError::HistogramOverflow) when a
    /// count wraps negative.
    ///
    /// # Example
    /// ```rust
    /// use nucleid_seq::kmer::KmerHistogram;
    /// use nucleid_seq::sequence::Sequence;
    ///
    /// let table = KmerHistogram::<i16>::new(2).unwrap();
    /// let hist = table.build(&Sequence::from_str("s", "ACGT")).unwrap();
    /// assert_eq!(hist.iter().map(|&c| c as i64).sum::<i64>(), 3);
    /// assert_eq!(hist[table.hash(b"AC", 0) as usize], 1);
    /// ```
    pub fn build(&self, sequence: &Sequence) -> Result<Vec<V>, SequenceError> {
        let segments = sequence.valid_segments();
        if segments.is_empty() {
            return Err(SequenceError::EmptyInput {
                header: sequence.description().to_owned(),
            });
        }

        let mut hist = vec![V::zero(); self.size];
        let seq = sequence.seq();
        let roll_out = self.bases[0];

        for &(start, end) in &segments {
            if end + 1 < start + self.k {
                continue;
            }
            // The last window of this segment starts at end - k + 1.
            let mut h = self.hash(seq, start);
            hist[h as usize] = hist[h as usize].wrapping_add(&V::one());
            for j in start + 1..=end + 1 - self.k {
                h = 4 * (h - roll_out * DIGIT_OF[seq[j - 1] as usize] as u64)
                    + DIGIT_OF[seq[j + self.k - 1] as usize] as u64;
                hist[h as usize] = hist[h as usize].wrapping_add(&V::one());
            }
        }

        if hist.iter().any(|&c| c < V::zero()) {
            return Err(SequenceError::HistogramOverflow { width: V::BITS });
        }
        Ok(hist)
    }

    /// Lists all cell indices in digit form: row `r` holds the `k` base-4 digits of `r`.
    ///
    /// The flattened table has `4^k · k` entries and is consumed by statistics that
    /// weigh cells by per-base background probabilities.
    pub fn keys_digit_format(&self) -> Vec<u8> {
        let mut keys = vec![0u8; self.size * self.k];
        for c in (0..self.k).rev() {
            let divisor = 4u64.pow(c as u32);
            for r in 0..self.size {
                keys[r * self.k + self.k - 1 - c] = ((r as u64 / divisor) % 4) as u8;
            }
        }
        keys
    }
}

/// Builds the monomer (k=1) histogram: one unsigned count per base, in digit order C, T, A, G.
pub fn build_monomers(sequence: &Sequence) -> Result<Vec<u64>, SequenceError> {
    let segments = sequence.valid_segments();
    if segments.is_empty() {
        return Err(SequenceError::EmptyInput {
            header: sequence.description().to_owned(),
        });
    }
    let mut hist = vec![0u64; ALPHABET_SIZE];
    let seq = sequence.seq();
    for &(start, end) in &segments {
        for &b in &seq[start..=end] {
            hist[DIGIT_OF[b as usize] as usize] += 1;
        }
    }
    Ok(hist)
}

/// Composition of a block of sequences: per-base frequencies in digit order C, T, A, G.
pub fn block_composition(block: &[Sequence]) -> [f64; ALPHABET_SIZE] {
    let mut counts = [0.0f64; ALPHABET_SIZE];
    for sequence in block {
        for &b in sequence.seq() {
            if b != UNKNOWN {
                counts[DIGIT_OF[b as usize] as usize] += 1.0;
            }
        }
    }
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        for c in counts.iter_mut() {
            *c /= total;
        }
    }
    counts
}

/// Digit code of a base, or `u8::MAX` for anything outside `{C, T, A, G}`.
pub fn digit_of(base: u8) -> u8 {
    if (base as usize) < 128 {
        DIGIT_OF[base as usize]
    } else {
        u8::MAX
    }
}
