use std::fmt;

/// The byte that marks an unknown base.
///
/// Ambiguity remapping happens in the reader; what remains is the four canonical
/// bases and `N`.
pub const UNKNOWN: u8 = b'N';

/// A DNA sequence.
///
/// A `char` takes four bytes, which is not needed for a nucleotide alphabet, so the
/// [`Sequence`](Sequence) struct stores its residues as `Vec<u8>`. Bodies are held in upper case
/// over `{A, C, G, T, N}`; the reader performs the case folding and the remapping of
/// ambiguity codes.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Sequence {
    /// identifies this sequence
    description: String,
    /// the sequence itself, stored as u8 bytes
    seq: Vec<u8>,
}

impl Sequence {
    /// Create a new instance of a Sequence by consuming the given data
    ///
    /// # Example
    /// ```rust
    /// use nucleid_seq::sequence::Sequence;
    ///
    /// let seq = Sequence::from_attrs(String::from("seq-1"), b"ACGTACGT".to_vec());
    /// assert_eq!("ACGTACGT", seq.to_string());
    /// ```
    pub fn from_attrs(description: String, seq: Vec<u8>) -> Self {
        Sequence { description, seq }
    }

    /// A handy way to create a new Sequence from `str` data
    ///
    /// # Example
    /// ```rust
    /// use nucleid_seq::sequence::Sequence;
    ///
    /// let seq = Sequence::from_str("seq-1", "ACGT");
    /// assert_eq!("ACGT", seq.to_string());
    /// ```
    pub fn from_str(description: &str, seq: &str) -> Self {
        Self {
            description: String::from(description),
            seq: seq.as_bytes().to_vec(),
        }
    }

    /// Return the description line of this Sequence, without the leading `>`
    pub fn description(&self) -> &str {
        self.description.as_ref()
    }

    /// Return the reference of the sequence itself
    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    /// Return the length of this sequence
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Returns true if this sequence contains no residues
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// Returns the nucleotide u8 code at a given position in this `Sequence`
    pub fn u8(&self, pos: usize) -> u8 {
        self.seq[pos]
    }

    /// Creates a string holding only the residues of this sequence.
    pub fn to_string(&self) -> String {
        String::from_utf8(self.seq.clone()).unwrap_or_default()
    }

    /// Maximal runs of non-unknown bases, as inclusive `[start, end]` coordinate pairs.
    ///
    /// # Example
    /// ```rust
    /// use nucleid_seq::sequence::Sequence;
    ///
    /// let seq = Sequence::from_str("seq-1", "ACGTNNACG");
    /// assert_eq!(seq.valid_segments(), vec![(0, 3), (6, 8)]);
    /// ```
    pub fn valid_segments(&self) -> Vec<(usize, usize)> {
        valid_segments_of(&self.seq)
    }

    /// The count of non-unknown bases, i.e. the summed length of all valid segments.
    pub fn effective_len(&self) -> usize {
        self.valid_segments()
            .iter()
            .map(|(s, e)| e - s + 1)
            .sum()
    }
}

/// Scans a residue slice for maximal unknown-free runs; coordinates are inclusive.
pub fn valid_segments_of(seq: &[u8]) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &c) in seq.iter().enumerate() {
        if c != UNKNOWN && start.is_none() {
            start = Some(i);
        } else if c == UNKNOWN {
            if let Some(s) = start.take() {
                segments.push((s, i - 1));
            }
        }
    }
    if let Some(s) = start {
        segments.push((s, seq.len() - 1));
    }
    segments
}

impl fmt::Display for Sequence {
    /// Creates a `String` representation of a `Sequence` - FASTA format
    ///
    /// ```rust
    /// use nucleid_seq::sequence::Sequence;
    /// use std::fmt::Write;
    ///
    /// let seq = Sequence::from_str("seq-1", "ACGT");
    /// let mut actual = String::new();
    /// write!(actual, "{}", seq).unwrap();
    /// assert_eq!(actual, "> seq-1\nACGT\n");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "> {}\n{}\n", self.description(), self.to_string())
    }
}
