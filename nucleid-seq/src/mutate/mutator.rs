use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::errors::SequenceError;
use crate::sequence::{valid_segments_of, UNKNOWN};

/// The eight mutation types of the mixed single-point/block model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Insertion,
    Deletion,
    Mismatch,
    BlockInsertion,
    BlockDeletion,
    Duplication,
    Inversion,
    Translocation,
}

impl Mutation {
    /// Block mutations consume a whole stretch of positions at once.
    pub fn is_block(self) -> bool {
        !matches!(
            self,
            Mutation::Insertion | Mutation::Deletion | Mutation::Mismatch
        )
    }
}

/// Produces mutated copies of a template sequence at requested identity rates.
///
/// Mutations are planned at positions spaced evenly over the valid part of the template;
/// at each position one of the enabled types is drawn. Block lengths are uniform within
/// the configured bounds, clamped by the remaining mutation budget and by the segment that
/// holds the position. A translocation replays the most recent block deletion at the new
/// position; when no deletion has been recorded yet the type is redrawn.
///
/// Alongside the mutated copy, the true identity of the copy to its template is tracked as
/// `match_count / aligned_length`, using the per-type accounting of the alignment a mutation
/// would produce. Randomness is fully determined by the seed.
pub struct Mutator<'a> {
    sequence: &'a [u8],
    segments: Vec<(usize, usize)>,
    effective_length: usize,
    /// cumulative draw limits for A, C, G in [0, 1); T takes the rest
    a_limit: f64,
    c_limit: f64,
    g_limit: f64,
    enabled: Vec<Mutation>,
    min_block: usize,
    max_block: usize,
    inversion_factor: f64,
    translocation_factor: f64,
    rng: SmallRng,
}

impl<'a> Mutator<'a> {
    /// Default lower bound of a mutation block.
    pub const MIN_BLOCK: usize = 2;
    /// Default upper bound of a mutation block.
    pub const MAX_BLOCK: usize = 5;
    /// Share of inverted mismatches charged against the match count.
    pub const INVERSION_FACTOR: f64 = 1.0;
    /// Share of a translocated block credited back to the match count.
    pub const TRANSLOCATION_FACTOR: f64 = 1.0;

    /// Creates a mutator over a template; the nucleotide composition used for random
    /// draws is taken from the template itself.
    pub fn new(
        sequence: &'a [u8],
        max_block: usize,
        seed: u64,
        min_block: usize,
    ) -> Result<Self, SequenceError> {
        let composition = Self::composition_of(sequence);
        Self::with_composition(sequence, max_block, seed, composition, min_block)
    }

    /// Creates a mutator with a caller-provided composition `[A, C, G, T]`.
    pub fn with_composition(
        sequence: &'a [u8],
        max_block: usize,
        seed: u64,
        composition: [f64; 4],
        min_block: usize,
    ) -> Result<Self, SequenceError> {
        if min_block <= 1 || max_block <= 1 || min_block > max_block {
            return Err(SequenceError::InvalidBlockBounds {
                min: min_block,
                max: max_block,
            });
        }

        let segments = valid_segments_of(sequence);
        if segments.is_empty() {
            return Err(SequenceError::EmptyInput {
                header: String::from("<mutation template>"),
            });
        }
        let effective_length = segments.iter().map(|(s, e)| e - s + 1).sum();

        Ok(Mutator {
            sequence,
            segments,
            effective_length,
            a_limit: composition[0],
            c_limit: composition[0] + composition[1],
            g_limit: composition[0] + composition[1] + composition[2],
            enabled: Vec::new(),
            min_block,
            max_block,
            inversion_factor: Self::INVERSION_FACTOR,
            translocation_factor: Self::TRANSLOCATION_FACTOR,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Nucleotide composition `[A, C, G, T]` of a template, unknowns kept in the denominator.
    fn composition_of(sequence: &[u8]) -> [f64; 4] {
        let mut composition = [0.0f64; 4];
        for &b in sequence {
            match b {
                b'A' => composition[0] += 1.0,
                b'C' => composition[1] += 1.0,
                b'G' => composition[2] += 1.0,
                b'T' => composition[3] += 1.0,
                _ => {}
            }
        }
        let len = sequence.len() as f64;
        if len > 0.0 {
            for c in composition.iter_mut() {
                *c /= len;
            }
        }
        composition
    }

    /// Enables one specific mutation type.
    ///
    /// [Translocation](Mutation::Translocation) also needs
    /// [BlockDeletion](Mutation::BlockDeletion) in the set; use
    /// [enable_translocation](Self::enable_translocation) for that pairing.
    pub fn enable(&mut self, mutation: Mutation) {
        if !self.enabled.contains(&mutation) {
            self.enabled.push(mutation);
        }
    }

    /// Enables single-point deletions and mismatches.
    pub fn enable_single_point(&mut self) {
        self.enabled.push(Mutation::Deletion);
        self.enabled.push(Mutation::Mismatch);
    }

    /// Enables block deletions and duplications.
    pub fn enable_block(&mut self) {
        self.enabled.push(Mutation::BlockDeletion);
        self.enabled.push(Mutation::Duplication);
    }

    /// Enables single and block insertions.
    pub fn enable_insertion(&mut self) {
        self.enabled.push(Mutation::Insertion);
        self.enabled.push(Mutation::BlockInsertion);
    }

    /// Enables inversions.
    pub fn enable_inversion(&mut self) {
        self.enabled.push(Mutation::Inversion);
    }

    /// Enables translocations; block deletion is pulled in as well since a
    /// translocation replays a recorded deletion.
    pub fn enable_translocation(&mut self) {
        self.enabled.push(Mutation::Translocation);
        if !self.enabled.contains(&Mutation::BlockDeletion) {
            self.enabled.push(Mutation::BlockDeletion);
        }
    }

    /// Draws a nucleotide according to the template composition.
    fn random_nucleotide(&mut self) -> u8 {
        let p: f64 = self.rng.gen();
        if p <= self.a_limit {
            b'A'
        } else if p <= self.c_limit {
            b'C'
        } else if p <= self.g_limit {
            b'G'
        } else {
            b'T'
        }
    }

    /// Produces one mutated copy and the identity it would score against the template.
    ///
    /// `mutation_rate` is the fraction of positions to disturb; the emitted identity is
    /// close to `1 - mutation_rate`, drifting by at most a position's worth per planned
    /// mutation.
    pub fn mutate(&mut self, mutation_rate: f64) -> Result<(Vec<u8>, f64), SequenceError> {
        if !(0.0..=1.0).contains(&mutation_rate) {
            return Err(SequenceError::InvalidMutationRate {
                rate: mutation_rate,
            });
        }
        if self.enabled.is_empty() {
            return Err(SequenceError::NoMutationsEnabled);
        }

        let o_len = self.sequence.len();
        let mut total = (mutation_rate * o_len as f64).round() as usize;
        if total > self.effective_length {
            total = self.effective_length;
        }

        if total < 1 {
            return Ok((self.sequence.to_vec(), 1.0));
        }

        let mut mutated: Vec<u8> = Vec::with_capacity(o_len + total);
        let mut delete_list: Vec<(usize, usize)> = Vec::new();
        let interval = self.effective_length as f64 / total as f64;
        let type_num = self.enabled.len();

        let mut remaining = total as i64;
        let mut align_len = o_len as f64;
        let mut match_num = o_len as f64;

        let mut seg_index = 0;
        let (mut seg_start, mut seg_end) = self.segments[0];
        let seg_num = self.segments.len();

        let mut skipped: i64 = 0;
        let mut i: i64 = 0;
        while i - skipped < total as i64 {
            let mut index = (i as f64 * interval) as usize;
            // The end of the sequence was reached before the budget ran out.
            if index >= o_len {
                break;
            }
            let old_index = index;

            // Skip planned positions that fall into an unknown region.
            while i < total as i64 && index < o_len && self.sequence[index] == UNKNOWN {
                i += 1;
                index = (i as f64 * interval) as usize;
                skipped += 1;
            }
            if index >= o_len || self.sequence[index] == UNKNOWN {
                mutated.extend_from_slice(&self.sequence[old_index..]);
                break;
            }
            if index != old_index {
                mutated.extend_from_slice(&self.sequence[old_index..index]);
            }

            // Find the segment holding this position; its end caps the block size.
            while !(index >= seg_start && index <= seg_end) && seg_index < seg_num - 1 {
                seg_index += 1;
                seg_start = self.segments[seg_index].0;
                seg_end = self.segments[seg_index].1;
            }
            if !(index >= seg_start && index <= seg_end) {
                return Err(SequenceError::PositionOutsideSegments { index });
            }

            let mut mutation = self.enabled[self.rng.gen_range(0..type_num)];
            while mutation == Mutation::Translocation && delete_list.is_empty() {
                mutation = self.enabled[self.rng.gen_range(0..type_num)];
            }

            let block: usize;
            let mut next_index: usize;
            if mutation.is_block() {
                let mut b = self.rng.gen_range(self.min_block..=self.max_block) as i64;
                if b > remaining {
                    b = remaining;
                }
                if index + b as usize > seg_end + 1 {
                    b = (seg_end - index + 1) as i64;
                }
                block = b as usize;
                next_index = ((i + b) as f64 * interval) as usize;
                remaining -= b;
            } else {
                block = 1;
                next_index = ((i + 1) as f64 * interval) as usize;
                remaining -= 1;
            }
            if remaining == 0 || next_index > o_len {
                next_index = o_len;
            }

            match mutation {
                Mutation::Insertion => {
                    let c = self.random_nucleotide();
                    mutated.push(c);
                    mutated.extend_from_slice(&self.sequence[index..next_index]);
                    align_len += 1.0;
                }
                Mutation::Deletion => {
                    mutated.extend_from_slice(&self.sequence[index + 1..next_index]);
                    match_num -= 1.0;
                }
                Mutation::Mismatch => {
                    let c = self.random_nucleotide();
                    mutated.push(c);
                    mutated.extend_from_slice(&self.sequence[index + 1..next_index]);
                    if c != self.sequence[index] {
                        match_num -= 1.0;
                    }
                }
                Mutation::BlockInsertion => {
                    for _ in 0..block {
                        let c = self.random_nucleotide();
                        mutated.push(c);
                    }
                    mutated.extend_from_slice(&self.sequence[index..next_index]);
                    align_len += block as f64;
                }
                Mutation::BlockDeletion => {
                    mutated.extend_from_slice(&self.sequence[index + block..next_index]);
                    delete_list.push((index, index + block - 1));
                    match_num -= block as f64;
                }
                Mutation::Duplication => {
                    mutated.extend_from_slice(&self.sequence[index..index + block]);
                    mutated.extend_from_slice(&self.sequence[index..next_index]);
                    align_len += block as f64;
                }
                Mutation::Inversion => {
                    let inverted: Vec<u8> = self.sequence[index..index + block]
                        .iter()
                        .rev()
                        .copied()
                        .collect();
                    let mismatches = inverted
                        .iter()
                        .zip(&self.sequence[index..index + block])
                        .filter(|(a, b)| a != b)
                        .count();
                    mutated.extend_from_slice(&inverted);
                    mutated.extend_from_slice(&self.sequence[index + block..next_index]);
                    // All bases are still present, only their order flipped.
                    match_num -= (mismatches as f64 * self.inversion_factor).round();
                }
                Mutation::Translocation => {
                    // A translocation undoes the most recent block deletion.
                    let (del_start, del_end) = delete_list.pop().unwrap_or((index, index));
                    mutated.extend_from_slice(&self.sequence[del_start..=del_end]);
                    mutated.extend_from_slice(&self.sequence[index..next_index]);
                    match_num += (block as f64 * self.translocation_factor).round();
                }
            }

            if mutation.is_block() {
                i += block as i64;
            } else {
                i += 1;
            }
        }

        Ok((mutated, match_num / align_len))
    }
}
