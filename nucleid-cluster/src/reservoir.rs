use log::warn;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use nucleid_identity::calculator::SequenceData;

/// Out-of-core buffer for points that no cluster claimed yet.
///
/// Unassigned points accumulate here across reads; when enough gather, a shuffled prefix
/// is drained and clustered as a fresh block. Shuffling is seeded and the seed advances
/// on every shuffle, so a run is reproducible end to end.
pub struct Reservoir<V> {
    data: SequenceData<V>,
    seed: u64,
}

impl<V> Reservoir<V> {
    /// The fixed starting seed of the shuffle sequence.
    pub const SEED: u64 = 17;

    pub fn new() -> Reservoir<V> {
        Reservoir {
            data: SequenceData::empty(),
            seed: Self::SEED,
        }
    }

    /// Number of buffered points.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Folds a batch of points into the buffer.
    pub fn add(&mut self, points: SequenceData<V>) {
        self.data.append(points);
    }

    /// Shuffles the buffer and removes up to `count` points from its front.
    pub fn remove(&mut self, count: usize) -> SequenceData<V> {
        self.shuffle();
        let count = count.min(self.data.len());

        let mut drawn = SequenceData::empty();
        drawn.k_hists = self.data.k_hists.drain(..count).collect();
        drawn.mono_hists = self.data.mono_hists.drain(..count).collect();
        drawn.headers = self.data.headers.drain(..count).collect();
        drawn.lengths = self.data.lengths.drain(..count).collect();
        drawn
    }

    /// Applies one seeded permutation to all four columns, then advances the seed.
    fn shuffle(&mut self) {
        let size = self.data.len();
        let mut order: Vec<usize> = (0..size).collect();
        let mut rng = SmallRng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);
        self.seed += 1;

        apply_order(&mut self.data.k_hists, &order);
        apply_order(&mut self.data.mono_hists, &order);
        apply_order(&mut self.data.headers, &order);
        apply_order(&mut self.data.lengths, &order);
    }
}

impl<V> Default for Reservoir<V> {
    fn default() -> Self {
        Reservoir::new()
    }
}

impl<V> Drop for Reservoir<V> {
    fn drop(&mut self) {
        if !self.data.is_empty() {
            warn!(
                "A reservoir holding {} points is being dropped",
                self.data.len()
            );
        }
    }
}

fn apply_order<T>(items: &mut Vec<T>, order: &[usize]) {
    let mut placed: Vec<Option<T>> = items.drain(..).map(Some).collect();
    items.extend(order.iter().filter_map(|&i| placed[i].take()));
}
