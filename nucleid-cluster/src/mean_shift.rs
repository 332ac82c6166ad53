use log::debug;

use nucleid_identity::calculator::{IdentityCalculator, SequenceData};
use nucleid_math::Matrix;
use nucleid_seq::kmer::HistCell;
use nucleid_seq::sequence::Sequence;

use crate::cluster::Cluster;
use crate::errors::ClusterError;

/// Mean shift over one block, with identity as the similarity measure.
///
/// Every sequence starts as its own cluster seeded with its row of the block's identity
/// matrix. Each iteration shifts all centers, picks representative histograms, merges
/// centers that got closer than the merge threshold and refreshes stale identity lists;
/// the loop stops when the cluster count holds for two consecutive iterations (or at the
/// iteration cap). Afterwards every in-block point is assigned to its best cluster at or
/// above the threshold.
pub struct MeanShift<'c, V> {
    calculator: &'c IdentityCalculator<V>,
    thread_num: usize,
    /// membership threshold, already relaxed by the predictor error
    threshold: f64,
    /// the original threshold; merging demands the full score
    merge_threshold: f64,
    /// below 0.7 representatives are picked before merging
    low_identity: bool,
    max_iterations: usize,
    data: SequenceData<V>,
    clusters: Vec<Cluster<V>>,
    assignments: Option<Vec<isize>>,
}

impl<'c, V: HistCell> MeanShift<'c, V> {
    /// Threshold at or below which representative selection precedes merging.
    pub const LOW_IDENTITY_CUTOFF: f64 = 0.7;

    /// Clusters a freshly read block.
    pub fn cluster_block(
        block: Vec<Sequence>,
        calculator: &'c IdentityCalculator<V>,
        thread_num: usize,
        threshold: f64,
        max_iterations: usize,
    ) -> Result<MeanShift<'c, V>, ClusterError> {
        let data = calculator.unpack_block(block, thread_num)?;
        Self::from_data(data, calculator, thread_num, threshold, max_iterations)
    }

    /// Clusters an already unpacked arena, e.g. a shuffled draw from the reservoir.
    pub fn from_data(
        data: SequenceData<V>,
        calculator: &'c IdentityCalculator<V>,
        thread_num: usize,
        threshold: f64,
        max_iterations: usize,
    ) -> Result<MeanShift<'c, V>, ClusterError> {
        if data.is_empty() {
            return Err(ClusterError::EmptyInput {
                stage: "mean shift (empty block)",
            });
        }
        let mut ms = MeanShift {
            calculator,
            thread_num: thread_num.max(1),
            threshold: threshold - calculator.error(),
            merge_threshold: threshold,
            low_identity: threshold <= Self::LOW_IDENTITY_CUTOFF,
            max_iterations,
            data,
            clusters: Vec::new(),
            assignments: None,
        };
        ms.init_clusters()?;
        ms.run(ms.max_iterations, true)?;
        ms.remove_empty();
        Ok(ms)
    }

    /// One cluster per sequence, each seeded with its identity-matrix row.
    fn init_clusters(&mut self) -> Result<(), ClusterError> {
        let matrix = self
            .calculator
            .score_all_vs_all(&self.data, self.thread_num)?;
        let size = self.data.len();
        self.clusters = (0..size)
            .map(|i| Cluster::seed(&self.data, matrix.row(i).to_vec(), i, self.threshold))
            .collect();
        Ok(())
    }

    /// The main loop: shift, representative selection and merge (order depending on the
    /// threshold), identity refresh, convergence check, then point assignment.
    pub fn run(&mut self, iterations: usize, can_assign: bool) -> Result<(), ClusterError> {
        let mut stable_count = 0;
        let mut old_cluster_number = self.clusters.len();

        for iteration in 0..iterations {
            self.shift_all()?;
            if self.low_identity {
                self.select_representatives()?;
                self.merge_greedy()?;
            } else {
                self.merge_greedy()?;
                self.select_representatives()?;
            }

            if can_assign {
                self.update_identity_lists()?;
            }

            let new_cluster_number = self.clusters.len();
            debug!(
                "Mean-shift iteration {}: {} clusters",
                iteration, new_cluster_number
            );
            if new_cluster_number == old_cluster_number {
                stable_count += 1;
            } else {
                stable_count = 0;
            }
            if stable_count == 2 {
                break;
            }
            old_cluster_number = new_cluster_number;
        }

        if can_assign {
            self.assign();
        }
        Ok(())
    }

    /// Shifts every cluster, in parallel over the clusters.
    fn shift_all(&mut self) -> Result<(), ClusterError> {
        let data = &self.data;
        for_each_cluster(&mut self.clusters, self.thread_num, &|cluster| {
            cluster.shift_weighted(data)
        })
    }

    /// For every shifted cluster: the member (or the old representative) most similar
    /// to the new synthetic mean becomes the representative histogram.
    fn select_representatives(&mut self) -> Result<(), ClusterError> {
        let data = &self.data;
        let calculator = self.calculator;
        for_each_cluster(&mut self.clusters, self.thread_num, &|cluster| {
            if !cluster.has_shifted() {
                return Ok(());
            }

            let members = cluster.members().to_vec();
            let scores = calculator.score_one_vs_many(
                cluster.k_mean(),
                cluster.mono_mean(),
                cluster.length(),
                data,
                &members,
                1,
            )?;

            // The old representative competes with the members.
            let old_score = match (cluster.k_old(), cluster.mono_old()) {
                (Some(k_old), Some(mono_old)) => {
                    let ratio = IdentityCalculator::<V>::ratio(cluster.length(), cluster.old_length());
                    calculator.score_pair(
                        cluster.k_mean(),
                        k_old,
                        cluster.mono_mean(),
                        mono_old,
                        ratio,
                        cluster.length(),
                        cluster.old_length(),
                    )?
                }
                _ => -1.0,
            };

            let mut best = old_score;
            let mut best_member: Option<usize> = None;
            for (&member, &score) in members.iter().zip(&scores) {
                if score > best {
                    best = score;
                    best_member = Some(member);
                }
            }

            match best_member {
                Some(member) => {
                    cluster.set_representative(
                        &data.k_hists[member],
                        &data.mono_hists[member],
                        false,
                    );
                }
                None => {
                    if let (Some(k_old), Some(mono_old)) =
                        (cluster.k_old().cloned(), cluster.mono_old().cloned())
                    {
                        // Keeping the old representative keeps the identity list valid.
                        cluster.set_representative(&k_old, &mono_old, true);
                    }
                }
            }
            Ok(())
        })
    }

    /// First-come-first-served merging: each unmerged cluster absorbs every later
    /// cluster whose representative scores at or above the merge threshold; the member
    /// with the highest contribution survives (earliest on ties).
    fn merge_greedy(&mut self) -> Result<(), ClusterError> {
        let size = self.clusters.len();
        let mut slots: Vec<Option<Cluster<V>>> = self.clusters.drain(..).map(Some).collect();
        let mut remaining = vec![true; size];
        let mut merged: Vec<Cluster<V>> = Vec::with_capacity(size);

        for i in 0..size {
            if !remaining[i] {
                continue;
            }
            remaining[i] = false;
            let Some(cluster) = slots[i].take() else {
                continue;
            };

            let candidates: Vec<usize> = (i + 1..size).filter(|&h| remaining[h]).collect();
            if candidates.is_empty() {
                merged.push(cluster);
                break;
            }

            let k_list: Vec<&[V]> = candidates
                .iter()
                .map(|&h| slots[h].as_ref().map(|c| c.k_mean()).unwrap_or(&[]))
                .collect();
            let mono_list: Vec<&[u64]> = candidates
                .iter()
                .map(|&h| slots[h].as_ref().map(|c| c.mono_mean()).unwrap_or(&[]))
                .collect();
            let len_list: Vec<usize> = candidates
                .iter()
                .map(|&h| slots[h].as_ref().map(|c| c.length()).unwrap_or(0))
                .collect();

            let scores = self.calculator.score_one_vs_hists(
                cluster.k_mean(),
                cluster.mono_mean(),
                cluster.length(),
                &k_list,
                &mono_list,
                &len_list,
                self.thread_num,
            )?;

            // Group in index order: the seed cluster first, then the absorbed ones.
            let mut group: Vec<Cluster<V>> = vec![cluster];
            for (&h, &score) in candidates.iter().zip(&scores) {
                if score >= self.merge_threshold {
                    remaining[h] = false;
                    if let Some(c) = slots[h].take() {
                        group.push(c);
                    }
                }
            }

            if group.len() == 1 {
                merged.extend(group);
                continue;
            }

            let mut survivor_index = 0;
            for (g, member) in group.iter().enumerate() {
                if member.contribution() > group[survivor_index].contribution() {
                    survivor_index = g;
                }
            }
            let mut survivor = group.swap_remove(survivor_index);
            survivor.merge_simple(group);
            merged.push(survivor);
        }

        self.clusters = merged;
        Ok(())
    }

    /// Recomputes the identity list of every cluster whose representative changed.
    fn update_identity_lists(&mut self) -> Result<(), ClusterError> {
        let all: Vec<usize> = (0..self.data.len()).collect();
        for cluster in &mut self.clusters {
            if cluster.identities_fresh() {
                continue;
            }
            let scores = self.calculator.score_one_vs_many(
                cluster.k_mean(),
                cluster.mono_mean(),
                cluster.length(),
                &self.data,
                &all,
                self.thread_num,
            )?;
            cluster.set_identities(scores);
        }
        Ok(())
    }

    /// Commits every cluster's running mean for the next pass.
    pub fn update_accumulated_mean(&mut self) {
        for cluster in &mut self.clusters {
            cluster.update_accumulated_mean();
        }
    }

    /// Assigns each in-block point to the best cluster at or above the threshold.
    /// The lowest-index cluster wins ties.
    fn assign(&mut self) {
        let size = self.data.len();
        let mut assignments: Vec<isize> = vec![-1; size];
        let mut best_scores: Vec<f64> = vec![-1.0; size];

        for (c, cluster) in self.clusters.iter().enumerate() {
            let identities = cluster.identities();
            for j in 0..size {
                let score = identities[j];
                if score >= self.threshold && score > best_scores[j] {
                    assignments[j] = c as isize;
                    best_scores[j] = score;
                }
            }
        }

        for &a in &assignments {
            if a >= 0 {
                self.clusters[a as usize].increment_assignment();
            }
        }
        self.assignments = Some(assignments);
    }

    /// Copies of every point no assignment decision reached.
    pub fn find_unassigned(&self) -> Result<SequenceData<V>, ClusterError> {
        let Some(assignments) = &self.assignments else {
            return Err(ClusterError::EmptyInput {
                stage: "find_unassigned before any assignment",
            });
        };
        let mut unassigned = SequenceData::empty();
        for (i, &a) in assignments.iter().enumerate() {
            if a == -1 {
                unassigned.k_hists.push(self.data.k_hists[i].clone());
                unassigned.mono_hists.push(self.data.mono_hists[i].clone());
                unassigned.headers.push(self.data.headers[i].clone());
                unassigned.lengths.push(self.data.lengths[i]);
            }
        }
        Ok(unassigned)
    }

    /// Swaps a new block in as the reference data; every identity list goes stale and is
    /// recomputed against the new block. No new clusters appear here.
    pub fn update_reference_data(&mut self, block: Vec<Sequence>) -> Result<(), ClusterError> {
        self.data = self.calculator.unpack_block(block, self.thread_num)?;
        self.assignments = None;
        for cluster in &mut self.clusters {
            cluster.invalidate_identities();
        }
        self.update_identity_lists()
    }

    /// Adopts the clusters of another mean-shift instance as additional centers.
    pub fn add_clusters_from(&mut self, other: &MeanShift<'_, V>) -> Result<(), ClusterError> {
        let all: Vec<usize> = (0..self.data.len()).collect();
        for cluster in &other.clusters {
            let scores = self.calculator.score_one_vs_many(
                cluster.k_mean(),
                cluster.mono_mean(),
                cluster.length(),
                &self.data,
                &all,
                self.thread_num,
            )?;
            self.clusters.push(Cluster::from_mean(
                cluster.k_mean().to_vec(),
                cluster.mono_mean().to_vec(),
                scores,
                cluster.contribution(),
                cluster.assignment(),
                self.threshold,
            ));
        }
        Ok(())
    }

    /// The all-centers identity matrix, for evaluation.
    pub fn centers_vs_centers(&self, max_side: usize) -> Result<Matrix, ClusterError> {
        let size = self.clusters.len();
        if size > max_side {
            return Err(ClusterError::MatrixTooLarge {
                size,
                limit: max_side,
            });
        }

        let mut matrix = Matrix::zeros(size, size);
        for i in 0..size {
            matrix[(i, i)] = 1.0;
            let cluster = &self.clusters[i];
            let later: Vec<usize> = (i + 1..size).collect();
            let k_list: Vec<&[V]> = later.iter().map(|&j| self.clusters[j].k_mean()).collect();
            let mono_list: Vec<&[u64]> =
                later.iter().map(|&j| self.clusters[j].mono_mean()).collect();
            let len_list: Vec<usize> = later.iter().map(|&j| self.clusters[j].length()).collect();
            let scores = self.calculator.score_one_vs_hists(
                cluster.k_mean(),
                cluster.mono_mean(),
                cluster.length(),
                &k_list,
                &mono_list,
                &len_list,
                self.thread_num,
            )?;
            for (&j, score) in later.iter().zip(scores) {
                matrix[(i, j)] = score;
                matrix[(j, i)] = score;
            }
        }
        Ok(matrix)
    }

    /// Drops clusters that never accumulated a second point.
    pub fn remove_singles(&mut self) {
        self.clusters.retain(|c| c.contribution() > 1);
    }

    /// Drops clusters no point was assigned to, at block end.
    pub fn remove_empty(&mut self) {
        self.clusters.retain(|c| c.assignment() > 0);
    }

    /// Releases the block arena; the clusters and their means stay alive.
    pub fn clear_data(&mut self) {
        self.data = SequenceData::empty();
        self.assignments = None;
    }

    pub fn clusters(&self) -> &[Cluster<V>] {
        &self.clusters
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn block_len(&self) -> usize {
        self.data.len()
    }
}

/// Applies `work` to every cluster with a static partition across the workers.
fn for_each_cluster<V: HistCell>(
    clusters: &mut [Cluster<V>],
    thread_num: usize,
    work: &(dyn Fn(&mut Cluster<V>) -> Result<(), ClusterError> + Sync),
) -> Result<(), ClusterError> {
    if clusters.is_empty() {
        return Ok(());
    }
    let threads = thread_num.clamp(1, clusters.len());
    if threads == 1 {
        for cluster in clusters.iter_mut() {
            work(cluster)?;
        }
        return Ok(());
    }

    let chunk = clusters.len().div_ceil(threads);
    let mut results: Vec<Result<(), ClusterError>> = Vec::with_capacity(threads);
    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for part in clusters.chunks_mut(chunk) {
            handles.push(scope.spawn(move || {
                for cluster in part.iter_mut() {
                    work(cluster)?;
                }
                Ok(())
            }));
        }
        for handle in handles {
            match handle.join() {
                Ok(result) => results.push(result),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    });
    results.into_iter().collect()
}
