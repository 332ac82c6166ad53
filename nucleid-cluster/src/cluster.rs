use std::collections::BTreeSet;

use nucleid_identity::calculator::SequenceData;
use nucleid_seq::kmer::HistCell;

use crate::errors::ClusterError;

fn round_to_cell<V: HistCell>(value: f64) -> V {
    V::from_f64(value.round()).unwrap_or_else(V::zero)
}

/// One mean-shift cluster: a synthetic center plus its bookkeeping.
///
/// The center is the weighted running mean of the k-mer and monomer histograms of every
/// point that ever fell within the threshold (`mean_current`), with the prior pass's
/// committed mean kept separately (`mean_old`). The identity list caches the scores of
/// the center against every point of the current block; the member list holds the
/// in-block points within the threshold as of the last shift.
pub struct Cluster<V> {
    threshold: f64,
    k_mean: Vec<V>,
    mono_mean: Vec<u64>,
    k_old: Option<Vec<V>>,
    mono_old: Option<Vec<u64>>,
    identities: Vec<f64>,
    members: Vec<usize>,
    /// points folded into the running mean, this pass and before
    contribution: u64,
    /// points folded into the committed old mean
    old_contribution: u64,
    /// points whose assignment decision picked this cluster
    assignment: u64,
    has_shifted: bool,
    identities_fresh: bool,
}

impl<V: HistCell> Cluster<V> {
    /// Seeds a cluster from one block point, with the identity-matrix row as its list.
    pub fn seed(
        data: &SequenceData<V>,
        identities: Vec<f64>,
        index: usize,
        threshold: f64,
    ) -> Cluster<V> {
        Cluster {
            threshold,
            k_mean: data.k_hists[index].clone(),
            mono_mean: data.mono_hists[index].clone(),
            k_old: None,
            mono_old: None,
            identities,
            members: Vec::new(),
            contribution: 0,
            old_contribution: 0,
            assignment: 0,
            has_shifted: true,
            identities_fresh: true,
        }
    }

    /// Injects a cluster center carried over from another mean-shift instance.
    pub fn from_mean(
        k_mean: Vec<V>,
        mono_mean: Vec<u64>,
        identities: Vec<f64>,
        contribution: u64,
        assignment: u64,
        threshold: f64,
    ) -> Cluster<V> {
        Cluster {
            threshold,
            k_old: Some(k_mean.clone()),
            mono_old: Some(mono_mean.clone()),
            k_mean,
            mono_mean,
            identities,
            members: Vec::new(),
            contribution,
            old_contribution: contribution,
            assignment,
            has_shifted: true,
            identities_fresh: true,
        }
    }

    /// The weighted flat-kernel shift.
    ///
    /// In-block points within the threshold each weigh one; the committed old mean
    /// weighs its old contribution. With no nearby point the center stays put and
    /// `has_shifted` turns false. Either way the contribution adds the member count.
    pub fn shift_weighted(&mut self, data: &SequenceData<V>) -> Result<(), ClusterError> {
        if !self.identities_fresh {
            return Err(ClusterError::StaleIdentityList);
        }

        let k_size = self.k_mean.len();
        let mono_size = self.mono_mean.len();
        let mut k_temp = vec![0.0f64; k_size];
        let mut mono_temp = vec![0.0f64; mono_size];

        self.members.clear();
        for i in 0..data.len() {
            if self.identities[i] >= self.threshold {
                self.members.push(i);
                let k_hist = &data.k_hists[i];
                for j in 0..k_size {
                    k_temp[j] += k_hist[j].as_();
                }
                let mono_hist = &data.mono_hists[i];
                for j in 0..mono_size {
                    mono_temp[j] += mono_hist[j] as f64;
                }
            }
        }

        let n = self.members.len() as f64;
        if n >= 1.0 {
            if self.old_contribution > 1 {
                let (Some(k_old), Some(mono_old)) = (&self.k_old, &self.mono_old) else {
                    return Err(ClusterError::MissingOldMean);
                };
                let total = self.old_contribution as f64 + n;
                let old_weight = self.old_contribution as f64 / total;
                let new_weight = n / total;
                let per_member = new_weight / n;
                for j in 0..k_size {
                    self.k_mean[j] = round_to_cell(
                        per_member * k_temp[j] + old_weight * k_old[j].as_(),
                    );
                }
                for j in 0..mono_size {
                    self.mono_mean[j] = (per_member * mono_temp[j]
                        + old_weight * mono_old[j] as f64)
                        .round() as u64;
                }
            } else {
                for j in 0..k_size {
                    self.k_mean[j] = round_to_cell(k_temp[j] / n);
                }
                for j in 0..mono_size {
                    self.mono_mean[j] = (mono_temp[j] / n).round() as u64;
                }
            }
            self.has_shifted = true;
        } else {
            self.has_shifted = false;
        }

        self.contribution = self.old_contribution + self.members.len() as u64;
        Ok(())
    }

    /// Replaces the synthetic mean with a representative histogram.
    ///
    /// The identity list stays valid only when the old representative is kept.
    pub fn set_representative(&mut self, k_hist: &[V], mono_hist: &[u64], up_to_date: bool) {
        self.k_mean.copy_from_slice(k_hist);
        self.mono_mean.copy_from_slice(mono_hist);
        self.identities_fresh = up_to_date;
    }

    /// Folds sibling clusters in: member lists union, counters accumulate.
    pub fn merge_simple(&mut self, siblings: Vec<Cluster<V>>) {
        if siblings.is_empty() {
            return;
        }
        let mut union: BTreeSet<usize> = self.members.iter().copied().collect();
        for sibling in siblings {
            self.contribution += sibling.contribution;
            self.old_contribution += sibling.old_contribution;
            self.assignment += sibling.assignment;
            union.extend(sibling.members);
        }
        self.members = union.into_iter().collect();
    }

    /// Commits the current mean as the accumulated old mean.
    pub fn update_accumulated_mean(&mut self) {
        self.k_old = Some(self.k_mean.clone());
        self.mono_old = Some(self.mono_mean.clone());
        self.old_contribution = self.contribution;
    }

    /// Points the cluster at a new block; its identity list must be recomputed.
    pub fn invalidate_identities(&mut self) {
        self.identities_fresh = false;
    }

    /// Installs a freshly computed identity list against the current block.
    pub fn set_identities(&mut self, identities: Vec<f64>) {
        self.identities = identities;
        self.identities_fresh = true;
    }

    pub fn identities(&self) -> &[f64] {
        &self.identities
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn k_mean(&self) -> &[V] {
        &self.k_mean
    }

    pub fn mono_mean(&self) -> &[u64] {
        &self.mono_mean
    }

    pub fn k_old(&self) -> Option<&Vec<V>> {
        self.k_old.as_ref()
    }

    pub fn mono_old(&self) -> Option<&Vec<u64>> {
        self.mono_old.as_ref()
    }

    /// Length of the synthetic center, i.e. the monomer total.
    pub fn length(&self) -> usize {
        self.mono_mean.iter().sum::<u64>() as usize
    }

    /// Length of the committed old center.
    pub fn old_length(&self) -> usize {
        self.mono_old
            .as_ref()
            .map(|m| m.iter().sum::<u64>() as usize)
            .unwrap_or(0)
    }

    pub fn contribution(&self) -> u64 {
        self.contribution
    }

    pub fn old_contribution(&self) -> u64 {
        self.old_contribution
    }

    pub fn assignment(&self) -> u64 {
        self.assignment
    }

    pub fn increment_assignment(&mut self) {
        self.assignment += 1;
    }

    pub fn has_shifted(&self) -> bool {
        self.has_shifted
    }

    pub fn identities_fresh(&self) -> bool {
        self.identities_fresh
    }
}
