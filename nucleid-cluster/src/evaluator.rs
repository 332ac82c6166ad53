use log::info;

use nucleid_math::Matrix;

use crate::cluster_info::ClusterRecord;
use crate::errors::ClusterError;

/// Quality indices over the final clustering.
///
/// Works on the all-centers identity matrix plus the per-member scores collected during
/// the final assignment. All distances are on the 1 − identity scale.
pub struct ClusterEvaluator<'a> {
    centers: &'a Matrix,
    clusters: &'a [ClusterRecord],
    total: usize,
}

impl<'a> ClusterEvaluator<'a> {
    pub fn new(
        centers: &'a Matrix,
        clusters: &'a [ClusterRecord],
        total: usize,
    ) -> ClusterEvaluator<'a> {
        ClusterEvaluator {
            centers,
            clusters,
            total,
        }
    }

    /// Davies-Bouldin index: mean over clusters of the worst intra-to-separation ratio.
    pub fn davies_bouldin(&self) -> Result<f64, ClusterError> {
        let n = self.clusters.len();
        if n == 0 {
            return Ok(f64::INFINITY);
        }
        let mut sum = 0.0;
        for i in 0..n {
            let mut worst = f64::NEG_INFINITY;
            for j in 0..n {
                if i == j {
                    continue;
                }
                let separation = 1.0 - self.centers[(i, j)];
                if separation <= 0.0 {
                    return Err(ClusterError::EstimationFailed {
                        reason: format!(
                            "clusters {} and {} have identical centers at this stage",
                            i, j
                        ),
                    });
                }
                let d = (self.clusters[i].intra() + self.clusters[j].intra()) / separation;
                if d > worst {
                    worst = d;
                }
            }
            sum += worst;
        }
        Ok(sum / n as f64)
    }

    /// Dunn index: smallest center separation over the largest intra-cluster spread.
    pub fn dunn(&self) -> f64 {
        let mut max_score = -1.0;
        for r in 0..self.centers.rows() {
            for c in 0..self.centers.cols() {
                if r != c && self.centers[(r, c)] > max_score {
                    max_score = self.centers[(r, c)];
                }
            }
        }
        let min_inter = 1.0 - max_score;

        let max_intra = self
            .clusters
            .iter()
            .map(|c| c.intra())
            .fold(-1.0, f64::max);
        if max_intra > 0.0 {
            min_inter / max_intra
        } else {
            f64::INFINITY
        }
    }

    /// Mean silhouette over every assigned member.
    pub fn silhouette(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for cluster in self.clusters {
            sum += cluster.silhouette_sum();
            count += cluster.len();
        }
        if count > 0 {
            sum / count as f64
        } else {
            f64::INFINITY
        }
    }

    /// Fraction of the input assigned to any cluster.
    pub fn coverage(&self) -> f64 {
        let clustered: usize = self.clusters.iter().map(|c| c.len()).sum();
        clustered as f64 / self.total as f64
    }

    /// Mean within-cluster identity.
    pub fn intra(&self) -> f64 {
        let sum: f64 = self.clusters.iter().map(|c| c.intra()).sum();
        1.0 - sum / self.clusters.len() as f64
    }

    /// Mean identity of each center to its closest other center.
    pub fn inter(&self) -> Result<f64, ClusterError> {
        let rows = self.centers.rows();
        let mut sum = 0.0;
        for r in 0..rows {
            let mut closest = -1.0;
            for c in 0..self.centers.cols() {
                if r != c && self.centers[(r, c)] > closest {
                    closest = self.centers[(r, c)];
                }
            }
            if !(0.0..=1.0).contains(&closest) {
                return Err(ClusterError::EstimationFailed {
                    reason: format!("cannot determine the inter-cluster score, max = {}", closest),
                });
            }
            sum += closest;
        }
        Ok(sum / rows as f64)
    }

    /// Logs every index plus the composite quality
    /// `(1/db · dunn · (1+sil)/2 · intra · (1−inter))^(1/5)`.
    pub fn log_all(&self) -> Result<(), ClusterError> {
        let db = self.davies_bouldin()?;
        let dunn = self.dunn();
        let silhouette = self.silhouette();
        let coverage = self.coverage();
        let intra = self.intra();
        let inter = self.inter()?;

        let quality =
            ((1.0 / db) * dunn * ((1.0 + silhouette) / 2.0) * intra * (1.0 - inter)).powf(0.2);

        info!("\tDavies-Bouldin index (lower is better): {:.4}", db);
        info!("\tDunn index (higher is better): {:.4}", dunn);
        info!("\tSilhouette (higher is better): {:.4}", silhouette);
        info!("\tIntra (higher is better): {:.4}", intra);
        info!("\tInter (lower is better): {:.4}", inter);
        info!("\tCluster quality (higher is better): {:.4}", quality);
        info!("\tCoverage (higher is better): {:.4}", coverage);
        Ok(())
    }
}
