use std::io::Write as _;
use std::path::Path;

use log::info;

use nucleid_identity::calculator::IdentityCalculator;
use nucleid_io::out_writer;
use nucleid_seq::kmer::HistCell;
use nucleid_seq::sequence::FastaBlockReader;

use crate::cluster_info::{ClusterRecord, MemberRecord, Membership};
use crate::config::ClusterConfig;
use crate::errors::ClusterError;
use crate::evaluator::ClusterEvaluator;
use crate::mean_shift::MeanShift;
use crate::reservoir::Reservoir;

/// The multi-pass, reservoir-backed driver over a whole FASTA file.
///
/// Pass 1 clusters the file block by block, feeding unassigned points through a shuffled
/// reservoir whose survivor clusters are injected back as candidate centers. Later passes
/// re-stream the file, shifting the accumulated centers against every block, and stop
/// early once the cluster count settles. A final pass assigns every sequence, classifies
/// its membership and writes the result records.
pub struct MeanShiftLarge<'c, V> {
    db: &'c Path,
    calculator: &'c IdentityCalculator<V>,
    threshold: f64,
    config: &'c ClusterConfig,
    sequences_seen: usize,
    print_counter: usize,
}

impl<'c, V: HistCell> MeanShiftLarge<'c, V> {
    pub fn new(
        db: &'c Path,
        calculator: &'c IdentityCalculator<V>,
        threshold: f64,
        config: &'c ClusterConfig,
    ) -> MeanShiftLarge<'c, V> {
        MeanShiftLarge {
            db,
            calculator,
            threshold,
            config,
            sequences_seen: 0,
            print_counter: 0,
        }
    }

    /// Runs the whole clustering and writes the result to `out_path`.
    pub fn run(&mut self, out_path: &Path) -> Result<(), ClusterError> {
        let mut ms = self.cluster_with_reservoir()?;
        ms.clear_data();
        self.assign_and_write(&mut ms, out_path)
    }

    /// The pass loop of the streaming algorithm.
    fn cluster_with_reservoir(&mut self) -> Result<MeanShift<'c, V>, ClusterError> {
        info!("Clustering ...");
        let cfg = self.config;
        let threads = cfg.thread_num;

        let mut reader = FastaBlockReader::open(self.db, cfg.block_size)?;
        let block = reader.read_block()?;
        self.sequences_seen += block.len();

        info!("Data run 1 ...");
        let mut ms = MeanShift::cluster_block(
            block,
            self.calculator,
            threads,
            self.threshold,
            cfg.max_iterations,
        )?;
        ms.remove_singles();
        self.print_status(&ms, 0, false);

        if !reader.is_reading() {
            return Ok(ms);
        }

        ms.update_accumulated_mean();
        let mut reservoir: Reservoir<V> = Reservoir::new();
        reservoir.add(ms.find_unassigned()?);
        let mut previous_singles: Option<MeanShift<'c, V>> = None;
        let mut can_add_centers = false;

        for pass in 0..cfg.pass_num {
            let cluster_count_before = ms.cluster_count();
            if pass > 0 {
                reader.set_block_size(cfg.v_block_size);
                info!("Data run {} ...", pass + 1);
            }

            let mut is_reading = reader.is_reading();
            let mut is_full = !reservoir.is_empty();

            while is_reading || is_full {
                if is_reading {
                    ms.clear_data();
                    let block = reader.read_block()?;
                    self.sequences_seen += block.len();
                    ms.update_reference_data(block)?;
                    is_reading = reader.is_reading();
                }

                if can_add_centers {
                    if let Some(singles) = &previous_singles {
                        ms.add_clusters_from(singles)?;
                    }
                }

                if is_reading || can_add_centers {
                    ms.run(1, pass == 0)?;
                    ms.update_accumulated_mean();
                    if pass == 0 {
                        let unassigned = ms.find_unassigned()?;
                        let unassigned_count = unassigned.len();
                        reservoir.add(unassigned);
                        // Shrink the next read so unassigned points keep pace.
                        let mut next = cfg.v_block_size;
                        if unassigned_count > 0 {
                            next = cfg.block_size * cfg.block_size / unassigned_count;
                        }
                        reader.set_block_size(next.min(cfg.v_block_size));
                    }
                    self.print_status(&ms, pass, false);
                }

                if reservoir.len() > cfg.block_size || (!is_reading && !reservoir.is_empty()) {
                    let mut singles = MeanShift::from_data(
                        reservoir.remove(cfg.block_size),
                        self.calculator,
                        threads,
                        self.threshold,
                        cfg.max_iterations,
                    )?;
                    singles.remove_singles();
                    if is_reading {
                        reservoir.add(singles.find_unassigned()?);
                    }
                    previous_singles = Some(singles);
                    can_add_centers = true;
                } else {
                    can_add_centers = false;
                }

                is_reading = reader.is_reading();
                is_full = !reservoir.is_empty();
            }

            if can_add_centers {
                if let Some(singles) = &previous_singles {
                    ms.add_clusters_from(singles)?;
                }
                ms.run(1, false)?;
                ms.update_accumulated_mean();
                self.print_status(&ms, pass, false);
            }

            if !reservoir.is_empty() {
                return Err(ClusterError::ReservoirNotEmpty {
                    size: reservoir.len(),
                });
            }

            self.print_status(&ms, pass, true);

            previous_singles = None;
            reader.restart()?;
            self.sequences_seen = 0;
            self.print_counter = 0;
            can_add_centers = false;

            if pass > 0 && cluster_count_before == ms.cluster_count() {
                info!("Cluster count settled at {}; stopping early", ms.cluster_count());
                break;
            }
        }

        Ok(ms)
    }

    fn print_status(&mut self, ms: &MeanShift<'c, V>, pass: usize, force: bool) {
        if force || self.sequences_seen >= self.print_counter * self.config.print_block {
            if !force {
                self.print_counter += 1;
            }
            info!(
                "\t[pass {}] Processed sequences: {}; found centers: {}",
                pass + 1,
                self.sequences_seen,
                ms.cluster_count()
            );
        }
    }

    /// Streams the file once more, assigns every sequence to its best center, classifies
    /// the membership and writes the records with dense 1-based cluster identifiers.
    fn assign_and_write(
        &mut self,
        ms: &mut MeanShift<'c, V>,
        out_path: &Path,
    ) -> Result<(), ClusterError> {
        info!("Assigning ...");
        let cfg = self.config;
        let error = self.calculator.error();
        let relax_threshold = self.threshold - error;

        // Evaluation and assign-all need every score, not just those above threshold.
        if cfg.evaluate || cfg.assign_all {
            self.calculator.set_can_skip(false);
        }

        let cluster_count = ms.cluster_count();
        let mut records: Vec<ClusterRecord> = (1..=cluster_count).map(ClusterRecord::new).collect();
        let mut singles: Vec<ClusterRecord> = Vec::new();

        let mut reader = FastaBlockReader::open(self.db, cfg.v_block_size)?;
        let mut data_size = 0usize;
        let mut assign_counter = 0usize;

        while reader.is_reading() {
            let block = reader.read_block()?;
            if block.is_empty() {
                break;
            }
            let data = self.calculator.unpack_block(block, cfg.thread_num)?;
            let block_len = data.len();
            data_size += block_len;

            // Per-cluster score lists over the block.
            let all: Vec<usize> = (0..block_len).collect();
            let mut per_cluster: Vec<Vec<f64>> = Vec::with_capacity(cluster_count);
            for cluster in ms.clusters() {
                per_cluster.push(self.calculator.score_one_vs_many(
                    cluster.k_mean(),
                    cluster.mono_mean(),
                    cluster.length(),
                    &data,
                    &all,
                    cfg.thread_num,
                )?);
            }

            for i in 0..block_len {
                let mut best = -1.0f64;
                let mut best_cluster: isize = -1;
                for (c, scores) in per_cluster.iter().enumerate() {
                    if scores[i] > best {
                        best = scores[i];
                        best_cluster = c as isize;
                    }
                }

                let mut second_best = -1.0f64;
                if cfg.evaluate {
                    for scores in &per_cluster {
                        if scores[i] < best && scores[i] > second_best {
                            second_best = scores[i];
                        }
                    }
                }

                let header = data.headers[i].clone();
                if best >= self.threshold && best_cluster >= 0 {
                    records[best_cluster as usize].add_member(MemberRecord {
                        header,
                        score_with_center: best,
                        score_with_neighbor: second_best,
                        membership: Membership::Member,
                    });
                } else if cfg.relax && best >= relax_threshold && best_cluster >= 0 {
                    records[best_cluster as usize].add_member(MemberRecord {
                        header,
                        score_with_center: best,
                        score_with_neighbor: second_best,
                        membership: Membership::Extended,
                    });
                } else if cfg.assign_all && best_cluster >= 0 {
                    records[best_cluster as usize].add_member(MemberRecord {
                        header,
                        score_with_center: best,
                        score_with_neighbor: second_best,
                        membership: Membership::Outside,
                    });
                } else {
                    // A cluster of its own.
                    let mut single = ClusterRecord::new(0);
                    single.add_member(MemberRecord {
                        header,
                        score_with_center: 1.0,
                        score_with_neighbor: best,
                        membership: Membership::Member,
                    });
                    singles.push(single);
                }
            }

            if assign_counter * cfg.print_block <= data_size {
                info!("\tSequences assigned to clusters: {}", data_size);
                assign_counter += 1;
            }
        }

        // Drop empty clusters and renumber everything densely, singles included.
        records.retain(|r| !r.is_empty());
        for (i, record) in records.iter_mut().enumerate() {
            record.set_identifier(i + 1);
        }
        let offset = records.len();
        for (i, single) in singles.iter_mut().enumerate() {
            single.set_identifier(offset + i + 1);
        }

        if cfg.evaluate {
            info!("Evaluating ...");
            let centers = ms.centers_vs_centers(ClusterConfig::MAX_MATRIX_SIZE)?;
            let evaluator = ClusterEvaluator::new(&centers, &records, data_size);
            evaluator.log_all()?;
        }

        let out_name = out_path.to_string_lossy();
        let mut out = out_writer(&out_name, false)?;
        for record in &records {
            write!(out, "{}", record.to_text())?;
        }
        for single in &singles {
            write!(out, "{}", single.to_text())?;
        }
        out.flush()?;
        info!(
            "Wrote {} clusters ({} of them singletons)",
            records.len() + singles.len(),
            singles.len()
        );
        Ok(())
    }
}
