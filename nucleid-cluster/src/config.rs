use crate::errors::ClusterError;

/// Tuning knobs of the streaming mean-shift clusterer.
///
/// Built once from the command line and passed immutably to the driver; the associated
/// constants carry the documented defaults and bounds.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// sequences per all-vs-all block
    pub block_size: usize,
    /// sequences per read block in passes 2..n
    pub v_block_size: usize,
    /// number of data passes over the file
    pub pass_num: usize,
    /// hard cap on mean-shift iterations per block
    pub max_iterations: usize,
    /// assign every sequence to its closest cluster even below the threshold
    pub assign_all: bool,
    /// compute cluster-quality indices after the final assignment
    pub evaluate: bool,
    /// relax the final-assignment threshold by the predictor error
    pub relax: bool,
    /// worker thread count
    pub thread_num: usize,
    /// progress is logged every this many processed sequences
    pub print_block: usize,
}

impl ClusterConfig {
    pub const BLOCK_SIZE: usize = 25_000;
    pub const V_BLOCK_SIZE: usize = 100_000;
    pub const PASS_NUM: usize = 10;
    pub const MAX_ITERATIONS: usize = 100;
    pub const PRINT_BLOCK: usize = 50_000;
    /// Largest all-vs-all matrix side; 46340² stays within a 32-bit cell count.
    pub const MAX_MATRIX_SIZE: usize = 46_340;
    pub const MIN_BLOCK_SIZE: usize = 1_000;
    pub const MIN_PASS_NUM: usize = 2;
    pub const MAX_PASS_NUM: usize = 10;

    /// Sequences per block during threshold estimation.
    pub const BANDWIDTH_BLOCK: usize = 10_000;
    /// Training threshold used while estimating the real one.
    pub const BANDWIDTH_THRESHOLD: f64 = 0.7;
    /// How many estimation rounds feed the median.
    pub const BANDWIDTH_ITERATIONS: usize = 3;

    /// Checks the documented CLI ranges.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.block_size < Self::MIN_BLOCK_SIZE || self.block_size > Self::MAX_MATRIX_SIZE {
            return Err(ClusterError::ConfigurationInvalid {
                reason: format!(
                    "all-vs-all block size must be within [{}, {}], got {}",
                    Self::MIN_BLOCK_SIZE,
                    Self::MAX_MATRIX_SIZE,
                    self.block_size
                ),
            });
        }
        if self.v_block_size < self.block_size {
            return Err(ClusterError::ConfigurationInvalid {
                reason: format!(
                    "read block size {} must be at least the all-vs-all block size {}",
                    self.v_block_size, self.block_size
                ),
            });
        }
        if self.pass_num < Self::MIN_PASS_NUM || self.pass_num > Self::MAX_PASS_NUM {
            return Err(ClusterError::ConfigurationInvalid {
                reason: format!(
                    "pass count must be within [{}, {}], got {}",
                    Self::MIN_PASS_NUM,
                    Self::MAX_PASS_NUM,
                    self.pass_num
                ),
            });
        }
        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            block_size: Self::BLOCK_SIZE,
            v_block_size: Self::V_BLOCK_SIZE,
            pass_num: Self::PASS_NUM,
            max_iterations: Self::MAX_ITERATIONS,
            assign_all: false,
            evaluate: false,
            relax: true,
            thread_num: 1,
            print_block: Self::PRINT_BLOCK,
        }
    }
}
