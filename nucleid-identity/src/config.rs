use crate::errors::IdentityError;

/// Tuning knobs of the self-supervised trainer.
///
/// One immutable instance is built up front and handed to every component that needs it;
/// the associated constants are the defaults of the original training recipe.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// lowest identity the negative mutation schedule reaches down to
    pub min_id: f64,
    /// mutated copies per template; must be even
    pub mut_per_template: usize,
    /// how many sequences the training block holds
    pub block_size: usize,
    /// subtracted from `ceil(log4(mean length))` when estimating k
    pub k_relax: usize,
    /// bounds of one mutation block
    pub min_block: usize,
    pub max_block: usize,
    /// mutation model switches
    pub single_point: bool,
    pub block: bool,
    pub inversion: bool,
    pub translocation: bool,
}

impl TrainingConfig {
    pub const MIN_ID: f64 = 0.0;
    pub const MUT_PER_TEMPLATE: usize = 10;
    pub const BLOCK_SIZE: usize = 1000;
    pub const K_RELAX: usize = 1;
    pub const MIN_BLOCK: usize = 2;
    pub const MAX_BLOCK: usize = 5;

    /// Checks the documented ranges; everything else in the trainer may assume them.
    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.mut_per_template % 2 != 0 || self.mut_per_template == 0 {
            return Err(IdentityError::ConfigurationInvalid {
                reason: format!(
                    "mutations per template must be even and positive, got {}",
                    self.mut_per_template
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.min_id) {
            return Err(IdentityError::ConfigurationInvalid {
                reason: format!("minimum identity must be within [0, 1], got {}", self.min_id),
            });
        }
        if self.min_block <= 1 || self.min_block > self.max_block {
            return Err(IdentityError::ConfigurationInvalid {
                reason: format!(
                    "mutation block bounds must satisfy 2 <= min <= max, got [{}, {}]",
                    self.min_block, self.max_block
                ),
            });
        }
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            min_id: Self::MIN_ID,
            mut_per_template: Self::MUT_PER_TEMPLATE,
            block_size: Self::BLOCK_SIZE,
            k_relax: Self::K_RELAX,
            min_block: Self::MIN_BLOCK,
            max_block: Self::MAX_BLOCK,
            single_point: true,
            block: true,
            inversion: false,
            translocation: false,
        }
    }
}
