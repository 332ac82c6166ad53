//! The mixed single-point/block mutation model used to synthesize labeled training pairs

mod mutator;

pub use mutator::*;
