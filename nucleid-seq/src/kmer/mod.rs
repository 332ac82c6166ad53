//! Dense k-mer and monomer count vectors over the DNA alphabet

mod histogram;

pub use histogram::*;
