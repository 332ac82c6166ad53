//! Provides the [`Sequence`](crate::sequence::Sequence) struct and FASTA block streaming

mod reader;
mod sequence;

pub use reader::*;
pub use sequence::*;
