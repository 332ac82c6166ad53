//! `nucleid-seq` handles DNA sequences for the nucleid package.
//!
//! The crate provides:
//!  - the [`Sequence`](crate::sequence::Sequence) struct and a FASTA
//!    [`FastaBlockReader`](crate::sequence::FastaBlockReader) that streams a file as blocks of
//!    sequences while remembering its byte offset, so the same file can be re-streamed pass
//!    after pass;
//!  - dense [k-mer histograms](crate::kmer::KmerHistogram) with cells monomorphized to the
//!    narrowest signed width that fits the data;
//!  - the [`Mutator`](crate::mutate::Mutator), which turns a template sequence into labeled
//!    mutated copies for self-supervised training.

mod errors;

pub mod kmer;
pub mod mutate;
pub mod sequence;

pub use errors::SequenceError;
