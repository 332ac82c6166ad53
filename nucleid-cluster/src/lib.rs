//! `nucleid-cluster` groups DNA sequences with a blockwise mean-shift algorithm that
//! runs on alignment-free identity scores.
//!
//! A [`MeanShift`](crate::mean_shift::MeanShift) instance clusters one block: every
//! sequence seeds a cluster, centers shift toward their in-threshold neighbors, close
//! centers merge greedily and representatives replace synthetic means. The
//! [`MeanShiftLarge`](crate::mean_shift_large::MeanShiftLarge) driver scales this out of
//! core: it streams the file in passes, keeps unassigned points in a shuffled
//! [`Reservoir`](crate::reservoir::Reservoir), and stops when the cluster count settles.
//! [`estimate_threshold`](crate::bandwidth::estimate_threshold) recovers a sensible
//! threshold from the score distribution when none is given.

mod errors;

pub mod bandwidth;
pub mod cluster;
pub mod cluster_info;
pub mod config;
pub mod evaluator;
pub mod mean_shift;
pub mod mean_shift_large;
pub mod reservoir;

pub use errors::ClusterError;
