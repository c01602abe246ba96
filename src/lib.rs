//! All against all distance estimation between sketches of sequences.
//!
//! Sketches (sorted min hashes) are compared without exhaustive pair enumeration : an inverted index
//! from hash values to sketches gives, for each query, only the sketches sharing at least one hash.
//! Each candidate pair is then merged to estimate jaccard index, Mash distance and a pvalue.
//!
//! The store is processed by rounds to bound the size of the index, comparisons of a round are
//! dispatched to a pool of threads.

pub mod errors;
pub mod utils;
pub mod pairwise;
pub mod answer;

pub use errors::PairwiseError;
