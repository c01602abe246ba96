//! Distance estimation between two sketches by merging their sorted hash lists.
//!
//! The jaccard index is estimated on the union restricted to the sketch_size smallest hashes,
//! then converted to a mutation rate per site (Mash distance) : d = -ln(2J/(1+J)) / k


use crate::utils::sketchstore::{Sketch, HashList};
use crate::pairwise::pvalue::SignificanceModel;


/// Result of comparison of a query with a candidate sketch
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PairResult {
    /// rank of candidate in store
    pub index : usize,
    /// number of common hashes
    pub common : u64,
    /// size of examined union, at most sketch size
    pub denom : u64,
    pub distance : f64,
    pub pvalue : f64,
}


/// Thresholds and constants shared by all comparisons of a run.
#[derive(Copy, Clone, Debug)]
pub struct EstimateParams {
    pub sketch_size : u64,
    pub kmer_size : usize,
    pub kmer_space : f64,
    pub max_distance : f64,
    pub max_pvalue : f64,
}


/// Counts common hashes in the union of the `sketch_size` smallest hashes of a and b.
/// Returns (common, denom).
///
/// If one list is exhausted before sketch_size hashes have been examined, the remaining
/// hashes of the other are added to denom (capped at sketch_size). This is an approximation of
/// the union completion, hashes left are not checked against anything.
pub fn merge_count<T : Ord>(a : &[T], b : &[T], sketch_size : u64) -> (u64, u64) {
    let mut i = 0;
    let mut j = 0;
    let mut common : u64 = 0;
    let mut denom : u64 = 0;
    //
    while denom < sketch_size && i < a.len() && j < b.len() {
        if a[i] < b[j] {
            i += 1;
        }
        else if b[j] < a[i] {
            j += 1;
        }
        else {
            i += 1;
            j += 1;
            common += 1;
        }
        denom += 1;
    }
    //
    if denom < sketch_size {
        denom += (a.len() - i) as u64;
        denom += (b.len() - j) as u64;
        denom = denom.min(sketch_size);
    }
    (common, denom)
} // end of merge_count



/// Mash distance from common and denom counts.
/// Degenerate cases are explicit to avoid -0, inf or NaN.
pub fn mash_distance(common : u64, denom : u64, kmer_size : usize) -> f64 {
    if denom == 0 {
        // two empty sketches
        return 1.;
    }
    if common == denom {
        return 0.;
    }
    if common == 0 {
        return 1.;
    }
    let jaccard = common as f64 / denom as f64;
    -(2. * jaccard / (1. + jaccard)).ln() / kmer_size as f64
}



/// Compares two sketches. Returns None if the distance is above max_distance, equal to 1 (no similarity),
/// or if the pvalue is above max_pvalue.
/// The index field of the result is set to 0, the caller sets it.
pub fn estimate(sketch_a : &Sketch, sketch_b : &Sketch, params : &EstimateParams, model : &dyn SignificanceModel) -> Option<PairResult> {
    let (common, denom) = match (sketch_a.get_hashes(), sketch_b.get_hashes()) {
        (HashList::H32(a), HashList::H32(b)) => merge_count(a, b, params.sketch_size),
        (HashList::H64(a), HashList::H64(b)) => merge_count(a, b, params.sketch_size),
        _ => panic!("estimate : sketches {} and {} have different hash widths", sketch_a.get_name(), sketch_b.get_name()),
    };
    let distance = mash_distance(common, denom, params.kmer_size);
    if distance > params.max_distance || distance == 1. {
        return None;
    }
    let pvalue = model.pvalue(common, sketch_a.get_length(), sketch_b.get_length(), params.kmer_space, denom);
    log::trace!("estimate {} {} common {} denom {} distance {:.3e} pvalue {:.3e}", sketch_a.get_name(), sketch_b.get_name(),
                common, denom, distance, pvalue);
    if pvalue > params.max_pvalue {
        return None;
    }
    Some(PairResult{index : 0, common, denom, distance, pvalue})
} // end of estimate



// end of mod tests
