//! Candidates for a query : sketches of the current round sharing at least one hash with it.
//!
//! A candidate must have a rank strictly less than the query. This is the only mechanism
//! ensuring each unordered pair is compared once in a run, when processing the query of larger rank,
//! and that no sketch is compared to itself.

use std::collections::BTreeSet;

use crate::utils::sketchstore::SketchStore;
use crate::pairwise::bucket::BucketIndex;


/// returns ranks (ascending, without duplicates) of candidates for query
pub fn find_candidates(query : usize, index : &BucketIndex, store : &SketchStore) -> BTreeSet<usize> {
    let mut targets = BTreeSet::<usize>::new();
    let (start, _) = index.get_range();
    if query <= start {
        return targets;
    }
    for h in store.get_sketch(query).get_hashes().iter() {
        if let Some(ranks) = index.get(h) {
            // ranks in a bucket are increasing
            for &rank in ranks.iter().take_while(|&&r| r < query) {
                targets.insert(rank);
            }
        }
    }
    log::trace!("query {} nb candidates {}", query, targets.len());
    targets
} // end of find_candidates



// end of mod tests
