//! Inverted index from hash values to ranks of sketches containing them.
//!
//! An index covers a contiguous range of ranks of the store, it is built at the beginning of a round
//! and dropped at its end. Buckets are keyed by the full hash value, the capacity given at construction
//! only sizes the table and the statistics.

use fxhash::FxHashMap;

use crate::utils::sketchstore::SketchStore;


pub struct BucketIndex {
    /// hash -> ranks, ranks are pushed in increasing order
    buckets : FxHashMap<u64, Vec<usize>>,
    /// range of ranks indexed [start, end)
    start : usize,
    end : usize,
    capacity : usize,
}


impl BucketIndex {

    /// indexes all hashes of sketches of rank in [start, end)
    pub fn build(store : &SketchStore, start : usize, end : usize, capacity : usize) -> Self {
        assert!(start <= end && end <= store.get_nb_sketches(), "BucketIndex::build bad range [{}, {})", start, end);
        log::info!("  creating bucket index for sketches [{}, {})", start, end);
        //
        let nb_hashes : usize = store.get_sketches()[start..end].iter().map(|s| s.get_hashes().len()).sum();
        let mut buckets = FxHashMap::<u64, Vec<usize>>::default();
        buckets.reserve(nb_hashes.min(capacity));
        for rank in start..end {
            for h in store.get_sketch(rank).get_hashes().iter() {
                buckets.entry(h).or_default().push(rank);
            }
        }
        log::debug!("  bucket index done, nb hashes : {}, nb distinct : {}", nb_hashes, buckets.len());
        BucketIndex{buckets, start, end, capacity}
    } // end of build


    /// ranks of sketches containing hash
    pub fn get(&self, hash : u64) -> Option<&[usize]> {
        self.buckets.get(&hash).map(|v| v.as_slice())
    }

    pub fn get_range(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// number of non empty buckets
    pub fn get_nb_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }


    /// Bucket size statistics over a table of `capacity` slots.
    /// Slots not occupied by a hash are counted as empty buckets.
    pub fn get_stats(&self) -> BucketStats {
        let nb_slots = self.capacity.max(self.buckets.len());
        let nb_empty = nb_slots - self.buckets.len();
        let total : usize = self.buckets.values().map(|v| v.len()).sum();
        let mean = total as f64 / nb_slots as f64;
        //
        let mut min = if nb_empty > 0 { 0 } else { usize::MAX };
        let mut max = 0;
        let mut var = nb_empty as f64 * mean * mean;
        for v in self.buckets.values() {
            min = min.min(v.len());
            max = max.max(v.len());
            var += (v.len() as f64 - mean).powi(2);
        }
        if nb_slots == 0 {
            min = 0;
        }
        let stddev = if nb_slots > 0 { (var / nb_slots as f64).sqrt() } else { 0. };
        let empty_fraction = if nb_slots > 0 { nb_empty as f64 / nb_slots as f64 } else { 1. };
        BucketStats{mean, stddev, min, max, empty_fraction}
    } // end of get_stats

} // end of impl BucketIndex



/// bucket size distribution, for logging
#[derive(Copy, Clone, Debug)]
pub struct BucketStats {
    pub mean : f64,
    pub stddev : f64,
    pub min : usize,
    pub max : usize,
    pub empty_fraction : f64,
}


impl std::fmt::Display for BucketStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bucket mean : {:.3e}\tstddev : {:.3e}\tmin : {}\tmax : {}\tempty : {}%", self.mean, self.stddev,
                self.min, self.max, (100. * self.empty_fraction) as usize)
    }
}



// end of mod tests
