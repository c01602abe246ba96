//! All against all comparison of a sketch store, processed by rounds.
//!
//! The ranks of the store are split in contiguous ranges. For each range a bucket index is built,
//! then all queries of rank larger than the range start are searched against it by a pool of workers.
//! The number of entries in an index is bounded by range size * sketch size, so the number of rounds
//! bounds the memory used.
//!
//! A pair (i, j), i < j is compared exactly once : in the round whose range contains i, when processing query j.
//! The partition is only a memory device, the set of pairs found does not depend on it.

use std::time::SystemTime;
use cpu_time::ProcessTime;

use crate::errors::PairwiseError;
use crate::utils::sketchstore::SketchStore;
use crate::utils::parameters::PairwiseParams;
use crate::pairwise::bucket::BucketIndex;
use crate::pairwise::candidates::find_candidates;
use crate::pairwise::estimate::{estimate, EstimateParams, PairResult};
use crate::pairwise::pvalue::{SignificanceModel, BinomialTail};
use crate::pairwise::pool::WorkerPool;


/// Pairs accepted for a query in a round, in increasing candidate rank.
/// A query is searched in each round whose range starts below it, complete is set on its last round.
#[derive(Clone, Debug)]
pub struct QueryResult {
    pub query : usize,
    pub pairs : Vec<PairResult>,
    pub complete : bool,
}


/// searches candidates of query in index and keeps those passing distance and pvalue thresholds
pub fn search_query(query : usize, index : &BucketIndex, store : &SketchStore, params : &EstimateParams,
            model : &dyn SignificanceModel) -> QueryResult {
    let query_sketch = store.get_sketch(query);
    let mut pairs = Vec::<PairResult>::new();
    for candidate in find_candidates(query, index, store) {
        if let Some(mut pair) = estimate(query_sketch, store.get_sketch(candidate), params, model) {
            pair.index = candidate;
            pairs.push(pair);
        }
    }
    // later rounds index only ranks >= end
    let complete = query <= index.get_range().1;
    QueryResult{query, pairs, complete}
} // end of search_query



//===================================================================================


/// Partition of ranks [0, nb_sketches) in rounds of equal size, the last round getting the remainder.
#[derive(Copy, Clone, Debug)]
pub struct RoundPlan {
    nb_sketches : usize,
    nb_rounds : usize,
    round_size : usize,
}


impl RoundPlan {

    /// nb_rounds = nb_sketches * sketch_size / capacity / 2, at least 1
    pub fn new(nb_sketches : usize, sketch_size : usize, capacity : usize) -> Self {
        let nb_rounds = nb_sketches.saturating_mul(sketch_size) / capacity.max(1) / 2;
        RoundPlan::with_rounds(nb_sketches, nb_rounds)
    }

    /// imposes the number of rounds, clamped to [1, nb_sketches]
    pub fn with_rounds(nb_sketches : usize, nb_rounds : usize) -> Self {
        let nb_rounds = nb_rounds.clamp(1, nb_sketches.max(1));
        let round_size = nb_sketches / nb_rounds;
        RoundPlan{nb_sketches, nb_rounds, round_size}
    }

    pub fn get_nb_rounds(&self) -> usize {
        self.nb_rounds
    }

    pub fn get_round_size(&self) -> usize {
        self.round_size
    }

    /// range [start, end) of ranks indexed in round
    pub fn get_range(&self, round : usize) -> (usize, usize) {
        assert!(round < self.nb_rounds);
        let start = round * self.round_size;
        let end = if round + 1 == self.nb_rounds { self.nb_sketches } else { start + self.round_size };
        (start, end)
    }
} // end of impl RoundPlan



/// some counts on a completed search
#[derive(Copy, Clone, Debug, Default)]
pub struct SearchSummary {
    pub nb_rounds : usize,
    pub nb_queries : usize,
    pub nb_pairs : usize,
}


//===================================================================================


/// Drives all against all comparison of a store.
pub struct PairwiseSearch<'a> {
    store : &'a SketchStore,
    params : PairwiseParams,
    model : Box<dyn SignificanceModel>,
}


impl <'a> PairwiseSearch<'a> {

    /// search with binomial significance model
    pub fn new(store : &'a SketchStore, params : PairwiseParams) -> Self {
        PairwiseSearch{store, params, model : Box::new(BinomialTail)}
    }

    pub fn with_model(store : &'a SketchStore, params : PairwiseParams, model : Box<dyn SignificanceModel>) -> Self {
        PairwiseSearch{store, params, model}
    }

    /// plan deduced from bucket capacity
    pub fn get_plan(&self) -> RoundPlan {
        RoundPlan::new(self.store.get_nb_sketches(), self.store.get_params().get_sketch_size(), self.params.get_bucket_capacity())
    }

    fn get_estimate_params(&self) -> EstimateParams {
        let sketch_params = self.store.get_params();
        EstimateParams{
            sketch_size : sketch_params.get_sketch_size() as u64,
            kmer_size : sketch_params.get_kmer_size(),
            kmer_space : sketch_params.get_kmer_space(),
            max_distance : self.params.get_max_distance(),
            max_pvalue : self.params.get_max_pvalue(),
        }
    }


    /// runs with plan deduced from capacity. See run_with_plan
    pub fn run<W>(&self, writer : W) -> Result<SearchSummary, PairwiseError>
            where W : FnMut(QueryResult) -> Result<(), PairwiseError> {
        let plan = self.get_plan();
        self.run_with_plan(&plan, writer)
    }


    /// Processes all rounds of plan. Each query result is passed to writer as soon as it is available,
    /// in increasing query rank within a round.
    pub fn run_with_plan<W>(&self, plan : &RoundPlan, mut writer : W) -> Result<SearchSummary, PairwiseError>
            where W : FnMut(QueryResult) -> Result<(), PairwiseError> {
        let mut summary = SearchSummary::default();
        let nb_sketches = self.store.get_nb_sketches();
        if nb_sketches == 0 {
            log::info!("PairwiseSearch : empty sketch store, nothing to do");
            return Ok(summary);
        }
        let estimate_params = self.get_estimate_params();
        let nb_threads = self.params.get_nb_threads();
        let store = self.store;
        let model : &dyn SignificanceModel = self.model.as_ref();
        log::info!("PairwiseSearch nb sketches : {}, nb rounds : {}, nb threads : {}", nb_sketches, plan.get_nb_rounds(), nb_threads);
        //
        for round in 0..plan.get_nb_rounds() {
            let (start, end) = plan.get_range(round);
            log::info!("Round {} of {} ({} - {})", round + 1, plan.get_nb_rounds(), start, end - 1);
            let start_t = SystemTime::now();
            let cpu_start = ProcessTime::now();
            //
            let index = BucketIndex::build(store, start, end, self.params.get_bucket_capacity());
            log::info!("  {}", index.get_stats());
            let index_ref = &index;
            //
            let scope_res = crossbeam_utils::thread::scope(|scope| -> Result<(), PairwiseError> {
                let mut pool = WorkerPool::new(scope, nb_threads, move |query : usize| {
                    search_query(query, index_ref, store, &estimate_params, model)
                });
                let mut emit = |res : QueryResult| -> Result<(), PairwiseError> {
                    if res.complete {
                        summary.nb_queries += 1;
                    }
                    summary.nb_pairs += res.pairs.len();
                    log::trace!("query {} nb pairs : {}", res.query, res.pairs.len());
                    writer(res)
                };
                // no candidate of rank in [start, end) can be smaller than a query of rank <= start
                for query in (start + 1)..nb_sketches {
                    pool.submit(query)?;
                    while pool.output_available()? {
                        emit(pool.pop_output()?)?;
                    }
                }
                while pool.running() {
                    emit(pool.pop_output()?)?;
                }
                Ok(())
            });
            match scope_res {
                Ok(res) => res?,
                Err(_) => {
                    log::error!("a worker thread panicked in round {}", round + 1);
                    return Err(PairwiseError::WorkerPanic{job : start});
                }
            }
            // all workers joined, index can go
            drop(index);
            summary.nb_rounds += 1;
            //
            let cpu_time = cpu_start.elapsed().as_secs_f64();
            let sys_time = start_t.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.);
            log::info!("  round {} done, system time(s) : {:.2}, cpu time(s) : {:.2}", round + 1, sys_time, cpu_time);
            if let Some(usage) = memory_stats::memory_stats() {
                log::info!("  physical memory : {} Mb", usage.physical_mem >> 20);
            }
        }
        log::info!("PairwiseSearch done, nb queries : {}, nb pairs : {}", summary.nb_queries, summary.nb_pairs);
        Ok(summary)
    } // end of run_with_plan

} // end of impl PairwiseSearch



#[cfg(test)]
mod tests {

    use super::*;
    use crate::utils::sketchstore::*;
    use crate::utils::parameters::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn store() -> SketchStore {
        let params = SketchParams::protein(3, 4).unwrap();
        let sketches = vec![
            Sketch::new("a".to_string(), 1000, HashList::H32(vec![1, 2, 3, 4])),
            Sketch::new("b".to_string(), 1000, HashList::H32(vec![1, 2, 3, 5])),
            Sketch::new("c".to_string(), 1000, HashList::H32(vec![5, 6, 7, 8])),
            Sketch::new("d".to_string(), 1000, HashList::H32(vec![1, 2, 3, 4])),
            Sketch::new("e".to_string(), 1000, HashList::H32(vec![100, 200])),
        ];
        SketchStore::new(params, sketches).unwrap()
    }

    #[test]
    fn test_plan() {
        // 100 * 400 / 1024 / 2 = 19 rounds of 5, last gets 10
        let plan = RoundPlan::new(100, 400, 1024);
        assert_eq!(plan.get_nb_rounds(), 19);
        assert_eq!(plan.get_range(0), (0, 5));
        assert_eq!(plan.get_range(18), (90, 100));
        //
        let plan = RoundPlan::new(10, 400, 1 << 25);
        assert_eq!(plan.get_nb_rounds(), 1);
        assert_eq!(plan.get_range(0), (0, 10));
        // never more rounds than sketches
        let plan = RoundPlan::new(3, 1000, 2);
        assert_eq!(plan.get_nb_rounds(), 3);
        assert_eq!(plan.get_range(2), (2, 3));
    }

    #[test]
    fn test_plan_covers_all() {
        for n in 1..30 {
            for r in 1..=n {
                let plan = RoundPlan::with_rounds(n, r);
                let mut next = 0;
                for round in 0..plan.get_nb_rounds() {
                    let (start, end) = plan.get_range(round);
                    assert_eq!(start, next);
                    assert!(end > start);
                    next = end;
                }
                assert_eq!(next, n);
            }
        }
    }

    #[test]
    fn test_search_one_round() {
        log_init_test();
        let store = store();
        let params = PairwiseParams::new(1., 1., 3, 1 << 10).unwrap();
        let search = PairwiseSearch::new(&store, params);
        let mut results = Vec::<QueryResult>::new();
        let summary = search.run(|r| { results.push(r); Ok(()) }).unwrap();
        assert_eq!(summary.nb_rounds, 1);
        // queries 1..5 in order
        let queries : Vec<usize> = results.iter().map(|r| r.query).collect();
        assert_eq!(queries, vec![1, 2, 3, 4]);
        assert!(results.iter().all(|r| r.complete));
        assert_eq!(summary.nb_queries, 4);
        // b ~ a
        let pairs : Vec<usize> = results[0].pairs.iter().map(|p| p.index).collect();
        assert_eq!(pairs, vec![0]);
        // c shares hash 5 with b only
        let pairs : Vec<(usize, u64)> = results[1].pairs.iter().map(|p| (p.index, p.common)).collect();
        assert_eq!(pairs, vec![(1, 1)]);
        // d identical to a, similar to b
        let pairs : Vec<usize> = results[2].pairs.iter().map(|p| p.index).collect();
        assert_eq!(pairs, vec![0, 1]);
        assert_eq!(results[2].pairs[0].distance, 0.);
        assert!(results[3].pairs.is_empty());
        assert_eq!(summary.nb_pairs, 4);
    }

    #[test]
    fn test_search_rounds_same_pairs() {
        log_init_test();
        let store = store();
        let params = PairwiseParams::new(1., 1., 2, 1 << 10).unwrap();
        let search = PairwiseSearch::new(&store, params);
        let collect = |plan : &RoundPlan| -> Vec<(usize, usize, u64, u64)> {
            let mut pairs = Vec::new();
            search.run_with_plan(plan, |r| {
                for p in &r.pairs {
                    pairs.push((r.query, p.index, p.common, p.denom));
                }
                Ok(())
            }).unwrap();
            pairs.sort();
            pairs
        };
        let reference = collect(&RoundPlan::with_rounds(5, 1));
        // each query completed once whatever the partition
        for nb_rounds in 1..=5 {
            let summary = search.run_with_plan(&RoundPlan::with_rounds(5, nb_rounds), |_| Ok(())).unwrap();
            assert_eq!(summary.nb_queries, 4);
            assert_eq!(summary.nb_rounds, nb_rounds);
        }
        for nb_rounds in 2..=5 {
            assert_eq!(collect(&RoundPlan::with_rounds(5, nb_rounds)), reference);
        }
    }

    #[test]
    fn test_writer_error_stops() {
        let store = store();
        let params = PairwiseParams::new(1., 1., 2, 1 << 10).unwrap();
        let search = PairwiseSearch::new(&store, params);
        let res = search.run(|_| Err(PairwiseError::InvalidParameter{name : "writer", msg : "full".to_string()}));
        assert!(matches!(res, Err(PairwiseError::InvalidParameter{name : "writer", ..})));
    }

} // end of mod tests
