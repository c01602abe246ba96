//! bucket index, candidate search, pair estimation and round scheduling

pub mod bucket;
pub mod candidates;
pub mod estimate;
pub mod pvalue;
pub mod pool;
pub mod rounds;

pub use bucket::{BucketIndex, BucketStats};
pub use candidates::find_candidates;
pub use estimate::{estimate, merge_count, mash_distance, EstimateParams, PairResult};
pub use pvalue::{SignificanceModel, BinomialTail};
pub use pool::WorkerPool;
pub use rounds::{PairwiseSearch, QueryResult, RoundPlan, SearchSummary, search_query};
