//! error type of the library.
//!
//! Library functions return `Result<_, PairwiseError>`, the binary wraps them in anyhow.

use thiserror::Error;


#[derive(Error, Debug)]
pub enum PairwiseError {
    /// a parameter is out of its admissible range
    #[error("invalid parameter {name} : {msg}")]
    InvalidParameter { name : &'static str, msg : String },

    /// requested parameter conflicts with the one inherited from sketch store
    #[error("parameter {name} : requested {requested} but sketches were made with {inherited}")]
    ParameterMismatch { name : &'static str, requested : usize, inherited : usize },

    /// hashes of a sketch are not strictly increasing (unsorted or duplicated)
    #[error("sketch {name} (rank {rank}) : hashes not strictly ascending at position {position}")]
    UnsortedSketch { name : String, rank : usize, position : usize },

    /// a sketch has more hashes than sketch size
    #[error("sketch {name} (rank {rank}) has {nb_hashes} hashes, sketch size is {sketch_size}")]
    OversizedSketch { name : String, rank : usize, nb_hashes : usize, sketch_size : usize },

    /// a sketch hash width differs from store parameters
    #[error("sketch {name} (rank {rank}) : hash width does not match store parameters")]
    HashWidthMismatch { name : String, rank : usize },

    /// a job panicked in the worker pool, or the pool lost its workers
    #[error("worker failure while processing job {job}")]
    WorkerPanic { job : usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}  // end of PairwiseError
