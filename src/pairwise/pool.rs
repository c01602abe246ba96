//! A fixed size pool of workers running inside a crossbeam scope.
//!
//! Jobs are sent through a bounded channel of capacity the number of workers, so submission blocks
//! when all workers are busy and the queue is full. Each job gets a submission rank; results come back
//! through an unbounded channel and are delivered in submission order.
//! As workers are scoped threads, jobs can borrow data living outside the scope (the sketch store,
//! the bucket index of the round). The scope joins all workers when it ends, which is the barrier
//! before data borrowed by jobs can be dropped.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crossbeam_channel::{Sender, Receiver, TryRecvError};
use crossbeam_utils::thread::Scope;

use crate::errors::PairwiseError;


pub struct WorkerPool<I, O> {
    job_sender : Sender<(usize, I)>,
    /// None as result means the job panicked
    result_receiver : Receiver<(usize, Option<O>)>,
    nb_submitted : usize,
    /// rank of next result to deliver
    next_out : usize,
    /// results arrived before their turn
    pending : BTreeMap<usize, O>,
}


impl <I, O> WorkerPool<I, O> where I : Send, O : Send {

    /// spawns nb_threads workers in scope, each running task on received jobs.
    /// The workers stop when the pool is dropped.
    pub fn new<'env, F>(scope : &Scope<'env>, nb_threads : usize, task : F) -> Self
            where F : Fn(I) -> O + Send + Sync + 'env,
                  I : 'env,
                  O : 'env {
        assert!(nb_threads > 0, "WorkerPool needs at least one thread");
        let (job_sender, job_receiver) = crossbeam_channel::bounded::<(usize, I)>(nb_threads);
        let (result_sender, result_receiver) = crossbeam_channel::unbounded::<(usize, Option<O>)>();
        let task = Arc::new(task);
        for _ in 0..nb_threads {
            let job_receiver = job_receiver.clone();
            let result_sender = result_sender.clone();
            let task = Arc::clone(&task);
            scope.spawn(move |_| {
                // loop ends when job channel is disconnected and empty
                for (rank, input) in job_receiver.iter() {
                    let output = std::panic::catch_unwind(AssertUnwindSafe(|| (*task)(input))).ok();
                    if output.is_none() {
                        log::error!("job {} panicked", rank);
                    }
                    if result_sender.send((rank, output)).is_err() {
                        break;
                    }
                }
            });
        }
        log::debug!("WorkerPool started with {} threads", nb_threads);
        WorkerPool{job_sender, result_receiver, nb_submitted : 0, next_out : 0, pending : BTreeMap::new()}
    } // end of new


    /// sends a job, blocks while the job queue is full
    pub fn submit(&mut self, input : I) -> Result<(), PairwiseError> {
        let rank = self.nb_submitted;
        if self.job_sender.send((rank, input)).is_err() {
            log::error!("WorkerPool cannot submit job {}, no worker left", rank);
            return Err(PairwiseError::WorkerPanic{job : rank});
        }
        self.nb_submitted += 1;
        Ok(())
    }


    /// true if some submitted job has not yet been delivered
    pub fn running(&self) -> bool {
        self.next_out < self.nb_submitted
    }


    /// non blocking. Collects arrived results and returns true if the next one in submission order is available.
    pub fn output_available(&mut self) -> Result<bool, PairwiseError> {
        loop {
            match self.result_receiver.try_recv() {
                Ok(msg) => self.store(msg)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.pending.contains_key(&self.next_out) && self.running() {
                        return Err(PairwiseError::WorkerPanic{job : self.next_out});
                    }
                    break;
                }
            }
        }
        Ok(self.pending.contains_key(&self.next_out))
    }


    /// blocks until next result in submission order arrives. Must be called only if running() is true.
    pub fn pop_output(&mut self) -> Result<O, PairwiseError> {
        assert!(self.running(), "WorkerPool::pop_output with no job in flight");
        loop {
            if let Some(output) = self.pending.remove(&self.next_out) {
                self.next_out += 1;
                return Ok(output);
            }
            match self.result_receiver.recv() {
                Ok(msg) => self.store(msg)?,
                Err(_) => {
                    log::error!("WorkerPool result channel disconnected, waiting for job {}", self.next_out);
                    return Err(PairwiseError::WorkerPanic{job : self.next_out});
                }
            }
        }
    }


    fn store(&mut self, msg : (usize, Option<O>)) -> Result<(), PairwiseError> {
        match msg {
            (rank, Some(output)) => {
                self.pending.insert(rank, output);
                Ok(())
            }
            (rank, None) => Err(PairwiseError::WorkerPanic{job : rank}),
        }
    }

} // end of impl WorkerPool



#[cfg(test)]
mod tests {

    use super::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_pool_order() {
        log_init_test();
        let data : Vec<u64> = (0..200).collect();
        let data_ref = &data;
        let mut collected = Vec::<u64>::new();
        crossbeam_utils::thread::scope(|scope| {
            // jobs of decreasing cost so that completion order differs from submission order
            let mut pool = WorkerPool::new(scope, 4, move |i : usize| {
                let mut acc = 0u64;
                for _ in 0..(200 - i) * 100 {
                    acc = acc.wrapping_add(data_ref[i]);
                }
                std::hint::black_box(acc);
                data_ref[i] * 2
            });
            for i in 0..data.len() {
                pool.submit(i).unwrap();
                while pool.output_available().unwrap() {
                    collected.push(pool.pop_output().unwrap());
                }
            }
            while pool.running() {
                collected.push(pool.pop_output().unwrap());
            }
        }).unwrap();
        let expected : Vec<u64> = data.iter().map(|x| x * 2).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_pool_panic() {
        log_init_test();
        let res = crossbeam_utils::thread::scope(|scope| {
            let mut pool = WorkerPool::new(scope, 2, |i : usize| {
                if i == 3 {
                    panic!("job 3 fails");
                }
                i
            });
            for i in 0..6 {
                pool.submit(i)?;
            }
            let mut res : Result<(), PairwiseError> = Ok(());
            while pool.running() {
                if let Err(e) = pool.pop_output() {
                    res = Err(e);
                    break;
                }
            }
            res
        }).unwrap();
        assert!(matches!(res, Err(PairwiseError::WorkerPanic{job : 3})));
    }

} // end of mod tests
