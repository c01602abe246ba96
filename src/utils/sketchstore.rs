//! The module gathers the structures holding sketches to compare: sorted hash lists, sketches and
//! the store of all sketches with their common parameters.
//!
//! The rank of a sketch in the store is its identity during all processing.

use serde::{Deserialize, Serialize};
use serde_json::{to_writer};

use std::path::{Path};
use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter};

use rayon::prelude::*;

use crate::errors::PairwiseError;
use crate::utils::parameters::{SketchParams, HashWidth};


/// Hash values retained by a sketch, sorted in strictly increasing order.
/// The width is chosen once for the whole store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HashList {
    H32(Vec<u32>),
    H64(Vec<u64>),
}


impl HashList {

    pub fn len(&self) -> usize {
        match self {
            HashList::H32(v) => v.len(),
            HashList::H64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_width(&self) -> HashWidth {
        match self {
            HashList::H32(_) => HashWidth::H32,
            HashList::H64(_) => HashWidth::H64,
        }
    }

    /// iterates over hash values widened to u64
    pub fn iter(&self) -> HashIter<'_> {
        match self {
            HashList::H32(v) => HashIter::H32(v.iter()),
            HashList::H64(v) => HashIter::H64(v.iter()),
        }
    }

    /// returns the first position where the list is not strictly increasing
    pub fn first_unsorted(&self) -> Option<usize> {
        match self {
            HashList::H32(v) => first_unsorted(v),
            HashList::H64(v) => first_unsorted(v),
        }
    }
} // end of impl HashList


fn first_unsorted<T : Ord>(v : &[T]) -> Option<usize> {
    v.windows(2).position(|w| w[0] >= w[1]).map(|p| p + 1)
}


pub enum HashIter<'a> {
    H32(std::slice::Iter<'a, u32>),
    H64(std::slice::Iter<'a, u64>),
}

impl <'a> Iterator for HashIter<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        match self {
            HashIter::H32(it) => it.next().map(|h| *h as u64),
            HashIter::H64(it) => it.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            HashIter::H32(it) => it.size_hint(),
            HashIter::H64(it) => it.size_hint(),
        }
    }
} // end of impl Iterator for HashIter


//=======================================================================================


/// A sketch of one sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sketch {
    /// fasta id of sequence
    name : String,
    /// length of sequence in residues. Used only in pvalue computation
    length : u64,
    /// min hashes
    hashes : HashList,
}


impl Sketch {
    pub fn new(name : String, length : u64, hashes : HashList) -> Self {
        Sketch{name, length, hashes}
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_length(&self) -> u64 {
        self.length
    }

    pub fn get_hashes(&self) -> &HashList {
        &self.hashes
    }
}  // end of impl Sketch


//=======================================================================================


/// Sketches to compare, with their common parameters.
/// Built once by loading, read only afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SketchStore {
    params : SketchParams,
    sketches : Vec<Sketch>,
}


impl SketchStore {

    /// allocates and checks sketches are coherent with parameters
    pub fn new(params : SketchParams, sketches : Vec<Sketch>) -> Result<Self, PairwiseError> {
        let store = SketchStore{params, sketches};
        store.check()?;
        Ok(store)
    }

    pub fn get_params(&self) -> &SketchParams {
        &self.params
    }

    /// number of sketches
    pub fn get_nb_sketches(&self) -> usize {
        self.sketches.len()
    }

    pub fn get_sketch(&self, rank : usize) -> &Sketch {
        &self.sketches[rank]
    }

    pub fn get_sketches(&self) -> &[Sketch] {
        &self.sketches
    }

    pub fn get_name(&self, rank : usize) -> &str {
        self.sketches[rank].get_name()
    }

    /// Checks parameters and sketches: hash width, size below sketch size, strictly increasing hashes.
    /// Done in parallel, the error returned is the one of the sketch with lowest rank.
    pub fn check(&self) -> Result<(), PairwiseError> {
        self.params.check()?;
        let width = self.params.get_hash_width();
        let sketch_size = self.params.get_sketch_size();
        let res = self.sketches.par_iter().enumerate().find_map_first(|(rank, sketch)| {
            let hashes = sketch.get_hashes();
            if hashes.get_width() != width {
                return Some(PairwiseError::HashWidthMismatch{name : sketch.name.clone(), rank});
            }
            if hashes.len() > sketch_size {
                return Some(PairwiseError::OversizedSketch{name : sketch.name.clone(), rank, nb_hashes : hashes.len(), sketch_size});
            }
            hashes.first_unsorted().map(|position| PairwiseError::UnsortedSketch{name : sketch.name.clone(), rank, position})
        });
        match res {
            Some(e) => {
                log::error!("SketchStore check failed : {}", e);
                Err(e)
            }
            None => {
                log::debug!("SketchStore check ok, nb sketches : {}", self.sketches.len());
                Ok(())
            }
        }
    } // end of check


    /// Scans sequence lengths and accumulates sequences too long for kmer size.
    pub fn length_warnings(&self) -> LengthWarnings {
        let mut warnings = LengthWarnings::new(&self.params);
        for sketch in &self.sketches {
            warnings.add(&self.params, sketch);
        }
        warnings
    } // end of length_warnings


    /// serialized dump
    pub fn dump_json(&self, filepath : &Path) -> Result<(), PairwiseError> {
        log::info!("dumping sketch store in json file : {:?}, nb sketches : {}", filepath, self.sketches.len());
        //
        let fileres = OpenOptions::new().write(true).create(true).truncate(true).open(filepath);
        if let Err(e) = fileres {
            log::error!("SketchStore dump : dump could not open file {:?}", filepath.as_os_str());
            return Err(PairwiseError::Io(e));
        }
        let mut writer = BufWriter::new(fileres?);
        to_writer(&mut writer, &self)?;
        //
        Ok(())
    } // end of dump_json


    /// reload from a json dump and check sketches
    pub fn reload_json(filepath : &Path) -> Result<SketchStore, PairwiseError> {
        let fileres = OpenOptions::new().read(true).open(filepath);
        if let Err(e) = fileres {
            log::error!("SketchStore reload_json : reload could not open file {:?}", filepath.as_os_str());
            return Err(PairwiseError::Io(e));
        }
        let reader = BufReader::new(fileres?);
        let store : SketchStore = serde_json::from_reader(reader)?;
        store.check()?;
        //
        log::info!("SketchStore, reloaded nb sketches : {:?}, kmer size : {}, sketch size : {}", store.sketches.len(),
                store.params.get_kmer_size(), store.params.get_sketch_size());
        //
        Ok(store)
    } // end of reload_json

}  // end of impl SketchStore


//=======================================================================================


/// Accumulates sequences whose length makes random kmer matches likely.
/// A sequence is too long if its length exceeds warning * kmer_space / (1 - warning).
/// We keep count and the description of the longest one.
#[derive(Clone, Debug)]
pub struct LengthWarnings {
    kmer_size : usize,
    warning : f64,
    length_threshold : f64,
    nb_warnings : usize,
    max_length : u64,
    max_name : String,
    /// probability of random kmer match for the longest sequence
    random_chance : f64,
    /// minimal kmer size satisfying the warning threshold for the longest sequence
    min_kmer_size : usize,
}


impl LengthWarnings {

    pub fn new(params : &SketchParams) -> Self {
        let warning = params.get_warning();
        let length_threshold = (warning * params.get_kmer_space()) / (1. - warning);
        LengthWarnings{kmer_size : params.get_kmer_size(), warning, length_threshold, nb_warnings : 0,
                max_length : 0, max_name : String::new(), random_chance : 0., min_kmer_size : 0}
    }

    fn add(&mut self, params : &SketchParams, sketch : &Sketch) {
        let length = sketch.get_length();
        if (length as f64) <= self.length_threshold {
            return;
        }
        if self.nb_warnings == 0 || length > self.max_length {
            self.max_length = length;
            self.max_name = sketch.get_name().to_string();
            self.random_chance = 1. / (1. + params.get_kmer_space() / length as f64);
            let ratio = length as f64 * (1. - self.warning) / self.warning;
            self.min_kmer_size = (ratio.ln() / (params.get_alphabet_size() as f64).ln()).ceil() as usize;
        }
        self.nb_warnings += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.nb_warnings == 0
    }

    pub fn get_nb_warnings(&self) -> usize {
        self.nb_warnings
    }

    pub fn get_max_length(&self) -> u64 {
        self.max_length
    }

    pub fn get_max_name(&self) -> &str {
        &self.max_name
    }

    pub fn get_random_chance(&self) -> f64 {
        self.random_chance
    }

    pub fn get_min_kmer_size(&self) -> usize {
        self.min_kmer_size
    }

    /// message for the user, None if no sequence was too long
    pub fn message(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut msg = format!("WARNING: for kmer size {}, the probability of a random kmer match ({:.3e}) exceeds the warning threshold ({})",
                    self.kmer_size, self.random_chance, self.warning);
        msg.push_str(&format!(" for sequence \"{}\" of length {}.", self.max_name, self.max_length));
        if self.nb_warnings > 1 {
            msg.push_str(&format!(" {} other sequences are also above the threshold.", self.nb_warnings - 1));
        }
        msg.push_str(&format!(" Distances to these sequences may be underestimated, kmer size should be at least {}.", self.min_kmer_size));
        Some(msg)
    }
} // end of impl LengthWarnings


//=======================================================================================


// end of mod tests
