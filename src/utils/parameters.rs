//! structures related to processing parameters


use std::fs::OpenOptions;
use std::path::{Path};
use std::io::{BufReader, BufWriter };

use serde::{Deserialize, Serialize};
use serde_json::{to_writer};

use crate::errors::PairwiseError;


/// default fraction used to warn for too large sequences with respect to kmer space
pub const DEFAULT_WARNING : f64 = 0.01;

/// default bucket table capacity. Determines the number of rounds
pub const DEFAULT_BUCKET_CAPACITY : usize = 1 << 25;

/// nucleotide alphabet size
pub const ALPHABET_DNA : u32 = 4;

/// amino acid alphabet size
pub const ALPHABET_AA : u32 = 20;


/// width of hash values stored in sketches. All sketches of a store have the same width.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashWidth {
    H32,
    H64,
}

impl HashWidth {
    /// 32 bits hash is sufficient up to kmer of 16 bases
    pub fn for_kmer_size(kmer_size : usize) -> Self {
        if kmer_size > 16 { HashWidth::H64 } else { HashWidth::H32 }
    }
} // end of impl HashWidth


//=========================================================================================

/// Parameters shared by all sketches of a store. They come with the sketches and are never
/// modified by the comparison engine.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SketchParams {
    /// kmer size, in 1..=32
    kmer_size : usize,
    /// max number of hashes retained by sketch
    sketch_size : usize,
    ///
    hash_width : HashWidth,
    /// true if strand is not canonicalized
    noncanonical : bool,
    /// true if case was preserved in kmers
    preserve_case : bool,
    /// 4 for dna, 20 for amino acids
    alphabet_size : u32,
    /// random match probability above which we warn for a sequence length
    warning : f64,
}


impl SketchParams {
    /// returns a checked parameter set
    pub fn new(kmer_size : usize, sketch_size : usize, hash_width : HashWidth, alphabet_size : u32) -> Result<Self, PairwiseError> {
        let params = SketchParams{kmer_size, sketch_size, hash_width, noncanonical : false, preserve_case : false,
                    alphabet_size, warning : DEFAULT_WARNING};
        params.check()?;
        Ok(params)
    }

    /// parameters used for protein pairwise comparisons: noncanonical, hash width from kmer size.
    pub fn protein(kmer_size : usize, sketch_size : usize) -> Result<Self, PairwiseError> {
        let mut params = SketchParams::new(kmer_size, sketch_size, HashWidth::for_kmer_size(kmer_size), ALPHABET_AA)?;
        params.noncanonical = true;
        Ok(params)
    }

    pub fn set_noncanonical(&mut self, noncanonical : bool) {
        self.noncanonical = noncanonical;
    }

    pub fn set_preserve_case(&mut self, preserve_case : bool) {
        self.preserve_case = preserve_case;
    }

    pub fn set_warning(&mut self, warning : f64) -> Result<(), PairwiseError> {
        if !(warning > 0. && warning < 1.) {
            return Err(PairwiseError::InvalidParameter{name : "warning", msg : format!("{} not in ]0,1[", warning)});
        }
        self.warning = warning;
        Ok(())
    }

    /// returns kmer size
    pub fn get_kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// return sketch size
    pub fn get_sketch_size(&self) -> usize {
        self.sketch_size
    }

    pub fn get_hash_width(&self) -> HashWidth {
        self.hash_width
    }

    pub fn get_noncanonical(&self) -> bool {
        self.noncanonical
    }

    pub fn get_preserve_case(&self) -> bool {
        self.preserve_case
    }

    pub fn get_alphabet_size(&self) -> u32 {
        self.alphabet_size
    }

    pub fn get_warning(&self) -> f64 {
        self.warning
    }

    /// number of possible kmers : alphabet_size^kmer_size
    pub fn get_kmer_space(&self) -> f64 {
        (self.alphabet_size as f64).powi(self.kmer_size as i32)
    }

    /// checks admissible ranges
    pub fn check(&self) -> Result<(), PairwiseError> {
        if self.kmer_size == 0 || self.kmer_size > 32 {
            return Err(PairwiseError::InvalidParameter{name : "kmer_size", msg : format!("{} not in 1..=32", self.kmer_size)});
        }
        if self.sketch_size == 0 {
            return Err(PairwiseError::InvalidParameter{name : "sketch_size", msg : "must be positive".to_string()});
        }
        if self.alphabet_size < 2 {
            return Err(PairwiseError::InvalidParameter{name : "alphabet_size", msg : format!("{} is less than 2", self.alphabet_size)});
        }
        if !(self.warning > 0. && self.warning < 1.) {
            return Err(PairwiseError::InvalidParameter{name : "warning", msg : format!("{} not in ]0,1[", self.warning)});
        }
        Ok(())
    }

    /// kmer size and sketch size are inherited from sketches. If the user asked for some values they must match.
    pub fn check_requested(&self, kmer_size : Option<usize>, sketch_size : Option<usize>) -> Result<(), PairwiseError> {
        if let Some(k) = kmer_size {
            if k != self.kmer_size {
                return Err(PairwiseError::ParameterMismatch{name : "kmer_size", requested : k, inherited : self.kmer_size});
            }
        }
        if let Some(s) = sketch_size {
            if s != self.sketch_size {
                return Err(PairwiseError::ParameterMismatch{name : "sketch_size", requested : s, inherited : self.sketch_size});
            }
        }
        Ok(())
    }

}  // end of SketchParams

//==========================================================================================

/// Parameters driving the all against all comparison.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct PairwiseParams {
    /// pairs with a distance above are not reported
    max_distance : f64,
    /// pairs with a pvalue above are not reported
    max_pvalue : f64,
    /// number of workers in pool
    nb_threads : usize,
    /// bucket table capacity (power of 2), bounds the number of sketches indexed in a round
    bucket_capacity : usize,
}


impl Default for PairwiseParams {
    fn default() -> Self {
        PairwiseParams{max_distance : 1., max_pvalue : 1., nb_threads : num_cpus::get(), bucket_capacity : DEFAULT_BUCKET_CAPACITY}
    }
}


impl PairwiseParams {

    pub fn new(max_distance : f64, max_pvalue : f64, nb_threads : usize, bucket_capacity : usize) -> Result<Self, PairwiseError> {
        let params = PairwiseParams{max_distance, max_pvalue, nb_threads, bucket_capacity};
        params.check()?;
        Ok(params)
    }

    pub fn get_max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn get_max_pvalue(&self) -> f64 {
        self.max_pvalue
    }

    pub fn get_nb_threads(&self) -> usize {
        self.nb_threads
    }

    pub fn get_bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }

    pub fn check(&self) -> Result<(), PairwiseError> {
        if !(0. ..= 1.).contains(&self.max_distance) {
            return Err(PairwiseError::InvalidParameter{name : "max_distance", msg : format!("{} not in [0,1]", self.max_distance)});
        }
        if !(0. ..= 1.).contains(&self.max_pvalue) {
            return Err(PairwiseError::InvalidParameter{name : "max_pvalue", msg : format!("{} not in [0,1]", self.max_pvalue)});
        }
        if self.nb_threads == 0 {
            return Err(PairwiseError::InvalidParameter{name : "nb_threads", msg : "must be positive".to_string()});
        }
        if !self.bucket_capacity.is_power_of_two() {
            return Err(PairwiseError::InvalidParameter{name : "bucket_capacity", msg : format!("{} is not a power of 2", self.bucket_capacity)});
        }
        Ok(())
    }


    pub fn dump_json(&self, filepath: &Path) ->  Result<(), PairwiseError> {
        //
        log::info!("dumping PairwiseParams in json file : {:?}", filepath);
        //
        let fileres = OpenOptions::new().write(true).create(true).truncate(true).open(filepath);
        if let Err(e) = fileres {
            log::error!("PairwiseParams dump : dump could not open file {:?}", filepath.as_os_str());
            return Err(PairwiseError::Io(e));
        }
        //
        let mut writer = BufWriter::new(fileres?);
        to_writer(&mut writer, &self)?;
        //
        Ok(())
    } // end of dump_json



    /// reload from a json dump.
    pub fn reload_json(filepath : &Path) -> Result<Self, PairwiseError> {
        log::info!("in PairwiseParams reload_json");
        //
        let fileres = OpenOptions::new().read(true).open(filepath);
        if let Err(e) = fileres {
            log::error!("PairwiseParams reload_json : reload could not open file {:?}", filepath.as_os_str());
            return Err(PairwiseError::Io(e));
        }
        //
        let reader = BufReader::new(fileres?);
        let params : Self = serde_json::from_reader(reader)?;
        params.check()?;
        //
        log::info!("PairwiseParams reload, max distance : {}, max pvalue : {}", params.max_distance, params.max_pvalue);
        //
        Ok(params)
    } // end of reload_json

} // end of impl PairwiseParams


//=====================================================================================


// end of mod tests
