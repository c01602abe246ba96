//! dumps results of pairwise comparisons
//!
//! Two formats :
//! - table : a header line "#query" followed by names of all sketches, then one line by query with
//!   its name followed by one column by sketch of smaller rank, holding the distance or blank.
//! - list : one line by accepted pair : query name, candidate name, distance, pvalue, common/denom
//!
//! Fields are tab separated.
//! A query searched over several rounds comes in pieces, in table mode its row is held until the last one.

use std::collections::BTreeMap;
use std::io::Write;

use csv::{QuoteStyle, WriterBuilder};

use crate::errors::PairwiseError;
use crate::utils::sketchstore::SketchStore;
use crate::pairwise::rounds::QueryResult;
use crate::pairwise::estimate::PairResult;


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    List,
}


pub struct PairwiseWriter<'a, W : Write> {
    store : &'a SketchStore,
    format : OutputFormat,
    writer : csv::Writer<W>,
    nb_lines : usize,
    /// table mode : pairs of queries not yet complete
    pending : BTreeMap<usize, Vec<PairResult>>,
}


impl <'a, W : Write> PairwiseWriter<'a, W> {

    pub fn new(store : &'a SketchStore, format : OutputFormat, out : W) -> Self {
        let writer = WriterBuilder::new().delimiter(b'\t').has_headers(false).flexible(true)
                .quote_style(QuoteStyle::Never).from_writer(out);
        PairwiseWriter{store, format, writer, nb_lines : 0, pending : BTreeMap::new()}
    }

    /// in table mode writes names of all sketches, nothing in list mode
    pub fn write_header(&mut self) -> Result<(), PairwiseError> {
        if self.format == OutputFormat::Table {
            let mut record = Vec::<&str>::with_capacity(self.store.get_nb_sketches() + 1);
            record.push("#query");
            record.extend(self.store.get_sketches().iter().map(|s| s.get_name()));
            self.writer.write_record(&record)?;
            self.nb_lines += 1;
        }
        Ok(())
    }

    /// dumps a query result. returns number of pairs written
    pub fn write(&mut self, result : &QueryResult) -> Result<usize, PairwiseError> {
        let store = self.store;
        let query_name = store.get_name(result.query);
        match self.format {
            OutputFormat::Table => {
                if !result.complete {
                    self.pending.entry(result.query).or_default().extend(result.pairs.iter().cloned());
                    return Ok(result.pairs.len());
                }
                let mut record = vec![String::new(); result.query + 1];
                record[0] = query_name.to_string();
                let previous = self.pending.remove(&result.query).unwrap_or_default();
                for pair in previous.iter().chain(result.pairs.iter()) {
                    record[pair.index + 1] = pair.distance.to_string();
                }
                self.writer.write_record(&record)?;
                self.nb_lines += 1;
            }
            OutputFormat::List => {
                for pair in &result.pairs {
                    let distance = pair.distance.to_string();
                    let pvalue = pair.pvalue.to_string();
                    let fraction = format!("{}/{}", pair.common, pair.denom);
                    self.writer.write_record([query_name, store.get_name(pair.index), distance.as_str(),
                                pvalue.as_str(), fraction.as_str()])?;
                    self.nb_lines += 1;
                }
            }
        }
        Ok(result.pairs.len())
    } // end of write

    pub fn get_nb_lines(&self) -> usize {
        self.nb_lines
    }

    pub fn flush(&mut self) -> Result<(), PairwiseError> {
        if !self.pending.is_empty() {
            log::warn!("PairwiseWriter : {} table rows never completed", self.pending.len());
        }
        self.writer.flush()?;
        Ok(())
    }

} // end of impl PairwiseWriter



// end of mod tests
