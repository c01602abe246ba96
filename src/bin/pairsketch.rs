//! pairsketch : all against all distances between sketches of a sketch store.
//!
//! pairsketch [options] store.json
//!
//! - store.json : a json dump of a sketch store (parameters and sorted min hashes of each sequence).
//!
//! --threads [-p] : number of threads, default to number of cpus.
//! --distance [-d] : maximum distance to report (default 1.).
//! --pvalue [-v] : maximum pvalue to report (default 1.).
//! --table [-t] : table output, one line by query, one column by sketch of lower rank. Pvalues are not reported
//!                but a field is blank if the pair does not pass the thresholds.
//! --kmer [-k], --sketch [-s] : kmer and sketch size are inherited from the store. If given they must match.
//! --capacity : bucket table capacity, a power of 2 (default 2^25). The number of rounds is
//!              nb_sketches * sketch_size / capacity / 2.
//! --output [-o] : output file, default to stdout.
//! --params : dumps parameters used in a json file.


use clap::{Arg, ArgAction, Command};
use anyhow::Context;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use env_logger::{Builder};

use pairsketch::utils::*;
use pairsketch::pairwise::PairwiseSearch;
use pairsketch::answer::{PairwiseWriter, OutputFormat};


// install a logger facility
fn init_log() -> u64 {
    Builder::from_default_env().init();
    log::info!("logger initialized");
    1
}


// the load phase hands its warnings here
fn emit_length_warnings(warnings : &LengthWarnings) {
    if let Some(msg) = warnings.message() {
        log::warn!("{} sequences too long for kmer size", warnings.get_nb_warnings());
        eprintln!("\n{}\n", msg);
    }
}


fn parse_cmd() -> clap::ArgMatches {
    Command::new("pairsketch")
        .version("0.1.0")
        .about("Estimate all pairwise distances of sequences from their sketches. Output fields are [seq-ID-1, seq-ID-2, distance, p-value, shared-hashes]")
        .arg(
            Arg::new("store")
                .value_name("SKETCH_STORE")
                .help("json dump of sketch store")
                .required(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("threads")
                .short('p')
                .long("threads")
                .value_name("THREADS")
                .help("Number of threads to use in parallel, default to number of cpus")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("distance")
                .short('d')
                .long("distance")
                .value_name("MAX_DISTANCE")
                .help("Maximum distance to report, in [0,1]")
                .default_value("1.0")
                .value_parser(clap::value_parser!(f64))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("pvalue")
                .short('v')
                .long("pvalue")
                .value_name("MAX_PVALUE")
                .help("Maximum p-value to report, in [0,1]")
                .default_value("1.0")
                .value_parser(clap::value_parser!(f64))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("table")
                .short('t')
                .long("table")
                .help("Table output (p-values are not reported, fields are blank if they do not meet thresholds)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("kmer_size")
                .short('k')
                .long("kmer")
                .value_name("KMER_SIZE")
                .help("Expected k-mer size, inherited from sketch store")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("sketch_size")
                .short('s')
                .long("sketch")
                .value_name("SKETCH_SIZE")
                .help("Expected sketch size, inherited from sketch store")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("capacity")
                .long("capacity")
                .value_name("CAPACITY")
                .help("Bucket table capacity (power of 2), bounds memory used by a round")
                .default_value("33554432")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_FILE")
                .help("Output file (defaults to stdout)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("params")
                .long("params")
                .value_name("PARAMS_FILE")
                .help("dump parameters used in a json file")
                .action(ArgAction::Set),
        )
        .get_matches()
} // end of parse_cmd



fn run() -> anyhow::Result<()> {
    let matches = parse_cmd();
    //
    let store_name = matches.get_one::<String>("store").context("sketch store file is required")?;
    let nb_threads = matches.get_one::<usize>("threads").copied().unwrap_or_else(num_cpus::get);
    let max_distance = *matches.get_one::<f64>("distance").context("no default for distance")?;
    let max_pvalue = *matches.get_one::<f64>("pvalue").context("no default for pvalue")?;
    let capacity = *matches.get_one::<usize>("capacity").context("no default for capacity")?;
    let format = if matches.get_flag("table") { OutputFormat::Table } else { OutputFormat::List };
    let kmer_size = matches.get_one::<usize>("kmer_size").copied();
    let sketch_size = matches.get_one::<usize>("sketch_size").copied();
    //
    let params = PairwiseParams::new(max_distance, max_pvalue, nb_threads, capacity)?;
    //
    let start_t = chrono::Local::now();
    log::info!("loading sketch store {}", store_name);
    let store = SketchStore::reload_json(Path::new(store_name))
            .with_context(|| format!("cannot load sketch store {}", store_name))?;
    // all configuration errors must be reported before any comparison
    store.get_params().check_requested(kmer_size, sketch_size)
            .context("kmer and sketch size are inherited from the sketch store, leave these options out")?;
    let warnings = store.length_warnings();
    if let Some(params_name) = matches.get_one::<String>("params") {
        params.dump_json(Path::new(params_name))?;
    }
    //
    let out : Box<dyn Write> = match matches.get_one::<String>("output") {
        Some(name) => Box::new(BufWriter::new(File::create(name).with_context(|| format!("cannot create output file {}", name))?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut writer = PairwiseWriter::new(&store, format, out);
    writer.write_header()?;
    //
    let search = PairwiseSearch::new(&store, params);
    let summary = search.run(|res| writer.write(&res).map(|_| ()))?;
    writer.flush()?;
    //
    emit_length_warnings(&warnings);
    let end_t = chrono::Local::now();
    log::info!("pairsketch done, nb rounds : {}, nb queries : {}, nb pairs : {}, elapsed(s) : {}", summary.nb_rounds,
            summary.nb_queries, summary.nb_pairs, (end_t - start_t).num_seconds());
    Ok(())
} // end of run



fn main() {
    let _ = init_log();
    //
    if let Err(e) = run() {
        log::error!("pairsketch failed : {:#}", e);
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
