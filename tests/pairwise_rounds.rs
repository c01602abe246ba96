//! all against all search on a store of pseudo random sketches, compared with exhaustive enumeration.

use std::collections::BTreeMap;

use pairsketch::utils::*;
use pairsketch::pairwise::*;
use pairsketch::answer::{PairwiseWriter, OutputFormat};


fn log_init_test() {
    let _ = env_logger::builder().is_test(true).try_init();
}


const NB_FAMILIES : u32 = 4;
const SKETCH_SIZE : usize = 50;

// sketches of a family draw hashes from overlapping windows of a common pool
fn make_store(nb_sketches : u32) -> SketchStore {
    let params = SketchParams::new(12, SKETCH_SIZE, HashWidth::H32, ALPHABET_DNA).unwrap();
    let mut sketches = Vec::<Sketch>::with_capacity(nb_sketches as usize);
    for i in 0..nb_sketches {
        let family = i % NB_FAMILIES;
        let offset = (i / NB_FAMILIES) * 7;
        let mut hashes : Vec<u32> = (offset..offset + SKETCH_SIZE as u32)
                .map(|j| probminhash::invhash::int32_hash(family * 100_000 + j)).collect();
        hashes.sort_unstable();
        hashes.dedup();
        let name = format!("seq_{}_{}", family, i);
        sketches.push(Sketch::new(name, 5000 + i as u64, HashList::H32(hashes)));
    }
    SketchStore::new(params, sketches).unwrap()
}


// (query, candidate) -> (common, denom, distance)
fn collect(store : &SketchStore, params : PairwiseParams, plan : &RoundPlan) -> BTreeMap<(usize, usize), (u64, u64, f64)> {
    let search = PairwiseSearch::new(store, params);
    let mut pairs = BTreeMap::new();
    let mut last_query = 0;
    search.run_with_plan(plan, |r| {
        for p in &r.pairs {
            assert!(p.index < r.query);
            let old = pairs.insert((r.query, p.index), (p.common, p.denom, p.distance));
            assert!(old.is_none(), "pair ({}, {}) reported twice", r.query, p.index);
        }
        last_query = last_query.max(r.query);
        Ok(())
    }).unwrap();
    assert_eq!(last_query + 1, store.get_nb_sketches());
    pairs
}


fn exhaustive(store : &SketchStore) -> BTreeMap<(usize, usize), (u64, u64, f64)> {
    let mut pairs = BTreeMap::new();
    let k = store.get_params().get_kmer_size();
    for j in 0..store.get_nb_sketches() {
        for i in 0..j {
            let (a, b) = match (store.get_sketch(j).get_hashes(), store.get_sketch(i).get_hashes()) {
                (HashList::H32(a), HashList::H32(b)) => (a, b),
                _ => panic!("unexpected hash width"),
            };
            let (common, denom) = merge_count(a, b, SKETCH_SIZE as u64);
            let distance = mash_distance(common, denom, k);
            if distance < 1. {
                pairs.insert((j, i), (common, denom, distance));
            }
        }
    }
    pairs
}


#[test]
fn test_rounds_match_exhaustive() {
    log_init_test();
    let store = make_store(40);
    let params = PairwiseParams::new(1., 1., 4, 1 << 10).unwrap();
    let reference = exhaustive(&store);
    // families do not share hashes, consecutive members do
    assert!(!reference.is_empty());
    for (j, i) in reference.keys() {
        assert_eq!(j % NB_FAMILIES as usize, i % NB_FAMILIES as usize);
    }
    for nb_rounds in [1, 2, 3, 7, 13, 40] {
        let plan = RoundPlan::with_rounds(store.get_nb_sketches(), nb_rounds);
        let found = collect(&store, params, &plan);
        assert_eq!(found.len(), reference.len(), "nb rounds {}", nb_rounds);
        for (key, (common, denom, distance)) in &reference {
            let (c, d, dist) = found[key];
            assert_eq!((c, d), (*common, *denom));
            assert!((dist - distance).abs() < 1.0e-12);
        }
    }
}


#[test]
fn test_thresholds() {
    log_init_test();
    let store = make_store(32);
    let all_params = PairwiseParams::new(1., 1., 2, 1 << 10).unwrap();
    let plan = RoundPlan::with_rounds(store.get_nb_sketches(), 3);
    let all = collect(&store, all_params, &plan);
    //
    let max_distance = 0.05;
    let close_params = PairwiseParams::new(max_distance, 1., 2, 1 << 10).unwrap();
    let close = collect(&store, close_params, &plan);
    let expected : Vec<(usize, usize)> = all.iter().filter(|(_, v)| v.2 <= max_distance).map(|(k, _)| *k).collect();
    let got : Vec<(usize, usize)> = close.keys().copied().collect();
    assert_eq!(got, expected);
    assert!(got.len() < all.len());
    //
    let strict_params = PairwiseParams::new(1., 1.0e-300, 2, 1 << 10).unwrap();
    let strict = collect(&store, strict_params, &plan);
    assert!(strict.len() <= all.len());
    for key in strict.keys() {
        assert!(all.contains_key(key));
    }
}


#[test]
fn test_reload_and_write() {
    log_init_test();
    let store = make_store(20);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    store.dump_json(&path).unwrap();
    let reloaded = SketchStore::reload_json(&path).unwrap();
    assert_eq!(reloaded.get_nb_sketches(), 20);
    assert!(reloaded.get_params().check_requested(Some(12), Some(SKETCH_SIZE)).is_ok());
    assert!(reloaded.get_params().check_requested(Some(15), None).is_err());
    //
    let params = PairwiseParams::new(1., 1., 3, 1 << 6).unwrap();
    let search = PairwiseSearch::new(&reloaded, params);
    assert!(search.get_plan().get_nb_rounds() > 1);
    let mut out = Vec::<u8>::new();
    let summary = {
        let mut writer = PairwiseWriter::new(&reloaded, OutputFormat::List, &mut out);
        writer.write_header().unwrap();
        let summary = search.run(|r| writer.write(&r).map(|_| ())).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.get_nb_lines(), summary.nb_pairs);
        summary
    };
    assert_eq!(summary.nb_queries, 19);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), summary.nb_pairs);
    for line in text.lines() {
        let fields : Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 5);
        assert!(fields[0].starts_with("seq_"));
        let distance : f64 = fields[2].parse().unwrap();
        assert!((0. ..1.).contains(&distance));
        assert!(fields[4].contains('/'));
    }
}
