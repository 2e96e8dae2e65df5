//! Demonstrate the process-wide result cache
//!
//! Set DATASLICE_CACHE_POLICY=none|weak|soft to compare behavior.

use dataslice::{LazyDataset, Result, ResultCache};
use std::time::Instant;

fn main() -> Result<()> {
    let dataset = LazyDataset::from_file("example_frame.dslc")?;
    let cache = ResultCache::global();
    println!("Cache policy: {:?}", cache.policy());

    for round in 1..=3 {
        let start = Instant::now();
        let realized = dataset.read_all_cached(cache)?;
        println!(
            "Round {round}: {} elements in {:?}",
            realized.data().len(),
            start.elapsed()
        );
    }

    let stats = cache.stats();
    println!(
        "hits {} / misses {} / loads {}",
        stats.hits(),
        stats.misses(),
        stats.loads()
    );
    Ok(())
}
