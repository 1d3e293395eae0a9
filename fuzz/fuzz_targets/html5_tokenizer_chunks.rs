#![no_main]

use html::dom_snapshot::{DomSnapshotOptions, compare_dom};
use html::test_harness::{FuzzMode, random_chunk_plan, run_chunked, run_full};
use libfuzzer_sys::fuzz_target;

// First eight bytes seed the chunk plan; the rest is the document.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 || data.len() > 16 * 1024 {
        return;
    }
    let (seed, body) = data.split_at(8);
    let seed = u64::from_le_bytes(seed.try_into().unwrap());
    let input = String::from_utf8_lossy(body);

    let plan = random_chunk_plan(&input, seed, FuzzMode::Mixed);
    let expected = run_full(&input);
    let actual = run_chunked(&input, &plan.plan);
    if let Err(mismatch) = compare_dom(&expected, &actual, DomSnapshotOptions::default()) {
        panic!("chunked parse differs ({}):\n{mismatch}", plan.summary);
    }
});
