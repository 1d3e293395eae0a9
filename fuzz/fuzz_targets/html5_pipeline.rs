#![no_main]

use html::dom_snapshot::{DomSnapshotOptions, compare_dom};
use html::test_harness::{FuzzMode, random_chunk_plan, run_full};
use libfuzzer_sys::fuzz_target;
use runtime_parse::{Collaborators, Coordinator, Driver, ParserConfig, PumpStatus};

// Speculative pipeline against the one-shot parse. Byte 0 picks the chunk
// token limit, bytes 1..9 seed the network chunking.
fuzz_target!(|data: &[u8]| {
    if data.len() < 9 || data.len() > 8 * 1024 {
        return;
    }
    let chunk_token_limit = usize::from(data[0] % 16) + 1;
    let seed = u64::from_le_bytes(data[1..9].try_into().unwrap());
    let input = String::from_utf8_lossy(&data[9..]);
    let plan = random_chunk_plan(&input, seed, FuzzMode::Mixed);

    let driver = Driver::new();
    let config = ParserConfig {
        chunk_token_limit,
        scripting: false,
        ..ParserConfig::default()
    };
    let collaborators = Collaborators {
        wake: Some(driver.wake_hook()),
        ..Collaborators::default()
    };
    let mut coordinator = Coordinator::new(config, collaborators).unwrap();
    for chunk in plan.plan.chunks(&input) {
        coordinator.append_bytes(&chunk);
        assert_eq!(driver.run_until_blocked(&mut coordinator), PumpStatus::NeedsInput);
    }
    coordinator.mark_end_of_stream();
    assert_eq!(driver.run_until_blocked(&mut coordinator), PumpStatus::Finished);

    let expected = run_full(&input);
    if let Err(mismatch) = compare_dom(&expected, &coordinator.dom(), DomSnapshotOptions::default()) {
        panic!("pipeline differs ({}):\n{mismatch}", plan.summary);
    }
});
