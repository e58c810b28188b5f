#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        // Description parsing and lowering should never panic.
        let _ = stagememo_parser::parse(source);
    }
});
