#![no_main]

use libfuzzer_sys::fuzz_target;
use stagememo_opt::{CacheConfig, PassManager};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok((name, mut module)) = stagememo_parser::parse_named(source) else {
        return;
    };
    let before = module.clone();
    // Injection either succeeds or leaves the module untouched.
    if PassManager::standard(&name, CacheConfig::default())
        .run(&mut module)
        .is_err()
    {
        assert_eq!(module, before);
    }
});
