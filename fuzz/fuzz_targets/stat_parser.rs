#![no_main]

use libfuzzer_sys::fuzz_target;
use ocioso::probe::ProcStatSnapshot;

fuzz_target!(|data: &[u8]| {
    // Convert arbitrary bytes to UTF-8 (parsing only sees text)
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing must reject or accept, never panic
        let _ = ProcStatSnapshot::parse(input);
    }
});
