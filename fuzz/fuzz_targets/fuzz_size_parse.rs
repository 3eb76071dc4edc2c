#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(bytes) = capsweep::parse_size(text) {
            let _ = capsweep::format_size(bytes);
        }
    }
});
