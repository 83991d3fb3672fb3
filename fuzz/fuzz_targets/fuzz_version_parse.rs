//! Fuzz target for version parsing.

#![no_main]

use gopkg_types::Version;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Some(version) = Version::parse(s) {
            assert_eq!(version.to_string(), s);
            assert!(version.contains(&version));
        }
    }
});
