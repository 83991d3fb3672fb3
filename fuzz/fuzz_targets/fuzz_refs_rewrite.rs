//! Fuzz target for version-constrained advertisement rewriting.

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use gopkg_types::Version;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    major: u8,
    unstable: bool,
    advertisement: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let data = Bytes::from(input.advertisement);
    let constraint = Version::new(u32::from(input.major % 4)).with_unstable(input.unstable);

    if let Ok(rewritten) = gopkg_git::rewrite_refs(&data, constraint) {
        // Output stays well framed.
        assert!(gopkg_git::scan(&rewritten.advertisement).all(|chunk| chunk.is_ok()));
    }
});
