//! Fuzz target for pkt-line scanning.
//!
//! The scanner must never panic, must stop after its first error and must
//! only report spans inside the buffer.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut end = 0;
    let mut errors = 0;
    for chunk in gopkg_git::scan(data) {
        match chunk {
            Ok(chunk) => {
                assert_eq!(chunk.span.start, end);
                assert!(chunk.span.end <= data.len());
                end = chunk.span.end;
            }
            Err(_) => errors += 1,
        }
    }
    assert!(errors <= 1);
});
