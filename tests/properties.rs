//! Traversal properties over generated payloads: termination on
//! arbitrary bytes, and exactly-once visiting of well-formed records.

mod common;

use common::klv;
use gpmf_parse::{FourCC, GpmfError, SearchMode, StreamCursor};
use proptest::prelude::*;

proptest! {
    /// Tolerant traversal over arbitrary bytes never panics and always
    /// terminates: every step advances by at least one record header.
    #[test]
    fn traversal_terminates_on_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
        if let Ok(mut cursor) = StreamCursor::new(&bytes) {
            let mut steps = 0usize;
            while cursor.next(SearchMode::RECURSE.tolerant()).is_ok() {
                steps += 1;
                // worst case one record per 4-byte word
                prop_assert!(steps <= bytes.len());
            }
        }
    }

    /// Strict traversal over arbitrary bytes fails cleanly or
    /// terminates; it never panics or loops.
    #[test]
    fn strict_traversal_fails_cleanly(bytes in proptest::collection::vec(any::<u8>(), 0..1024)) {
        if let Ok(mut cursor) = StreamCursor::new(&bytes) {
            let mut steps = 0usize;
            loop {
                match cursor.next(SearchMode::RECURSE) {
                    Ok(_) => {
                        steps += 1;
                        prop_assert!(steps <= bytes.len());
                    }
                    Err(_) => break,
                }
            }
        }
    }

    /// One find_next pass from the root visits every well-formed
    /// top-level record exactly once.
    #[test]
    fn top_level_records_visited_once(
        payloads in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..16),
            1..24,
        )
    ) {
        let mut bytes = Vec::new();
        for data in &payloads {
            // u8 elements: struct size 1, repeat = element count
            bytes.extend(klv(b"ACCL", b'B', 1, data.len() as u16, data));
        }

        let mut cursor = StreamCursor::new(&bytes).unwrap();
        let mut visited = 0usize;
        loop {
            match cursor.find_next(FourCC::from_str("ACCL"), SearchMode::CURRENT_LEVEL) {
                Ok(record) => {
                    prop_assert_eq!(record.raw_bytes(), payloads[visited].as_slice());
                    visited += 1;
                }
                Err(GpmfError::NotFound) => break,
                Err(err) => panic!("unexpected traversal error: {err}"),
            }
        }
        prop_assert_eq!(visited, payloads.len());
    }
}
