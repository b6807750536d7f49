//! Fuzz target for Envelope::from_bytes
//!
//! Feeds arbitrary bytes to the envelope and header parsers to find:
//! - Panics on short or oversized input
//! - Length confusion between header and ciphertext
//!
//! The fuzzer should NEVER panic. Every accepted envelope must re-encode to
//! the exact input bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ratchet_core::{Envelope, Header};

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = Envelope::from_bytes(data) {
        assert_eq!(envelope.to_bytes(), data, "envelope encoding must be lossless");
    }

    match Header::from_bytes(data) {
        Ok(header) => assert_eq!(&header.to_bytes()[..], data),
        Err(_) => assert_ne!(data.len(), Header::SIZE, "40-byte input must always parse"),
    }
});
