//! Fuzz target for a two-party ratchet session
//!
//! Drives Alice and Bob through an arbitrary schedule of sends, delayed
//! deliveries, and forged messages.
//!
//! # Strategy
//!
//! - Arbitrary interleaving of sends from both sides
//! - Deliveries from an in-flight queue in arbitrary order
//! - Bit flips and header rewrites on delivered messages
//! - Replays of already delivered messages
//!
//! # Invariants
//!
//! - No operation panics
//! - A genuine message, delivered once and in time, decrypts to its plaintext
//! - A forged or replayed message never yields plaintext
//! - The skipped-key store never exceeds its capacity

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use ratchet_core::{Header, OverflowPolicy, RatchetConfig, RatchetState, RootKey};

type State = RatchetState<ChaCha20Rng>;

#[derive(Debug, Clone, Arbitrary)]
struct SessionScenario {
    root: [u8; 32],
    seed: u64,
    evict_oldest: bool,
    authenticate_header: bool,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    /// Queue a message from one side
    Send { from_alice: bool, message: Vec<u8> },
    /// Deliver (and remove) the in-flight message at `slot`
    Deliver { slot: u8 },
    /// Deliver a copy of the message at `slot` with one bit flipped
    Corrupt { slot: u8, bit: u16 },
    /// Deliver a copy of the message at `slot` with a rewritten counter
    RewriteCounter { slot: u8, send_count: u32 },
    /// Deliver a successfully delivered message again
    Replay { slot: u8 },
}

struct InFlight {
    to_bob: bool,
    header: Header,
    ciphertext: Vec<u8>,
    plaintext: Vec<u8>,
}

fn pick<T>(items: &[T], slot: u8) -> Option<usize> {
    (!items.is_empty()).then(|| usize::from(slot) % items.len())
}

fuzz_target!(|scenario: SessionScenario| {
    let policy =
        if scenario.evict_oldest { OverflowPolicy::EvictOldest } else { OverflowPolicy::RejectNew };
    let config = RatchetConfig::default()
        .with_overflow_policy(policy)
        .with_max_chain_gap(200)
        .with_authenticated_header(scenario.authenticate_header);

    let Ok(mut alice) = State::with_rng(
        RootKey::from_bytes(scenario.root),
        config.clone(),
        ChaCha20Rng::seed_from_u64(scenario.seed),
    ) else {
        return;
    };
    let Ok(mut bob) = State::with_rng(
        RootKey::from_bytes(scenario.root),
        config,
        ChaCha20Rng::seed_from_u64(scenario.seed.wrapping_add(1)),
    ) else {
        return;
    };
    let (alice_public, bob_public) = (alice.public_key(), bob.public_key());
    assert!(alice.init_peer(bob_public).is_ok());
    assert!(bob.init_peer(alice_public).is_ok());

    // Alice opens so both sides agree on the first chain
    let Ok((header, ciphertext)) = alice.send(b"open") else { return };
    assert_eq!(bob.receive(&header, &ciphertext).ok().as_deref(), Some(&b"open"[..]));

    let mut in_flight: Vec<InFlight> = Vec::new();
    let mut delivered: Vec<InFlight> = Vec::new();

    for op in scenario.operations {
        match op {
            Operation::Send { from_alice, message } => {
                let sender = if from_alice { &mut alice } else { &mut bob };
                if let Ok((header, ciphertext)) = sender.send(&message) {
                    in_flight.push(InFlight {
                        to_bob: from_alice,
                        header,
                        ciphertext,
                        plaintext: message,
                    });
                }
            },

            Operation::Deliver { slot } => {
                let Some(idx) = pick(&in_flight, slot) else { continue };
                let message = in_flight.remove(idx);
                let receiver = if message.to_bob { &mut bob } else { &mut alice };

                // Delivery may legitimately fail (the key was discarded or the
                // gap was too large), but never with wrong plaintext
                if let Ok(plaintext) = receiver.receive(&message.header, &message.ciphertext) {
                    assert_eq!(plaintext, message.plaintext, "decrypted to different plaintext");
                    delivered.push(message);
                }
            },

            Operation::Corrupt { slot, bit } => {
                let Some(idx) = pick(&in_flight, slot) else { continue };
                let message = &in_flight[idx];
                let mut forged = message.ciphertext.clone();
                let bit = usize::from(bit) % (forged.len() * 8);
                forged[bit / 8] ^= 1 << (bit % 8);

                let receiver = if message.to_bob { &mut bob } else { &mut alice };
                assert!(receiver.receive(&message.header, &forged).is_err(), "forgery accepted");
            },

            Operation::RewriteCounter { slot, send_count } => {
                let Some(idx) = pick(&in_flight, slot) else { continue };
                let message = &in_flight[idx];
                if send_count == message.header.send_count {
                    continue;
                }
                let header = Header { send_count, ..message.header };

                let receiver = if message.to_bob { &mut bob } else { &mut alice };
                assert!(
                    receiver.receive(&header, &message.ciphertext).is_err(),
                    "message accepted under a rewritten counter"
                );
            },

            Operation::Replay { slot } => {
                let Some(idx) = pick(&delivered, slot) else { continue };
                let message = &delivered[idx];
                let receiver = if message.to_bob { &mut bob } else { &mut alice };
                assert!(
                    receiver.receive(&message.header, &message.ciphertext).is_err(),
                    "replay accepted"
                );
            },
        }

        let capacity = alice.config().max_skipped_keys;
        assert!(alice.skipped_key_count() <= capacity);
        assert!(bob.skipped_key_count() <= capacity);
    }
});
