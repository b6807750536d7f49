//! Two-party Double Ratchet
//!
//! Session state machine on top of [`ratchet_crypto`]. Each party holds one
//! [`RatchetState`] per conversation, seeded from a root key agreed out of
//! band (X3DH or similar). Every message is sealed under a fresh key, and
//! a new DH exchange happens each time the conversation changes direction.
//!
//! # Message Flow
//!
//! ```text
//!  Alice                                         Bob
//!    │ create(root) / init_peer(bob_pub)          │ create(root) / init_peer(alice_pub)
//!    │                                            │
//!    │ send ── DH step, chain 0 ──(header, ct)──▶ │ receive ── DH step, chain 0
//!    │ send ── chain 1 ───────────(header, ct)──▶ │ receive
//!    │                                            │
//!    │ receive ◀──(header, ct)── DH step, chain 0 │ send
//! ```
//!
//! Out-of-order and missing messages are handled by caching the keys the
//! receiver had to derive ahead of time (bounded by
//! [`RatchetConfig::max_skipped_keys`]).
//!
//! # Usage
//!
//! ```
//! use ratchet_core::{RatchetState, RootKey};
//!
//! let mut alice = RatchetState::create(RootKey::from_bytes([7; 32]))?;
//! let mut bob = RatchetState::create(RootKey::from_bytes([7; 32]))?;
//! let (alice_public, bob_public) = (alice.public_key(), bob.public_key());
//! alice.init_peer(bob_public)?;
//! bob.init_peer(alice_public)?;
//!
//! let (header, ciphertext) = alice.send(b"hello")?;
//! assert_eq!(bob.receive(&header, &ciphertext)?, b"hello");
//! # Ok::<(), ratchet_core::RatchetError>(())
//! ```
//!
//! # Non-goals
//!
//! Key agreement, identity, persistence, and transport are the caller's
//! business. Concurrent first sends from both parties before either has
//! received anything are not supported.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod header;
pub mod skipped;
pub mod state;

pub use config::{DEFAULT_MAX_CHAIN_GAP, MAX_SKIP, RatchetConfig};
pub use error::RatchetError;
pub use header::{Envelope, Header};
pub use ratchet_crypto::{DhKeyPair, DhPublicKey, RootKey};
pub use skipped::{OverflowPolicy, PutOutcome, SkippedKeyId, SkippedKeyStore};
pub use state::RatchetState;
