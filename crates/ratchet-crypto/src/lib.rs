//! Double Ratchet Cryptographic Primitives
//!
//! Leaf building blocks for the ratchet state machine: X25519 key pairs,
//! root and chain key derivation, and authenticated encryption. Derivations
//! are pure functions with deterministic outputs. Operations that need
//! randomness take the RNG as a parameter so tests can seed it.
//!
//! # Key Lifecycle
//!
//! ```text
//! Shared secret (external key agreement)
//!        │
//!        ▼
//! Root Key ──DH output──▶ HKDF ──▶ Root Key' + Chain Key
//!                                               │
//!                                               ▼
//!                                HMAC ──▶ Chain Key' + Message Key
//!                                                           │
//!                                                           ▼
//!                                      ChaCha20-Poly1305 ──▶ Ciphertext
//! ```
//!
//! Message keys are used for exactly one seal or open and are zeroized when
//! dropped, so past messages stay protected even if later keys leak.
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain ratchet: each step is one-way and the caller discards the old
//!   chain key
//! - Message key disposal: keys are zeroized on drop
//!
//! Break-in Recovery:
//! - Root ratchet mixes every new DH output with the full ratchet history
//!
//! Authenticity:
//! - ChaCha20-Poly1305 AEAD with a random 96-bit nonce per message
//! - Any failed tag check is reported as the same opaque error
//!
//! Randomness:
//! - Key and nonce generation use `try_fill_bytes`; a failing source is an
//!   error, never a silent fallback

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod dh;
pub mod error;
pub mod kdf;
pub mod keys;
mod random;

pub use aead::{MIN_SEALED_LEN, NONCE_SIZE, TAG_SIZE, open, seal, seal_with_nonce};
pub use dh::{DH_KEY_SIZE, DhKeyPair, DhOutput, DhPublicKey, clamp_scalar};
pub use error::CryptoError;
pub use kdf::{chain_ratchet, root_ratchet};
pub use keys::{ChainKey, KEY_SIZE, MessageKey, RootKey};
