//! Root and chain key derivation
//!
//! # Security Properties
//!
//! - Break-in recovery: every root step mixes a fresh DH output into the full
//!   ratchet history, so a leaked root key stops being useful after the next
//!   exchange
//! - Forward secrecy: chain steps are one-way; neither output reveals the
//!   chain key it came from
//! - Determinism: same inputs always produce the same keys

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{
    dh::DhOutput,
    keys::{ChainKey, KEY_SIZE, MessageKey, RootKey},
};

type HmacSha256 = Hmac<Sha256>;

/// HMAC input for deriving the next chain key
const CHAIN_LABEL: &[u8] = &[0x01];

/// HMAC input for deriving a message key
const MESSAGE_LABEL: &[u8] = &[0x02];

/// Mix a DH output into the root key.
///
/// HKDF-SHA256 with the DH output as input key material and the old root key
/// as salt. The 64-byte output is split into the new root key (first half)
/// and a new chain key (second half).
pub fn root_ratchet(root_key: &RootKey, dh_output: &DhOutput) -> (RootKey, ChainKey) {
    let hkdf = Hkdf::<Sha256>::new(Some(root_key.as_bytes()), dh_output.as_bytes());

    let mut okm = [0u8; 2 * KEY_SIZE];
    let Ok(()) = hkdf.expand(&[], &mut okm) else {
        unreachable!("64 bytes is a valid HKDF-SHA256 output length");
    };

    let mut root = [0u8; KEY_SIZE];
    let mut chain = [0u8; KEY_SIZE];
    root.copy_from_slice(&okm[..KEY_SIZE]);
    chain.copy_from_slice(&okm[KEY_SIZE..]);
    okm.zeroize();

    (RootKey::from_bytes(root), ChainKey::from_bytes(chain))
}

/// Advance a chain key one step.
///
/// Returns the next chain key and the message key for the current position.
/// The caller drops the input chain key, which zeroizes it.
pub fn chain_ratchet(chain_key: &ChainKey) -> (ChainKey, MessageKey) {
    let next = ChainKey::from_bytes(hmac_label(chain_key, CHAIN_LABEL));
    let message = MessageKey::from_bytes(hmac_label(chain_key, MESSAGE_LABEL));
    (next, message)
}

fn hmac_label(chain_key: &ChainKey, label: &[u8]) -> [u8; KEY_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(chain_key.as_bytes()) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(label);
    let result = mac.finalize().into_bytes();

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&result);
    key
}
