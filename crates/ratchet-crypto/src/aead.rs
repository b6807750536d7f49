//! Message encryption using `ChaCha20-Poly1305`
//!
//! Wire layout: `nonce (12) || ciphertext || tag (16)`. A fresh random nonce
//! is drawn for every message; message keys are single-use, so a nonce never
//! repeats under the same key.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::{CryptoRng, RngCore};

use crate::{error::CryptoError, keys::MessageKey, random::fill_random};

/// Size of the random nonce prefixed to every ciphertext (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Smallest valid sealed message: nonce and tag around an empty plaintext
pub const MIN_SEALED_LEN: usize = NONCE_SIZE + TAG_SIZE;

/// Encrypt `plaintext` under `key` with a freshly drawn nonce.
///
/// `aad` is authenticated but not encrypted; pass an empty slice when no
/// associated data is bound.
///
/// # Errors
///
/// - `EntropyUnavailable` if the nonce cannot be drawn
/// - `EncryptionFailed` if the plaintext exceeds the cipher's limit
pub fn seal<R: RngCore + CryptoRng>(
    key: &MessageKey,
    plaintext: &[u8],
    aad: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>, CryptoError> {
    let mut nonce = [0u8; NONCE_SIZE];
    fill_random(rng, &mut nonce)?;
    seal_with_nonce(key, plaintext, aad, nonce)
}

/// Encrypt with a caller-supplied nonce.
///
/// Pure variant of [`seal`] for deterministic tests. Callers MUST NOT reuse
/// a nonce under the same key.
pub fn seal_with_nonce(
    key: &MessageKey,
    plaintext: &[u8],
    aad: &[u8],
    nonce: [u8; NONCE_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut wire = Vec::with_capacity(NONCE_SIZE + sealed.len());
    wire.extend_from_slice(&nonce);
    wire.extend_from_slice(&sealed);
    Ok(wire)
}

/// Verify and decrypt a sealed message.
///
/// # Errors
///
/// - `DecryptionFailed` for any failure: truncated input, wrong key, wrong
///   associated data, or a modified nonce, ciphertext or tag. No plaintext is
///   released on failure.
pub fn open(key: &MessageKey, wire: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if wire.len() < MIN_SEALED_LEN {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce, sealed) = wire.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad })
        .map_err(|_| CryptoError::DecryptionFailed)
}
