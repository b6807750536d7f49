//! Error types for ratchet primitives

use thiserror::Error;

/// Errors from the DH, KDF and AEAD primitives.
///
/// Variants never carry key material. Authentication failures are collapsed
/// into a single opaque variant so callers cannot build a decryption oracle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// The random source failed to produce bytes (key or nonce generation)
    #[error("secure random source unavailable")]
    EntropyUnavailable,

    /// Peer public key is low-order or otherwise yields a non-contributory
    /// shared secret
    #[error("invalid DH public key")]
    InvalidPublicKey,

    /// AEAD open failed (wrong key, tampered nonce/ciphertext/tag, truncated
    /// input)
    #[error("decryption failed")]
    DecryptionFailed,

    /// AEAD seal failed (plaintext exceeds the cipher's length limit)
    #[error("encryption failed")]
    EncryptionFailed,
}

impl CryptoError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// A broken random source cannot be worked around by the caller. Every
    /// other variant concerns a single message or key and leaves the caller
    /// free to continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::EntropyUnavailable => true,

            Self::InvalidPublicKey | Self::DecryptionFailed | Self::EncryptionFailed => false,
        }
    }
}
