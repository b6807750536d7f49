//! Error types for ratchet operations

use ratchet_crypto::CryptoError;
use thiserror::Error;

/// Errors from [`crate::RatchetState`] operations.
///
/// No variant carries key material. Every failure leaves the state exactly as
/// it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatchetError {
    /// The secure random source failed during key or nonce generation
    #[error("secure random source unavailable")]
    EntropyUnavailable,

    /// The message could not be decrypted.
    ///
    /// Covers tag mismatch, tampering, replay of an already consumed key and
    /// indices whose key is no longer available. The caller cannot tell
    /// these cases apart.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Peer advertised a low-order or all-zero DH public key
    #[error("invalid DH public key")]
    InvalidPublicKey,

    /// Header asks us to derive more chain steps than allowed in one call
    #[error("skip limit exceeded: {gap} chain steps requested, limit is {limit}")]
    SkipLimitExceeded {
        /// Number of chain steps the header would require
        gap: u32,
        /// Configured `max_chain_gap`
        limit: u32,
    },

    /// Message counter would overflow the 32-bit wire field
    #[error("message counter overflow")]
    CounterOverflow,

    /// `send`/`receive` called before the peer's public key was supplied
    #[error("peer public key not initialized")]
    PeerNotInitialized,

    /// `init_peer` called twice on the same state
    #[error("peer public key already initialized")]
    PeerAlreadyInitialized,

    /// Header bytes have the wrong length
    #[error("malformed header: expected {expected} bytes, got {actual}")]
    MalformedHeader {
        /// Required header length
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// Plaintext too long for the AEAD
    #[error("encryption failed")]
    EncryptionFailed,
}

impl RatchetError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors mean the session cannot make progress without outside
    /// intervention (a working RNG, a fresh key agreement, or a fix to the
    /// caller). Non-fatal errors concern a single message; the transport may
    /// drop it or request retransmission.
    pub fn is_fatal(&self) -> bool {
        match self {
            // Environment or caller broken
            Self::EntropyUnavailable => true,
            Self::CounterOverflow => true,
            Self::PeerNotInitialized => true,
            Self::PeerAlreadyInitialized => true,

            // Per-message failures
            Self::DecryptionFailed => false,
            Self::InvalidPublicKey => false,
            Self::SkipLimitExceeded { .. } => false,
            Self::MalformedHeader { .. } => false,
            Self::EncryptionFailed => false,
        }
    }
}

impl From<CryptoError> for RatchetError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::EntropyUnavailable => Self::EntropyUnavailable,
            CryptoError::InvalidPublicKey => Self::InvalidPublicKey,
            CryptoError::DecryptionFailed => Self::DecryptionFailed,
            CryptoError::EncryptionFailed => Self::EncryptionFailed,
        }
    }
}
