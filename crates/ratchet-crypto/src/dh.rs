//! X25519 key pairs and Diffie-Hellman

use std::fmt;

use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroize;

use crate::{error::CryptoError, random::fill_random};

/// Size of an X25519 public key, private scalar and shared secret
pub const DH_KEY_SIZE: usize = 32;

/// Clamp a private scalar per the X25519 key format.
///
/// Clears the low 3 bits of the first byte, clears the top bit and sets the
/// second-highest bit of the last byte.
pub fn clamp_scalar(scalar: &mut [u8; DH_KEY_SIZE]) {
    scalar[0] &= 0b1111_1000;
    scalar[31] &= 0b0111_1111;
    scalar[31] |= 0b0100_0000;
}

/// Public half of a DH key pair.
///
/// Advertised in every message header and used to index skipped message
/// keys. Not secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DhPublicKey([u8; DH_KEY_SIZE]);

impl DhPublicKey {
    /// Wrap raw public key bytes received from a peer.
    pub fn from_bytes(bytes: [u8; DH_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw public key bytes.
    pub fn as_bytes(&self) -> &[u8; DH_KEY_SIZE] {
        &self.0
    }
}

impl From<[u8; DH_KEY_SIZE]> for DhPublicKey {
    fn from(bytes: [u8; DH_KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Output of a Diffie-Hellman exchange, zeroized on drop.
pub struct DhOutput(SharedSecret);

impl DhOutput {
    /// Raw shared secret bytes.
    pub fn as_bytes(&self) -> &[u8; DH_KEY_SIZE] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for DhOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DhOutput(<redacted>)")
    }
}

/// An X25519 key pair. The private scalar is zeroized on drop.
pub struct DhKeyPair {
    secret: StaticSecret,
    public: DhPublicKey,
}

impl DhKeyPair {
    /// Generate a fresh key pair.
    ///
    /// # Errors
    ///
    /// - `EntropyUnavailable` if the random source fails. Key generation
    ///   never proceeds with partially filled or predictable material.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, CryptoError> {
        let mut scalar = [0u8; DH_KEY_SIZE];
        if let Err(err) = fill_random(rng, &mut scalar) {
            scalar.zeroize();
            return Err(err);
        }

        Ok(Self::from_secret_bytes(scalar))
    }

    /// Import an externally provisioned private scalar.
    ///
    /// The scalar is clamped before use and the working copy is zeroized.
    pub fn from_secret_bytes(mut scalar: [u8; DH_KEY_SIZE]) -> Self {
        clamp_scalar(&mut scalar);
        let secret = StaticSecret::from(scalar);
        scalar.zeroize();

        let public = DhPublicKey(PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    /// Public half of this key pair.
    pub fn public(&self) -> DhPublicKey {
        self.public
    }

    /// Compute the shared secret with a peer's public key.
    ///
    /// # Errors
    ///
    /// - `InvalidPublicKey` if the peer key is all-zero or of low order, so
    ///   the exchange would not depend on our private scalar.
    pub fn diffie_hellman(&self, peer: &DhPublicKey) -> Result<DhOutput, CryptoError> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(peer.0));
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidPublicKey);
        }

        Ok(DhOutput(shared))
    }
}

impl fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhKeyPair").field("public", &self.public).finish_non_exhaustive()
    }
}
