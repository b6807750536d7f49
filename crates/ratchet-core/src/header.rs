//! Message header and envelope wire formats.
//!
//! The header travels in the clear next to every ciphertext:
//!
//! ```text
//! 0                32          36          40
//! ├── dh_public ───┼─ prev (BE)┼─ n (BE) ──┤
//! ```
//!
//! It is not authenticated unless the session enables header binding, in
//! which case these 40 bytes are the AEAD associated data.

use ratchet_crypto::{DH_KEY_SIZE, DhPublicKey};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::RatchetError;

/// Fixed wire layout of a header. All fields are byte arrays, so every
/// 40-byte pattern is a valid value.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct WireHeader {
    dh_public: [u8; DH_KEY_SIZE],
    previous_send_count: [u8; 4],
    send_count: [u8; 4],
}

/// Header sent with every ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Sender's current ratchet public key
    pub dh_public: DhPublicKey,
    /// Messages the sender sent in its previous sending chain
    pub previous_send_count: u32,
    /// Index of this message in the sender's current chain
    pub send_count: u32,
}

impl Header {
    /// Size of the serialized header (40 bytes)
    pub const SIZE: usize = DH_KEY_SIZE + 4 + 4;

    /// Serialize to the 40-byte wire form.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let wire = WireHeader {
            dh_public: *self.dh_public.as_bytes(),
            previous_send_count: self.previous_send_count.to_be_bytes(),
            send_count: self.send_count.to_be_bytes(),
        };

        let mut bytes = [0u8; Self::SIZE];
        bytes.copy_from_slice(wire.as_bytes());
        bytes
    }

    /// Parse the 40-byte wire form.
    ///
    /// # Errors
    ///
    /// - `MalformedHeader` if `bytes` is not exactly 40 bytes long
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RatchetError> {
        let wire = WireHeader::read_from_bytes(bytes).map_err(|_| {
            RatchetError::MalformedHeader { expected: Self::SIZE, actual: bytes.len() }
        })?;

        Ok(Self {
            dh_public: DhPublicKey::from_bytes(wire.dh_public),
            previous_send_count: u32::from_be_bytes(wire.previous_send_count),
            send_count: u32::from_be_bytes(wire.send_count),
        })
    }
}

/// A header together with its ciphertext, framed for transport.
///
/// Wire form is the 40 header bytes immediately followed by the sealed
/// payload (`nonce || ciphertext || tag`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Cleartext header
    pub header: Header,
    /// Sealed payload
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Serialize header and ciphertext into one buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Header::SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Split a buffer into header and ciphertext.
    ///
    /// The ciphertext is not validated here; `receive` rejects anything that
    /// fails to authenticate.
    ///
    /// # Errors
    ///
    /// - `MalformedHeader` if the buffer is shorter than a header
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RatchetError> {
        if bytes.len() < Header::SIZE {
            return Err(RatchetError::MalformedHeader {
                expected: Header::SIZE,
                actual: bytes.len(),
            });
        }

        let (header, ciphertext) = bytes.split_at(Header::SIZE);
        Ok(Self { header: Header::from_bytes(header)?, ciphertext: ciphertext.to_vec() })
    }
}
