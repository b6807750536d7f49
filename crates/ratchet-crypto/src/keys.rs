//! Symmetric key newtypes
//!
//! Each key is exactly 32 bytes, is zeroized when dropped, and prints as a
//! redacted placeholder under `Debug`.

use std::fmt;

use zeroize::Zeroize;

/// Size of every root, chain and message key
pub const KEY_SIZE: usize = 32;

macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name([u8; KEY_SIZE]);

        impl $name {
            /// Wrap raw key bytes.
            pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
                Self(bytes)
            }

            /// Raw key bytes.
            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!(stringify!($name), "(<redacted>)"))
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.0.zeroize();
            }
        }
    };
}

secret_key!(
    /// Root key, advanced only by DH ratchet steps.
    RootKey
);

secret_key!(
    /// Chain key, advanced one-way for every message in one direction.
    ///
    /// Cloned only to stage a chain walk that may be discarded if the
    /// message fails to authenticate.
    ChainKey
);

secret_key!(
    /// Single-use key that seals or opens exactly one message.
    MessageKey
);

impl Clone for ChainKey {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}
