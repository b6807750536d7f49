//! Checked access to the secure random source

use rand::{CryptoRng, RngCore};

use crate::error::CryptoError;

/// Fill `dest` from `rng`, surfacing a source failure instead of falling back.
pub(crate) fn fill_random<R: RngCore + CryptoRng>(
    rng: &mut R,
    dest: &mut [u8],
) -> Result<(), CryptoError> {
    rng.try_fill_bytes(dest).map_err(|_| CryptoError::EntropyUnavailable)
}
