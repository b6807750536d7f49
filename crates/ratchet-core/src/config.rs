//! Ratchet session configuration.

use crate::skipped::OverflowPolicy;

/// Default capacity of the skipped-key store
pub const MAX_SKIP: usize = 50;

/// Default bound on chain steps derived by a single `receive`
pub const DEFAULT_MAX_CHAIN_GAP: u32 = 1000;

/// Configuration for a [`crate::RatchetState`].
///
/// Both parties of a conversation must agree on `authenticate_header`.
/// The other fields are local policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatchetConfig {
    /// Maximum number of skipped message keys held at once
    pub max_skipped_keys: usize,

    /// What to do when the skipped-key store is full
    pub overflow_policy: OverflowPolicy,

    /// Maximum chain steps one `receive` may derive in a single chain.
    ///
    /// Headers demanding more are rejected before any derivation.
    pub max_chain_gap: u32,

    /// Bind the 40 header bytes to the AEAD as associated data.
    ///
    /// Changes the wire contract: peers must use the same setting.
    pub authenticate_header: bool,
}

impl Default for RatchetConfig {
    fn default() -> Self {
        Self {
            max_skipped_keys: MAX_SKIP,
            overflow_policy: OverflowPolicy::RejectNew,
            max_chain_gap: DEFAULT_MAX_CHAIN_GAP,
            authenticate_header: false,
        }
    }
}

impl RatchetConfig {
    /// Set the skipped-key store capacity.
    #[must_use]
    pub fn with_max_skipped_keys(mut self, max: usize) -> Self {
        self.max_skipped_keys = max;
        self
    }

    /// Set the store overflow policy.
    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set the per-receive chain step bound.
    #[must_use]
    pub fn with_max_chain_gap(mut self, gap: u32) -> Self {
        self.max_chain_gap = gap;
        self
    }

    /// Enable or disable header binding.
    #[must_use]
    pub fn with_authenticated_header(mut self, enabled: bool) -> Self {
        self.authenticate_header = enabled;
        self
    }
}
