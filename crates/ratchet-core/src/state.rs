//! Per-peer Double Ratchet state machine.
//!
//! One [`RatchetState`] holds everything a party knows about one
//! conversation and is mutated in place by [`RatchetState::send`] and
//! [`RatchetState::receive`].
//!
//! # Transactions
//!
//! Both operations first stage every value they would change (new root key,
//! chain keys, counters, skipped keys) in locals and commit them only after
//! the AEAD seal/open succeeds. A failed call, whether from a tampered
//! ciphertext, a hostile header or a broken RNG, leaves the state untouched.
//!
//! # Concurrency
//!
//! The state is `Send` but has no interior locking. Callers that share it
//! between tasks serialize access externally (a mutex, or a single task
//! owning the state and processing inbound and outbound events in order).

use std::fmt;

use rand::{CryptoRng, RngCore, rngs::OsRng};
use ratchet_crypto::{
    ChainKey, DhKeyPair, DhPublicKey, MessageKey, RootKey, chain_ratchet, open, root_ratchet, seal,
};

use crate::{
    config::RatchetConfig,
    error::RatchetError,
    header::Header,
    skipped::{PutOutcome, SkippedKeyId, SkippedKeyStore},
};

/// Ratchet state for one side of a two-party conversation.
///
/// # Invariants
///
/// - Every message key seals or opens exactly one message and is zeroized
///   afterwards
/// - A DH ratchet step always replaces the root key and the chain key of the
///   corresponding direction
/// - The skipped-key store never exceeds its configured capacity
/// - `ratchet_pending` is set when a new peer key is adopted and cleared by
///   the next successful `send`
pub struct RatchetState<R = OsRng> {
    config: RatchetConfig,
    rng: R,

    root_key: RootKey,
    self_key_pair: DhKeyPair,
    peer_public: Option<DhPublicKey>,

    sending_chain: Option<ChainKey>,
    receiving_chain: Option<ChainKey>,
    send_counter: u32,
    receive_counter: u32,
    previous_send_count: u32,

    /// Peer advertised a new ratchet key since we last sent
    ratchet_pending: bool,

    skipped: SkippedKeyStore,
}

/// Everything a successful `receive` commits.
struct ReceiveStep {
    /// New root key and peer key when the header announced a new chain
    dh_step: Option<(RootKey, DhPublicKey)>,
    next_chain: ChainKey,
    next_index: u32,
    skipped: Vec<(SkippedKeyId, MessageKey)>,
    message_key: MessageKey,
}

impl RatchetState<OsRng> {
    /// Create a state from the externally agreed root key, using the OS
    /// random source and the default configuration.
    ///
    /// # Errors
    ///
    /// - `EntropyUnavailable` if the initial key pair cannot be generated
    pub fn create(root_key: RootKey) -> Result<Self, RatchetError> {
        Self::with_rng(root_key, RatchetConfig::default(), OsRng)
    }
}

impl<R: RngCore + CryptoRng> RatchetState<R> {
    /// Create a state with an explicit configuration and random source.
    ///
    /// # Errors
    ///
    /// - `EntropyUnavailable` if the initial key pair cannot be generated
    pub fn with_rng(root_key: RootKey, config: RatchetConfig, mut rng: R) -> Result<Self, RatchetError> {
        let key_pair = DhKeyPair::generate(&mut rng)?;
        Ok(Self::from_key_pair(root_key, key_pair, config, rng))
    }

    /// Create a state around an existing key pair, such as the signed prekey
    /// the peer used during key agreement.
    pub fn from_key_pair(
        root_key: RootKey,
        key_pair: DhKeyPair,
        config: RatchetConfig,
        rng: R,
    ) -> Self {
        let skipped = SkippedKeyStore::new(config.max_skipped_keys, config.overflow_policy);

        Self {
            config,
            rng,
            root_key,
            self_key_pair: key_pair,
            peer_public: None,
            sending_chain: None,
            receiving_chain: None,
            send_counter: 0,
            receive_counter: 0,
            previous_send_count: 0,
            ratchet_pending: false,
            skipped,
        }
    }

    /// Our current ratchet public key. Hand the initial one to the peer for
    /// its [`init_peer`](Self::init_peer).
    pub fn public_key(&self) -> DhPublicKey {
        self.self_key_pair.public()
    }

    /// The peer's current ratchet public key, once known.
    pub fn peer_public_key(&self) -> Option<DhPublicKey> {
        self.peer_public
    }

    /// Number of skipped message keys currently cached.
    pub fn skipped_key_count(&self) -> usize {
        self.skipped.len()
    }

    /// Configuration this state was created with.
    pub fn config(&self) -> &RatchetConfig {
        &self.config
    }

    /// Bind the state to the peer's initial public key.
    ///
    /// Mixes `DH(self, peer)` into the root key. Both parties obtain the same
    /// root key here, since the exchange is symmetric. The next `send` then
    /// performs a full sending-side DH ratchet step with a fresh key pair,
    /// which the peer mirrors on its first `receive`.
    ///
    /// # Errors
    ///
    /// - `PeerAlreadyInitialized` if called twice
    /// - `InvalidPublicKey` if the peer key is low-order
    pub fn init_peer(&mut self, peer_public: DhPublicKey) -> Result<(), RatchetError> {
        if self.peer_public.is_some() {
            return Err(RatchetError::PeerAlreadyInitialized);
        }

        let dh_output = self.self_key_pair.diffie_hellman(&peer_public)?;
        // The bootstrap chain is identical on both sides, so it never seals a
        // message; the first send ratchets past it.
        let (root_key, _) = root_ratchet(&self.root_key, &dh_output);

        self.root_key = root_key;
        self.peer_public = Some(peer_public);
        self.ratchet_pending = true;

        tracing::debug!("ratchet bound to peer");
        Ok(())
    }

    /// Encrypt `plaintext` for the peer.
    ///
    /// Performs a sending DH ratchet step first if the peer advertised a new
    /// key since our last send.
    ///
    /// # Errors
    ///
    /// - `PeerNotInitialized` before [`init_peer`](Self::init_peer)
    /// - `EntropyUnavailable` if key or nonce generation fails
    /// - `CounterOverflow` after 2^32 - 1 messages in one chain
    pub fn send(&mut self, plaintext: &[u8]) -> Result<(Header, Vec<u8>), RatchetError> {
        let peer_public = self.peer_public.ok_or(RatchetError::PeerNotInitialized)?;

        let dh_step = if self.ratchet_pending {
            let key_pair = DhKeyPair::generate(&mut self.rng)?;
            let dh_output = key_pair.diffie_hellman(&peer_public)?;
            let (root_key, chain) = root_ratchet(&self.root_key, &dh_output);
            Some((key_pair, root_key, chain))
        } else {
            None
        };

        let (chain, index, previous_send_count, dh_public) = match &dh_step {
            Some((key_pair, _, chain)) => (chain, 0, self.send_counter, key_pair.public()),
            None => (
                self.sending_chain.as_ref().ok_or(RatchetError::PeerNotInitialized)?,
                self.send_counter,
                self.previous_send_count,
                self.self_key_pair.public(),
            ),
        };

        let next_index = index.checked_add(1).ok_or(RatchetError::CounterOverflow)?;
        let (next_chain, message_key) = chain_ratchet(chain);

        let header = Header { dh_public, previous_send_count, send_count: index };
        let aad = associated_data(&self.config, &header);
        let ciphertext = seal(&message_key, plaintext, &aad, &mut self.rng)?;

        if let Some((key_pair, root_key, _)) = dh_step {
            self.self_key_pair = key_pair;
            self.root_key = root_key;
            self.previous_send_count = previous_send_count;
            self.ratchet_pending = false;
            tracing::debug!(previous_send_count, "sending DH ratchet step");
        }
        self.sending_chain = Some(next_chain);
        self.send_counter = next_index;

        Ok((header, ciphertext))
    }

    /// Decrypt a message from the peer.
    ///
    /// Handles out-of-order delivery through the skipped-key store and
    /// performs a receiving DH ratchet step when the header carries a new
    /// peer key.
    ///
    /// # Errors
    ///
    /// - `PeerNotInitialized` before [`init_peer`](Self::init_peer)
    /// - `DecryptionFailed` on authentication failure, replay, or an index
    ///   whose key is no longer available
    /// - `SkipLimitExceeded` if the message index lies more than
    ///   `max_chain_gap` steps ahead in its chain. An overlong previous
    ///   chain is truncated instead, so a new peer key is always adopted.
    /// - `InvalidPublicKey` if the header carries a low-order key
    pub fn receive(&mut self, header: &Header, ciphertext: &[u8]) -> Result<Vec<u8>, RatchetError> {
        let peer_public = self.peer_public.ok_or(RatchetError::PeerNotInitialized)?;
        let aad = associated_data(&self.config, header);

        let id = SkippedKeyId::new(header.dh_public, header.send_count);
        if let Some(message_key) = self.skipped.get(&id) {
            let plaintext = open(message_key, ciphertext, &aad)?;
            drop(self.skipped.take(&id));
            tracing::trace!(index = header.send_count, "opened with skipped message key");
            return Ok(plaintext);
        }

        let step = self.stage_receive(header, peer_public)?;
        let plaintext = open(&step.message_key, ciphertext, &aad)?;
        self.commit_receive(step, header);

        Ok(plaintext)
    }

    /// Derive, without mutating anything, every key `receive` needs.
    fn stage_receive(
        &self,
        header: &Header,
        peer_public: DhPublicKey,
    ) -> Result<ReceiveStep, RatchetError> {
        let mut skipped = Vec::new();

        let (chain, from, dh_step) = if header.dh_public == peer_public {
            let chain = self.receiving_chain.as_ref().ok_or(RatchetError::DecryptionFailed)?;
            if header.send_count < self.receive_counter {
                // Already consumed or discarded: replay or lost message
                return Err(RatchetError::DecryptionFailed);
            }
            (chain.clone(), self.receive_counter, None)
        } else {
            // Flush the chain being replaced up to the number of messages
            // the peer says it sent there. Keys past `max_chain_gap` are
            // abandoned; the new chain does not depend on them.
            if let Some(old_chain) = &self.receiving_chain {
                let limit = self.receive_counter.saturating_add(self.config.max_chain_gap);
                let until = header.previous_send_count.min(limit);
                if until < header.previous_send_count {
                    tracing::debug!(
                        abandoned = header.previous_send_count - until,
                        "previous chain too long to flush, abandoning tail"
                    );
                }
                self.skip_ahead(
                    old_chain.clone(),
                    self.receive_counter,
                    until,
                    peer_public,
                    &mut skipped,
                )?;
            }

            let dh_output = self.self_key_pair.diffie_hellman(&header.dh_public)?;
            let (root_key, chain) = root_ratchet(&self.root_key, &dh_output);
            (chain, 0, Some((root_key, header.dh_public)))
        };

        let chain = self.skip_ahead(chain, from, header.send_count, header.dh_public, &mut skipped)?;
        let next_index = header.send_count.checked_add(1).ok_or(RatchetError::CounterOverflow)?;
        let (next_chain, message_key) = chain_ratchet(&chain);

        Ok(ReceiveStep { dh_step, next_chain, next_index, skipped, message_key })
    }

    /// Advance `chain` from index `from` to `until`, collecting the keys
    /// passed over.
    fn skip_ahead(
        &self,
        mut chain: ChainKey,
        from: u32,
        until: u32,
        dh_public: DhPublicKey,
        skipped: &mut Vec<(SkippedKeyId, MessageKey)>,
    ) -> Result<ChainKey, RatchetError> {
        let gap = until.saturating_sub(from);
        if gap > self.config.max_chain_gap {
            return Err(RatchetError::SkipLimitExceeded { gap, limit: self.config.max_chain_gap });
        }

        for index in from..until {
            let (next, message_key) = chain_ratchet(&chain);
            skipped.push((SkippedKeyId::new(dh_public, index), message_key));
            chain = next;
        }

        Ok(chain)
    }

    fn commit_receive(&mut self, step: ReceiveStep, header: &Header) {
        if let Some((root_key, peer_public)) = step.dh_step {
            self.root_key = root_key;
            self.peer_public = Some(peer_public);
            self.ratchet_pending = true;
            tracing::debug!(
                previous_send_count = header.previous_send_count,
                "receiving DH ratchet step"
            );
        }

        self.receiving_chain = Some(step.next_chain);
        self.receive_counter = step.next_index;

        let (mut evicted, mut discarded) = (0usize, 0usize);
        for (id, message_key) in step.skipped {
            match self.skipped.put(id, message_key) {
                PutOutcome::Stored => {},
                PutOutcome::Evicted(_) => evicted += 1,
                PutOutcome::Rejected => discarded += 1,
            }
        }
        if evicted + discarded > 0 {
            tracing::warn!(
                evicted,
                discarded,
                capacity = self.skipped.capacity(),
                policy = ?self.skipped.policy(),
                "skipped-key store full"
            );
        }
    }
}

/// Header bytes bound to the AEAD, or nothing when binding is disabled.
fn associated_data(config: &RatchetConfig, header: &Header) -> Vec<u8> {
    if config.authenticate_header { header.to_bytes().to_vec() } else { Vec::new() }
}

impl<R> fmt::Debug for RatchetState<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatchetState")
            .field("public_key", &self.self_key_pair.public())
            .field("peer_public", &self.peer_public)
            .field("send_counter", &self.send_counter)
            .field("receive_counter", &self.receive_counter)
            .field("previous_send_count", &self.previous_send_count)
            .field("ratchet_pending", &self.ratchet_pending)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}
