//! Bounded store of skipped message keys.
//!
//! Messages that arrive out of order force the receiver to derive keys ahead
//! of their use. Those keys are parked here, indexed by the sender's DH public
//! key and the message's index in that chain, until the message turns up.
//!
//! # Invariants
//!
//! - Never holds more than `capacity` entries
//! - Each key is handed out at most once ([`SkippedKeyStore::take`] removes
//!   it)
//! - Keys that cannot be stored are zeroized immediately

use std::{collections::HashMap, fmt};

use ratchet_crypto::{DhPublicKey, MessageKey};

/// Composite lookup key: sender's ratchet public key plus chain index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkippedKeyId {
    /// DH public key of the chain the message belongs to
    pub dh_public: DhPublicKey,
    /// Message index within that chain
    pub index: u32,
}

impl SkippedKeyId {
    /// Identify message `index` of the chain announced by `dh_public`.
    pub fn new(dh_public: DhPublicKey, index: u32) -> Self {
        Self { dh_public, index }
    }
}

/// Behaviour when inserting into a full store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Keep existing entries and discard the new key. In-flight messages
    /// whose keys are already cached stay decryptable.
    #[default]
    RejectNew,
    /// Drop the oldest entry to make room for the new key.
    EvictOldest,
}

/// Result of [`SkippedKeyStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Key stored without displacing anything
    Stored,
    /// Key stored after evicting the given entry
    Evicted(SkippedKeyId),
    /// Store full (or zero capacity); key discarded
    Rejected,
}

struct Entry {
    key: MessageKey,
    /// Insertion order, used to find the oldest entry
    sequence: u64,
}

/// Per-session bounded map from [`SkippedKeyId`] to message key.
pub struct SkippedKeyStore {
    entries: HashMap<SkippedKeyId, Entry>,
    capacity: usize,
    policy: OverflowPolicy,
    next_sequence: u64,
}

impl SkippedKeyStore {
    /// Create an empty store.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self { entries: HashMap::new(), capacity, policy, next_sequence: 0 }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Policy applied when full.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no keys are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a key is held for `id`.
    pub fn contains(&self, id: &SkippedKeyId) -> bool {
        self.entries.contains_key(id)
    }

    /// Cache a skipped key, applying the overflow policy when full.
    ///
    /// Re-inserting an existing id replaces its key in place.
    pub fn put(&mut self, id: SkippedKeyId, key: MessageKey) -> PutOutcome {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.key = key;
            return PutOutcome::Stored;
        }

        if self.entries.len() < self.capacity {
            self.insert(id, key);
            return PutOutcome::Stored;
        }

        match self.policy {
            OverflowPolicy::RejectNew => PutOutcome::Rejected,
            OverflowPolicy::EvictOldest => {
                let Some(oldest) = self.oldest() else {
                    // Zero capacity: nothing to evict
                    return PutOutcome::Rejected;
                };
                self.entries.remove(&oldest);
                self.insert(id, key);
                PutOutcome::Evicted(oldest)
            },
        }
    }

    /// Borrow the key for `id` without consuming it.
    pub fn get(&self, id: &SkippedKeyId) -> Option<&MessageKey> {
        self.entries.get(id).map(|entry| &entry.key)
    }

    /// Remove and return the key for `id`. Absence is not an error.
    pub fn take(&mut self, id: &SkippedKeyId) -> Option<MessageKey> {
        self.entries.remove(id).map(|entry| entry.key)
    }

    fn insert(&mut self, id: SkippedKeyId, key: MessageKey) {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.entries.insert(id, Entry { key, sequence });
    }

    fn oldest(&self) -> Option<SkippedKeyId> {
        self.entries.iter().min_by_key(|(_, entry)| entry.sequence).map(|(id, _)| *id)
    }
}

impl fmt::Debug for SkippedKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkippedKeyStore")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .finish()
    }
}
