//! # Audit Hash Chain
//!
//! Each audit entry stores the hash of the tenant's previous entry and its
//! own hash, `SHA-256(previous_hash || "\n" || payload)`. The first entry
//! of a tenant chains to [`GENESIS_HASH`]. Altering any stored field of an
//! entry changes its recomputed hash; removing or reordering entries breaks
//! the `previous_hash` links.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hash the first entry of every tenant chains to.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An entry that participates in the chain.
pub trait ChainLink {
    /// Hash of the preceding entry as stored.
    fn previous_hash(&self) -> &str;
    /// Hash of this entry as stored.
    fn entry_hash(&self) -> &str;
    /// Canonical serialization of the hashed fields.
    fn payload(&self) -> String;
}

/// Compute an entry hash.
pub fn chain_hash(previous_hash: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(b"\n");
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Result of recomputing a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainIntegrity {
    /// Entries examined.
    pub total_entries: usize,
    /// Entries whose `previous_hash` does not match the preceding entry.
    pub broken_links: usize,
    /// Entries whose stored hash does not match their content.
    pub tampered_entries: usize,
    /// Whether the chain is intact.
    pub chain_valid: bool,
}

/// Recompute a tenant's chain, oldest entry first.
pub fn verify<'a, L, I>(entries: I) -> ChainIntegrity
where
    L: ChainLink + 'a,
    I: IntoIterator<Item = &'a L>,
{
    let mut total_entries = 0;
    let mut broken_links = 0;
    let mut tampered_entries = 0;
    let mut expected_previous = GENESIS_HASH.to_string();

    for entry in entries {
        total_entries += 1;
        if entry.previous_hash() != expected_previous {
            broken_links += 1;
        }
        if chain_hash(entry.previous_hash(), &entry.payload()) != entry.entry_hash() {
            tampered_entries += 1;
        }
        expected_previous = entry.entry_hash().to_string();
    }

    ChainIntegrity {
        total_entries,
        broken_links,
        tampered_entries,
        chain_valid: broken_links == 0 && tampered_entries == 0,
    }
}
