//! Sparse state-tree and transitions-tree Merkle engine.
//!
//! Two independent services, as the protocol specifies:
//!
//! - a **stateless** transitions tree (`merkle_root` / `verify`), used to
//!   anchor a block's list of encoded transitions to a single root, and
//! - a **stateful** sparse state tree of fixed [`TREE_HEIGHT`]
//!   ([`SparseMerkleTree`]), used during fraud-proof evaluation to verify
//!   storage-slot witnesses and recompute a post-state root.
//!
//! Both use `keccak256` as the node hash, matching the off-chain operator.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

pub use rollup_primitives::{keccak256, TREE_HEIGHT};

/// Hash two child nodes into their parent.
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    keccak256(&buf)
}

fn combine(index_is_odd: bool, current: [u8; 32], sibling: [u8; 32]) -> [u8; 32] {
    if index_is_odd {
        hash_pair(&sibling, &current)
    } else {
        hash_pair(&current, &sibling)
    }
}

/// Root of the transitions tree over `leaves` (raw encoded-transition bytes,
/// hashed here). Pads to the next power of two by duplicating the hash of the
/// last real leaf up the right spine — this is the exact policy an off-chain
/// operator must replicate. An empty leaf list roots to the all-zero word.
pub fn merkle_root(leaves: &[Vec<u8>]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut layer: Vec<[u8; 32]> = leaves.iter().map(|l| keccak256(l)).collect();
    let padded_len = layer.len().next_power_of_two();
    if let Some(&last) = layer.last() {
        while layer.len() < padded_len {
            layer.push(last);
        }
    }
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len() / 2);
        for chunk in layer.chunks_exact(2) {
            next.push(hash_pair(&chunk[0], &chunk[1]));
        }
        layer = next;
    }
    layer[0]
}

/// Stateless inclusion check against an already-known root. `siblings.len()`
/// determines the depth; `index`'s binary expansion (LSB = depth-0 sibling)
/// determines left/right ordering at each level.
pub fn verify(root: [u8; 32], leaf_bytes: &[u8], index: u32, siblings: &[[u8; 32]]) -> bool {
    let mut current = keccak256(leaf_bytes);
    let mut idx = index;
    for sibling in siblings {
        current = combine(idx & 1 == 1, current, *sibling);
        idx >>= 1;
    }
    current == root
}

/// Build the full transitions tree for test/offline proof generation,
/// returning one layer per depth (layer 0 = leaf hashes, last = root).
pub fn build_tree(leaves: &[Vec<u8>]) -> Vec<Vec<[u8; 32]>> {
    if leaves.is_empty() {
        return alloc::vec![alloc::vec![[0u8; 32]]];
    }
    let mut layer: Vec<[u8; 32]> = leaves.iter().map(|l| keccak256(l)).collect();
    let padded_len = layer.len().next_power_of_two();
    if let Some(&last) = layer.last() {
        while layer.len() < padded_len {
            layer.push(last);
        }
    }
    let mut layers = alloc::vec![layer.clone()];
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len() / 2);
        for chunk in layer.chunks_exact(2) {
            next.push(hash_pair(&chunk[0], &chunk[1]));
        }
        layers.push(next.clone());
        layer = next;
    }
    layers
}

/// Sibling path for `index` out of a tree built with [`build_tree`].
pub fn prove(layers: &[Vec<[u8; 32]>], index: u32) -> Vec<[u8; 32]> {
    let mut siblings = Vec::new();
    let mut idx = index;
    for layer in layers.iter().take(layers.len().saturating_sub(1)) {
        let sibling_index = (idx ^ 1) as usize;
        siblings.push(layer[sibling_index.min(layer.len() - 1)]);
        idx >>= 1;
    }
    siblings
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MerkleError {
    /// `siblings` did not have exactly [`TREE_HEIGHT`] entries.
    WrongProofLength,
    /// The supplied witness does not hash up to the tree's current root.
    RootMismatch,
    /// `update_leaf` was called for a slot whose ancestor path was never
    /// populated by a preceding `verify_and_store`.
    PathNotCached,
}

/// Stateful sparse Merkle tree of fixed height [`TREE_HEIGHT`]. Transient:
/// built fresh at the start of a fraud-proof call and dropped at the end, so
/// there is never a cache to leak between independent proof sessions.
#[derive(Clone, Debug)]
pub struct SparseMerkleTree {
    root: [u8; 32],
    cache: BTreeMap<(u8, u32), [u8; 32]>,
}

impl SparseMerkleTree {
    /// Reset the engine to a claimed root (`setMerkleRootAndHeight` — height
    /// is always [`TREE_HEIGHT`] in this implementation).
    pub fn new(root: [u8; 32]) -> Self {
        Self { root, cache: BTreeMap::new() }
    }

    pub fn root(&self) -> [u8; 32] {
        self.root
    }

    /// Verify that `leaf_bytes` at `slot_index`, climbed through `siblings`,
    /// yields the tree's current root, and cache the witnessed path so later
    /// `update_leaf` calls need not re-supply it.
    pub fn verify_and_store(
        &mut self,
        leaf_bytes: &[u8],
        slot_index: u32,
        siblings: &[[u8; 32]],
    ) -> Result<(), MerkleError> {
        if siblings.len() != TREE_HEIGHT as usize {
            return Err(MerkleError::WrongProofLength);
        }
        let mut current = keccak256(leaf_bytes);
        let mut idx = slot_index;
        let mut path: Vec<((u8, u32), [u8; 32])> = Vec::with_capacity(2 * TREE_HEIGHT as usize);
        for (depth, sibling) in siblings.iter().enumerate() {
            path.push(((depth as u8, idx), current));
            let sibling_index = idx ^ 1;
            path.push(((depth as u8, sibling_index), *sibling));
            current = combine(idx & 1 == 1, current, *sibling);
            idx >>= 1;
        }
        if current != self.root {
            return Err(MerkleError::RootMismatch);
        }
        for (key, value) in path {
            self.cache.insert(key, value);
        }
        Ok(())
    }

    /// Replace the leaf at `slot_index` and recompute the root up the cached
    /// path. Fails if `slot_index`'s ancestors were never populated.
    pub fn update_leaf(&mut self, new_leaf_hash: [u8; 32], slot_index: u32) -> Result<(), MerkleError> {
        let mut current = new_leaf_hash;
        let mut idx = slot_index;
        for depth in 0..TREE_HEIGHT as u8 {
            self.cache.insert((depth, idx), current);
            let sibling_index = idx ^ 1;
            let sibling = *self
                .cache
                .get(&(depth, sibling_index))
                .ok_or(MerkleError::PathNotCached)?;
            current = combine(idx & 1 == 1, current, sibling);
            idx >>= 1;
        }
        self.root = current;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollup_primitives::AccountInfo;

    fn zero_leaf_proof(depth: u32) -> Vec<[u8; 32]> {
        // Proof against the canonical all-empty-slots tree: every sibling is
        // the hash of the zero-word leaf repeated up the tree.
        let mut sibling = keccak256(&[0u8; 32]);
        let mut out = Vec::new();
        for _ in 0..depth {
            out.push(sibling);
            sibling = hash_pair(&sibling, &sibling);
        }
        out
    }

    fn empty_tree_root(depth: u32) -> [u8; 32] {
        let mut node = keccak256(&[0u8; 32]);
        for _ in 0..depth {
            node = hash_pair(&node, &node);
        }
        node
    }

    #[test]
    fn merkle_round_trip_transitions_tree() {
        let leaves: Vec<Vec<u8>> = (0..5u8).map(|i| alloc::vec![i; 4]).collect();
        let layers = build_tree(&leaves);
        let root = *layers.last().unwrap().first().unwrap();
        for (i, leaf) in leaves.iter().enumerate() {
            let siblings = prove(&layers, i as u32);
            assert!(verify(root, leaf, i as u32, &siblings), "leaf {i} failed to verify");
        }
    }

    #[test]
    fn merkle_root_of_empty_list_is_zero() {
        assert_eq!(merkle_root(&[]), [0u8; 32]);
    }

    #[test]
    fn state_tree_apply_law() {
        let root0 = empty_tree_root(TREE_HEIGHT);
        let siblings = zero_leaf_proof(TREE_HEIGHT);
        let slot_index = 42u32;

        let mut tree = SparseMerkleTree::new(root0);
        let empty = AccountInfo::default();
        tree.verify_and_store(&empty.to_leaf_bytes(), slot_index, &siblings).unwrap();

        let new_value = AccountInfo {
            account: [9u8; 20],
            balances: alloc::vec![primitive_types::U256::from(5u64)],
            transfer_nonces: alloc::vec![0],
            withdraw_nonces: alloc::vec![0],
        };
        tree.update_leaf(new_value.leaf_hash(), slot_index).unwrap();

        // Independent recomputation: every other leaf is still the empty
        // leaf hash, only `slot_index`'s leaf changed.
        let mut expected = new_value.leaf_hash();
        let mut idx = slot_index;
        for sib in &siblings {
            expected = combine(idx & 1 == 1, expected, *sib);
            idx >>= 1;
        }
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn update_leaf_without_prior_witness_fails_loudly() {
        let mut tree = SparseMerkleTree::new([1u8; 32]);
        let err = tree.update_leaf([2u8; 32], 7).unwrap_err();
        assert_eq!(err, MerkleError::PathNotCached);
    }

    #[test]
    fn verify_and_store_rejects_bad_witness() {
        let root0 = empty_tree_root(TREE_HEIGHT);
        let mut siblings = zero_leaf_proof(TREE_HEIGHT);
        siblings[0] = [0xFFu8; 32];
        let mut tree = SparseMerkleTree::new(root0);
        let empty = AccountInfo::default();
        let err = tree.verify_and_store(&empty.to_leaf_bytes(), 1, &siblings).unwrap_err();
        assert_eq!(err, MerkleError::RootMismatch);
    }
}
