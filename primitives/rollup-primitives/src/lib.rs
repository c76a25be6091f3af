//! Data model shared by the rollup fraud-proof core: account/storage-slot
//! encodings, transition variants, and the inclusion-proof wrappers the
//! adjudicator passes around.
//!
//! This crate has no FRAME dependency: it is consumed as an ordinary Rust
//! library by `rollup-merkle`, `rollup-evaluator`, and the pallets.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use codec::{Decode, Encode, MaxEncodedLen};
use primitive_types::U256;
use scale_info::TypeInfo;
use sha3::{Digest, Keccak256};

/// Height of the sparse state tree. Fixed by the protocol, not configurable
/// per-deployment, so a client and this chain can never disagree about it.
pub const TREE_HEIGHT: u32 = 32;

/// keccak256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// A committed rollup block: the transitions-tree root and the number of
/// transitions it contains. A tombstoned (pruned) block has both fields
/// zeroed in place; `BlockCount` is never reduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, Default, MaxEncodedLen)]
pub struct Block {
    pub root_hash: [u8; 32],
    pub block_size: u32,
}

impl Block {
    pub fn is_pruned(&self) -> bool {
        self.root_hash == [0u8; 32]
    }
}

/// Per-token-index account state stored at one leaf of the sparse state tree.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, Default)]
pub struct AccountInfo {
    pub account: [u8; 20],
    pub balances: Vec<U256>,
    pub transfer_nonces: Vec<u64>,
    pub withdraw_nonces: Vec<u64>,
}

impl AccountInfo {
    /// True for the canonical "uninhabited slot" value.
    pub fn is_empty_slot(&self) -> bool {
        self.account == [0u8; 20]
            && self.balances.is_empty()
            && self.transfer_nonces.is_empty()
            && self.withdraw_nonces.is_empty()
    }

    /// Canonical leaf encoding. An uninhabited slot is the 32-byte zero word;
    /// any other value is the SCALE encoding of `(account, balances,
    /// transfer_nonces, withdraw_nonces)`. Off-chain operators must reproduce
    /// this bit-for-bit, including the zero-word special case.
    pub fn to_leaf_bytes(&self) -> Vec<u8> {
        if self.is_empty_slot() {
            return [0u8; 32].to_vec();
        }
        (self.account, self.balances.clone(), self.transfer_nonces.clone(), self.withdraw_nonces.clone()).encode()
    }

    /// keccak256 of the canonical leaf encoding — what is actually installed
    /// into the sparse Merkle tree as a leaf hash.
    pub fn leaf_hash(&self) -> [u8; 32] {
        keccak256(&self.to_leaf_bytes())
    }
}

/// A single leaf of the sparse state tree.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct StorageSlot {
    pub slot_index: u32,
    pub value: AccountInfo,
}

/// Merkle path proving a transition is the `transition_index`-th leaf of the
/// transitions tree rooted at `blocks[block_number].root_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct TransitionInclusionProof {
    pub block_number: u32,
    pub transition_index: u32,
    pub siblings: Vec<[u8; 32]>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct IncludedTransition {
    pub transition: Vec<u8>,
    pub inclusion_proof: TransitionInclusionProof,
}

/// The state-tree Merkle path for a slot against some asserted root, plus the
/// claimed value itself.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct IncludedStorageSlot {
    pub storage_slot: StorageSlot,
    pub siblings: Vec<[u8; 32]>,
}

/// Canonical withdraw-signature message tag.
pub const WITHDRAW_TAG: &[u8] = b"withdraw";

/// A decoded, tagged state transition. `transition_type` is the SCALE
/// discriminant of this enum and must match the off-chain operator's wire
/// format exactly.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub enum Transition {
    CreateAndDeposit {
        account_slot_index: u32,
        account: [u8; 20],
        token_index: u32,
        amount: U256,
        state_root: [u8; 32],
    },
    Deposit {
        account_slot_index: u32,
        token_index: u32,
        amount: U256,
        state_root: [u8; 32],
    },
    Withdraw {
        account_slot_index: u32,
        token_index: u32,
        amount: U256,
        nonce: u64,
        signature: [u8; 65],
        state_root: [u8; 32],
    },
    CreateAndTransfer {
        sender_slot_index: u32,
        recipient_slot_index: u32,
        recipient_account: [u8; 20],
        token_index: u32,
        amount: U256,
        nonce: u64,
        signature: [u8; 65],
        state_root: [u8; 32],
    },
    Transfer {
        sender_slot_index: u32,
        recipient_slot_index: u32,
        token_index: u32,
        amount: U256,
        nonce: u64,
        signature: [u8; 65],
        state_root: [u8; 32],
    },
}

impl Transition {
    pub fn state_root(&self) -> [u8; 32] {
        match self {
            Transition::CreateAndDeposit { state_root, .. }
            | Transition::Deposit { state_root, .. }
            | Transition::Withdraw { state_root, .. }
            | Transition::CreateAndTransfer { state_root, .. }
            | Transition::Transfer { state_root, .. } => *state_root,
        }
    }

    /// Storage slot indexes touched, in evaluation order.
    pub fn access_list(&self) -> Vec<u32> {
        match self {
            Transition::CreateAndDeposit { account_slot_index, .. }
            | Transition::Deposit { account_slot_index, .. }
            | Transition::Withdraw { account_slot_index, .. } => alloc::vec![*account_slot_index],
            Transition::CreateAndTransfer { sender_slot_index, recipient_slot_index, .. }
            | Transition::Transfer { sender_slot_index, recipient_slot_index, .. } => {
                alloc::vec![*sender_slot_index, *recipient_slot_index]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_encodes_to_zero_word() {
        let info = AccountInfo::default();
        assert!(info.is_empty_slot());
        assert_eq!(info.to_leaf_bytes(), [0u8; 32].to_vec());
    }

    #[test]
    fn inhabited_slot_does_not_encode_to_zero_word() {
        let info = AccountInfo {
            account: [1u8; 20],
            balances: alloc::vec![U256::from(5)],
            transfer_nonces: alloc::vec![0],
            withdraw_nonces: alloc::vec![0],
        };
        assert!(!info.is_empty_slot());
        assert_ne!(info.to_leaf_bytes(), [0u8; 32].to_vec());
    }

    #[test]
    fn access_list_order_matches_variant_semantics() {
        let t = Transition::Transfer {
            sender_slot_index: 3,
            recipient_slot_index: 7,
            token_index: 0,
            amount: U256::from(1),
            nonce: 0,
            signature: [0u8; 65],
            state_root: [0u8; 32],
        };
        assert_eq!(t.access_list(), alloc::vec![3, 7]);
    }
}
