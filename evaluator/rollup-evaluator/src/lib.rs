//! Pure, state-free transition decoder and state-transition function.
//!
//! Consumed by `pallet-rollup-chain` as ordinary function calls: this is the
//! native equivalent of the original design's fallible
//! `evaluator.call(op, args) -> Result<Decoded, DecodeError>` abstraction
//! (see the crate-level design notes in `DESIGN.md`). There is no pallet
//! storage here and no callback into the caller — the evaluator cannot be
//! reentered because it never calls back out.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod signing;

use alloc::vec::Vec;
use codec::Decode;
use primitive_types::U256;
use rollup_primitives::{AccountInfo, StorageSlot, Transition};

/// Everything that can go wrong decoding or evaluating a transition. None of
/// these panic — the adjudicator treats every variant as a fraud signal (for
/// the disputed transition) or a caller error (for malformed witnesses), never
/// as a reason to abort the host process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluatorError {
    /// The raw bytes are not a valid SCALE-encoded `Transition`.
    Decode,
    /// `token_index` is out of bounds for the slot's `balances` vector. Slots
    /// are never auto-extended to cover an unknown token.
    UnknownTokenIndex,
    /// Debiting `amount` would underflow the slot's balance.
    InsufficientBalance,
    /// The transition's `nonce` does not equal the slot's current nonce for
    /// this token (nonces must match exactly, not merely be monotonic).
    NonceMismatch,
    /// Signature recovery failed, or recovered to the wrong address.
    InvalidSignature,
    /// A `CreateAndDeposit`/`CreateAndTransfer` target slot is not the
    /// canonical empty encoding.
    SlotNotEmpty,
    /// Crediting `amount` would overflow the slot's balance.
    BalanceOverflow,
}

/// The decoded summary the adjudicator needs before it has any storage
/// witnesses: the operator's claimed post-state root and the ordered list of
/// slot indices the transition touches.
pub struct DecodedTransition {
    pub state_root: [u8; 32],
    pub access_list: Vec<u32>,
}

/// Decodes raw transition bytes. Never panics on malformed input — the
/// caller (the adjudicator) treats `Err` as proof of fraud for the disputed
/// transition, and as a hard abort only when decoding the transition that
/// precedes it (see `pallet-rollup-chain::prove_transition_invalid` step 2).
pub fn decode_transition(bytes: &[u8]) -> Result<Transition, EvaluatorError> {
    Transition::decode(&mut &bytes[..]).map_err(|_| EvaluatorError::Decode)
}

/// Convenience wrapper matching the distilled spec's
/// `getTransitionStateRootAndAccessList`. Equivalent to decoding and then
/// reading `state_root()`/`access_list()` off the result.
pub fn decode_summary(bytes: &[u8]) -> Result<DecodedTransition, EvaluatorError> {
    let transition = decode_transition(bytes)?;
    Ok(DecodedTransition { state_root: transition.state_root(), access_list: transition.access_list() })
}

fn ensure_balance_slot(info: &AccountInfo, token_index: u32) -> Result<usize, EvaluatorError> {
    let idx = token_index as usize;
    if idx >= info.balances.len() {
        return Err(EvaluatorError::UnknownTokenIndex);
    }
    Ok(idx)
}

fn sized_account(account: [u8; 20], token_index: u32, amount: U256) -> AccountInfo {
    let len = token_index as usize + 1;
    let mut balances = alloc::vec![U256::zero(); len];
    balances[token_index as usize] = amount;
    AccountInfo {
        account,
        balances,
        transfer_nonces: alloc::vec![0u64; len],
        withdraw_nonces: alloc::vec![0u64; len],
    }
}

/// Given the decoded transition and the current values of its access-list
/// slots (same order as `Transition::access_list`), returns the
/// post-transition leaf hashes to install. Performs every semantic check:
/// signature validity, sufficient balance, exact nonce equality, known token
/// index, and slot-creation preconditions.
pub fn evaluate_transition(
    contract_addr: [u8; 20],
    transition: &Transition,
    slots: &[StorageSlot],
) -> Result<Vec<[u8; 32]>, EvaluatorError> {
    match transition {
        Transition::CreateAndDeposit { account, token_index, amount, .. } => {
            let slot = &slots[0];
            if !slot.value.is_empty_slot() {
                return Err(EvaluatorError::SlotNotEmpty);
            }
            let info = sized_account(*account, *token_index, *amount);
            Ok(alloc::vec![info.leaf_hash()])
        },
        Transition::Deposit { token_index, amount, .. } => {
            let slot = &slots[0];
            let mut info = slot.value.clone();
            let idx = ensure_balance_slot(&info, *token_index)?;
            info.balances[idx] =
                info.balances[idx].checked_add(*amount).ok_or(EvaluatorError::BalanceOverflow)?;
            Ok(alloc::vec![info.leaf_hash()])
        },
        Transition::Withdraw { token_index, amount, nonce, signature, .. } => {
            let slot = &slots[0];
            let mut info = slot.value.clone();
            let idx = ensure_balance_slot(&info, *token_index)?;
            if info.balances[idx] < *amount {
                return Err(EvaluatorError::InsufficientBalance);
            }
            if info.withdraw_nonces[idx] != *nonce {
                return Err(EvaluatorError::NonceMismatch);
            }
            if !signing::verify_withdraw_signature(
                contract_addr,
                info.account,
                *token_index,
                *amount,
                *nonce,
                signature,
            ) {
                return Err(EvaluatorError::InvalidSignature);
            }
            info.balances[idx] -= *amount;
            info.withdraw_nonces[idx] += 1;
            Ok(alloc::vec![info.leaf_hash()])
        },
        Transition::CreateAndTransfer { recipient_account, token_index, amount, nonce, signature, .. } => {
            let sender_slot = &slots[0];
            let recipient_slot = &slots[1];
            if !recipient_slot.value.is_empty_slot() {
                return Err(EvaluatorError::SlotNotEmpty);
            }
            let mut sender = sender_slot.value.clone();
            let idx = ensure_balance_slot(&sender, *token_index)?;
            if sender.balances[idx] < *amount {
                return Err(EvaluatorError::InsufficientBalance);
            }
            if sender.transfer_nonces[idx] != *nonce {
                return Err(EvaluatorError::NonceMismatch);
            }
            if !signing::verify_transfer_signature(
                contract_addr,
                sender.account,
                *recipient_account,
                *token_index,
                *amount,
                *nonce,
                signature,
            ) {
                return Err(EvaluatorError::InvalidSignature);
            }
            sender.balances[idx] -= *amount;
            sender.transfer_nonces[idx] += 1;
            let recipient = sized_account(*recipient_account, *token_index, *amount);
            Ok(alloc::vec![sender.leaf_hash(), recipient.leaf_hash()])
        },
        Transition::Transfer { token_index, amount, nonce, signature, .. } => {
            let sender_slot = &slots[0];
            let recipient_slot = &slots[1];
            let mut sender = sender_slot.value.clone();
            let mut recipient = recipient_slot.value.clone();
            let sender_idx = ensure_balance_slot(&sender, *token_index)?;
            let recipient_idx = ensure_balance_slot(&recipient, *token_index)?;
            if sender.balances[sender_idx] < *amount {
                return Err(EvaluatorError::InsufficientBalance);
            }
            if sender.transfer_nonces[sender_idx] != *nonce {
                return Err(EvaluatorError::NonceMismatch);
            }
            if !signing::verify_transfer_signature(
                contract_addr,
                sender.account,
                recipient.account,
                *token_index,
                *amount,
                *nonce,
                signature,
            ) {
                return Err(EvaluatorError::InvalidSignature);
            }
            sender.balances[sender_idx] -= *amount;
            sender.transfer_nonces[sender_idx] += 1;
            recipient.balances[recipient_idx] = recipient.balances[recipient_idx]
                .checked_add(*amount)
                .ok_or(EvaluatorError::BalanceOverflow)?;
            Ok(alloc::vec![sender.leaf_hash(), recipient.leaf_hash()])
        },
    }
}

/// True iff `transition` is a `Withdraw` variant carrying a valid signature
/// from `account` over the canonical withdraw message.
pub fn verify_withdraw_transition(contract_addr: [u8; 20], account: [u8; 20], transition: &Transition) -> bool {
    match transition {
        Transition::Withdraw { token_index, amount, nonce, signature, .. } => {
            signing::verify_withdraw_signature(contract_addr, account, *token_index, *amount, *nonce, signature)
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::Encode;
    use rollup_primitives::StorageSlot;

    const CONTRACT: [u8; 20] = [0x42; 20];

    fn keypair() -> (libsecp256k1::SecretKey, [u8; 20]) {
        let sk = libsecp256k1::SecretKey::parse(&[7u8; 32]).unwrap();
        let pk = libsecp256k1::PublicKey::from_secret_key(&sk);
        let uncompressed = pk.serialize();
        let hash = rollup_primitives::keccak256(&uncompressed[1..]);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..32]);
        (sk, addr)
    }

    fn sign(sk: &libsecp256k1::SecretKey, digest: &[u8; 32]) -> [u8; 65] {
        let message = libsecp256k1::Message::parse(digest);
        let (sig, recovery_id) = libsecp256k1::sign(&message, sk);
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.serialize());
        out[64] = recovery_id.serialize();
        out
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(decode_transition(&[0xFF, 0x01]), Err(EvaluatorError::Decode));
    }

    #[test]
    fn deposit_credits_existing_slot() {
        let existing = AccountInfo {
            account: [1u8; 20],
            balances: alloc::vec![U256::from(10u64)],
            transfer_nonces: alloc::vec![0],
            withdraw_nonces: alloc::vec![0],
        };
        let transition = Transition::Deposit {
            account_slot_index: 0,
            token_index: 0,
            amount: U256::from(5u64),
            state_root: [0u8; 32],
        };
        let slots = [StorageSlot { slot_index: 0, value: existing.clone() }];
        let outputs = evaluate_transition(CONTRACT, &transition, &slots).unwrap();
        let mut expected = existing;
        expected.balances[0] = U256::from(15u64);
        assert_eq!(outputs, alloc::vec![expected.leaf_hash()]);
    }

    #[test]
    fn deposit_rejects_unknown_token() {
        let existing =
            AccountInfo { account: [1u8; 20], balances: alloc::vec![], transfer_nonces: alloc::vec![], withdraw_nonces: alloc::vec![] };
        let transition = Transition::Deposit {
            account_slot_index: 0,
            token_index: 0,
            amount: U256::from(5u64),
            state_root: [0u8; 32],
        };
        let slots = [StorageSlot { slot_index: 0, value: existing }];
        assert_eq!(evaluate_transition(CONTRACT, &transition, &slots), Err(EvaluatorError::UnknownTokenIndex));
    }

    #[test]
    fn withdraw_requires_valid_signature_and_matching_nonce() {
        let (sk, addr) = keypair();
        let existing = AccountInfo {
            account: addr,
            balances: alloc::vec![U256::from(100u64)],
            transfer_nonces: alloc::vec![0],
            withdraw_nonces: alloc::vec![0],
        };
        let amount = U256::from(40u64);
        let nonce = 0u64;
        let token_index = 0u32;
        let digest = signing::eth_signed_message_hash(&rollup_primitives::keccak256(
            &(CONTRACT, rollup_primitives::WITHDRAW_TAG, token_index, amount, nonce).encode(),
        ));
        let signature = sign(&sk, &digest);
        let transition = Transition::Withdraw {
            account_slot_index: 0,
            token_index,
            amount,
            nonce,
            signature,
            state_root: [0u8; 32],
        };
        let slots = [StorageSlot { slot_index: 0, value: existing.clone() }];
        let outputs = evaluate_transition(CONTRACT, &transition, &slots).unwrap();
        let mut expected = existing;
        expected.balances[0] = U256::from(60u64);
        expected.withdraw_nonces[0] = 1;
        assert_eq!(outputs, alloc::vec![expected.leaf_hash()]);

        // A bit-flipped signature must not recover to the same address.
        let mut bad_sig = signature;
        bad_sig[0] ^= 0xFF;
        let bad_transition = Transition::Withdraw {
            account_slot_index: 0,
            token_index,
            amount,
            nonce,
            signature: bad_sig,
            state_root: [0u8; 32],
        };
        assert_eq!(
            evaluate_transition(CONTRACT, &bad_transition, &slots),
            Err(EvaluatorError::InvalidSignature)
        );
    }

    #[test]
    fn withdraw_rejects_insufficient_balance() {
        let (sk, addr) = keypair();
        let existing = AccountInfo {
            account: addr,
            balances: alloc::vec![U256::from(10u64)],
            transfer_nonces: alloc::vec![0],
            withdraw_nonces: alloc::vec![0],
        };
        let amount = U256::from(40u64);
        let digest = signing::eth_signed_message_hash(&rollup_primitives::keccak256(
            &(CONTRACT, rollup_primitives::WITHDRAW_TAG, 0u32, amount, 0u64).encode(),
        ));
        let signature = sign(&sk, &digest);
        let transition = Transition::Withdraw {
            account_slot_index: 0,
            token_index: 0,
            amount,
            nonce: 0,
            signature,
            state_root: [0u8; 32],
        };
        let slots = [StorageSlot { slot_index: 0, value: existing }];
        assert_eq!(
            evaluate_transition(CONTRACT, &transition, &slots),
            Err(EvaluatorError::InsufficientBalance)
        );
    }

    #[test]
    fn create_and_deposit_rejects_non_empty_target() {
        let occupied = AccountInfo {
            account: [9u8; 20],
            balances: alloc::vec![U256::from(1u64)],
            transfer_nonces: alloc::vec![0],
            withdraw_nonces: alloc::vec![0],
        };
        let transition = Transition::CreateAndDeposit {
            account_slot_index: 0,
            account: [2u8; 20],
            token_index: 0,
            amount: U256::from(5u64),
            state_root: [0u8; 32],
        };
        let slots = [StorageSlot { slot_index: 0, value: occupied }];
        assert_eq!(evaluate_transition(CONTRACT, &transition, &slots), Err(EvaluatorError::SlotNotEmpty));
    }

    #[test]
    fn transfer_moves_balance_between_existing_slots() {
        let (sk, sender_addr) = keypair();
        let sender = AccountInfo {
            account: sender_addr,
            balances: alloc::vec![U256::from(100u64)],
            transfer_nonces: alloc::vec![0],
            withdraw_nonces: alloc::vec![0],
        };
        let recipient_addr = [5u8; 20];
        let recipient = AccountInfo {
            account: recipient_addr,
            balances: alloc::vec![U256::from(3u64)],
            transfer_nonces: alloc::vec![0],
            withdraw_nonces: alloc::vec![0],
        };
        let amount = U256::from(10u64);
        let digest = signing::eth_signed_message_hash(&rollup_primitives::keccak256(
            &(CONTRACT, recipient_addr, 0u32, amount, 0u64).encode(),
        ));
        let signature = sign(&sk, &digest);
        let transition = Transition::Transfer {
            sender_slot_index: 0,
            recipient_slot_index: 1,
            token_index: 0,
            amount,
            nonce: 0,
            signature,
            state_root: [0u8; 32],
        };
        let slots = [
            StorageSlot { slot_index: 0, value: sender.clone() },
            StorageSlot { slot_index: 1, value: recipient.clone() },
        ];
        let outputs = evaluate_transition(CONTRACT, &transition, &slots).unwrap();
        let mut expected_sender = sender;
        expected_sender.balances[0] = U256::from(90u64);
        expected_sender.transfer_nonces[0] = 1;
        let mut expected_recipient = recipient;
        expected_recipient.balances[0] = U256::from(13u64);
        assert_eq!(outputs, alloc::vec![expected_sender.leaf_hash(), expected_recipient.leaf_hash()]);
    }

    #[test]
    fn decode_summary_exposes_access_list_and_root() {
        let transition = Transition::Deposit {
            account_slot_index: 4,
            token_index: 1,
            amount: U256::from(1u64),
            state_root: [7u8; 32],
        };
        let bytes = transition.encode();
        let summary = decode_summary(&bytes).unwrap();
        assert_eq!(summary.access_list, alloc::vec![4]);
        assert_eq!(summary.state_root, [7u8; 32]);
    }
}
