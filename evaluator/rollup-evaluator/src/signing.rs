//! Ethereum-style message hashing and ECDSA recovery shared by every signed
//! transition variant. Every signed message is mixed with `contract_addr` so
//! signatures from one rollup deployment can't be replayed against another.

use alloc::vec::Vec;
use codec::Encode;
use primitive_types::U256;
use rollup_primitives::{keccak256, WITHDRAW_TAG};

const ETH_SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Applies the Ethereum signed-message prefix to an already-hashed digest.
pub fn eth_signed_message_hash(inner: &[u8; 32]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(ETH_SIGNED_MESSAGE_PREFIX.len() + 32);
    buf.extend_from_slice(ETH_SIGNED_MESSAGE_PREFIX);
    buf.extend_from_slice(inner);
    keccak256(&buf)
}

fn withdraw_digest(contract_addr: [u8; 20], token_index: u32, amount: U256, nonce: u64) -> [u8; 32] {
    let encoded = (contract_addr, WITHDRAW_TAG, token_index, amount, nonce).encode();
    keccak256(&encoded)
}

fn transfer_digest(
    contract_addr: [u8; 20],
    recipient: [u8; 20],
    token_index: u32,
    amount: U256,
    nonce: u64,
) -> [u8; 32] {
    let encoded = (contract_addr, recipient, token_index, amount, nonce).encode();
    keccak256(&encoded)
}

/// Recovers the 20-byte Ethereum-style address that produced `signature` over
/// `digest`. `signature` is `r || s || v` with `v` the recovery id (0-3),
/// matching `sp_io::crypto::secp256k1_ecdsa_recover`.
pub fn recover_address(signature: &[u8; 65], digest: &[u8; 32]) -> Option<[u8; 20]> {
    let pubkey = sp_io::crypto::secp256k1_ecdsa_recover(signature, digest).ok()?;
    let hash = keccak256(&pubkey);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Some(addr)
}

/// True iff `signature` is a valid signature by `account` over the canonical
/// withdraw message `(contract_addr, "withdraw", token_index, amount, nonce)`.
pub fn verify_withdraw_signature(
    contract_addr: [u8; 20],
    account: [u8; 20],
    token_index: u32,
    amount: U256,
    nonce: u64,
    signature: &[u8; 65],
) -> bool {
    let digest = eth_signed_message_hash(&withdraw_digest(contract_addr, token_index, amount, nonce));
    recover_address(signature, &digest) == Some(account)
}

/// True iff `signature` is a valid signature by `sender` over the canonical
/// transfer message `(contract_addr, recipient, token_index, amount, nonce)`.
pub fn verify_transfer_signature(
    contract_addr: [u8; 20],
    sender: [u8; 20],
    recipient: [u8; 20],
    token_index: u32,
    amount: U256,
    nonce: u64,
    signature: &[u8; 65],
) -> bool {
    let digest =
        eth_signed_message_hash(&transfer_digest(contract_addr, recipient, token_index, amount, nonce));
    recover_address(signature, &digest) == Some(sender)
}
