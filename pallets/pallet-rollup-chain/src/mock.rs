use crate::{CommitterAddressMapping, ValidatorRegistryError, ValidatorRegistryProvider};
use frame_support::derive_impl;
use rollup_primitives::keccak256;
use sp_runtime::BuildStorage;
use std::cell::RefCell;

type Block = frame_system::mocking::MockBlock<Test>;

pub type AccountId = u64;

pub const CONTRACT_ADDRESS: [u8; 20] = [0x42; 20];

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Compat,
    Fixed,
}

thread_local! {
    static VALIDATORS: RefCell<Vec<[u8; 20]>> = const { RefCell::new(Vec::new()) };
    static COMMITTER_INDEX: RefCell<u32> = const { RefCell::new(0) };
    static PICK_NEXT_CALLS: RefCell<u32> = const { RefCell::new(0) };
    static MODE: RefCell<Mode> = const { RefCell::new(Mode::Compat) };
}

/// Stand-in for `pallet-validator-registry` in this pallet's unit tests.
/// Reimplements both the Compat- and Fixed-mode threshold checks against a
/// thread-local validator set, since this crate takes no Cargo dependency on
/// the registry pallet.
pub struct TestValidatorRegistry;

pub fn set_validators(validators: Vec<[u8; 20]>) {
    VALIDATORS.with(|v| *v.borrow_mut() = validators);
    COMMITTER_INDEX.with(|c| *c.borrow_mut() = 0);
}

pub fn set_mode(mode: Mode) {
    MODE.with(|m| *m.borrow_mut() = mode);
}

pub fn committer_index() -> u32 {
    COMMITTER_INDEX.with(|c| *c.borrow())
}

pub fn pick_next_committer_call_count() -> u32 {
    PICK_NEXT_CALLS.with(|c| *c.borrow())
}

fn eth_signed_digest(block_number: u32, transitions: &[Vec<u8>]) -> [u8; 32] {
    let inner = keccak256(&(block_number, transitions).encode());
    let mut buf = Vec::with_capacity(28 + 32);
    buf.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    buf.extend_from_slice(&inner);
    keccak256(&buf)
}

fn try_recover(signature: &[u8], digest: &[u8; 32]) -> Option<[u8; 20]> {
    if signature.len() != 65 {
        return None;
    }
    let mut sig = [0u8; 65];
    sig.copy_from_slice(signature);
    let pubkey = sp_io::crypto::secp256k1_ecdsa_recover(&sig, digest).ok()?;
    let hash = keccak256(&pubkey);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Some(addr)
}

use codec::Encode;

impl ValidatorRegistryProvider for TestValidatorRegistry {
    fn check_signatures(
        block_number: u32,
        transitions: &[Vec<u8>],
        signatures: &[Vec<u8>],
    ) -> Result<(), ValidatorRegistryError> {
        let validators = VALIDATORS.with(|v| v.borrow().clone());
        let n = validators.len();
        if n == 0 {
            return Err(ValidatorRegistryError::EmptyValidatorSet);
        }
        if signatures.len() != n {
            return Err(ValidatorRegistryError::SignatureCountMismatch);
        }
        let digest = eth_signed_digest(block_number, transitions);
        let committer_idx = (committer_index() as usize) % n;

        match MODE.with(|m| *m.borrow()) {
            Mode::Compat => {
                for i in 0..n {
                    let recovered =
                        try_recover(&signatures[i], &digest).ok_or(ValidatorRegistryError::InvalidSignature)?;
                    if recovered != validators[i] {
                        return Err(ValidatorRegistryError::InvalidSignature);
                    }
                }
                Ok(())
            },
            Mode::Fixed => {
                let mut count = 0u32;
                for i in 0..n {
                    if signatures[i].is_empty() {
                        continue;
                    }
                    if try_recover(&signatures[i], &digest) == Some(validators[i]) {
                        count += 1;
                    }
                }
                let threshold_met = if n < 4 { count == n as u32 } else { count * 3 > n as u32 * 2 };
                if !threshold_met {
                    return Err(ValidatorRegistryError::ThresholdNotMet);
                }
                let committer_sig = &signatures[committer_idx];
                if committer_sig.is_empty() {
                    return Err(ValidatorRegistryError::NotCommitter);
                }
                if try_recover(committer_sig, &digest) != Some(validators[committer_idx]) {
                    return Err(ValidatorRegistryError::NotCommitter);
                }
                Ok(())
            },
        }
    }

    fn pick_next_committer() {
        PICK_NEXT_CALLS.with(|c| *c.borrow_mut() += 1);
        let n = VALIDATORS.with(|v| v.borrow().len()) as u32;
        if n == 0 {
            return;
        }
        COMMITTER_INDEX.with(|c| {
            let next = (*c.borrow() + 1) % n;
            *c.borrow_mut() = next;
        });
    }

    fn current_committer() -> Option<[u8; 20]> {
        let validators = VALIDATORS.with(|v| v.borrow().clone());
        if validators.is_empty() {
            return None;
        }
        let idx = (committer_index() as usize) % validators.len();
        Some(validators[idx])
    }
}

/// Test-only mapping from a validator's 20-byte address onto the mock
/// runtime's `u64` account space: the address's low 8 bytes, big-endian.
pub struct TestAddressMapping;

impl CommitterAddressMapping<AccountId> for TestAddressMapping {
    fn into_account_id(address: [u8; 20]) -> AccountId {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&address[12..20]);
        u64::from_be_bytes(buf)
    }
}

/// Convenience wrapper for test code that needs to sign extrinsics as a
/// specific validator address.
pub fn account_of(address: [u8; 20]) -> AccountId {
    TestAddressMapping::into_account_id(address)
}

#[frame_support::runtime]
mod runtime {
    #[runtime::runtime]
    #[runtime::derive(
        RuntimeCall,
        RuntimeEvent,
        RuntimeError,
        RuntimeOrigin,
        RuntimeFreezeReason,
        RuntimeHoldReason,
        RuntimeSlashReason,
        RuntimeLockId,
        RuntimeTask,
        RuntimeViewFunction
    )]
    pub struct Test;

    #[runtime::pallet_index(0)]
    pub type System = frame_system::Pallet<Test>;
    #[runtime::pallet_index(1)]
    pub type RollupChain = crate::Pallet<Test>;
}

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
    type Block = Block;
    type AccountId = AccountId;
}

frame_support::parameter_types! {
    pub const ContractAddress: [u8; 20] = CONTRACT_ADDRESS;
}

impl crate::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type ValidatorRegistry = TestValidatorRegistry;
    type AddressMapping = TestAddressMapping;
    type ContractAddress = ContractAddress;
}

pub fn new_test_ext() -> sp_io::TestExternalities {
    set_validators(Vec::new());
    set_mode(Mode::Compat);
    let mut storage = frame_system::GenesisConfig::<Test>::default().build_storage().unwrap();
    crate::GenesisConfig::<Test> { owner: Some(1) }.assimilate_storage(&mut storage).unwrap();
    let mut ext = sp_io::TestExternalities::new(storage);
    ext.execute_with(|| System::set_block_number(1));
    ext
}
