// This is free and unencumbered software released into the public domain.
//
// Anyone is free to copy, modify, publish, use, compile, sell, or
// distribute this software, either in source code form or as a compiled
// binary, for any purpose, commercial or non-commercial, and by any
// means.
//
// In jurisdictions that recognize copyright laws, the author or authors
// of this software dedicate any and all copyright interest in the
// software to the public domain. We make this dedication for the benefit
// of the public at large and to the detriment of our heirs and
// successors. We intend this dedication to be an overt act of
// relinquishment in perpetuity of all present and future rights to this
// software under copyright law.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS BE LIABLE FOR ANY CLAIM, DAMAGES OR
// OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE,
// ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR
// OTHER DEALINGS IN THE SOFTWARE.
//
// For more information, please refer to <http://unlicense.org>

//! This module contains the `impl`s for the runtime's traits (aka `Config`) of the various
//! pallets used in the runtime.

// Local module imports
use super::{
    AccountId, AuraId, Balance, Block, BlockNumber, EXISTENTIAL_DEPOSIT, Hash, Nonce, Runtime,
    RuntimeCall, RuntimeEvent, RuntimeFreezeReason, RuntimeHoldReason, SLOT_DURATION, System,
    VERSION,
};
// Substrate and Polkadot dependencies
use frame_support::{
    derive_impl, parameter_types,
    traits::{ConstBool, ConstU8, ConstU32, ConstU64, VariantCountOf},
    weights::{
        IdentityFee, Weight,
        constants::{BlockExecutionWeight, ExtrinsicBaseWeight, RocksDbWeight},
    },
};
use frame_system::limits::{BlockLength, BlockWeights};
use pallet_transaction_payment::{ConstFeeMultiplier, FungibleAdapter, Multiplier};
use sp_runtime::{
    FixedU128, Perbill, traits::{BlakeTwo256, Hash as HashT, IdentityLookup, One},
    transaction_validity::TransactionPriority,
};

const NORMAL_DISPATCH_RATIO: Perbill = Perbill::from_percent(75);

parameter_types! {
    pub const BlockHashCount: BlockNumber = 2400;
    pub const Version: sp_version::RuntimeVersion = VERSION;

    pub RuntimeBlockLength: BlockLength = BlockLength::max_with_normal_ratio(5 * 1024 * 1024, NORMAL_DISPATCH_RATIO);
    pub const SS58Prefix: u8 = 42;
}

pub const WEIGHT_REF_TIME_PER_SECOND: u64 = 1_000_000_000_000;
/// We allow for 2 seconds of compute with a 6 second average block time, with maximum proof size.
const MAXIMUM_BLOCK_WEIGHT: Weight =
    Weight::from_parts(WEIGHT_REF_TIME_PER_SECOND.saturating_mul(2), u64::MAX);

/// We assume that ~10% of the block weight is consumed by `on_initialize` handlers.
/// This is used to limit the maximal weight of a single extrinsic.
const AVERAGE_ON_INITIALIZE_RATIO: Perbill = Perbill::from_percent(10);
parameter_types! {
    pub RuntimeBlockWeights: BlockWeights = BlockWeights::builder()
        .base_block(BlockExecutionWeight::get())
        .for_class(frame_support::dispatch::DispatchClass::all(), |weights| {
            weights.base_extrinsic = ExtrinsicBaseWeight::get();
        })
        .for_class(frame_support::dispatch::DispatchClass::Normal, |weights| {
            weights.max_total = Some(NORMAL_DISPATCH_RATIO * MAXIMUM_BLOCK_WEIGHT);
        })
        .for_class(frame_support::dispatch::DispatchClass::Operational, |weights| {
            weights.max_total = Some(MAXIMUM_BLOCK_WEIGHT);
            // Operational transactions have some extra reserved space, so that they
            // are included even if block reached `MAXIMUM_BLOCK_WEIGHT`.
            weights.reserved = Some(
                MAXIMUM_BLOCK_WEIGHT - NORMAL_DISPATCH_RATIO * MAXIMUM_BLOCK_WEIGHT
            );
        })
        .avg_block_initialization(AVERAGE_ON_INITIALIZE_RATIO)
        .build_or_panic();
}

/// The default types are being injected by [`derive_impl`](`frame_support::derive_impl`) from
/// [`SoloChainDefaultConfig`](`struct@frame_system::config_preludes::SolochainDefaultConfig`),
/// but overridden as needed.
#[derive_impl(frame_system::config_preludes::SolochainDefaultConfig)]
impl frame_system::Config for Runtime {
    /// The block type for the runtime.
    type Block = Block;
    /// Block & extrinsics weights: base values and limits.
    type BlockWeights = RuntimeBlockWeights;
    /// The maximum length of a block (in bytes).
    type BlockLength = RuntimeBlockLength;
    /// The identifier used to distinguish between accounts.
    type AccountId = AccountId;
    /// The type for storing how many extrinsics an account has signed.
    type Nonce = Nonce;
    /// The type for hashing blocks and tries.
    type Hash = Hash;
    /// Maximum number of block number to block hash mappings to keep (oldest pruned first).
    type BlockHashCount = BlockHashCount;
    /// The weight of database operations that the runtime can invoke.
    type DbWeight = RocksDbWeight;
    /// Version of the runtime.
    type Version = Version;
    /// The data to be stored in an account.
    type AccountData = pallet_balances::AccountData<Balance>;
    /// This is used as an identifier of the chain. 42 is the generic substrate prefix.
    type SS58Prefix = SS58Prefix;
    type MaxConsumers = frame_support::traits::ConstU32<16>;

    /// The lookup mechanism to get account ID from whatever is passed in dispatchers.
    type Lookup = IdentityLookup<AccountId>;
}

parameter_types! {
    pub const MaxAuthorities: u32 = 100;
}

impl pallet_aura::Config for Runtime {
    type AuthorityId = AuraId;
    type DisabledValidators = ();
    type MaxAuthorities = MaxAuthorities;
    type AllowMultipleBlocksPerSlot = ConstBool<false>;
    type SlotDuration = pallet_aura::MinimumPeriodTimesTwo<Runtime>;
}

impl pallet_grandpa::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;

    type WeightInfo = ();
    type MaxAuthorities = MaxAuthorities;
    type MaxNominators = ConstU32<0>;
    type MaxSetIdSessionEntries = ConstU64<0>;

    type KeyOwnerProof = sp_core::Void;
    type EquivocationReportSystem = ();
}

impl pallet_timestamp::Config for Runtime {
    /// A timestamp: milliseconds since the unix epoch.
    type Moment = u64;
    type OnTimestampSet = Aura;
    type MinimumPeriod = ConstU64<{ SLOT_DURATION / 2 }>;
    type WeightInfo = ();
}

parameter_types! {
    pub const ExistentialDeposit: Balance = EXISTENTIAL_DEPOSIT;
}

impl pallet_balances::Config for Runtime {
    /// The ubiquitous event type.
    type RuntimeEvent = RuntimeEvent;
    type RuntimeHoldReason = RuntimeHoldReason;
    type RuntimeFreezeReason = RuntimeFreezeReason;
    type WeightInfo = pallet_balances::weights::SubstrateWeight<Runtime>;
    /// The type for recording an account's balance.
    type Balance = Balance;
    type DustRemoval = ();
    type ExistentialDeposit = ExistentialDeposit;
    type AccountStore = System;
    type ReserveIdentifier = [u8; 8];
    type FreezeIdentifier = RuntimeFreezeReason;
    type MaxLocks = ConstU32<50>;
    type MaxReserves = ();
    type MaxFreezes = VariantCountOf<RuntimeFreezeReason>;
    type DoneSlashHandler = ();
}

parameter_types! {
    pub FeeMultiplier: Multiplier = Multiplier::one();
}

impl pallet_transaction_payment::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type OnChargeTransaction = FungibleAdapter<Balances, ()>;
    type WeightToFee = IdentityFee<Balance>;
    type LengthToFee = IdentityFee<Balance>;
    type FeeMultiplierUpdate = ConstFeeMultiplier<FeeMultiplier>;
    type OperationalFeeMultiplier = ConstU8<5>;
    type WeightInfo = pallet_transaction_payment::weights::SubstrateWeight<Runtime>;
}

impl pallet_sudo::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type RuntimeCall = RuntimeCall;
    type WeightInfo = pallet_sudo::weights::SubstrateWeight<Runtime>;
}

parameter_types! {
    /// A fixed 20-byte identifier for this rollup deployment, mixed into every
    /// signed message so signatures cannot be replayed against another deployment.
    pub const RollupContractAddress: [u8; 20] = *b"xorion-rollup-chain0";
    pub const MaxValidators: u32 = 32;
    /// The chain's one-time genesis choice of threshold semantics: this
    /// runtime picks the corrected `Fixed` mode rather than reproducing the
    /// original `Compat` bug. Not changeable by a later runtime upgrade
    /// without an explicit storage migration.
    pub const RollupThresholdMode: pallet_validator_registry::ThresholdMode =
        pallet_validator_registry::ThresholdMode::Fixed;
}

impl pallet_validator_registry::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type MaxValidators = MaxValidators;
    type ThresholdMode = RollupThresholdMode;
    type RollupChainHook = ();
}

impl pallet_token_registry::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
}

impl pallet_rollup_chain::Config for Runtime {
    type RuntimeEvent = RuntimeEvent;
    type ValidatorRegistry = ValidatorRegistry;
    type AddressMapping = HashedCommitterMapping;
    type ContractAddress = RollupContractAddress;
}

/// Maps a validator's 20-byte secp256k1/keccak address onto this runtime's
/// `AccountId32` space by hashing a domain-separated encoding of it, the same
/// shape EVM-account-bridging runtimes use for their own address mapping.
pub struct HashedCommitterMapping;

impl pallet_rollup_chain::CommitterAddressMapping<AccountId> for HashedCommitterMapping {
    fn into_account_id(address: [u8; 20]) -> AccountId {
        let mut data = [0u8; 24];
        data[0..4].copy_from_slice(b"rlp:");
        data[4..24].copy_from_slice(&address);
        AccountId::new(BlakeTwo256::hash(&data).0)
    }
}

/// Bridges `pallet-rollup-chain`'s late-bound view of the validator registry
/// onto the concrete pallet. Lives here, not in either pallet crate, because
/// only the runtime legitimately depends on both.
impl pallet_rollup_chain::ValidatorRegistryProvider for ValidatorRegistry {
    fn check_signatures(
        block_number: u32,
        transitions: &[alloc::vec::Vec<u8>],
        signatures: &[alloc::vec::Vec<u8>],
    ) -> Result<(), pallet_rollup_chain::ValidatorRegistryError> {
        pallet_validator_registry::Pallet::<Runtime>::check_signatures(
            block_number,
            transitions,
            signatures,
        )
        .map_err(|err| match err {
            pallet_validator_registry::Error::<Runtime>::EmptyValidatorSet =>
                pallet_rollup_chain::ValidatorRegistryError::EmptyValidatorSet,
            pallet_validator_registry::Error::<Runtime>::SignatureCountMismatch =>
                pallet_rollup_chain::ValidatorRegistryError::SignatureCountMismatch,
            pallet_validator_registry::Error::<Runtime>::ThresholdNotMet =>
                pallet_rollup_chain::ValidatorRegistryError::ThresholdNotMet,
            pallet_validator_registry::Error::<Runtime>::InvalidSignature =>
                pallet_rollup_chain::ValidatorRegistryError::InvalidSignature,
            pallet_validator_registry::Error::<Runtime>::NotCommitter =>
                pallet_rollup_chain::ValidatorRegistryError::NotCommitter,
            // Every other variant is owner/genesis-management only and
            // cannot occur inside `check_signatures`.
            _ => pallet_rollup_chain::ValidatorRegistryError::InvalidSignature,
        })
    }

    fn pick_next_committer() {
        pallet_validator_registry::Pallet::<Runtime>::pick_next_committer();
    }

    fn current_committer() -> Option<[u8; 20]> {
        pallet_validator_registry::Pallet::<Runtime>::current_committer()
    }
}
