#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(test)]
mod mock;

pub use pallet::*;

/// What `pallet-rollup-chain` needs from `pallet-validator-registry`, kept as
/// a local trait so neither pallet takes a Cargo dependency on the other —
/// only the runtime crate, which legitimately depends on both, implements
/// this for the validator-registry pallet's concrete `Pallet<Runtime>` type.
pub trait ValidatorRegistryProvider {
    /// Checks the committer/threshold signature requirement for `commit_block`.
    fn check_signatures(
        block_number: u32,
        transitions: &[sp_std::vec::Vec<u8>],
        signatures: &[sp_std::vec::Vec<u8>],
    ) -> Result<(), ValidatorRegistryError>;
    /// Advances the committer cursor after a successful commit.
    fn pick_next_committer();
    fn current_committer() -> Option<[u8; 20]>;
}

/// Binds a validator's secp256k1/keccak address onto this chain's native
/// `AccountId` space so `commit_block`'s signed origin can be compared
/// directly against `ValidatorRegistry::current_committer()` — this chain's
/// extrinsic-signing key space is not the secp256k1 space validators sign
/// block digests with, so some explicit mapping between the two is required.
pub trait CommitterAddressMapping<AccountId> {
    fn into_account_id(address: [u8; 20]) -> AccountId;
}

/// Mirrors `pallet_validator_registry::Error`'s signature-related variants
/// without requiring a dependency on that pallet's crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidatorRegistryError {
    EmptyValidatorSet,
    SignatureCountMismatch,
    ThresholdNotMet,
    InvalidSignature,
    NotCommitter,
}

#[frame_support::pallet]
pub mod pallet {
    use super::{CommitterAddressMapping, ValidatorRegistryError, ValidatorRegistryProvider};
    use frame_support::pallet_prelude::*;
    use frame_system::pallet_prelude::*;
    use rollup_evaluator::{decode_transition, evaluate_transition};
    use rollup_merkle::SparseMerkleTree;
    use rollup_primitives::{Block, IncludedStorageSlot, IncludedTransition, StorageSlot};
    use sp_std::vec::Vec;

    const STORAGE_VERSION: StorageVersion = StorageVersion::new(1);

    #[pallet::pallet]
    #[pallet::storage_version(STORAGE_VERSION)]
    pub struct Pallet<T>(_);

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Late-bound view onto `pallet-validator-registry` — see the
        /// crate-level note on cyclic wiring.
        type ValidatorRegistry: ValidatorRegistryProvider;

        /// Resolves the current committer's validator address onto this
        /// chain's `AccountId` space for the `commit_block` origin check.
        type AddressMapping: CommitterAddressMapping<Self::AccountId>;

        /// Mixed into every user signature so messages from one rollup
        /// deployment cannot be replayed against another.
        #[pallet::constant]
        type ContractAddress: Get<[u8; 20]>;
    }

    /// Owner-equivalent admin account, kept for symmetry with the other two
    /// pallets' `Owner: StorageValue<T::AccountId>` convention (see
    /// `pallet-launch-claim`); no call in this pallet is owner-gated today —
    /// `commit_block` is gated by the validator-registry signature threshold
    /// and `prove_transition_invalid` is open to any signed account.
    #[pallet::storage]
    #[pallet::getter(fn owner)]
    pub type Owner<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

    /// Append-only block ledger, keyed by block number. A pruned (tombstoned)
    /// block has both fields of its `Block` zeroed in place; `BlockCount` is
    /// never reduced.
    #[pallet::storage]
    #[pallet::getter(fn blocks)]
    pub type Blocks<T: Config> = StorageMap<_, Blake2_128Concat, u32, Block, ValueQuery>;

    #[pallet::storage]
    #[pallet::getter(fn block_count)]
    pub type BlockCount<T: Config> = StorageValue<_, u32, ValueQuery>;

    #[pallet::genesis_config]
    pub struct GenesisConfig<T: Config> {
        pub owner: Option<T::AccountId>,
    }

    impl<T: Config> Default for GenesisConfig<T> {
        fn default() -> Self {
            Self { owner: None }
        }
    }

    #[pallet::genesis_build]
    impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
        fn build(&self) {
            if let Some(ref owner) = self.owner {
                Owner::<T>::put(owner.clone());
            }
        }
    }

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        TransitionSubmitted { data: Vec<u8> },
        RollupBlockCommitted { block_number: u32, transitions: Vec<Vec<u8>> },
        DecodedTransition { success: bool, return_data: Vec<u8> },
        BlockPruned { from_block: u32 },
    }

    #[pallet::error]
    pub enum Error<T> {
        /// `block_number` did not equal `BlockCount` — no gaps, no replays.
        WrongBlockNumber,
        EmptyValidatorSet,
        SignatureCountMismatch,
        ThresholdNotMet,
        InvalidSignature,
        NotCommitter,
        /// A referenced block is missing or has been pruned.
        BlockPruned,
        /// The two transitions are not block-adjacent.
        NotSequential,
        /// The `pre` transition's bytes do not decode — the prior block
        /// itself must be challenged instead of this pair.
        PreTransitionUndecodable,
        /// Supplied storage-slot indices do not match the invalid
        /// transition's access list.
        AccessListMismatch,
        /// A storage-slot witness failed to verify against the asserted
        /// pre-state root.
        BadWitness,
        /// The disputed transition evaluated cleanly to the root it claimed —
        /// the caller's challenge was wrong.
        NoFraudDetected,
    }

    impl<T> From<ValidatorRegistryError> for Error<T> {
        fn from(e: ValidatorRegistryError) -> Self {
            match e {
                ValidatorRegistryError::EmptyValidatorSet => Error::EmptyValidatorSet,
                ValidatorRegistryError::SignatureCountMismatch => Error::SignatureCountMismatch,
                ValidatorRegistryError::ThresholdNotMet => Error::ThresholdNotMet,
                ValidatorRegistryError::InvalidSignature => Error::InvalidSignature,
                ValidatorRegistryError::NotCommitter => Error::NotCommitter,
            }
        }
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Optimistic commit path: no semantic validation of `transitions`
        /// happens here beyond the signature threshold — that is the
        /// optimistic premise. Weight must stay low; the heavier Merkle and
        /// evaluator work only ever runs inside `prove_transition_invalid`.
        #[pallet::call_index(0)]
        #[pallet::weight(T::DbWeight::get().reads_writes(4, 2))]
        pub fn commit_block(
            origin: OriginFor<T>,
            block_number: u32,
            transitions: Vec<Vec<u8>>,
            signatures: Vec<Vec<u8>>,
        ) -> DispatchResult {
            let who = ensure_signed(origin)?;

            let committer = T::ValidatorRegistry::current_committer().ok_or(Error::<T>::NotCommitter)?;
            ensure!(who == T::AddressMapping::into_account_id(committer), Error::<T>::NotCommitter);

            ensure!(block_number == BlockCount::<T>::get(), Error::<T>::WrongBlockNumber);

            T::ValidatorRegistry::check_signatures(block_number, &transitions, &signatures)
                .map_err(Error::<T>::from)?;

            for data in transitions.iter() {
                Self::deposit_event(Event::TransitionSubmitted { data: data.clone() });
            }

            let root = rollup_merkle::merkle_root(&transitions);
            Blocks::<T>::insert(block_number, Block { root_hash: root, block_size: transitions.len() as u32 });
            let next_block_number = block_number.checked_add(1).ok_or(Error::<T>::WrongBlockNumber)?;
            BlockCount::<T>::put(next_block_number);

            Self::deposit_event(Event::RollupBlockCommitted { block_number, transitions });

            T::ValidatorRegistry::pick_next_committer();
            Ok(())
        }

        /// Fraud-proof adjudicator: any signed account may challenge. Any
        /// step that detects fraud prunes and returns `Ok(())` — the
        /// extrinsic "succeeding" is the intended, paid-for outcome of a
        /// correct challenge. Reaching the end without detecting fraud fails
        /// with `Error::NoFraudDetected` so the caller pays the fee.
        #[pallet::call_index(1)]
        #[pallet::weight(T::DbWeight::get().reads_writes(8, 4))]
        pub fn prove_transition_invalid(
            origin: OriginFor<T>,
            pre_included: IncludedTransition,
            invalid_included: IncludedTransition,
            slots: Vec<IncludedStorageSlot>,
        ) -> DispatchResult {
            let _who = ensure_signed(origin)?;

            Self::verify_sequential_transitions(&pre_included, &invalid_included)?;

            let pre_transition = decode_transition(&pre_included.transition)
                .map_err(|_| Error::<T>::PreTransitionUndecodable)?;

            let invalid_transition = match decode_transition(&invalid_included.transition) {
                Ok(t) => t,
                Err(_) => {
                    Self::prune_blocks_after(invalid_included.inclusion_proof.block_number);
                    return Ok(());
                },
            };

            let invalid_access_list = invalid_transition.access_list();
            ensure!(slots.len() == invalid_access_list.len(), Error::<T>::AccessListMismatch);
            for (slot, expected_index) in slots.iter().zip(invalid_access_list.iter()) {
                ensure!(slot.storage_slot.slot_index == *expected_index, Error::<T>::AccessListMismatch);
            }

            let pre_state_root = pre_transition.state_root();
            let mut tree = SparseMerkleTree::new(pre_state_root);
            for slot in slots.iter() {
                tree.verify_and_store(
                    &slot.storage_slot.value.to_leaf_bytes(),
                    slot.storage_slot.slot_index,
                    &slot.siblings,
                )
                .map_err(|_| Error::<T>::BadWitness)?;
            }

            let contract_addr = T::ContractAddress::get();
            let storage_slots: Vec<StorageSlot> = slots.iter().map(|s| s.storage_slot.clone()).collect();
            let outcome = evaluate_transition(contract_addr, &invalid_transition, &storage_slots);

            match outcome {
                Err(_evaluator_error) => {
                    Self::deposit_event(Event::DecodedTransition { success: false, return_data: Vec::new() });
                    Self::prune_blocks_after(invalid_included.inclusion_proof.block_number);
                    return Ok(());
                },
                Ok(outputs) => {
                    Self::deposit_event(Event::DecodedTransition {
                        success: true,
                        return_data: codec::Encode::encode(&outputs),
                    });

                    for (slot, output) in slots.iter().zip(outputs.iter()) {
                        tree.update_leaf(*output, slot.storage_slot.slot_index)
                            .map_err(|_| Error::<T>::BadWitness)?;
                    }

                    if tree.root() != invalid_transition.state_root() {
                        Self::prune_blocks_after(invalid_included.inclusion_proof.block_number);
                        Ok(())
                    } else {
                        Err(Error::<T>::NoFraudDetected.into())
                    }
                },
            }
        }
    }

    impl<T: Config> Pallet<T> {
        fn verify_sequential_transitions(
            pre: &IncludedTransition,
            invalid: &IncludedTransition,
        ) -> Result<(), Error<T>> {
            let pre_block = Blocks::<T>::get(pre.inclusion_proof.block_number);
            ensure!(!pre_block.is_pruned(), Error::<T>::BlockPruned);
            ensure!(
                rollup_merkle::verify(
                    pre_block.root_hash,
                    &pre.transition,
                    pre.inclusion_proof.transition_index,
                    &pre.inclusion_proof.siblings,
                ),
                Error::<T>::NotSequential
            );

            let invalid_block = Blocks::<T>::get(invalid.inclusion_proof.block_number);
            ensure!(!invalid_block.is_pruned(), Error::<T>::BlockPruned);
            ensure!(
                rollup_merkle::verify(
                    invalid_block.root_hash,
                    &invalid.transition,
                    invalid.inclusion_proof.transition_index,
                    &invalid.inclusion_proof.siblings,
                ),
                Error::<T>::NotSequential
            );

            let pre_next_index = pre.inclusion_proof.transition_index.checked_add(1);
            let same_block_adjacent = pre.inclusion_proof.block_number == invalid.inclusion_proof.block_number
                && pre_next_index == Some(invalid.inclusion_proof.transition_index);

            let next_block_number = pre.inclusion_proof.block_number.checked_add(1);
            let cross_block_adjacent = Some(invalid.inclusion_proof.block_number) == next_block_number
                && pre_next_index == Some(pre_block.block_size)
                && invalid.inclusion_proof.transition_index == 0;

            ensure!(same_block_adjacent || cross_block_adjacent, Error::<T>::NotSequential);
            Ok(())
        }

        /// Tombstones every block from `n` (inclusive) up to `BlockCount`.
        /// `BlockCount` itself is never reduced, so a later call with a
        /// larger `n` leaves already-tombstoned entries untouched —
        /// idempotent by construction.
        pub(crate) fn prune_blocks_after(n: u32) {
            let count = BlockCount::<T>::get();
            let mut b = n;
            while b < count {
                Blocks::<T>::insert(b, Block::default());
                b += 1;
            }
            Self::deposit_event(Event::BlockPruned { from_block: n });
        }
    }
}
