#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(test)]
mod mock;

pub use pallet::*;

/// Called whenever the elected committer changes (on `set_validators` and on
/// every successful commit's rotation). Gives `pallet-rollup-chain` a
/// late-bound way to learn who may submit blocks without this crate taking a
/// Cargo dependency on it — see `DESIGN.md`'s cyclic-wiring note.
pub trait RollupChainCommitterHook {
    fn on_committer_changed(new_committer: [u8; 20]);
}

impl RollupChainCommitterHook for () {
    fn on_committer_changed(_new_committer: [u8; 20]) {}
}

/// Selects which of the two threshold semantics `check_signatures` enforces.
/// Neither is a silent default — a runtime's `Config` must name one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, codec::Encode, codec::Decode, scale_info::TypeInfo)]
pub enum ThresholdMode {
    /// Bit-for-bit reproduction of the original bug: every validator index
    /// must carry a recovering signature, which makes the `n<4`/`2n/3`
    /// branch below unreachable.
    Compat,
    /// Accepts any subset of signatures meeting the threshold at the
    /// corresponding validator indices.
    Fixed,
}

#[frame_support::pallet]
pub mod pallet {
    use super::{RollupChainCommitterHook, ThresholdMode};
    use frame_support::pallet_prelude::*;
    use frame_system::pallet_prelude::*;
    use rollup_primitives::keccak256;
    use sp_std::vec::Vec;

    const STORAGE_VERSION: StorageVersion = StorageVersion::new(1);

    #[pallet::pallet]
    #[pallet::storage_version(STORAGE_VERSION)]
    pub struct Pallet<T>(_);

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Upper bound on validator-set size (for `BoundedVec` encoding).
        #[pallet::constant]
        type MaxValidators: Get<u32>;

        /// Which threshold semantics `check_signatures` enforces.
        #[pallet::constant]
        type ThresholdMode: Get<ThresholdMode>;

        /// Notified on every committer change.
        type RollupChainHook: RollupChainCommitterHook;
    }

    /// Owner-equivalent admin account, following this workspace's
    /// `Owner: StorageValue<T::AccountId>` convention (see `pallet-launch-claim`).
    #[pallet::storage]
    #[pallet::getter(fn owner)]
    pub type Owner<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

    #[pallet::storage]
    #[pallet::getter(fn validators)]
    pub type Validators<T: Config> =
        StorageValue<_, BoundedVec<[u8; 20], T::MaxValidators>, ValueQuery>;

    #[pallet::storage]
    #[pallet::getter(fn current_committer_index)]
    pub type CurrentCommitterIndex<T: Config> = StorageValue<_, u32, ValueQuery>;

    /// One-shot: flips to `true` on the first `bind_rollup_chain` call and
    /// never flips back. `set_validators` requires this to already be `true`.
    #[pallet::storage]
    #[pallet::getter(fn rollup_chain_bound)]
    pub type RollupChainBound<T: Config> = StorageValue<_, bool, ValueQuery>;

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
        CommitterChanged { new_committer: [u8; 20] },
        ValidatorsUpdated { validators: Vec<[u8; 20]> },
        RollupChainBoundEvent,
    }

    #[pallet::error]
    pub enum Error<T> {
        NoOwner,
        NotOwner,
        EmptyValidatorSet,
        TooManyValidators,
        RollupChainAlreadyBound,
        RollupChainNotBound,
        EmptyValidatorsForCommitter,
        SignatureCountMismatch,
        ThresholdNotMet,
        InvalidSignature,
        NotCommitter,
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Owner-only. Replaces the validator set, resets the committer
        /// cursor to 0, and announces the new committer. Requires
        /// `bind_rollup_chain` to have already run once.
        #[pallet::call_index(0)]
        #[pallet::weight(T::DbWeight::get().reads_writes(2, 2))]
        pub fn set_validators(origin: OriginFor<T>, validators: Vec<[u8; 20]>) -> DispatchResult {
            Self::ensure_owner(origin)?;
            ensure!(!validators.is_empty(), Error::<T>::EmptyValidatorSet);
            ensure!(RollupChainBound::<T>::get(), Error::<T>::RollupChainNotBound);

            let bounded: BoundedVec<[u8; 20], T::MaxValidators> =
                validators.clone().try_into().map_err(|_| Error::<T>::TooManyValidators)?;

            Validators::<T>::put(bounded);
            CurrentCommitterIndex::<T>::put(0u32);
            Self::deposit_event(Event::ValidatorsUpdated { validators });
            Self::announce_committer();
            Ok(())
        }

        /// Owner-only, one-shot. Binds the (otherwise cyclic) reference to
        /// `pallet-rollup-chain`: before this runs, `set_validators` is
        /// rejected, so the committer can never be announced to a caller
        /// that hasn't bound yet.
        #[pallet::call_index(1)]
        #[pallet::weight(T::DbWeight::get().reads_writes(1, 1))]
        pub fn bind_rollup_chain(origin: OriginFor<T>) -> DispatchResult {
            Self::ensure_owner(origin)?;
            ensure!(!RollupChainBound::<T>::get(), Error::<T>::RollupChainAlreadyBound);
            RollupChainBound::<T>::put(true);
            Self::deposit_event(Event::RollupChainBoundEvent);
            if !Validators::<T>::get().is_empty() {
                Self::announce_committer();
            }
            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        fn ensure_owner(origin: OriginFor<T>) -> Result<T::AccountId, DispatchError> {
            let who = ensure_signed(origin)?;
            let owner = Owner::<T>::get().ok_or(Error::<T>::NoOwner)?;
            ensure!(who == owner, Error::<T>::NotOwner);
            Ok(who)
        }

        /// keccak256 of the SCALE encoding of `(block_number, transitions)` —
        /// the message every validator signature is taken over.
        pub fn block_digest(block_number: u32, transitions: &[Vec<u8>]) -> [u8; 32] {
            keccak256(&(block_number, transitions).encode())
        }

        fn eth_signed_digest(inner: &[u8; 32]) -> [u8; 32] {
            let mut buf = Vec::with_capacity(28 + 32);
            buf.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
            buf.extend_from_slice(inner);
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

        /// Called by `pallet-rollup-chain::commit_block`. Validates the
        /// signature threshold for `mode` and that the current committer's
        /// index specifically carries a recovering signature — this is how
        /// "the caller must equal `committerAddress`" is expressed here: this
        /// chain's extrinsic-signing key space (the native `AccountId`) is
        /// not the secp256k1/keccak key space validators sign with, so
        /// committer identity is established cryptographically from
        /// `signatures` rather than compared against `origin` directly.
        pub fn check_signatures(
            block_number: u32,
            transitions: &[Vec<u8>],
            signatures: &[Vec<u8>],
        ) -> Result<(), Error<T>> {
            let validators = Validators::<T>::get();
            let n = validators.len();
            ensure!(n > 0, Error::<T>::EmptyValidatorSet);
            ensure!(signatures.len() == n, Error::<T>::SignatureCountMismatch);
            let digest = Self::eth_signed_digest(&Self::block_digest(block_number, transitions));
            let committer_index = (CurrentCommitterIndex::<T>::get() as usize) % n;

            match T::ThresholdMode::get() {
                ThresholdMode::Compat => {
                    for i in 0..n {
                        let recovered =
                            Self::try_recover(&signatures[i], &digest).ok_or(Error::<T>::InvalidSignature)?;
                        ensure!(recovered == validators[i], Error::<T>::InvalidSignature);
                    }
                    // `count` is always `n` here, so the formula below can
                    // never reject — preserved verbatim as documented dead
                    // code, matching the source's own unresolved TODO.
                    let count = n as u32;
                    let _threshold_is_vacuous =
                        if n < 4 { count == n as u32 } else { count * 3 > n as u32 * 2 };
                },
                ThresholdMode::Fixed => {
                    let mut count = 0u32;
                    for i in 0..n {
                        if signatures[i].is_empty() {
                            continue;
                        }
                        if Self::try_recover(&signatures[i], &digest) == Some(validators[i]) {
                            count += 1;
                        }
                    }
                    let threshold_met = if n < 4 { count == n as u32 } else { count * 3 > n as u32 * 2 };
                    ensure!(threshold_met, Error::<T>::ThresholdNotMet);

                    let committer_sig = &signatures[committer_index];
                    ensure!(!committer_sig.is_empty(), Error::<T>::NotCommitter);
                    let recovered =
                        Self::try_recover(committer_sig, &digest).ok_or(Error::<T>::NotCommitter)?;
                    ensure!(recovered == validators[committer_index], Error::<T>::NotCommitter);
                },
            }
            Ok(())
        }

        /// Called by `pallet-rollup-chain::commit_block` after a successful
        /// commit; advances the cursor strictly round-robin.
        pub fn pick_next_committer() {
            let n = Validators::<T>::get().len() as u32;
            if n == 0 {
                return;
            }
            let next = (CurrentCommitterIndex::<T>::get() + 1) % n;
            CurrentCommitterIndex::<T>::put(next);
            Self::announce_committer();
        }

        pub fn current_committer() -> Option<[u8; 20]> {
            let validators = Validators::<T>::get();
            if validators.is_empty() {
                return None;
            }
            let idx = (CurrentCommitterIndex::<T>::get() as usize) % validators.len();
            Some(validators[idx])
        }

        fn announce_committer() {
            if let Some(committer) = Self::current_committer() {
                Self::deposit_event(Event::CommitterChanged { new_committer: committer });
                T::RollupChainHook::on_committer_changed(committer);
            }
        }
    }
}
