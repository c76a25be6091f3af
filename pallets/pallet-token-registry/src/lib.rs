#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(test)]
mod mock;

pub use pallet::*;

/// Index `0` is both the first real index assigned by `register_token` and
/// what a `ValueQuery` read of an absent `AddressToIndex` entry would return.
/// This pallet avoids the ambiguity on-chain by storing `AddressToIndex` as
/// `OptionQuery`, so `None` (never registered) and `Some(0)` (registered
/// first) stay distinguishable in Rust. Off-chain indexers that flatten the
/// `Option` to a `0`- or `u32::MAX`-sentinel convention must still take care
/// not to reintroduce the ambiguity themselves.
pub const INDEX_ZERO_AMBIGUITY_NOTE: &str =
    "AddressToIndex is OptionQuery: None means unregistered, Some(0) means registered at index 0";

#[frame_support::pallet]
pub mod pallet {
    use frame_support::pallet_prelude::*;
    use frame_system::pallet_prelude::*;

    const STORAGE_VERSION: StorageVersion = StorageVersion::new(1);

    #[pallet::pallet]
    #[pallet::storage_version(STORAGE_VERSION)]
    pub struct Pallet<T>(_);

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;
    }

    /// Owner-equivalent admin account, following this workspace's
    /// `Owner: StorageValue<T::AccountId>` convention (see `pallet-launch-claim`).
    #[pallet::storage]
    #[pallet::getter(fn owner)]
    pub type Owner<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

    #[pallet::storage]
    #[pallet::getter(fn address_to_index)]
    pub type AddressToIndex<T: Config> = StorageMap<_, Blake2_128Concat, [u8; 20], u32, OptionQuery>;

    #[pallet::storage]
    #[pallet::getter(fn index_to_address)]
    pub type IndexToAddress<T: Config> = StorageMap<_, Blake2_128Concat, u32, [u8; 20], OptionQuery>;

    /// Monotonically increasing; never decremented, so an index is never
    /// reassigned once handed out.
    #[pallet::storage]
    #[pallet::getter(fn num_tokens)]
    pub type NumTokens<T: Config> = StorageValue<_, u32, ValueQuery>;

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
        TokenRegistered { token_address: [u8; 20], token_index: u32 },
    }

    #[pallet::error]
    pub enum Error<T> {
        NoOwner,
        NotOwner,
        ZeroAddress,
        AlreadyRegistered,
        TooManyTokens,
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Owner-only. Assigns the next monotonic index to `addr`, rejecting
        /// the zero address and re-registration of an already-known address.
        #[pallet::call_index(0)]
        #[pallet::weight(T::DbWeight::get().reads_writes(2, 3))]
        pub fn register_token(origin: OriginFor<T>, addr: [u8; 20]) -> DispatchResult {
            Self::ensure_owner(origin)?;
            ensure!(addr != [0u8; 20], Error::<T>::ZeroAddress);
            ensure!(AddressToIndex::<T>::get(addr).is_none(), Error::<T>::AlreadyRegistered);

            let index = NumTokens::<T>::get();
            let next = index.checked_add(1).ok_or(Error::<T>::TooManyTokens)?;

            AddressToIndex::<T>::insert(addr, index);
            IndexToAddress::<T>::insert(index, addr);
            NumTokens::<T>::put(next);

            Self::deposit_event(Event::TokenRegistered { token_address: addr, token_index: index });
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
    }
}
