use crate::{RollupChainCommitterHook, ThresholdMode};
use frame_support::{derive_impl, parameter_types};
use sp_runtime::BuildStorage;
use std::cell::RefCell;

type Block = frame_system::mocking::MockBlock<Test>;

pub type AccountId = u64;

thread_local! {
    pub static LAST_ANNOUNCED_COMMITTER: RefCell<Option<[u8; 20]>> = const { RefCell::new(None) };
    static THRESHOLD_MODE: RefCell<ThresholdMode> = const { RefCell::new(ThresholdMode::Compat) };
}

/// Lets individual tests pick which threshold semantics the mock runtime
/// enforces, without standing up a second mock runtime.
pub fn set_threshold_mode(mode: ThresholdMode) {
    THRESHOLD_MODE.with(|m| *m.borrow_mut() = mode);
}

pub struct Mode;
impl frame_support::traits::Get<ThresholdMode> for Mode {
    fn get() -> ThresholdMode {
        THRESHOLD_MODE.with(|m| *m.borrow())
    }
}

pub struct RecordingHook;
impl RollupChainCommitterHook for RecordingHook {
    fn on_committer_changed(new_committer: [u8; 20]) {
        LAST_ANNOUNCED_COMMITTER.with(|c| *c.borrow_mut() = Some(new_committer));
    }
}

pub fn last_announced_committer() -> Option<[u8; 20]> {
    LAST_ANNOUNCED_COMMITTER.with(|c| *c.borrow())
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
    pub type ValidatorRegistry = crate::Pallet<Test>;
}

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
    type Block = Block;
    type AccountId = AccountId;
}

parameter_types! {
    pub const MaxValidators: u32 = 16;
}

impl crate::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type MaxValidators = MaxValidators;
    type ThresholdMode = Mode;
    type RollupChainHook = RecordingHook;
}

pub fn new_test_ext() -> sp_io::TestExternalities {
    set_threshold_mode(ThresholdMode::Compat);
    let mut storage = frame_system::GenesisConfig::<Test>::default().build_storage().unwrap();
    crate::GenesisConfig::<Test> { owner: Some(1) }.assimilate_storage(&mut storage).unwrap();
    let mut ext = sp_io::TestExternalities::new(storage);
    ext.execute_with(|| System::set_block_number(1));
    ext
}
