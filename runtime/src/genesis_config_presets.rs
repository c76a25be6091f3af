use crate::{AccountId, AuraId, RuntimeGenesisConfig, UNIT};
use alloc::{vec, vec::Vec};
use frame_support::build_struct_json_patch;
use pallet_grandpa::AuthorityId as GrandpaId;
use serde_json::Value;
use sp_core::crypto::get_public_from_string_or_panic;
use sp_core::{ed25519, sr25519};
use sp_genesis_builder::PresetId;
use sp_keyring::Sr25519Keyring;

/// Returns the genesis config presets populated with given parameters.
fn testnet_genesis(
    initial_authorities: Vec<(AuraId, GrandpaId)>,
    root: AccountId,
    endowed_accounts: Vec<AccountId>,
) -> Value {
    build_struct_json_patch!(RuntimeGenesisConfig {
        balances: BalancesConfig {
            balances: endowed_accounts
                .iter()
                .cloned()
                .map(|k| (k, 1_000_000 * UNIT))
                .collect::<Vec<_>>(),
        },
        aura: AuraConfig {
            authorities: initial_authorities.iter().map(|x| x.0.clone()).collect(),
        },
        grandpa: GrandpaConfig {
            authorities: initial_authorities.into_iter().map(|x| (x.1, 1)).collect(),
        },
        sudo: SudoConfig { key: Some(root.clone()) },
        validator_registry: ValidatorRegistryConfig { owner: Some(root.clone()) },
        token_registry: TokenRegistryConfig { owner: Some(root.clone()) },
        rollup_chain: RollupChainConfig { owner: Some(root) },
    })
}

/// Return the development genesis config.
pub fn development_config_genesis() -> Value {
    testnet_genesis(
        vec![authority_keys_from_seed("Alice")],
        account_id_from_seed("Alice"),
        Sr25519Keyring::well_known().map(|key| key.to_account_id()).collect(),
    )
}

/// Return the local genesis config preset.
pub fn local_config_genesis() -> Value {
    testnet_genesis(
        vec![authority_keys_from_seed("Alice"), authority_keys_from_seed("Bob")],
        account_id_from_seed("Alice"),
        Sr25519Keyring::well_known().map(|key| key.to_account_id()).collect(),
    )
}

/// Return the test-net genesis config preset: a single authority, same shape as
/// `development_config_genesis` but kept distinct so the seed can diverge from
/// `Alice` once a real deployment key is available.
pub fn test_net_config_genesis() -> Value {
    testnet_genesis(
        vec![authority_keys_from_seed("Alice")],
        account_id_from_seed("Alice"),
        Sr25519Keyring::well_known().map(|key| key.to_account_id()).collect(),
    )
}

/// Return the main-net genesis config preset.
///
/// Uses the same well-known development keys as the other presets until a real
/// main-net authority set and root key are available.
pub fn main_net_config_genesis() -> Value {
    testnet_genesis(
        vec![authority_keys_from_seed("Alice")],
        account_id_from_seed("Alice"),
        vec![account_id_from_seed("Alice")],
    )
}

pub const TEST_NET: &str = "testnet";
pub const MAIN_NET: &str = "mainnet";

/// Provides the JSON representation of predefined genesis config for given `id`.
pub fn get_preset(id: &PresetId) -> Option<Vec<u8>> {
    let patch = match id.as_ref() {
        sp_genesis_builder::DEV_RUNTIME_PRESET => development_config_genesis(),
        sp_genesis_builder::LOCAL_TESTNET_RUNTIME_PRESET => local_config_genesis(),
        TEST_NET => test_net_config_genesis(),
        MAIN_NET => main_net_config_genesis(),
        _ => return None,
    };
    Some(
        serde_json::to_string(&patch)
            .expect("serialization to json is expected to work. qed.")
            .into_bytes(),
    )
}

/// List of supported presets.
pub fn preset_names() -> Vec<PresetId> {
    vec![
        PresetId::from(sp_genesis_builder::DEV_RUNTIME_PRESET),
        PresetId::from(sp_genesis_builder::LOCAL_TESTNET_RUNTIME_PRESET),
        PresetId::from(TEST_NET),
        PresetId::from(MAIN_NET),
    ]
}

fn account_id_from_seed(seed: &str) -> AccountId {
    get_public_from_string_or_panic::<sr25519::Public>(seed).into()
}

/// Helper function to generate an Aura + Grandpa authority pair from a seed.
///
/// Note: `//` is prepended internally.
fn authority_keys_from_seed(seed: &str) -> (AuraId, GrandpaId) {
    (
        get_public_from_string_or_panic::<sr25519::Public>(seed).into(),
        get_public_from_string_or_panic::<ed25519::Public>(seed).into(),
    )
}
