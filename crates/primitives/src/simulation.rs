//! Types produced and consumed by the traced validation of user operations

use ethers::{
    contract::{EthAbiCodec, EthAbiType},
    types::{Address, H256, U256},
};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Time interval before a user operation expires (in seconds)
pub const EXPIRATION_TIMESTAMP_DIFF: u64 = 30;

lazy_static! {
    /// Opcodes the entities may not execute during validation
    pub static ref FORBIDDEN_OPCODES: HashSet<String> = {
        let mut set = HashSet::new();
        set.insert("GASPRICE".to_string());
        set.insert("GASLIMIT".to_string());
        set.insert("DIFFICULTY".to_string());
        set.insert("TIMESTAMP".to_string());
        set.insert("BASEFEE".to_string());
        set.insert("BLOCKHASH".to_string());
        set.insert("NUMBER".to_string());
        set.insert("SELFBALANCE".to_string());
        set.insert("BALANCE".to_string());
        set.insert("ORIGIN".to_string());
        set.insert("GAS".to_string());
        set.insert("CREATE".to_string());
        set.insert("COINBASE".to_string());
        set.insert("SELFDESTRUCT".to_string());
        set.insert("RANDOM".to_string());
        set.insert("PREVRANDAO".to_string());
        set
    };
    pub static ref CREATE_OPCODE: String = "CREATE".to_string();
    pub static ref CREATE2_OPCODE: String = "CREATE2".to_string();
    pub static ref RETURN_OPCODE: String = "RETURN".to_string();
    pub static ref REVERT_OPCODE: String = "REVERT".to_string();
    pub static ref VALIDATE_PAYMASTER_USER_OP_FUNCTION: String =
        "validatePaymasterUserOp".to_string();
}

/// Code hash of an externally accessed contract, captured during the traced
/// simulation
#[derive(
    Debug,
    Default,
    Clone,
    Eq,
    PartialEq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EthAbiCodec,
    EthAbiType,
)]
pub struct CodeHash {
    pub address: Address,
    pub hash: H256,
}

/// Storage referenced during validation; doubles as the `knownAccounts` hint
/// for the conditional transaction endpoint
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageMap {
    /// Whole-account storage roots (from `eth_getProof`)
    pub root_hashes: HashMap<Address, H256>,
    /// Individual slot values observed during simulation
    pub slots: HashMap<Address, HashMap<H256, H256>>,
}

/// Per-validation overrides for stake requirements
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub min_stake: Option<U256>,
    pub min_unstake_delay: Option<U256>,
}
