//! Reputation types for entities involved in user operations

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// All possible reputation statuses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    OK,
    THROTTLED,
    BANNED,
}

/// Wire representation of a status (the debug RPC exchanges raw numbers)
pub type ReputationStatus = u8;

impl From<Status> for ReputationStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::OK => 0,
            Status::THROTTLED => 1,
            Status::BANNED => 2,
        }
    }
}

impl From<ReputationStatus> for Status {
    fn from(status: ReputationStatus) -> Self {
        match status {
            1 => Status::THROTTLED,
            2 => Status::BANNED,
            _ => Status::OK,
        }
    }
}

/// Reputation entry for an entity (sender, factory, paymaster)
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationEntry {
    pub address: Address,
    pub uo_seen: u64,
    pub uo_included: u64,
    pub status: ReputationStatus,
}

impl ReputationEntry {
    pub fn default_with_addr(address: Address) -> Self {
        Self { address, uo_seen: 0, uo_included: 0, status: Status::OK.into() }
    }
}

/// Stake info, as registered in the entry point
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeInfo {
    pub address: Address,
    pub stake: U256,
    /// Unstake delay in seconds
    pub unstake_delay: U256,
}

impl StakeInfo {
    pub fn is_staked(&self) -> bool {
        self.stake > U256::zero() && self.unstake_delay > U256::zero()
    }
}

/// Response for the stake info query (debug RPC)
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeInfoResponse {
    pub stake_info: StakeInfo,
    pub is_staked: bool,
}
