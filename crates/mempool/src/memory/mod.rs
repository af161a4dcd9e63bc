//! In-memory backends for the mempool and the reputation registry

mod mempool;
mod reputation;

pub use mempool::UserOperationsBySeq;

use crate::{Mempool, Reputation};
use aurelius_primitives::{reputation::ReputationEntry, simulation::CodeHash, UserOperationHash};
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// Creates a [Mempool](Mempool) backed by in-memory stores
pub fn mempool_in_memory() -> Mempool {
    Mempool::new(
        Box::new(UserOperationsBySeq::default()),
        Box::new(HashMap::<Address, HashSet<UserOperationHash>>::default()),
        Box::new(HashMap::<Address, HashSet<UserOperationHash>>::default()),
        Box::new(HashMap::<UserOperationHash, Vec<CodeHash>>::default()),
    )
}

/// Creates a [Reputation](Reputation) registry backed by in-memory stores
pub fn reputation_in_memory(
    throttling_slack: u64,
    ban_slack: u64,
    min_stake: U256,
    min_unstake_delay: U256,
) -> Reputation {
    Reputation::new(
        throttling_slack,
        ban_slack,
        min_stake,
        min_unstake_delay,
        Arc::new(RwLock::new(HashSet::<Address>::default())),
        Arc::new(RwLock::new(HashSet::<Address>::default())),
        Box::new(HashMap::<Address, ReputationEntry>::default()),
    )
}
