use crate::{mempool::ClearOp, reputation::ReputationEntryOp, ReputationError};
use aurelius_primitives::reputation::ReputationEntry;
use ethers::types::Address;
use std::collections::HashMap;

impl ReputationEntryOp for HashMap<Address, ReputationEntry> {
    fn get_entry(&self, addr: &Address) -> Result<Option<ReputationEntry>, ReputationError> {
        Ok(self.get(addr).cloned())
    }

    fn set_entry(
        &mut self,
        entry: ReputationEntry,
    ) -> Result<Option<ReputationEntry>, ReputationError> {
        Ok(self.insert(entry.address, entry))
    }

    fn contains_entry(&self, addr: &Address) -> Result<bool, ReputationError> {
        Ok(self.contains_key(addr))
    }

    fn get_all(&self) -> Vec<ReputationEntry> {
        self.values().cloned().collect()
    }
}

impl ClearOp for HashMap<Address, ReputationEntry> {
    fn clear(&mut self) {
        self.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{utils::tests::reputation_test_case, Reputation};
    use aurelius_primitives::constants::validation::reputation::{
        BAN_SLACK, THROTTLING_SLACK,
    };
    use ethers::types::U256;
    use parking_lot::RwLock;
    use std::{collections::HashSet, sync::Arc};

    #[test]
    fn memory_reputation() {
        let reputation = Reputation::new(
            THROTTLING_SLACK,
            BAN_SLACK,
            U256::from(1),
            U256::from(0),
            Arc::new(RwLock::new(HashSet::<Address>::default())),
            Arc::new(RwLock::new(HashSet::<Address>::default())),
            Box::new(HashMap::<Address, ReputationEntry>::default()),
        );
        reputation_test_case(reputation);
    }
}
