use crate::{
    mempool::{
        AddRemoveUserOp, AddRemoveUserOpHash, ClearOp, UserOperationAddrOp,
        UserOperationCodeHashOp, UserOperationOp,
    },
    MempoolErrorKind,
};
use aurelius_primitives::{simulation::CodeHash, UserOperation, UserOperationHash};
use ethers::types::Address;
use std::collections::{HashMap, HashSet};

/// In-memory user operation store; remembers arrival order so that equal tips
/// sort first-come-first-served
#[derive(Clone, Debug, Default)]
pub struct UserOperationsBySeq {
    ops: HashMap<UserOperationHash, (u64, UserOperation)>,
    seq: u64,
}

impl AddRemoveUserOp for UserOperationsBySeq {
    fn add(&mut self, uo: UserOperation) -> Result<UserOperationHash, MempoolErrorKind> {
        let uo_hash = uo.hash;
        self.seq += 1;
        self.ops.insert(uo_hash, (self.seq, uo));
        Ok(uo_hash)
    }

    fn remove_by_uo_hash(&mut self, uo_hash: &UserOperationHash) -> Result<bool, MempoolErrorKind> {
        Ok(self.ops.remove(uo_hash).is_some())
    }
}

impl UserOperationOp for UserOperationsBySeq {
    fn get_by_uo_hash(
        &self,
        uo_hash: &UserOperationHash,
    ) -> Result<Option<UserOperation>, MempoolErrorKind> {
        Ok(self.ops.get(uo_hash).map(|(_, uo)| uo.clone()))
    }

    fn get_sorted(&self) -> Result<Vec<UserOperation>, MempoolErrorKind> {
        let mut uos: Vec<(u64, UserOperation)> = self.ops.values().cloned().collect();
        uos.sort_by(|(seq_a, a), (seq_b, b)| {
            if a.max_priority_fee_per_gas != b.max_priority_fee_per_gas {
                b.max_priority_fee_per_gas.cmp(&a.max_priority_fee_per_gas)
            } else {
                seq_a.cmp(seq_b)
            }
        });
        Ok(uos.into_iter().map(|(_, uo)| uo).collect())
    }

    fn get_all(&self) -> Result<Vec<UserOperation>, MempoolErrorKind> {
        Ok(self.ops.values().map(|(_, uo)| uo.clone()).collect())
    }

    fn len(&self) -> usize {
        self.ops.len()
    }
}

impl ClearOp for UserOperationsBySeq {
    fn clear(&mut self) {
        self.ops.clear();
        self.seq = 0;
    }
}

impl UserOperationAddrOp for HashMap<Address, HashSet<UserOperationHash>> {
    fn get_all_by_address(&self, addr: &Address) -> Vec<UserOperationHash> {
        if let Some(uos_by_relation) = self.get(addr) {
            uos_by_relation.iter().cloned().collect()
        } else {
            vec![]
        }
    }
}

impl AddRemoveUserOpHash for HashMap<Address, HashSet<UserOperationHash>> {
    fn add(
        &mut self,
        address: &Address,
        uo_hash: UserOperationHash,
    ) -> Result<(), MempoolErrorKind> {
        self.entry(*address).or_default().insert(uo_hash);
        Ok(())
    }

    fn remove_uo_hash(
        &mut self,
        address: &Address,
        uo_hash: &UserOperationHash,
    ) -> Result<bool, MempoolErrorKind> {
        if let Some(uos) = self.get_mut(address) {
            uos.remove(uo_hash);

            if uos.is_empty() {
                self.remove(address);
            };
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl UserOperationCodeHashOp for HashMap<UserOperationHash, Vec<CodeHash>> {
    fn has_code_hashes(&self, uo_hash: &UserOperationHash) -> Result<bool, MempoolErrorKind> {
        Ok(self.contains_key(uo_hash))
    }

    fn set_code_hashes(
        &mut self,
        uo_hash: &UserOperationHash,
        hashes: Vec<CodeHash>,
    ) -> Result<(), MempoolErrorKind> {
        self.insert(*uo_hash, hashes);
        Ok(())
    }

    fn get_code_hashes(
        &self,
        uo_hash: &UserOperationHash,
    ) -> Result<Vec<CodeHash>, MempoolErrorKind> {
        Ok(self.get(uo_hash).cloned().unwrap_or_default())
    }

    fn remove_code_hashes(
        &mut self,
        uo_hash: &UserOperationHash,
    ) -> Result<bool, MempoolErrorKind> {
        Ok(self.remove(uo_hash).is_some())
    }
}

impl ClearOp for HashMap<UserOperationHash, Vec<CodeHash>> {
    fn clear(&mut self) {
        self.clear()
    }
}

impl ClearOp for HashMap<Address, HashSet<UserOperationHash>> {
    fn clear(&mut self) {
        self.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{utils::tests::mempool_test_case, Mempool};

    #[test]
    fn memory_mempool() {
        let mempool = Mempool::new(
            Box::new(UserOperationsBySeq::default()),
            Box::new(HashMap::<Address, HashSet<UserOperationHash>>::default()),
            Box::new(HashMap::<Address, HashSet<UserOperationHash>>::default()),
            Box::new(HashMap::<UserOperationHash, Vec<CodeHash>>::default()),
        );
        mempool_test_case(mempool);
    }
}
