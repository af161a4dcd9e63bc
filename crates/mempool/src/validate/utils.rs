use aurelius_contracts::{entry_point::SimulateValidationResult, tracer::JsTracerFrame};
use aurelius_primitives::{
    constants::validation::entities::NUMBER_OF_LEVELS, get_address, reputation::StakeInfo,
    simulation::StorageMap, UserOperation,
};
use ethers::types::{Address, BigEndianHash, H256, U256};

/// Gas spent by the verification phase (`preOpGas`), from the simulation
/// result
pub fn extract_verification_gas_limit(sim_res: &SimulateValidationResult) -> U256 {
    match sim_res {
        SimulateValidationResult::ValidationResult(res) => res.return_info.0,
        SimulateValidationResult::ValidationResultWithAggregation(res) => res.return_info.0,
    }
}

/// Wei the entry point requires as deposit for the user operation
pub fn extract_pre_fund(sim_res: &SimulateValidationResult) -> U256 {
    match sim_res {
        SimulateValidationResult::ValidationResult(res) => res.return_info.1,
        SimulateValidationResult::ValidationResultWithAggregation(res) => res.return_info.1,
    }
}

/// Whether the account (or paymaster) signature failed to verify
pub fn extract_sig_failed(sim_res: &SimulateValidationResult) -> bool {
    match sim_res {
        SimulateValidationResult::ValidationResult(res) => res.return_info.2,
        SimulateValidationResult::ValidationResultWithAggregation(res) => res.return_info.2,
    }
}

/// Time range the user operation is valid in: `(valid_after, valid_until)`
pub fn extract_timestamps(sim_res: &SimulateValidationResult) -> (U256, U256) {
    match sim_res {
        SimulateValidationResult::ValidationResult(res) => {
            (res.return_info.3.into(), res.return_info.4.into())
        }
        SimulateValidationResult::ValidationResultWithAggregation(res) => {
            (res.return_info.3.into(), res.return_info.4.into())
        }
    }
}

/// Aggregator the account delegates its signature to, if any
pub fn extract_aggregator(sim_res: &SimulateValidationResult) -> Option<Address> {
    match sim_res {
        SimulateValidationResult::ValidationResult(_) => None,
        SimulateValidationResult::ValidationResultWithAggregation(res) => {
            Some(res.aggregator_info.0)
        }
    }
}

/// Stake info of the factory, the account and the paymaster, in tracer level
/// order
pub fn extract_stake_info(
    uo: &UserOperation,
    sim_res: &SimulateValidationResult,
) -> [StakeInfo; NUMBER_OF_LEVELS] {
    let (f_info, s_info, p_info) = match sim_res {
        SimulateValidationResult::ValidationResult(res) => {
            (&res.factory_info, &res.sender_info, &res.paymaster_info)
        }
        SimulateValidationResult::ValidationResultWithAggregation(res) => {
            (&res.factory_info, &res.sender_info, &res.paymaster_info)
        }
    };

    [
        // factory
        StakeInfo {
            address: get_address(&uo.init_code).unwrap_or(Address::zero()),
            stake: f_info.0,
            unstake_delay: f_info.1,
        },
        // account
        StakeInfo { address: uo.sender, stake: s_info.0, unstake_delay: s_info.1 },
        // paymaster
        StakeInfo {
            address: get_address(&uo.paymaster_and_data).unwrap_or(Address::zero()),
            stake: p_info.0,
            unstake_delay: p_info.1,
        },
    ]
}

fn parse_slot(slot: &str) -> Option<H256> {
    U256::from_str_radix(slot.trim_start_matches("0x"), 16).ok().map(|v| H256::from_uint(&v))
}

/// Builds the storage map of one user operation from the tracer output: every
/// slot read during validation, with the value observed
pub fn extract_storage_map(js_trace: &JsTracerFrame) -> StorageMap {
    let mut storage_map = StorageMap::default();

    for l in js_trace.calls_from_entry_point.iter() {
        for (addr, acc) in l.access.iter() {
            let slots = storage_map.slots.entry(*addr).or_default();
            for (slot, value) in acc.reads.iter() {
                if let (Some(slot), Some(value)) = (parse_slot(slot), parse_slot(value)) {
                    slots.entry(slot).or_insert(value);
                }
            }
        }
    }

    storage_map
}

/// Merges the storage map of one more user operation into the bundle's
/// accumulated map.
///
/// Returns false without modifying the accumulator when the two maps assert
/// different values for the same slot; including that operation would make
/// the bundle's storage hint self-contradictory.
pub fn try_merge_storage_map(acc: &mut StorageMap, other: &StorageMap) -> bool {
    for (addr, root) in other.root_hashes.iter() {
        if let Some(prev) = acc.root_hashes.get(addr) {
            if prev != root {
                return false;
            }
        }
    }

    for (addr, slots) in other.slots.iter() {
        if other.root_hashes.contains_key(addr) || acc.root_hashes.contains_key(addr) {
            continue;
        }
        if let Some(prev_slots) = acc.slots.get(addr) {
            for (slot, value) in slots.iter() {
                if let Some(prev) = prev_slots.get(slot) {
                    if prev != value {
                        return false;
                    }
                }
            }
        }
    }

    for (addr, root) in other.root_hashes.iter() {
        acc.root_hashes.insert(*addr, *root);
        acc.slots.remove(addr);
    }

    for (addr, slots) in other.slots.iter() {
        if acc.root_hashes.contains_key(addr) {
            continue;
        }
        let entry = acc.slots.entry(*addr).or_default();
        for (slot, value) in slots.iter() {
            entry.insert(*slot, *value);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_map(addr: Address, slot: u64, value: u64) -> StorageMap {
        let mut map = StorageMap::default();
        map.slots.entry(addr).or_default().insert(
            H256::from_low_u64_be(slot),
            H256::from_low_u64_be(value),
        );
        map
    }

    #[test]
    fn storage_map_merge_disjoint() {
        let addrs = [Address::random(), Address::random()];

        let mut acc = slot_map(addrs[0], 0, 1);
        assert!(try_merge_storage_map(&mut acc, &slot_map(addrs[1], 0, 2)));
        assert_eq!(acc.slots.len(), 2);
    }

    #[test]
    fn storage_map_merge_same_value() {
        let addr = Address::random();

        let mut acc = slot_map(addr, 0, 1);
        assert!(try_merge_storage_map(&mut acc, &slot_map(addr, 0, 1)));
        assert_eq!(acc.slots[&addr].len(), 1);
    }

    #[test]
    fn storage_map_merge_conflict() {
        let addr = Address::random();

        let mut acc = slot_map(addr, 0, 1);
        let before = acc.clone();
        assert!(!try_merge_storage_map(&mut acc, &slot_map(addr, 0, 2)));
        assert_eq!(acc, before);
    }

    #[test]
    fn storage_map_root_hash_wins() {
        let addr = Address::random();

        let mut acc = slot_map(addr, 0, 1);
        let mut other = StorageMap::default();
        other.root_hashes.insert(addr, H256::random());

        assert!(try_merge_storage_map(&mut acc, &other));
        assert!(acc.slots.get(&addr).is_none());
        assert!(acc.root_hashes.contains_key(&addr));
    }
}
