use crate::{
    validate::{utils::extract_stake_info, SimulationTraceCheck, SimulationTraceHelper},
    Mempool, Reputation, SimulationError,
};
use aurelius_contracts::SELECTORS_INDICES;
use aurelius_primitives::{
    constants::validation::entities::{FACTORY_LEVEL, LEVEL_TO_ENTITY, NUMBER_OF_LEVELS},
    reputation::StakeInfo,
    UserOperation,
};
use ethers::{
    providers::Middleware,
    types::{Address, Bytes, U256},
    utils::keccak256,
};
use std::collections::{HashMap, HashSet};

#[derive(Clone)]
pub struct StorageAccess;

impl StorageAccess {
    /// Derives the storage slots associated with each entity from the keccak
    /// preimages the tracer collected (mapping keys that embed an entity
    /// address)
    fn parse_slots(
        &self,
        keccak: Vec<Bytes>,
        info: &[StakeInfo; NUMBER_OF_LEVELS],
        slots: &mut HashMap<Address, HashSet<Bytes>>,
    ) {
        for kecc in keccak {
            for entity in info {
                if entity.address.is_zero() {
                    continue;
                }

                let addr_b =
                    Bytes::from([vec![0; 12], entity.address.to_fixed_bytes().to_vec()].concat());

                if kecc.starts_with(&addr_b) {
                    let k = keccak256(kecc.clone());
                    slots.entry(entity.address).or_default().insert(k.into());
                }
            }
        }
    }

    /// Whether the slot belongs to the address's associated storage (the
    /// address itself, or within 128 slots of one of its mapping cells)
    fn associated_with_slot(
        &self,
        addr: &Address,
        slot: &String,
        slots: &HashMap<Address, HashSet<Bytes>>,
    ) -> Result<bool, SimulationError> {
        if *slot == format!("{addr:?}") {
            return Ok(true);
        }

        if !slots.contains_key(addr) {
            return Ok(false);
        }

        let slot_num = U256::from_str_radix(slot.trim_start_matches("0x"), 16)
            .map_err(|_| SimulationError::StorageAccess { slot: slot.clone() })?;

        if let Some(slots) = slots.get(addr) {
            for slot in slots {
                let slot_ent_num = U256::from(slot.as_ref());

                if slot_num >= slot_ent_num && slot_num < (slot_ent_num + 128) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }
}

#[async_trait::async_trait]
impl<M: Middleware> SimulationTraceCheck<M> for StorageAccess {
    /// Storage access outside the sender's own storage is only allowed to
    /// staked entities and associated slots, and never to the storage of an
    /// address that is a sender elsewhere in the mempool.
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        mempool: &Mempool,
        _reputation: &Reputation,
        helper: &mut SimulationTraceHelper<M>,
    ) -> Result<(), SimulationError> {
        if helper.stake_info.is_none() {
            helper.stake_info = Some(extract_stake_info(uo, helper.simulate_validation_result));
        }

        let mut slots = HashMap::new();
        self.parse_slots(
            helper.js_trace.keccak.clone(),
            &helper.stake_info.unwrap_or_default(),
            &mut slots,
        );

        let mut slot_staked = String::new();
        let stake_info = helper.stake_info.unwrap_or_default();

        for call_info in helper.js_trace.calls_from_entry_point.iter() {
            let level = SELECTORS_INDICES.get(&call_info.top_level_method_sig).cloned();

            if let Some(l) = level {
                let stake_info_l = stake_info[l];

                for (addr, acc) in &call_info.access {
                    // [STO-010] - access to the "account" storage is always
                    // allowed
                    if *addr == uo.sender || *addr == helper.entry_point.address() {
                        continue;
                    }

                    // access to the storage of another sender currently in
                    // the mempool would race with that sender's operations
                    if mempool.get_number_by_sender(addr) > 0 {
                        return Err(SimulationError::StorageAccess {
                            slot: format!("{addr:?} (sender of another user operation)"),
                        });
                    }

                    slot_staked.clear();

                    for slot in [
                        acc.reads.keys().cloned().collect::<Vec<String>>(),
                        acc.writes.keys().cloned().collect(),
                    ]
                    .concat()
                    {
                        if self.associated_with_slot(&uo.sender, &slot, &slots)? {
                            // [STO-021], [STO-022] - associated storage of the
                            // account in a non-entity contract is allowed if
                            // the account already exists, or the factory is
                            // staked
                            if !(uo.init_code.is_empty() ||
                                uo.sender == stake_info_l.address &&
                                    stake_info[FACTORY_LEVEL].is_staked())
                            {
                                slot_staked.clone_from(&slot);
                            }
                        } else if *addr == stake_info_l.address // [STO-031] - the entity's own storage (if staked)
                            || self.associated_with_slot(&stake_info_l.address, &slot, &slots)? // [STO-032] - associated storage of the entity (if staked)
                            || !acc.writes.contains_key(&slot)
                        // [STO-033] - read-only access in a non-entity
                        // contract (if staked)
                        {
                            slot_staked.clone_from(&slot);
                        } else {
                            return Err(SimulationError::StorageAccess { slot });
                        }
                    }

                    if !slot_staked.is_empty() && !stake_info_l.is_staked() {
                        return Err(SimulationError::Unstaked {
                            entity: LEVEL_TO_ENTITY[l].into(),
                            address: stake_info_l.address,
                            inner: format!("accessed slot {slot_staked}"),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
