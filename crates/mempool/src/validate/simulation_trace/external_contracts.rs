use crate::{
    validate::{SimulationTraceCheck, SimulationTraceHelper},
    Mempool, Reputation, SimulationError,
};
use aurelius_contracts::SELECTORS_INDICES;
use aurelius_primitives::{
    constants::validation::entities::LEVEL_TO_ENTITY, simulation::CREATE2_OPCODE, UserOperation,
};
use ethers::providers::Middleware;

#[derive(Clone)]
pub struct ExternalContracts;

#[async_trait::async_trait]
impl<M: Middleware> SimulationTraceCheck<M> for ExternalContracts {
    /// Validation may only touch deployed contracts, and may not inspect the
    /// entry point's own code.
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        _mempool: &Mempool,
        _reputation: &Reputation,
        helper: &mut SimulationTraceHelper<M>,
    ) -> Result<(), SimulationError> {
        for call_info in helper.js_trace.calls_from_entry_point.iter() {
            let level = SELECTORS_INDICES.get(&call_info.top_level_method_sig).cloned();

            if let Some(l) = level {
                // [OP-041] - access to an address without deployed code is
                // forbidden for EXTCODE* and *CALL opcodes
                // [OP-042] - exception: access to the "sender" address
                for (addr, size) in call_info.contract_size.iter() {
                    if *addr != uo.sender &&
                        size.contract_size <= 2 &&
                        size.opcode != *CREATE2_OPCODE
                    {
                        return Err(SimulationError::Opcode {
                            entity: LEVEL_TO_ENTITY[l].into(),
                            opcode: size.opcode.clone(),
                        });
                    }
                }

                // [OP-051] - EXTCODE* of the entry point address is forbidden
                for (addr, info) in call_info.ext_code_access_info.iter() {
                    if *addr == helper.entry_point.address() {
                        return Err(SimulationError::Opcode {
                            entity: LEVEL_TO_ENTITY[l].into(),
                            opcode: info.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
