use crate::{
    validate::{SimulationTraceCheck, SimulationTraceHelper},
    Mempool, Reputation, SimulationError,
};
use aurelius_contracts::SELECTORS_INDICES;
use aurelius_primitives::{
    constants::validation::entities::{FACTORY, LEVEL_TO_ENTITY},
    simulation::{CREATE2_OPCODE, FORBIDDEN_OPCODES},
    UserOperation,
};
use ethers::providers::Middleware;

#[derive(Clone)]
pub struct Opcodes;

#[async_trait::async_trait]
impl<M: Middleware> SimulationTraceCheck<M> for Opcodes {
    /// Entities must not execute environment-dependent opcodes during
    /// validation.
    async fn check_user_operation(
        &self,
        _uo: &UserOperation,
        _mempool: &Mempool,
        _reputation: &Reputation,
        helper: &mut SimulationTraceHelper<M>,
    ) -> Result<(), SimulationError> {
        for call_info in helper.js_trace.calls_from_entry_point.iter() {
            let level = SELECTORS_INDICES.get(&call_info.top_level_method_sig).cloned();

            if let Some(l) = level {
                // [OP-011] - block opcodes
                for op in call_info.opcodes.keys() {
                    if FORBIDDEN_OPCODES.contains(op) {
                        return Err(SimulationError::Opcode {
                            entity: LEVEL_TO_ENTITY[l].to_string(),
                            opcode: op.clone(),
                        });
                    }
                }

                // [OP-031] - CREATE2 is allowed exactly once in the deployment
                // phase and must deploy code for the "sender" address
                if let Some(c) = call_info.opcodes.get(&*CREATE2_OPCODE) {
                    if LEVEL_TO_ENTITY[l] == FACTORY && *c == 1 {
                        continue;
                    }
                    return Err(SimulationError::Opcode {
                        entity: LEVEL_TO_ENTITY[l].to_string(),
                        opcode: CREATE2_OPCODE.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
