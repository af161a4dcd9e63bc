use crate::{
    validate::{SimulationTraceCheck, SimulationTraceHelper},
    Mempool, Reputation, SimulationError,
};
use aurelius_primitives::UserOperation;
use ethers::providers::Middleware;

#[derive(Clone)]
pub struct Gas;

#[async_trait::async_trait]
impl<M: Middleware> SimulationTraceCheck<M> for Gas {
    /// [OP-020] - revert on "out of gas" is forbidden as it can "leak" the
    /// gas limit or the current call stack depth
    async fn check_user_operation(
        &self,
        _uo: &UserOperation,
        _mempool: &Mempool,
        _reputation: &Reputation,
        helper: &mut SimulationTraceHelper<M>,
    ) -> Result<(), SimulationError> {
        for call_info in helper.js_trace.calls_from_entry_point.iter() {
            if call_info.oog.unwrap_or(false) {
                return Err(SimulationError::OutOfGas);
            }
        }

        Ok(())
    }
}
