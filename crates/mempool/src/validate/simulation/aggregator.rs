use crate::{
    validate::{utils::extract_aggregator, SimulationCheck, SimulationHelper},
    SimulationError,
};
use aurelius_primitives::UserOperation;

#[derive(Clone)]
pub struct Aggregator;

impl SimulationCheck for Aggregator {
    /// Accounts delegating their signature to an aggregator are not accepted
    /// by this bundler.
    fn check_user_operation(
        &self,
        _uo: &UserOperation,
        helper: &mut SimulationHelper,
    ) -> Result<(), SimulationError> {
        if let Some(aggregator) = extract_aggregator(helper.simulate_validation_result) {
            return Err(SimulationError::UnsupportedAggregator { aggregator });
        }

        Ok(())
    }
}
