use crate::{
    validate::{utils::extract_sig_failed, SimulationCheck, SimulationHelper},
    SimulationError,
};
use aurelius_primitives::UserOperation;

#[derive(Clone)]
pub struct Signature;

impl SimulationCheck for Signature {
    /// The entry point flags a wrong account or paymaster signature instead
    /// of reverting; treat it as a validation failure.
    fn check_user_operation(
        &self,
        _uo: &UserOperation,
        helper: &mut SimulationHelper,
    ) -> Result<(), SimulationError> {
        if extract_sig_failed(helper.simulate_validation_result) {
            return Err(SimulationError::Signature);
        }

        Ok(())
    }
}
