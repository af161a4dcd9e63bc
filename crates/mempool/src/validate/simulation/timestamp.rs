use crate::{
    validate::{utils::extract_timestamps, SimulationCheck, SimulationHelper},
    SimulationError,
};
use aurelius_primitives::{simulation::EXPIRATION_TIMESTAMP_DIFF, UserOperation};
use ethers::types::U256;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Timestamp;

impl SimulationCheck for Timestamp {
    /// The operation must stay valid long enough for the bundle to land; a
    /// future `valid_after` is recorded, a zero `valid_until` means no
    /// expiry.
    fn check_user_operation(
        &self,
        _uo: &UserOperation,
        helper: &mut SimulationHelper,
    ) -> Result<(), SimulationError> {
        let (valid_after, valid_until) = extract_timestamps(helper.simulate_validation_result);

        let now = U256::from(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|err| SimulationError::Other { inner: err.to_string() })?
                .as_secs(),
        );

        if !valid_until.is_zero() {
            if valid_until < now {
                return Err(SimulationError::Timestamp { inner: "already expired".into() });
            }

            if valid_until <= now + EXPIRATION_TIMESTAMP_DIFF {
                return Err(SimulationError::Timestamp { inner: "expires too soon".into() });
            }

            helper.valid_until = Some(valid_until);
        }

        if valid_after > now {
            helper.valid_after = Some(valid_after);
        }

        Ok(())
    }
}
