use crate::validate::utils::{extract_timestamps, extract_verification_gas_limit};
use aurelius_contracts::{EntryPoint, EntryPointError};
use aurelius_primitives::UserOperationSigned;
use ethers::{providers::Middleware, types::U256};

/// Placeholder verification gas for the simulation run of the estimate
const VERIFICATION_GAS_PLACEHOLDER: u64 = 10_000_000;

/// Result of a gas estimation: verification gas, call gas and the validity
/// window reported by the simulation
#[derive(Debug, Default, Clone)]
pub struct GasEstimate {
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
    pub valid_after: Option<U256>,
    pub valid_until: Option<U256>,
}

/// Estimates the gas fields of a user operation.
///
/// The operation is simulated with zeroed fees and a large verification gas
/// placeholder; the verification gas comes from the reported `preOpGas`, the
/// call gas from a plain `eth_estimateGas` of the execution call the entry
/// point would make into the sender.
pub async fn estimate_user_op_gas<M: Middleware + 'static>(
    uo: &UserOperationSigned,
    entry_point: &EntryPoint<M>,
) -> Result<GasEstimate, EntryPointError> {
    let uo_sim = uo
        .clone()
        .verification_gas_limit(VERIFICATION_GAS_PLACEHOLDER.into())
        .call_gas_limit(U256::zero())
        .max_fee_per_gas(U256::zero())
        .max_priority_fee_per_gas(U256::zero());

    let sim_res = entry_point.simulate_validation(uo_sim).await?;

    let verification_gas_limit = extract_verification_gas_limit(&sim_res);
    let (valid_after, valid_until) = extract_timestamps(&sim_res);

    let call_gas_limit = entry_point.estimate_call_gas(uo).await?;

    Ok(GasEstimate {
        verification_gas_limit,
        call_gas_limit,
        valid_after: if valid_after.is_zero() { None } else { Some(valid_after) },
        valid_until: if valid_until.is_zero() { None } else { Some(valid_until) },
    })
}
