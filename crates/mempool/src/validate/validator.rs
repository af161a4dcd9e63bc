use super::{
    sanity::{
        CallGas, Entities, MaxFee, Paymaster, Sender, UnstakedEntities, VerificationGas,
    },
    simulation::{Aggregator, Signature, Timestamp},
    simulation_trace::{
        CallStack, CodeHashes, ExternalContracts, Gas, Opcodes, StorageAccess,
    },
    utils::{extract_pre_fund, extract_storage_map, extract_verification_gas_limit},
    SanityCheck, SanityHelper, SimulationCheck, SimulationHelper, SimulationTraceCheck,
    SimulationTraceHelper, UserOperationValidationOutcome, UserOperationValidator,
    UserOperationValidatorMode,
};
use crate::{
    mempool::Mempool, InvalidMempoolUserOperationError, Reputation, SimulationError,
};
use alloy_chains::Chain;
use aurelius_contracts::{
    entry_point::SimulateValidationResult, tracer::JsTracerFrame, EntryPoint, EntryPointError,
};
use aurelius_primitives::{simulation::ValidationConfig, UserOperation};
use enumset::EnumSet;
use ethers::{
    providers::Middleware,
    types::{GethTrace, U256},
};
use tracing::debug;

pub type StandardValidator<M> = StandardUserOperationValidator<
    M,
    (Sender, VerificationGas, CallGas, MaxFee, Paymaster, Entities, UnstakedEntities),
    (Signature, Timestamp, Aggregator),
    (Gas, Opcodes, ExternalContracts, StorageAccess, CallStack, CodeHashes),
>;

pub type UnsafeValidator<M> = StandardUserOperationValidator<
    M,
    (Sender, VerificationGas, CallGas, MaxFee, Paymaster, Entities, UnstakedEntities),
    (Signature, Timestamp, Aggregator),
    (),
>;

/// Standard implementation of [UserOperationValidator], parameterized over
/// the sets of checks to apply in each stage
pub struct StandardUserOperationValidator<M: Middleware + 'static, SanCk, SimCk, SimTrCk>
where
    SanCk: SanityCheck<M>,
    SimCk: SimulationCheck,
    SimTrCk: SimulationTraceCheck<M>,
{
    entry_point: EntryPoint<M>,
    chain: Chain,
    sanity_checks: SanCk,
    simulation_checks: SimCk,
    simulation_trace_checks: SimTrCk,
}

impl<M: Middleware + Clone + 'static, SanCk, SimCk, SimTrCk> Clone
    for StandardUserOperationValidator<M, SanCk, SimCk, SimTrCk>
where
    SanCk: SanityCheck<M> + Clone,
    SimCk: SimulationCheck + Clone,
    SimTrCk: SimulationTraceCheck<M> + Clone,
{
    fn clone(&self) -> Self {
        Self {
            entry_point: self.entry_point.clone(),
            chain: self.chain,
            sanity_checks: self.sanity_checks.clone(),
            simulation_checks: self.simulation_checks.clone(),
            simulation_trace_checks: self.simulation_trace_checks.clone(),
        }
    }
}

/// Creates a validator running the full rule set, including the traced
/// simulation
pub fn new_canonical<M: Middleware + 'static>(
    entry_point: EntryPoint<M>,
    chain: Chain,
    max_verification_gas: U256,
    min_priority_fee_per_gas: U256,
) -> StandardValidator<M> {
    StandardUserOperationValidator::new(
        entry_point,
        chain,
        (
            Sender,
            VerificationGas { max_verification_gas },
            CallGas,
            MaxFee { min_priority_fee_per_gas },
            Paymaster,
            Entities,
            UnstakedEntities,
        ),
        (Signature, Timestamp, Aggregator),
        (Gas, Opcodes, ExternalContracts, StorageAccess, CallStack, CodeHashes),
    )
}

/// Creates a validator without the trace checks, for nodes that have no
/// `debug_traceCall`
pub fn new_canonical_unsafe<M: Middleware + 'static>(
    entry_point: EntryPoint<M>,
    chain: Chain,
    max_verification_gas: U256,
    min_priority_fee_per_gas: U256,
) -> UnsafeValidator<M> {
    StandardUserOperationValidator::new(
        entry_point,
        chain,
        (
            Sender,
            VerificationGas { max_verification_gas },
            CallGas,
            MaxFee { min_priority_fee_per_gas },
            Paymaster,
            Entities,
            UnstakedEntities,
        ),
        (Signature, Timestamp, Aggregator),
        (),
    )
}

impl<M: Middleware + 'static, SanCk, SimCk, SimTrCk>
    StandardUserOperationValidator<M, SanCk, SimCk, SimTrCk>
where
    SanCk: SanityCheck<M>,
    SimCk: SimulationCheck,
    SimTrCk: SimulationTraceCheck<M>,
{
    pub fn new(
        entry_point: EntryPoint<M>,
        chain: Chain,
        sanity_checks: SanCk,
        simulation_checks: SimCk,
        simulation_trace_checks: SimTrCk,
    ) -> Self {
        Self { entry_point, chain, sanity_checks, simulation_checks, simulation_trace_checks }
    }

    async fn simulate_validation(
        &self,
        uo: &UserOperation,
    ) -> Result<SimulateValidationResult, SimulationError> {
        match self.entry_point.simulate_validation(uo.user_operation.clone()).await {
            Ok(res) => Ok(res),
            Err(err) => Err(match err {
                EntryPointError::FailedOp(op) => SimulationError::Validation { inner: op.reason },
                EntryPointError::ExecutionReverted(inner) => SimulationError::Execution { inner },
                EntryPointError::Provider { inner } => SimulationError::Provider { inner },
                _ => SimulationError::Other { inner: err.to_string() },
            }),
        }
    }

    async fn simulate_validation_trace(
        &self,
        uo: &UserOperation,
    ) -> Result<GethTrace, SimulationError> {
        match self.entry_point.simulate_validation_trace(uo.user_operation.clone()).await {
            Ok(trace) => Ok(trace),
            Err(err) => Err(match err {
                EntryPointError::FailedOp(op) => SimulationError::Validation { inner: op.reason },
                EntryPointError::Provider { inner } => SimulationError::Provider { inner },
                _ => SimulationError::Other { inner: err.to_string() },
            }),
        }
    }
}

#[async_trait::async_trait]
impl<M: Middleware + 'static, SanCk, SimCk, SimTrCk> UserOperationValidator
    for StandardUserOperationValidator<M, SanCk, SimCk, SimTrCk>
where
    SanCk: SanityCheck<M>,
    SimCk: SimulationCheck,
    SimTrCk: SimulationTraceCheck<M>,
{
    /// Validates a user operation against the stages selected in `mode`:
    /// static sanity checks, the decoded `simulateValidation` result, and
    /// the traced simulation.
    async fn validate_user_operation(
        &self,
        uo: &UserOperation,
        mempool: &Mempool,
        reputation: &Reputation,
        val_config: Option<ValidationConfig>,
        mode: EnumSet<UserOperationValidatorMode>,
    ) -> Result<UserOperationValidationOutcome, InvalidMempoolUserOperationError> {
        let mut out: UserOperationValidationOutcome = Default::default();

        let val_config = val_config.unwrap_or(ValidationConfig {
            min_stake: Some(reputation.min_stake()),
            min_unstake_delay: Some(reputation.min_unstake_delay()),
        });

        if mode.contains(UserOperationValidatorMode::Sanity) {
            let sanity_helper = SanityHelper {
                entry_point: &self.entry_point,
                chain: self.chain,
                val_config: val_config.clone(),
            };

            self.sanity_checks
                .check_user_operation(uo, mempool, reputation, &sanity_helper)
                .await?;
        }

        if let Some(uo_prev) = mempool.get_prev_by_sender(uo) {
            out.prev_hash = Some(uo_prev.hash);
        }

        debug!("Simulate user operation from {:?}", uo.sender);
        let sim_res = self.simulate_validation(uo).await?;

        if mode.contains(UserOperationValidatorMode::Simulation) {
            let mut sim_helper = SimulationHelper {
                simulate_validation_result: &sim_res,
                valid_after: None,
                valid_until: None,
            };

            self.simulation_checks.check_user_operation(uo, &mut sim_helper)?;

            out.valid_after = sim_helper.valid_after;
            out.valid_until = sim_helper.valid_until;
        }

        out.pre_fund = extract_pre_fund(&sim_res);
        out.verification_gas_limit = extract_verification_gas_limit(&sim_res);

        if mode.contains(UserOperationValidatorMode::SimulationTrace) {
            debug!("Simulate user operation with trace from {:?}", uo.sender);
            let geth_trace = self.simulate_validation_trace(uo).await?;
            let js_trace: JsTracerFrame = JsTracerFrame::try_from(geth_trace)
                .map_err(|error| SimulationError::Validation { inner: error.to_string() })?;

            let mut sim_helper = SimulationTraceHelper {
                entry_point: &self.entry_point,
                chain: self.chain,
                simulate_validation_result: &sim_res,
                js_trace: &js_trace,
                val_config,
                stake_info: None,
                code_hashes: None,
            };

            self.simulation_trace_checks
                .check_user_operation(uo, mempool, reputation, &mut sim_helper)
                .await?;

            out.code_hashes = sim_helper.code_hashes;
            out.storage_map = extract_storage_map(&js_trace);
        }

        Ok(out)
    }
}
