//! Composable user operation validation: sanity checks, simulation checks and
//! simulation trace checks

use crate::{
    mempool::Mempool, InvalidMempoolUserOperationError, Reputation, SanityError, SimulationError,
};
use alloy_chains::Chain;
use aurelius_contracts::{entry_point::SimulateValidationResult, tracer::JsTracerFrame, EntryPoint};
use aurelius_primitives::{
    constants::validation::entities::NUMBER_OF_LEVELS,
    reputation::StakeInfo,
    simulation::{CodeHash, StorageMap, ValidationConfig},
    UserOperation, UserOperationHash,
};
use enumset::{EnumSet, EnumSetType};
use ethers::{providers::Middleware, types::U256};

pub mod sanity;
pub mod simulation;
pub mod simulation_trace;
pub mod utils;
pub mod validator;

/// The outcome of a user operation validation
#[derive(Debug, Clone, Default)]
pub struct UserOperationValidationOutcome {
    /// Hash of the incumbent user operation this one replaces, if any
    pub prev_hash: Option<UserOperationHash>,
    /// Wei the entry point requires as a deposit for this operation
    pub pre_fund: U256,
    /// Gas spent by the verification phase (`preOpGas`)
    pub verification_gas_limit: U256,
    // Simulation
    pub valid_after: Option<U256>,
    pub valid_until: Option<U256>,
    // Simulation trace
    pub code_hashes: Option<Vec<CodeHash>>,
    pub storage_map: StorageMap,
}

/// The stages the validator may run; bundle re-validation skips the sanity
/// stage, unsafe mode skips the trace stage
#[derive(EnumSetType, Debug)]
pub enum UserOperationValidatorMode {
    Sanity,
    Simulation,
    SimulationTrace,
}

/// The user operation validator trait; implementations choose which rules to
/// apply per mode flag
#[async_trait::async_trait]
pub trait UserOperationValidator: Send + Sync {
    async fn validate_user_operation(
        &self,
        uo: &UserOperation,
        mempool: &Mempool,
        reputation: &Reputation,
        val_config: Option<ValidationConfig>,
        mode: EnumSet<UserOperationValidatorMode>,
    ) -> Result<UserOperationValidationOutcome, InvalidMempoolUserOperationError>;
}

/// Context the sanity checks run in
pub struct SanityHelper<'a, M: Middleware + 'static> {
    pub entry_point: &'a EntryPoint<M>,
    pub chain: Chain,
    pub val_config: ValidationConfig,
}

#[async_trait::async_trait]
pub trait SanityCheck<M: Middleware>: Send + Sync {
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        mempool: &Mempool,
        reputation: &Reputation,
        helper: &SanityHelper<M>,
    ) -> Result<(), SanityError>;
}

#[async_trait::async_trait]
impl<M: Middleware> SanityCheck<M> for () {
    async fn check_user_operation(
        &self,
        _uo: &UserOperation,
        _mempool: &Mempool,
        _reputation: &Reputation,
        _helper: &SanityHelper<M>,
    ) -> Result<(), SanityError> {
        Ok(())
    }
}

// Allows chaining sanity checks as tuples:
// `(Check1, Check2, ...).check_user_operation(...)`
macro_rules! sanity_check_impls {
    ( $( $name:ident )+ ) => {
        #[allow(non_snake_case)]
        #[async_trait::async_trait]
        impl<M: Middleware, $($name : SanityCheck<M>,)+> SanityCheck<M> for ($($name,)+)
        {
            async fn check_user_operation(
                &self,
                uo: &UserOperation,
                mempool: &Mempool,
                reputation: &Reputation,
                helper: &SanityHelper<M>,
            ) -> Result<(), SanityError>
                {
                    let ($($name,)+) = self;
                    ($($name.check_user_operation(uo, mempool, reputation, helper).await?,)+);
                    Ok(())
                }
        }
    };
}

sanity_check_impls! { A }
sanity_check_impls! { A B }
sanity_check_impls! { A B C }
sanity_check_impls! { A B C D }
sanity_check_impls! { A B C D F }
sanity_check_impls! { A B C D F G }
sanity_check_impls! { A B C D F G I }
sanity_check_impls! { A B C D F G I J }

/// Context the simulation checks run in
pub struct SimulationHelper<'a> {
    pub simulate_validation_result: &'a SimulateValidationResult,
    pub valid_after: Option<U256>,
    pub valid_until: Option<U256>,
}

pub trait SimulationCheck: Send + Sync {
    fn check_user_operation(
        &self,
        uo: &UserOperation,
        helper: &mut SimulationHelper,
    ) -> Result<(), SimulationError>;
}

// Allows chaining simulation checks as tuples
macro_rules! simulation_check_impls {
    ( $( $name:ident )+ ) => {
        #[allow(non_snake_case)]
        impl<$($name : SimulationCheck,)+> SimulationCheck for ($($name,)+)
        {
            fn check_user_operation(
                &self,
                uo: &UserOperation,
                helper: &mut SimulationHelper,
            ) -> Result<(), SimulationError>
                {
                    let ($($name,)+) = self;
                    ($($name.check_user_operation(uo, helper)?,)+);
                    Ok(())
                }
        }
    };
}

simulation_check_impls! { A }
simulation_check_impls! { A B }
simulation_check_impls! { A B C }
simulation_check_impls! { A B C D }

/// Context the simulation trace checks run in
pub struct SimulationTraceHelper<'a, M: Middleware + Send + Sync + 'static> {
    pub entry_point: &'a EntryPoint<M>,
    pub chain: Chain,
    pub simulate_validation_result: &'a SimulateValidationResult,
    pub js_trace: &'a JsTracerFrame,
    pub val_config: ValidationConfig,
    pub stake_info: Option<[StakeInfo; NUMBER_OF_LEVELS]>,
    pub code_hashes: Option<Vec<CodeHash>>,
}

#[async_trait::async_trait]
pub trait SimulationTraceCheck<M: Middleware>: Send + Sync {
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        mempool: &Mempool,
        reputation: &Reputation,
        helper: &mut SimulationTraceHelper<M>,
    ) -> Result<(), SimulationError>;
}

#[async_trait::async_trait]
impl<M: Middleware> SimulationTraceCheck<M> for () {
    async fn check_user_operation(
        &self,
        _uo: &UserOperation,
        _mempool: &Mempool,
        _reputation: &Reputation,
        _helper: &mut SimulationTraceHelper<M>,
    ) -> Result<(), SimulationError> {
        Ok(())
    }
}

// Allows chaining simulation trace checks as tuples
macro_rules! simulation_trace_check_impls {
    ( $( $name:ident )+ ) => {
        #[allow(non_snake_case)]
        #[async_trait::async_trait]
        impl<M: Middleware, $($name : SimulationTraceCheck<M>,)+> SimulationTraceCheck<M> for ($($name,)+)
        {
            async fn check_user_operation(
                &self,
                uo: &UserOperation,
                mempool: &Mempool,
                reputation: &Reputation,
                helper: &mut SimulationTraceHelper<M>,
            ) -> Result<(), SimulationError>
                {
                    let ($($name,)+) = self;
                    ($($name.check_user_operation(uo, mempool, reputation, helper).await?,)+);
                    Ok(())
                }
        }
    };
}

simulation_trace_check_impls! { A }
simulation_trace_check_impls! { A B }
simulation_trace_check_impls! { A B C }
simulation_trace_check_impls! { A B C D }
simulation_trace_check_impls! { A B C D F }
simulation_trace_check_impls! { A B C D F G }
