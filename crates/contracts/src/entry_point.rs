pub use super::gen::{
    AccountDeployedFilter, DepositedFilter, EntryPointAPI, EntryPointAPIErrors,
    EntryPointAPIEvents, FailedOp, SignatureAggregatorChangedFilter, UserOperationEventFilter,
    UserOperationRevertReasonFilter, ValidationResult, ValidationResultWithAggregation,
};
use super::{
    error::{decode_revert_error, EntryPointError},
    gen::{self, SenderAddressResult},
    tracer::JS_TRACER,
};
use aurelius_primitives::UserOperationSigned;
use ethers::{
    prelude::{ContractError, Event},
    providers::Middleware,
    types::{
        transaction::eip2718::TypedTransaction, Address, GethDebugTracerType,
        GethDebugTracingCallOptions, GethDebugTracingOptions, GethTrace, TransactionRequest, U256,
    },
};
use std::sync::Arc;

/// Gas the simulated validation call is given (well above any real budget so
/// the simulation never runs out before validation does)
const SIMULATE_VALIDATION_GAS: u64 = 100_000_000;

/// Decoded revert payload of a successful `simulateValidation`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulateValidationResult {
    ValidationResult(ValidationResult),
    ValidationResultWithAggregation(ValidationResultWithAggregation),
}

/// Wrapper around the deployed entry point contract
pub struct EntryPoint<M: Middleware + 'static> {
    eth_client: Arc<M>,
    address: Address,
    entry_point_api: EntryPointAPI<M>,
}

impl<M: Middleware + 'static> Clone for EntryPoint<M> {
    fn clone(&self) -> Self {
        Self {
            eth_client: self.eth_client.clone(),
            address: self.address,
            entry_point_api: self.entry_point_api.clone(),
        }
    }
}

impl<M: Middleware + 'static> EntryPoint<M> {
    pub fn new(eth_client: Arc<M>, address: Address) -> Self {
        let entry_point_api = EntryPointAPI::new(address, eth_client.clone());
        Self { eth_client, address, entry_point_api }
    }

    pub fn entry_point_api(&self) -> &EntryPointAPI<M> {
        &self.entry_point_api
    }

    pub fn events(&self) -> Event<Arc<M>, M, EntryPointAPIEvents> {
        self.entry_point_api.events()
    }

    pub fn eth_client(&self) -> Arc<M> {
        self.eth_client.clone()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn deserialize_error_msg(
        err: ContractError<M>,
    ) -> Result<EntryPointAPIErrors, EntryPointError> {
        match err {
            ContractError::DecodingError(e) => {
                Err(EntryPointError::Decode { inner: e.to_string() })
            }
            ContractError::AbiError(e) => Err(EntryPointError::ABI { inner: e.to_string() }),
            ContractError::MiddlewareError { e } => EntryPointError::from_middleware_error::<M>(e),
            ContractError::ProviderError { e } => EntryPointError::from_provider_error(&e),
            ContractError::Revert(data) => decode_revert_error(data),
            _ => Err(EntryPointError::Other { inner: err.to_string() }),
        }
    }

    /// Runs `simulateValidation` via `eth_call`; the entry point communicates
    /// the result through a structured revert
    pub async fn simulate_validation<U: Into<gen::UserOperation>>(
        &self,
        uo: U,
    ) -> Result<SimulateValidationResult, EntryPointError> {
        let mut call = self.entry_point_api.simulate_validation(uo.into());
        call.tx.set_gas(SIMULATE_VALIDATION_GAS);

        match call.call().await {
            Ok(_) => Err(EntryPointError::NoRevert { function: "simulate_validation".into() }),
            Err(err) => Self::deserialize_error_msg(err).and_then(|op| match op {
                EntryPointAPIErrors::ValidationResult(res) => {
                    Ok(SimulateValidationResult::ValidationResult(res))
                }
                EntryPointAPIErrors::ValidationResultWithAggregation(res) => {
                    Ok(SimulateValidationResult::ValidationResultWithAggregation(res))
                }
                EntryPointAPIErrors::FailedOp(err) => Err(EntryPointError::FailedOp(err)),
                EntryPointAPIErrors::RevertString(reason) => {
                    Err(EntryPointError::ExecutionReverted(reason))
                }
                _ => Err(EntryPointError::Other {
                    inner: format!("simulate validation with invalid error: {op:?}"),
                }),
            }),
        }
    }

    /// Runs `simulateValidation` under `debug_traceCall` with the collector
    /// tracer, capturing opcodes and storage accesses
    pub async fn simulate_validation_trace<U: Into<gen::UserOperation>>(
        &self,
        uo: U,
    ) -> Result<GethTrace, EntryPointError> {
        let mut call = self.entry_point_api.simulate_validation(uo.into());
        call.tx.set_gas(SIMULATE_VALIDATION_GAS);

        self.eth_client
            .debug_trace_call(
                call.tx,
                None,
                GethDebugTracingCallOptions {
                    tracing_options: GethDebugTracingOptions {
                        tracer: Some(GethDebugTracerType::JsTracer(JS_TRACER.into())),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                EntryPointError::from_middleware_error::<M>(e).expect_err("trace err is expected")
            })
    }

    /// Pre-flights `handleOps` via `eth_call`; a revert carries the
    /// `FailedOp` that identifies the offending user operation
    pub async fn handle_ops<U: Into<gen::UserOperation>>(
        &self,
        uos: Vec<U>,
        beneficiary: Address,
    ) -> Result<(), EntryPointError> {
        self.entry_point_api
            .handle_ops(uos.into_iter().map(|u| u.into()).collect(), beneficiary)
            .call()
            .await
            .or_else(|e| {
                Self::deserialize_error_msg(e).and_then(|op| match op {
                    EntryPointAPIErrors::FailedOp(err) => Err(EntryPointError::FailedOp(err)),
                    _ => Err(EntryPointError::Other { inner: format!("handle ops error: {op:?}") }),
                })
            })
    }

    /// Builds the (unsigned) `handleOps` transaction
    pub fn handle_ops_tx(
        &self,
        uos: Vec<gen::UserOperation>,
        beneficiary: Address,
    ) -> TypedTransaction {
        self.entry_point_api.handle_ops(uos, beneficiary).tx
    }

    pub async fn balance_of(&self, addr: &Address) -> Result<U256, EntryPointError> {
        self.entry_point_api
            .balance_of(*addr)
            .call()
            .await
            .map_err(|err| EntryPointError::Other { inner: format!("balance of error: {err:?}") })
    }

    pub async fn get_deposit_info(&self, addr: &Address) -> Result<DepositInfo, EntryPointError> {
        let res = self.entry_point_api.get_deposit_info(*addr).call().await;

        match res {
            Ok((deposit, staked, stake, unstake_delay_sec, withdraw_time)) => {
                Ok(DepositInfo { deposit, staked, stake, unstake_delay_sec, withdraw_time })
            }
            Err(err) => {
                Err(EntryPointError::Other { inner: format!("get deposit info error: {err:?}") })
            }
        }
    }

    pub async fn get_nonce(&self, addr: &Address, key: U256) -> Result<U256, EntryPointError> {
        self.entry_point_api
            .get_nonce(*addr, key)
            .call()
            .await
            .map_err(|err| EntryPointError::Other { inner: format!("get nonce error: {err:?}") })
    }

    pub async fn get_sender_address(
        &self,
        init_code: ethers::types::Bytes,
    ) -> Result<SenderAddressResult, EntryPointError> {
        let res = self.entry_point_api.get_sender_address(init_code).call().await;

        match res {
            Ok(_) => Err(EntryPointError::NoRevert { function: "get_sender_address".into() }),
            Err(e) => Self::deserialize_error_msg(e).and_then(|op| match op {
                EntryPointAPIErrors::SenderAddressResult(res) => Ok(res),
                EntryPointAPIErrors::FailedOp(err) => Err(EntryPointError::FailedOp(err)),
                _ => Err(EntryPointError::Other {
                    inner: format!("get sender address error: {op:?}"),
                }),
            }),
        }
    }

    /// Estimates the gas of the execution phase: the call the entry point
    /// makes into the sender with the user operation's calldata
    pub async fn estimate_call_gas(
        &self,
        uo: &UserOperationSigned,
    ) -> Result<U256, EntryPointError> {
        self.eth_client
            .estimate_gas(
                &TransactionRequest::new()
                    .from(self.address)
                    .to(uo.sender)
                    .data(uo.call_data.clone())
                    .into(),
                None,
            )
            .await
            .map_err(|err| EntryPointError::Provider { inner: err.to_string() })
    }
}

/// Deposit info of an entity, as registered in the entry point
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DepositInfo {
    pub deposit: u128,
    pub staked: bool,
    pub stake: u128,
    pub unstake_delay_sec: u32,
    pub withdraw_time: u64,
}
