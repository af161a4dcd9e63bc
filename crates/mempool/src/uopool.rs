use crate::{
    estimate::estimate_user_op_gas,
    mempool::{mempool_id, Mempool, MempoolId},
    utils::div_ceil,
    validate::{
        utils::try_merge_storage_map, UserOperationValidationOutcome, UserOperationValidator,
        UserOperationValidatorMode,
    },
    InvalidMempoolUserOperationError, MempoolError, MempoolErrorKind, Overhead, Reputation,
    ReputationError, SanityError, SimulationError,
};
use alloy_chains::Chain;
use aurelius_contracts::{
    entry_point::UserOperationEventFilter, parse_from_input_data, EntryPoint, EntryPointAPIEvents,
    EntryPointError,
};
use aurelius_primitives::{
    constants::{
        mempool::LATEST_SCAN_DEPTH, validation::reputation::THROTTLED_ENTITY_BUNDLE_COUNT,
    },
    get_address,
    reputation::{ReputationEntry, StakeInfo, StakeInfoResponse, Status},
    simulation::{StorageMap, ValidationConfig},
    UserOperation, UserOperationByHash, UserOperationGasEstimation, UserOperationHash,
    UserOperationReceipt,
};
use ethers::{
    prelude::LogMeta,
    providers::Middleware,
    types::{Address, U256, U64},
};
use eyre::format_err;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace, warn};

// Percentage the returned pre-verification gas estimate is padded by
const PRE_VERIFICATION_SAFE_RESERVE_PERC: u64 = 10;

/// Shared handle to the pool; the mutex serializes admission, event
/// reconciliation and bundle assembly against each other
pub type UoPoolHandle<M, V> = std::sync::Arc<tokio::sync::Mutex<UoPool<M, V>>>;

/// Stake checks are skipped during the second validation; the zero minimums
/// make them vacuous
fn stakes_unchecked() -> ValidationConfig {
    ValidationConfig { min_stake: Some(U256::zero()), min_unstake_delay: Some(U256::zero()) }
}

/// The user operation pool: validates and stores incoming user operations,
/// assembles bundles from them, and reconciles its state with the entry point
/// events observed on chain.
pub struct UoPool<M: Middleware + 'static, V: UserOperationValidator> {
    /// The unique ID of the mempool
    pub id: MempoolId,
    /// The [EntryPoint](EntryPoint) contract object
    pub entry_point: EntryPoint<M>,
    /// The [UserOperationValidator](UserOperationValidator) object
    pub validator: V,
    /// The [Mempool](Mempool) object
    pub mempool: Mempool,
    /// The [Reputation](Reputation) object
    pub reputation: Reputation,
    /// Upper bound on the gas claimed by the user operations of one bundle
    pub max_bundle_gas: U256,
    /// Upper bound on the number of user operations resident in the mempool
    pub mempool_max_size: usize,
    /// The [EIP-155](https://eips.ethereum.org/EIPS/eip-155) chain
    pub chain: Chain,
    /// Whether bundles go out over `eth_sendRawTransactionConditional`; the
    /// storage map is then pinned with account storage roots where possible
    pub conditional_rpc: bool,
    /// Last block whose entry point events have been processed
    last_seen_block: U64,
    /// Aggregator announced by the most recent `SignatureAggregatorChanged`
    current_aggregator: Option<Address>,
}

impl<M: Middleware + 'static, V: UserOperationValidator> UoPool<M, V> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entry_point: EntryPoint<M>,
        validator: V,
        mempool: Mempool,
        reputation: Reputation,
        max_bundle_gas: U256,
        mempool_max_size: usize,
        chain: Chain,
        conditional_rpc: bool,
    ) -> Self {
        Self {
            id: mempool_id(&entry_point.address(), chain.id()),
            entry_point,
            validator,
            mempool,
            reputation,
            max_bundle_gas,
            mempool_max_size,
            chain,
            conditional_rpc,
            last_seen_block: U64::zero(),
            current_aggregator: None,
        }
    }

    /// All user operations currently in the mempool
    pub fn get_all(&self) -> eyre::Result<Vec<UserOperation>> {
        self.mempool.get_all().map_err(|err| {
            format_err!("getting all user operations from mempool failed: {err:?}")
        })
    }

    /// All reputation entries (debug RPC)
    pub fn get_reputation(&self) -> Vec<ReputationEntry> {
        self.reputation.get_all().unwrap_or_default()
    }

    /// Sets reputation entries (debug RPC)
    pub fn set_reputation(
        &mut self,
        reputation: Vec<ReputationEntry>,
    ) -> Result<(), ReputationError> {
        self.reputation.set_entities(reputation)
    }

    pub fn clear_mempool(&mut self) {
        self.mempool.clear();
    }

    pub fn clear_reputation(&mut self) {
        self.reputation.clear();
    }

    pub fn clear(&mut self) {
        self.mempool.clear();
        self.reputation.clear();
    }

    /// Runs the full validation (sanity + simulation + trace) for admission
    pub async fn validate_user_operation(
        &self,
        uo: &UserOperation,
    ) -> Result<UserOperationValidationOutcome, InvalidMempoolUserOperationError> {
        self.validator
            .validate_user_operation(
                uo,
                &self.mempool,
                &self.reputation,
                None,
                UserOperationValidatorMode::Sanity |
                    UserOperationValidatorMode::Simulation |
                    UserOperationValidatorMode::SimulationTrace,
            )
            .await
    }

    /// Admits a validated user operation into the mempool.
    ///
    /// A replacement evicts its incumbent, an admission into a full mempool
    /// evicts the lowest-tip entry when the incoming operation outbids it,
    /// and the `seen` counters of every entity are bumped whether or not the
    /// validation passed.
    pub async fn add_user_operation(
        &mut self,
        uo: UserOperation,
        res: Result<UserOperationValidationOutcome, InvalidMempoolUserOperationError>,
    ) -> Result<UserOperationHash, MempoolError> {
        let res = match res {
            Ok(res) => res,
            Err(err) => {
                // a seen-but-rejected operation still counts against the
                // entities
                self.increment_seen(&uo);

                if let InvalidMempoolUserOperationError::Sanity(SanityError::Reputation(
                    ReputationError::BannedEntity { address, .. },
                )) = err
                {
                    self.remove_user_operation_by_entity(&address);
                }
                return Err(MempoolError { hash: uo.hash, kind: err.into() });
            }
        };

        if let Some(uo_hash) = res.prev_hash {
            self.remove_user_operation(&uo_hash);
        } else if self.mempool.len() >= self.mempool_max_size {
            let lowest = self
                .mempool
                .get_sorted()
                .map_err(|kind| MempoolError { hash: uo.hash, kind })?
                .pop();
            match lowest {
                Some(lowest)
                    if uo.max_priority_fee_per_gas > lowest.max_priority_fee_per_gas =>
                {
                    debug!("Mempool full, evicting lowest-tip operation {:?}", lowest.hash);
                    self.remove_user_operation(&lowest.hash);
                }
                _ => {
                    self.increment_seen(&uo);
                    return Err(MempoolError {
                        hash: uo.hash,
                        kind: MempoolErrorKind::Overflow {
                            inner: format!(
                                "tip {} does not outbid any of the {} resident user operations",
                                uo.max_priority_fee_per_gas, self.mempool_max_size
                            ),
                        },
                    });
                }
            }
        }

        match self.mempool.add(uo.clone()) {
            Ok(uo_hash) => {
                if let Some(code_hashes) = res.code_hashes {
                    if let Err(err) = self.mempool.set_code_hashes(&uo_hash, code_hashes) {
                        warn!("Failed to set code hashes for {uo_hash:?}: {err:?}");
                    }
                }
                info!("{uo_hash:?} added to the mempool {:?}", self.id);
                trace!("{uo:?} added to the mempool {:?}", self.id);

                self.increment_seen(&uo);

                Ok(uo_hash)
            }
            Err(e) => Err(MempoolError { hash: uo.hash, kind: e }),
        }
    }

    fn increment_seen(&mut self, uo: &UserOperation) {
        let (sender, factory, paymaster) = uo.get_entities();
        self.reputation.increment_seen(&sender).ok();
        if let Some(factory) = factory {
            self.reputation.increment_seen(&factory).ok();
        }
        if let Some(paymaster) = paymaster {
            self.reputation.increment_seen(&paymaster).ok();
        }
    }

    /// User operations in inclusion order
    pub fn get_sorted_user_operations(&self) -> eyre::Result<Vec<UserOperation>> {
        self.mempool.get_sorted().map_err(|err| {
            format_err!("getting sorted user operations from mempool failed: {err:?}")
        })
    }

    /// Assembles a bundle from the given snapshot of user operations.
    ///
    /// Each entry is re-validated and admitted into the bundle subject to the
    /// per-bundle invariants: one operation per sender, banned entities
    /// dropped, throttled entities limited to one slot, the gas budget
    /// respected, paymaster deposits never overdrawn, and the accumulated
    /// storage map free of conflicts. Entries that fail re-validation are
    /// removed from the mempool; entries that merely cannot join this bundle
    /// stay for the next cycle.
    pub async fn bundle_user_operations(
        &mut self,
        uos: Vec<UserOperation>,
    ) -> eyre::Result<(Vec<UserOperation>, StorageMap)> {
        let mut uos_valid = vec![];
        let mut senders = HashSet::new();
        let mut gas_total = U256::zero();
        let mut paymaster_dep: HashMap<Address, U256> = HashMap::new();
        let mut staked_entity_c: HashMap<Address, u64> = HashMap::new();
        let mut storage_map = StorageMap::default();

        let senders_all = uos.iter().map(|uo| uo.sender).collect::<HashSet<_>>();

        'uos: for uo in uos {
            // at most one user operation per sender per bundle
            if senders.contains(&uo.sender) {
                continue;
            }

            let p_opt = get_address(&uo.paymaster_and_data);
            let f_opt = get_address(&uo.init_code);

            let p_st = Status::from(
                self.reputation
                    .get_status_from_bytes(&uo.paymaster_and_data)
                    .map_err(|err| format_err!("getting reputation status failed: {err:?}"))?,
            );
            let f_st = Status::from(
                self.reputation
                    .get_status_from_bytes(&uo.init_code)
                    .map_err(|err| format_err!("getting reputation status failed: {err:?}"))?,
            );

            let p_c = p_opt.map(|p| staked_entity_c.get(&p).cloned().unwrap_or(0)).unwrap_or(0);
            let f_c = f_opt.map(|f| staked_entity_c.get(&f).cloned().unwrap_or(0)).unwrap_or(0);

            match (p_st, f_st) {
                (Status::BANNED, _) | (_, Status::BANNED) => {
                    self.mempool.remove(&uo.hash).map_err(|err| {
                        format_err!(
                            "removing banned user operation {:?} failed: {err:?}",
                            uo.hash,
                        )
                    })?;
                    continue;
                }
                (Status::THROTTLED, _) if p_c >= THROTTLED_ENTITY_BUNDLE_COUNT as u64 => {
                    continue;
                }
                (_, Status::THROTTLED) if f_c >= THROTTLED_ENTITY_BUNDLE_COUNT as u64 => {
                    continue;
                }
                _ => (),
            };

            // the second validation: everything could have changed while the
            // operation sat in the mempool
            let val_out = self
                .validator
                .validate_user_operation(
                    &uo,
                    &self.mempool,
                    &self.reputation,
                    Some(stakes_unchecked()),
                    UserOperationValidatorMode::Simulation |
                        UserOperationValidatorMode::SimulationTrace,
                )
                .await;

            debug!("Second validation for user operation {:?}: {:?}", uo.hash, val_out);

            match val_out {
                Ok(val_out) => {
                    if val_out.valid_after.is_some() {
                        continue;
                    }

                    // the storage this operation touches may not overlap with
                    // another sender in the snapshot
                    for addr in val_out.storage_map.root_hashes.keys() {
                        if *addr != uo.sender && senders_all.contains(addr) {
                            continue 'uos;
                        }
                    }
                    for addr in val_out.storage_map.slots.keys() {
                        if *addr != uo.sender && senders_all.contains(addr) {
                            continue 'uos;
                        }
                    }

                    let gas_cost = val_out.verification_gas_limit.saturating_add(uo.call_gas_limit);
                    let gas_total_new = gas_total.saturating_add(gas_cost);
                    if gas_total_new > self.max_bundle_gas {
                        break;
                    }

                    if let Some(p) = p_opt {
                        let balance = match paymaster_dep.get(&p) {
                            Some(n) => *n,
                            None => self.entry_point.balance_of(&p).await.map_err(|err| {
                                format_err!("getting balance of paymaster {p:?} failed: {err:?}")
                            })?,
                        };

                        if balance < val_out.pre_fund {
                            // the paymaster's deposit is already claimed by
                            // earlier operations in this bundle
                            continue;
                        }

                        staked_entity_c.entry(p).and_modify(|c| *c += 1).or_insert(1);
                        paymaster_dep.insert(p, balance.saturating_sub(val_out.pre_fund));
                    }

                    if let Some(f) = f_opt {
                        staked_entity_c.entry(f).and_modify(|c| *c += 1).or_insert(1);
                    }

                    let mut uo_map = val_out.storage_map;
                    if self.conditional_rpc && uo.init_code.is_empty() {
                        match self
                            .entry_point
                            .eth_client()
                            .get_proof(uo.sender, vec![], None)
                            .await
                        {
                            Ok(proof) => {
                                uo_map.slots.remove(&uo.sender);
                                uo_map.root_hashes.insert(uo.sender, proof.storage_hash);
                            }
                            Err(err) => {
                                warn!(
                                    "eth_getProof for sender {:?} failed: {err:?}",
                                    uo.sender
                                );
                            }
                        }
                    }

                    if !try_merge_storage_map(&mut storage_map, &uo_map) {
                        debug!(
                            "Skipping user operation {:?}, its storage map conflicts with the bundle",
                            uo.hash
                        );
                        continue;
                    }

                    gas_total = gas_total_new;
                }
                Err(_) => {
                    self.mempool.remove(&uo.hash).map_err(|err| {
                        format_err!(
                            "removing user operation {:?} with failed 2nd validation failed: {err:?}",
                            uo.hash,
                        )
                    })?;
                    continue;
                }
            }

            uos_valid.push(uo.clone());
            senders.insert(uo.sender);
        }

        Ok((uos_valid, storage_map))
    }

    /// Replays entry point events since the last processed block and
    /// reconciles the mempool and the reputation counters with them.
    ///
    /// The block watermark makes repeated calls idempotent, and the mempool
    /// removal tolerates operations that are already gone.
    pub async fn handle_past_events(&mut self) -> eyre::Result<()> {
        let block_num = self.entry_point.eth_client().get_block_number().await?;
        let from_block = if self.last_seen_block.is_zero() {
            block_num.saturating_sub(U64::from(LATEST_SCAN_DEPTH))
        } else {
            self.last_seen_block + 1
        };

        if from_block > block_num {
            return Ok(());
        }

        let events =
            self.entry_point.events().from_block(from_block).to_block(block_num).query().await?;

        for event in events {
            match event {
                EntryPointAPIEvents::UserOperationEventFilter(ev) => {
                    let uo_hash: UserOperationHash = ev.user_op_hash.into();

                    self.reputation.increment_included(&ev.sender).ok();
                    if !ev.paymaster.is_zero() {
                        self.reputation.increment_included(&ev.paymaster).ok();
                    }

                    if self
                        .mempool
                        .remove(&uo_hash)
                        .map_err(|err| {
                            format_err!("removing included user operation failed: {err:?}")
                        })?
                    {
                        debug!("{uo_hash:?} removed from the mempool, observed on chain");
                    }
                }
                EntryPointAPIEvents::AccountDeployedFilter(ev) => {
                    self.reputation.increment_included(&ev.factory).ok();
                }
                EntryPointAPIEvents::SignatureAggregatorChangedFilter(ev) => {
                    self.current_aggregator =
                        if ev.aggregator.is_zero() { None } else { Some(ev.aggregator) };
                }
                _ => (),
            }
        }

        self.last_seen_block = block_num;

        Ok(())
    }

    /// Estimates the gas fields of a user operation (the
    /// `eth_estimateUserOperationGas` backend)
    pub async fn estimate_user_operation_gas(
        &self,
        uo: &UserOperation,
    ) -> Result<UserOperationGasEstimation, MempoolError> {
        let pre_verification_gas = div_ceil(
            Overhead::default().calculate_pre_verification_gas(uo).saturating_mul(
                U256::from(100).saturating_add(PRE_VERIFICATION_SAFE_RESERVE_PERC.into()),
            ),
            U256::from(100),
        );

        let est = estimate_user_op_gas(&uo.user_operation, &self.entry_point).await.map_err(
            |e| match e {
                EntryPointError::FailedOp(op) => MempoolError {
                    hash: uo.hash,
                    kind: MempoolErrorKind::InvalidUserOperation(
                        InvalidMempoolUserOperationError::Simulation(SimulationError::Validation {
                            inner: op.reason,
                        }),
                    ),
                },
                EntryPointError::ExecutionReverted(e) => MempoolError {
                    hash: uo.hash,
                    kind: MempoolErrorKind::InvalidUserOperation(
                        InvalidMempoolUserOperationError::Simulation(SimulationError::Execution {
                            inner: e,
                        }),
                    ),
                },
                EntryPointError::Provider { inner } => {
                    MempoolError { hash: uo.hash, kind: MempoolErrorKind::Provider { inner } }
                }
                _ => MempoolError {
                    hash: uo.hash,
                    kind: MempoolErrorKind::Other { inner: e.to_string() },
                },
            },
        )?;

        Ok(UserOperationGasEstimation {
            pre_verification_gas,
            verification_gas_limit: est.verification_gas_limit,
            call_gas_limit: est.call_gas_limit,
            valid_after: est.valid_after,
            valid_until: est.valid_until,
        })
    }

    /// Finds the `UserOperationEvent` of a mined user operation, if any
    pub async fn get_user_operation_event_meta(
        &self,
        uo_hash: &UserOperationHash,
    ) -> eyre::Result<Option<(UserOperationEventFilter, LogMeta)>> {
        let mut event: Option<(UserOperationEventFilter, LogMeta)> = None;
        let latest_block = self.entry_point.eth_client().get_block_number().await?;
        let filter = self
            .entry_point
            .entry_point_api()
            .event::<UserOperationEventFilter>()
            .from_block(latest_block.saturating_sub(U64::from(LATEST_SCAN_DEPTH)))
            .topic1(uo_hash.0);
        let res: Vec<(UserOperationEventFilter, LogMeta)> = filter.query_with_meta().await?;
        // the same user operation can appear twice in one bundle; the last
        // event wins
        for log_meta in res.iter() {
            event = Some(log_meta.clone());
        }
        Ok(event)
    }

    /// The user operation and its inclusion coordinates, recovered from the
    /// `handleOps` transaction it was mined in
    pub async fn get_user_operation_by_hash(
        &self,
        uo_hash: &UserOperationHash,
    ) -> eyre::Result<UserOperationByHash> {
        let event = self.get_user_operation_event_meta(uo_hash).await?;

        if let Some((event, log_meta)) = event {
            if let Some((uo, ep)) = self
                .entry_point
                .eth_client()
                .get_transaction(log_meta.transaction_hash)
                .await?
                .and_then(|tx| {
                    let uos = parse_from_input_data(tx.input)?;
                    let ep = tx.to?;
                    uos.iter()
                        .find(|uo| uo.sender == event.sender && uo.nonce == event.nonce)
                        .map(|uo| (uo.clone(), ep))
                })
            {
                return Ok(UserOperationByHash {
                    user_operation: uo,
                    entry_point: ep,
                    transaction_hash: log_meta.transaction_hash,
                    block_hash: log_meta.block_hash,
                    block_number: log_meta.block_number,
                });
            }
        }

        Err(format_err!("no user operation found"))
    }

    /// The receipt of a mined user operation
    pub async fn get_user_operation_receipt(
        &self,
        uo_hash: &UserOperationHash,
    ) -> eyre::Result<UserOperationReceipt> {
        let event = self.get_user_operation_event_meta(uo_hash).await?;

        if let Some((event, log_meta)) = event {
            if let Some(tx_receipt) = self
                .entry_point
                .eth_client()
                .get_transaction_receipt(log_meta.transaction_hash)
                .await?
            {
                let uo = self.get_user_operation_by_hash(uo_hash).await?;
                return Ok(UserOperationReceipt {
                    user_operation_hash: *uo_hash,
                    sender: event.sender,
                    nonce: event.nonce,
                    actual_gas_cost: event.actual_gas_cost,
                    actual_gas_used: event.actual_gas_used,
                    success: event.success,
                    tx_receipt: tx_receipt.clone(),
                    logs: tx_receipt.logs.into_iter().collect(),
                    paymaster: get_address(&uo.user_operation.paymaster_and_data),
                    reason: String::new(),
                });
            }
        }

        Err(format_err!("no user operation found"))
    }

    /// Removes a user operation from the mempool
    pub fn remove_user_operation(&mut self, uo_hash: &UserOperationHash) -> Option<()> {
        self.mempool.remove(uo_hash).ok();
        None
    }

    /// Removes every user operation involving the given entity
    pub fn remove_user_operation_by_entity(&mut self, entity: &Address) -> Option<()> {
        self.mempool.remove_by_entity(entity).ok();
        None
    }

    /// Removes multiple user operations; the reputation bookkeeping is done
    /// by the events path once inclusion is observed on chain
    pub fn remove_user_operations(&mut self, uos: Vec<UserOperation>) {
        for uo in uos {
            self.remove_user_operation(&uo.hash);
        }
    }

    /// Stake info of an entity (debug RPC)
    pub async fn get_stake_info(&self, addr: &Address) -> eyre::Result<StakeInfoResponse> {
        let info = self.entry_point.get_deposit_info(addr).await?;
        let stake_info = StakeInfo {
            address: *addr,
            stake: U256::from(info.stake),
            unstake_delay: U256::from(info.unstake_delay_sec),
        };
        Ok(StakeInfoResponse {
            stake_info,
            is_staked: self.reputation.verify_stake("", Some(stake_info), None, None).is_ok(),
        })
    }

    /// Aggregator announced by the most recent on-chain
    /// `SignatureAggregatorChanged` event
    pub fn current_aggregator(&self) -> Option<Address> {
        self.current_aggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mempool_in_memory, reputation_in_memory};
    use aurelius_primitives::{
        constants::validation::reputation::{BAN_SLACK, THROTTLING_SLACK},
        UserOperationSigned,
    };
    use ethers::{
        abi::{encode, Token},
        contract::EthEvent,
        providers::{MockProvider, Provider},
        types::{Bytes, Log, H256},
    };
    use std::sync::Arc;

    const EP: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";
    const ETH: u64 = 1_000_000_000_000_000_000;

    #[derive(Clone, Default)]
    struct StubValidator {
        outcomes: HashMap<UserOperationHash, Option<UserOperationValidationOutcome>>,
    }

    impl StubValidator {
        fn ok(mut self, uo: &UserOperation, out: UserOperationValidationOutcome) -> Self {
            self.outcomes.insert(uo.hash, Some(out));
            self
        }

        fn failing(mut self, uo: &UserOperation) -> Self {
            self.outcomes.insert(uo.hash, None);
            self
        }
    }

    #[async_trait::async_trait]
    impl UserOperationValidator for StubValidator {
        async fn validate_user_operation(
            &self,
            uo: &UserOperation,
            _mempool: &Mempool,
            _reputation: &Reputation,
            _val_config: Option<ValidationConfig>,
            _mode: enumset::EnumSet<UserOperationValidatorMode>,
        ) -> Result<UserOperationValidationOutcome, InvalidMempoolUserOperationError> {
            match self.outcomes.get(&uo.hash) {
                Some(Some(out)) => Ok(out.clone()),
                Some(None) => Err(InvalidMempoolUserOperationError::Simulation(
                    SimulationError::Validation { inner: "simulation failed".into() },
                )),
                None => Ok(Default::default()),
            }
        }
    }

    fn test_pool(
        validator: StubValidator,
        max_bundle_gas: u64,
        mempool_max_size: usize,
    ) -> (UoPool<Provider<MockProvider>, StubValidator>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let entry_point = EntryPoint::new(Arc::new(provider), EP.parse().unwrap());
        let pool = UoPool::new(
            entry_point,
            validator,
            mempool_in_memory(),
            reputation_in_memory(THROTTLING_SLACK, BAN_SLACK, U256::one(), U256::zero()),
            max_bundle_gas.into(),
            mempool_max_size,
            Chain::dev(),
            false,
        );
        (pool, mock)
    }

    fn uo(sender: Address, nonce: u64, tip: u64) -> UserOperation {
        let signed = UserOperationSigned::random()
            .sender(sender)
            .nonce(nonce.into())
            .call_gas_limit(50_000.into())
            .max_priority_fee_per_gas(tip.into());
        let hash = signed.hash(&EP.parse().unwrap(), Chain::dev().id());
        UserOperation::from_user_operation_signed(hash, signed)
    }

    fn uo_with_paymaster(sender: Address, paymaster: Address, tip: u64) -> UserOperation {
        let signed = UserOperationSigned::random()
            .sender(sender)
            .call_gas_limit(50_000.into())
            .max_priority_fee_per_gas(tip.into())
            .paymaster_and_data(paymaster.as_bytes().to_vec().into());
        let hash = signed.hash(&EP.parse().unwrap(), Chain::dev().id());
        UserOperation::from_user_operation_signed(hash, signed)
    }

    fn outcome(verification_gas: u64, pre_fund: u64) -> UserOperationValidationOutcome {
        UserOperationValidationOutcome {
            verification_gas_limit: verification_gas.into(),
            pre_fund: pre_fund.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn bundle_takes_one_op_per_sender() {
        let sender = Address::random();
        let uo0 = uo(sender, 0, 100);
        let uo1 = uo(sender, 1, 90);

        let validator =
            StubValidator::default().ok(&uo0, outcome(100_000, 0)).ok(&uo1, outcome(100_000, 0));
        let (mut pool, _mock) = test_pool(validator, 10_000_000, 4096);

        pool.mempool.add(uo0.clone()).unwrap();
        pool.mempool.add(uo1.clone()).unwrap();

        let (bundle, _) =
            pool.bundle_user_operations(vec![uo0.clone(), uo1.clone()]).await.unwrap();

        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle[0].hash, uo0.hash);
        // the second op stays for the next cycle
        assert!(pool.mempool.get(&uo1.hash).unwrap().is_some());
    }

    #[tokio::test]
    async fn bundle_removes_op_with_banned_paymaster() {
        let paymaster = Address::random();
        let uo = uo_with_paymaster(Address::random(), paymaster, 100);

        let validator = StubValidator::default().ok(&uo, outcome(100_000, 0));
        let (mut pool, _mock) = test_pool(validator, 10_000_000, 4096);
        pool.reputation.add_blacklist(&paymaster);

        pool.mempool.add(uo.clone()).unwrap();

        let (bundle, _) = pool.bundle_user_operations(vec![uo.clone()]).await.unwrap();

        assert!(bundle.is_empty());
        assert!(pool.mempool.get(&uo.hash).unwrap().is_none());
    }

    #[tokio::test]
    async fn bundle_respects_paymaster_deposit() {
        let paymaster = Address::random();
        let uo0 = uo_with_paymaster(Address::random(), paymaster, 100);
        let uo1 = uo_with_paymaster(Address::random(), paymaster, 90);

        let validator = StubValidator::default()
            .ok(&uo0, outcome(100_000, ETH))
            .ok(&uo1, outcome(100_000, ETH));
        let (mut pool, mock) = test_pool(validator, 10_000_000, 4096);

        pool.mempool.add(uo0.clone()).unwrap();
        pool.mempool.add(uo1.clone()).unwrap();

        // paymaster deposit queried once, covers one and a half prefunds
        mock.push::<String, _>(format!("0x{:064x}", U256::from(ETH) * U256::from(3) / U256::from(2)))
            .unwrap();

        let (bundle, _) =
            pool.bundle_user_operations(vec![uo0.clone(), uo1.clone()]).await.unwrap();

        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle[0].hash, uo0.hash);
        // skipped, not removed: the deposit may cover it next cycle
        assert!(pool.mempool.get(&uo1.hash).unwrap().is_some());
    }

    #[tokio::test]
    async fn bundle_stops_at_gas_budget() {
        let uos: Vec<_> =
            (0..3u64).map(|i| uo(Address::random(), 0, 100 - i)).collect();

        let mut validator = StubValidator::default();
        for uo in &uos {
            validator = validator.ok(uo, outcome(100_000, 0));
        }
        // each op claims 150k gas; two land exactly on the budget
        let (mut pool, _mock) = test_pool(validator, 300_000, 4096);

        for uo in &uos {
            pool.mempool.add(uo.clone()).unwrap();
        }

        let (bundle, _) = pool.bundle_user_operations(uos.clone()).await.unwrap();

        assert_eq!(bundle.len(), 2);
        assert!(pool.mempool.get(&uos[2].hash).unwrap().is_some());
    }

    #[tokio::test]
    async fn bundle_skips_cross_sender_storage_access() {
        let sender_a = Address::random();
        let sender_b = Address::random();
        let uo_a = uo(sender_a, 0, 100);
        let uo_b = uo(sender_b, 0, 90);

        // op A reads storage of sender B during validation
        let mut out_a = outcome(100_000, 0);
        out_a.storage_map.slots.entry(sender_b).or_default().insert(H256::zero(), H256::zero());

        let validator =
            StubValidator::default().ok(&uo_a, out_a).ok(&uo_b, outcome(100_000, 0));
        let (mut pool, _mock) = test_pool(validator, 10_000_000, 4096);

        pool.mempool.add(uo_a.clone()).unwrap();
        pool.mempool.add(uo_b.clone()).unwrap();

        let (bundle, _) =
            pool.bundle_user_operations(vec![uo_a.clone(), uo_b.clone()]).await.unwrap();

        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle[0].hash, uo_b.hash);
        assert!(pool.mempool.get(&uo_a.hash).unwrap().is_some());
    }

    #[tokio::test]
    async fn bundle_removes_op_failing_second_validation() {
        let uo = uo(Address::random(), 0, 100);

        let validator = StubValidator::default().failing(&uo);
        let (mut pool, _mock) = test_pool(validator, 10_000_000, 4096);

        pool.mempool.add(uo.clone()).unwrap();

        let (bundle, _) = pool.bundle_user_operations(vec![uo.clone()]).await.unwrap();

        assert!(bundle.is_empty());
        assert!(pool.mempool.get(&uo.hash).unwrap().is_none());
    }

    #[tokio::test]
    async fn bundle_drops_op_with_conflicting_storage_map() {
        let third_party = Address::random();
        let uo_a = uo(Address::random(), 0, 100);
        let uo_b = uo(Address::random(), 0, 90);

        // both ops read the same slot of a non-sender contract, but observed
        // different values
        let mut out_a = outcome(100_000, 0);
        out_a
            .storage_map
            .slots
            .entry(third_party)
            .or_default()
            .insert(H256::zero(), H256::from_low_u64_be(1));
        let mut out_b = outcome(100_000, 0);
        out_b
            .storage_map
            .slots
            .entry(third_party)
            .or_default()
            .insert(H256::zero(), H256::from_low_u64_be(2));

        let validator = StubValidator::default().ok(&uo_a, out_a).ok(&uo_b, out_b);
        let (mut pool, _mock) = test_pool(validator, 10_000_000, 4096);

        pool.mempool.add(uo_a.clone()).unwrap();
        pool.mempool.add(uo_b.clone()).unwrap();

        let (bundle, storage_map) =
            pool.bundle_user_operations(vec![uo_a.clone(), uo_b.clone()]).await.unwrap();

        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle[0].hash, uo_a.hash);
        assert_eq!(
            storage_map.slots[&third_party][&H256::zero()],
            H256::from_low_u64_be(1)
        );
        assert!(pool.mempool.get(&uo_b.hash).unwrap().is_some());
    }

    #[tokio::test]
    async fn admission_evicts_lowest_tip_when_full() {
        let (mut pool, _mock) = test_pool(StubValidator::default(), 10_000_000, 2);

        let uo_low = uo(Address::random(), 0, 10);
        let uo_mid = uo(Address::random(), 0, 20);
        pool.add_user_operation(uo_low.clone(), Ok(Default::default())).await.unwrap();
        pool.add_user_operation(uo_mid.clone(), Ok(Default::default())).await.unwrap();

        // not outbidding the lowest resident tip
        let uo_equal = uo(Address::random(), 0, 10);
        let res = pool.add_user_operation(uo_equal, Ok(Default::default())).await;
        assert!(matches!(
            res,
            Err(MempoolError { kind: MempoolErrorKind::Overflow { .. }, .. })
        ));

        let uo_high = uo(Address::random(), 0, 30);
        pool.add_user_operation(uo_high.clone(), Ok(Default::default())).await.unwrap();

        assert_eq!(pool.mempool.len(), 2);
        assert!(pool.mempool.get(&uo_low.hash).unwrap().is_none());
        assert!(pool.mempool.get(&uo_high.hash).unwrap().is_some());
    }

    #[tokio::test]
    async fn admission_replaces_incumbent() {
        let (mut pool, _mock) = test_pool(StubValidator::default(), 10_000_000, 4096);

        let sender = Address::random();
        let uo_prev = uo(sender, 5, 100);
        pool.add_user_operation(uo_prev.clone(), Ok(Default::default())).await.unwrap();

        let uo_repl = uo(sender, 5, 115);
        let res = UserOperationValidationOutcome {
            prev_hash: Some(uo_prev.hash),
            ..Default::default()
        };
        pool.add_user_operation(uo_repl.clone(), Ok(res)).await.unwrap();

        assert_eq!(pool.mempool.len(), 1);
        assert!(pool.mempool.get(&uo_prev.hash).unwrap().is_none());
        assert_eq!(
            pool.mempool.get(&uo_repl.hash).unwrap().unwrap().max_priority_fee_per_gas,
            U256::from(115)
        );
    }

    #[tokio::test]
    async fn admission_counts_rejected_ops_as_seen() {
        let (mut pool, _mock) = test_pool(StubValidator::default(), 10_000_000, 4096);

        let uo = uo(Address::random(), 0, 100);
        let res = pool
            .add_user_operation(
                uo.clone(),
                Err(InvalidMempoolUserOperationError::Simulation(SimulationError::Signature)),
            )
            .await;

        assert!(res.is_err());
        assert_eq!(pool.reputation.get(&uo.sender).unwrap().uo_seen, 1);
        assert!(pool.mempool.is_empty());
    }

    fn user_op_event_log(uo: &UserOperation) -> Log {
        let paymaster = get_address(&uo.paymaster_and_data).unwrap_or_default();
        Log {
            address: EP.parse().unwrap(),
            topics: vec![
                UserOperationEventFilter::signature(),
                uo.hash.0,
                H256::from(uo.sender),
                H256::from(paymaster),
            ],
            data: Bytes::from(encode(&[
                Token::Uint(uo.nonce),
                Token::Bool(true),
                Token::Uint(U256::from(1)),
                Token::Uint(U256::from(1)),
            ])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn events_reconcile_mempool_and_reputation() {
        let paymaster = Address::random();
        let uo = uo_with_paymaster(Address::random(), paymaster, 100);

        let (mut pool, mock) = test_pool(StubValidator::default(), 10_000_000, 4096);
        pool.mempool.add(uo.clone()).unwrap();

        // responses are a stack: logs first, then the block number
        mock.push::<Vec<ethers::types::Log>, _>(vec![user_op_event_log(&uo)]).unwrap();
        mock.push(U64::from(100)).unwrap();

        pool.handle_past_events().await.unwrap();

        assert!(pool.mempool.is_empty());
        assert_eq!(pool.reputation.get(&uo.sender).unwrap().uo_included, 1);
        assert_eq!(pool.reputation.get(&paymaster).unwrap().uo_included, 1);

        // replaying the same head is a no-op: the watermark skips the log
        // query and the counters stay put
        mock.push(U64::from(100)).unwrap();
        pool.handle_past_events().await.unwrap();

        assert_eq!(pool.reputation.get(&uo.sender).unwrap().uo_included, 1);
    }
}
