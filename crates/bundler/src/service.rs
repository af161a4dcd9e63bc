use crate::{bundler::SendBundleOp, errors::BundlerError, Bundler};
use aurelius_contracts::FailedOp;
use aurelius_mempool::{UoPool, UserOperationValidator};
use aurelius_primitives::UserOperation;
use ethers::{providers::Middleware, types::H256};
use eyre::format_err;
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, trace, warn};

/// Drives the bundling pipeline: a single-shot cycle that reconciles the
/// mempool with the chain, assembles a bundle and submits it, plus the
/// interval- and size-driven triggers that schedule the cycle.
///
/// Every cycle runs under the pool mutex, so at most one is in flight and
/// admission never races with bundle assembly.
pub struct BundlerService<M, V, S>
where
    M: Middleware + 'static,
    V: UserOperationValidator + 'static,
    S: SendBundleOp + Clone,
{
    pub bundler: Bundler<M, S>,
    pub uopool: Arc<Mutex<UoPool<M, V>>>,
    running: Arc<parking_lot::Mutex<bool>>,
}

impl<M, V, S> Clone for BundlerService<M, V, S>
where
    M: Middleware + 'static,
    V: UserOperationValidator + 'static,
    S: SendBundleOp + Clone,
{
    fn clone(&self) -> Self {
        Self {
            bundler: self.bundler.clone(),
            uopool: self.uopool.clone(),
            running: self.running.clone(),
        }
    }
}

impl<M, V, S> BundlerService<M, V, S>
where
    M: Middleware + 'static,
    V: UserOperationValidator + 'static,
    S: SendBundleOp + Clone,
{
    pub fn new(bundler: Bundler<M, S>, uopool: Arc<Mutex<UoPool<M, V>>>) -> Self {
        Self { bundler, uopool, running: Arc::new(parking_lot::Mutex::new(false)) }
    }

    /// Runs one bundling cycle.
    ///
    /// Returns `Ok(None)` when there was nothing to submit or the cycle was
    /// abandoned on a transient failure; an `Err` is fatal and the process
    /// should stop.
    pub async fn send_next_bundle(&self) -> eyre::Result<Option<H256>> {
        let mut uopool = self.uopool.lock().await;

        if let Err(err) = uopool.handle_past_events().await {
            warn!("Failed to handle past events: {err:?}");
        }

        let uos = match uopool.get_sorted_user_operations() {
            Ok(uos) => uos,
            Err(err) => {
                error!("Failed to snapshot the mempool: {err:?}");
                return Ok(None);
            }
        };

        let (bundle, storage_map) = match uopool.bundle_user_operations(uos).await {
            Ok(res) => res,
            Err(err) => {
                error!("Failed to create a bundle: {err:?}");
                return Ok(None);
            }
        };

        if bundle.is_empty() {
            trace!("Skipping bundling cycle, no bundleable user operations");
            return Ok(None);
        }

        info!("Creating a bundle with {} user operations", bundle.len());
        trace!("Bundle content: {bundle:?}");

        match self.bundler.send_next_bundle(&bundle, storage_map).await {
            Ok(tx_hash) => {
                let uo_hashes = bundle.iter().map(|uo| uo.hash).collect::<Vec<_>>();
                uopool.remove_user_operations(bundle);
                info!("Bundle sent, tx hash: {tx_hash:?}, user operations: {uo_hashes:?}");
                Ok(Some(tx_hash))
            }
            Err(BundlerError::FailedOp(op)) => {
                Self::handle_failed_op(&mut uopool, &bundle, op);
                Ok(None)
            }
            Err(BundlerError::MethodNotFound { inner }) => {
                Err(format_err!("upstream node lacks a required RPC method: {inner}"))
            }
            Err(err) => {
                error!("Failed to send the bundle: {err:?}");
                Ok(None)
            }
        }
    }

    /// Reacts to a `FailedOp` revert: the entity class named by the AA error
    /// prefix is punished, any other reason removes just the offending user
    /// operation.
    fn handle_failed_op(uopool: &mut UoPool<M, V>, bundle: &[UserOperation], op: FailedOp) {
        let index = op.op_index.low_u64() as usize;
        let uo = match bundle.get(index) {
            Some(uo) => uo,
            None => {
                error!("FailedOp index {index} out of bundle bounds: {op}");
                return;
            }
        };

        warn!("handleOps failed on user operation {:?}: {op}", uo.hash);

        let (sender, factory, paymaster) = uo.get_entities();

        if op.reason.starts_with("AA3") {
            if let Some(paymaster) = paymaster {
                uopool.reputation.update_handle_ops_reverted(&paymaster).ok();
            }
        } else if op.reason.starts_with("AA2") {
            uopool.reputation.update_handle_ops_reverted(&sender).ok();
        } else if op.reason.starts_with("AA1") {
            if let Some(factory) = factory {
                uopool.reputation.update_handle_ops_reverted(&factory).ok();
            }
        } else {
            uopool.remove_user_operation(&uo.hash);
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    pub fn stop_bundling(&self) {
        info!("Stopping auto bundling");
        *self.running.lock() = false;
    }

    /// Enables auto bundling and starts the interval loop; an interval of 0
    /// leaves only the size-driven trigger active
    pub fn start_bundling(&self, interval: u64)
    where
        Self: Send + Sync,
    {
        if self.is_running() {
            return;
        }

        *self.running.lock() = true;

        if interval == 0 {
            info!("Starting auto bundling without interval, size-triggered only");
            return;
        }

        info!("Starting auto bundling with interval of {interval} seconds");

        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval));
            loop {
                interval.tick().await;

                if !service.is_running() {
                    break;
                }

                if let Err(err) = service.send_next_bundle().await {
                    error!("Fatal bundling error: {err:?}");
                    std::process::exit(1);
                }
            }
        });
    }

    /// Consumes admission wake-ups: whenever the mempool grows past the
    /// configured threshold, a cycle is scheduled without waiting for the
    /// interval
    pub fn spawn_trigger_listener(&self, mut wake: mpsc::UnboundedReceiver<()>)
    where
        Self: Send + Sync,
    {
        let service = self.clone();
        tokio::spawn(async move {
            while wake.recv().await.is_some() {
                if !service.is_running() {
                    continue;
                }

                if let Err(err) = service.send_next_bundle().await {
                    error!("Fatal bundling error: {err:?}");
                    std::process::exit(1);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_chains::Chain;
    use aurelius_contracts::EntryPoint;
    use aurelius_mempool::{
        mempool_in_memory, reputation_in_memory, InvalidMempoolUserOperationError, Mempool,
        Reputation, UserOperationValidationOutcome, UserOperationValidatorMode,
    };
    use aurelius_primitives::{
        reputation::Status,
        simulation::ValidationConfig,
        UserOperation, UserOperationSigned,
    };
    use ethers::{
        providers::{MockProvider, Provider},
        types::{Address, U256},
    };

    struct NoopValidator;

    #[async_trait::async_trait]
    impl UserOperationValidator for NoopValidator {
        async fn validate_user_operation(
            &self,
            _uo: &UserOperation,
            _mempool: &Mempool,
            _reputation: &Reputation,
            _val_config: Option<ValidationConfig>,
            _mode: enumset::EnumSet<UserOperationValidatorMode>,
        ) -> Result<UserOperationValidationOutcome, InvalidMempoolUserOperationError> {
            Ok(Default::default())
        }
    }

    const EP: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";

    fn test_pool() -> UoPool<Provider<MockProvider>, NoopValidator> {
        let (provider, _mock) = Provider::mocked();
        UoPool::new(
            EntryPoint::new(Arc::new(provider), EP.parse().unwrap()),
            NoopValidator,
            mempool_in_memory(),
            reputation_in_memory(10, 50, U256::one(), U256::zero()),
            U256::from(10_000_000u64),
            4096,
            Chain::dev(),
            false,
        )
    }

    fn uo_with_entities(paymaster: Address, factory: Address) -> UserOperation {
        let signed = UserOperationSigned::random()
            .init_code([factory.as_bytes(), &[0x1f]].concat().into())
            .paymaster_and_data(paymaster.as_bytes().to_vec().into());
        let hash = signed.hash(&EP.parse().unwrap(), Chain::dev().id());
        UserOperation::from_user_operation_signed(hash, signed)
    }

    type Svc = BundlerService<
        Provider<MockProvider>,
        NoopValidator,
        crate::EthereumClient<Provider<MockProvider>>,
    >;

    #[tokio::test]
    async fn failed_op_punishes_entity_by_prefix() {
        let paymaster = Address::random();
        let factory = Address::random();
        let uo = uo_with_entities(paymaster, factory);
        let bundle = vec![uo.clone()];

        // AA3* hits the paymaster
        let mut pool = test_pool();
        pool.mempool.add(uo.clone()).unwrap();
        Svc::handle_failed_op(
            &mut pool,
            &bundle,
            FailedOp { op_index: U256::zero(), reason: "AA33 reverted: paymaster".into() },
        );
        assert_eq!(Status::from(pool.reputation.get_status(&paymaster).unwrap()), Status::BANNED);
        assert_eq!(Status::from(pool.reputation.get_status(&uo.sender).unwrap()), Status::OK);
        // AA prefixes leave the operation in the mempool
        assert!(pool.mempool.get(&uo.hash).unwrap().is_some());

        // AA2* hits the sender
        let mut pool = test_pool();
        pool.mempool.add(uo.clone()).unwrap();
        Svc::handle_failed_op(
            &mut pool,
            &bundle,
            FailedOp { op_index: U256::zero(), reason: "AA24 signature error".into() },
        );
        assert_eq!(Status::from(pool.reputation.get_status(&uo.sender).unwrap()), Status::BANNED);

        // AA1* hits the factory
        let mut pool = test_pool();
        pool.mempool.add(uo.clone()).unwrap();
        Svc::handle_failed_op(
            &mut pool,
            &bundle,
            FailedOp { op_index: U256::zero(), reason: "AA13 initCode failed or OOG".into() },
        );
        assert_eq!(Status::from(pool.reputation.get_status(&factory).unwrap()), Status::BANNED);

        // any other reason removes just the offending operation
        let mut pool = test_pool();
        pool.mempool.add(uo.clone()).unwrap();
        Svc::handle_failed_op(
            &mut pool,
            &bundle,
            FailedOp { op_index: U256::zero(), reason: "AA90 invalid beneficiary".into() },
        );
        assert!(pool.mempool.get(&uo.hash).unwrap().is_none());
        assert_eq!(Status::from(pool.reputation.get_status(&uo.sender).unwrap()), Status::OK);
    }
}
