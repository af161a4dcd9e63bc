use crate::errors::BundlerError;
use alloy_chains::Chain;
use aurelius_contracts::EntryPoint;
use aurelius_primitives::{
    constants::bundler::BUNDLE_GAS_LIMIT, simulation::StorageMap, UserOperation, Wallet,
};
use ethers::{
    providers::Middleware,
    types::{
        transaction::eip2718::TypedTransaction, Address, Eip1559TransactionRequest, H256, U256,
        U64,
    },
};
use tracing::{info, trace};

/// Strategy for getting a signed bundle transaction on chain
#[async_trait::async_trait]
pub trait SendBundleOp: Send + Sync + 'static {
    /// Submits a bundle transaction, optionally constrained by the storage
    /// map observed during validation
    async fn send_bundle(
        &self,
        bundle: TypedTransaction,
        storage_map: StorageMap,
    ) -> Result<H256, BundlerError>;
}

/// Builds, pre-flights and submits `handleOps` transactions
pub struct Bundler<M, S>
where
    M: Middleware + 'static,
    S: SendBundleOp,
{
    /// Wallet holding the bundler's signing key
    pub wallet: Wallet,
    /// Beneficiary address where the gas refund is sent after execution
    pub beneficiary: Address,
    /// When the signer's own balance drops to this level, refunds are routed
    /// to the signer instead of the beneficiary
    pub min_balance: U256,
    /// Entry point contract
    pub entry_point: EntryPoint<M>,
    /// The chain the bundles go to
    pub chain: Chain,
    /// Submission strategy (plain or conditional endpoint)
    pub client: S,
}

impl<M, S> Clone for Bundler<M, S>
where
    M: Middleware + 'static,
    S: SendBundleOp + Clone,
{
    fn clone(&self) -> Self {
        Self {
            wallet: self.wallet.clone(),
            beneficiary: self.beneficiary,
            min_balance: self.min_balance,
            entry_point: self.entry_point.clone(),
            chain: self.chain,
            client: self.client.clone(),
        }
    }
}

impl<M, S> Bundler<M, S>
where
    M: Middleware + 'static,
    S: SendBundleOp,
{
    pub fn new(
        wallet: Wallet,
        beneficiary: Address,
        min_balance: U256,
        entry_point: EntryPoint<M>,
        chain: Chain,
        client: S,
    ) -> Self {
        Self { wallet, beneficiary, min_balance, entry_point, chain, client }
    }

    /// Routes the gas refund to the signer itself while its balance is at or
    /// below the configured minimum, topping it back up
    async fn select_beneficiary(&self) -> Result<Address, BundlerError> {
        let balance = self
            .entry_point
            .eth_client()
            .get_balance(self.wallet.address(), None)
            .await
            .map_err(|err| BundlerError::Provider { inner: err.to_string() })?;

        Ok(if balance <= self.min_balance {
            info!("Signer balance {balance} below minimum, redirecting refund to itself");
            self.wallet.address()
        } else {
            self.beneficiary
        })
    }

    /// Builds the EIP-1559 `handleOps` transaction for the bundle
    async fn create_bundle_tx(
        &self,
        uos: &[UserOperation],
        beneficiary: Address,
    ) -> Result<TypedTransaction, BundlerError> {
        let client = self.entry_point.eth_client();

        let nonce = client
            .get_transaction_count(self.wallet.address(), None)
            .await
            .map_err(|err| BundlerError::Provider { inner: err.to_string() })?;

        let (max_fee_per_gas, max_priority_fee_per_gas) = client
            .estimate_eip1559_fees(None)
            .await
            .map_err(|err| BundlerError::Provider { inner: err.to_string() })?;

        let tx = self.entry_point.handle_ops_tx(
            uos.iter().map(|uo| uo.user_operation.clone().into()).collect(),
            beneficiary,
        );

        Ok(TypedTransaction::Eip1559(Eip1559TransactionRequest {
            to: tx.to().cloned(),
            from: Some(self.wallet.address()),
            data: tx.data().cloned(),
            chain_id: Some(U64::from(self.chain.id())),
            max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
            max_fee_per_gas: Some(max_fee_per_gas),
            gas: Some(BUNDLE_GAS_LIMIT.into()),
            nonce: Some(nonce),
            value: None,
            access_list: Default::default(),
        }))
    }

    /// Pre-flights and submits a bundle of user operations.
    ///
    /// The `eth_call` pre-flight surfaces a `FailedOp` naming the offending
    /// operation before any gas is spent; the caller reacts to it through
    /// [BundlerError::FailedOp].
    pub async fn send_next_bundle(
        &self,
        uos: &[UserOperation],
        storage_map: StorageMap,
    ) -> Result<H256, BundlerError> {
        if uos.is_empty() {
            info!("Skipping, no user operations to bundle");
            return Ok(H256::default());
        }

        let beneficiary = self.select_beneficiary().await?;

        self.entry_point
            .handle_ops(
                uos.iter().map(|uo| uo.user_operation.clone()).collect(),
                beneficiary,
            )
            .await?;

        let tx = self.create_bundle_tx(uos, beneficiary).await?;

        trace!("Sending bundle transaction: {tx:?}");

        self.client.send_bundle(tx, storage_map).await
    }
}
