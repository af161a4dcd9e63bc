use crate::{bundler::SendBundleOp, errors::BundlerError};
use aurelius_primitives::{simulation::StorageMap, Wallet};
use ethers::{
    middleware::SignerMiddleware,
    providers::Middleware,
    signers::LocalWallet,
    types::{transaction::eip2718::TypedTransaction, H256},
};
use std::{sync::Arc, time::Duration};
use tracing::trace;

/// Submits bundles through the regular `eth_sendRawTransaction` path
#[derive(Clone)]
pub struct EthereumClient<M>(pub SignerMiddleware<Arc<M>, LocalWallet>);

#[async_trait::async_trait]
impl<M> SendBundleOp for EthereumClient<M>
where
    M: Middleware + 'static,
{
    async fn send_bundle(
        &self,
        bundle: TypedTransaction,
        _storage_map: StorageMap,
    ) -> Result<H256, BundlerError> {
        trace!("Sending transaction to the execution client: {bundle:?}");

        let tx = self
            .0
            .send_transaction(bundle, None)
            .await
            .map_err(|err| BundlerError::Provider { inner: err.to_string() })?
            .interval(Duration::from_millis(75));
        let tx_hash = tx.tx_hash();

        let tx_receipt =
            tx.await.map_err(|err| BundlerError::Provider { inner: err.to_string() })?;

        trace!("Transaction receipt: {tx_receipt:?}");

        Ok(tx_hash)
    }
}

impl<M> EthereumClient<M>
where
    M: Middleware + 'static,
{
    pub fn new(eth_client: Arc<M>, wallet: Wallet) -> Self {
        Self(SignerMiddleware::new(eth_client, wallet.signer))
    }
}
