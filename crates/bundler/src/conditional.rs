use crate::{bundler::SendBundleOp, errors::BundlerError};
use aurelius_primitives::{simulation::StorageMap, Wallet};
use ethers::{
    middleware::SignerMiddleware,
    providers::{Middleware, MiddlewareError},
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, H256, U64},
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::trace;

/// Per-account storage requirement attached to a conditional transaction
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AccountStorage {
    /// Expected root hash of the account's whole storage trie
    RootHash(H256),
    /// Expected values of individual slots
    SlotValues(HashMap<H256, H256>),
}

/// Options of `eth_sendRawTransactionConditional`: the node drops the
/// transaction instead of including it when any condition stopped holding
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalOptions {
    pub known_accounts: HashMap<Address, AccountStorage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number_min: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number_max: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_max: Option<u64>,
}

/// Submits bundles through `eth_sendRawTransactionConditional`, with the
/// bundle's storage map as the `knownAccounts` hint
#[derive(Clone)]
pub struct ConditionalClient<M>(pub SignerMiddleware<Arc<M>, LocalWallet>);

#[async_trait::async_trait]
impl<M> SendBundleOp for ConditionalClient<M>
where
    M: Middleware + 'static,
{
    async fn send_bundle(
        &self,
        bundle: TypedTransaction,
        storage_map: StorageMap,
    ) -> Result<H256, BundlerError> {
        trace!("Sending transaction to the conditional endpoint: {bundle:?}");

        let mut known_accounts: HashMap<Address, AccountStorage> = HashMap::default();

        for (k, v) in storage_map.root_hashes {
            known_accounts.insert(k, AccountStorage::RootHash(v));
        }

        for (k, v) in storage_map.slots {
            known_accounts.insert(k, AccountStorage::SlotValues(v));
        }

        let signature = self
            .0
            .signer()
            .sign_transaction(&bundle)
            .await
            .map_err(|err| BundlerError::Provider { inner: err.to_string() })?;
        let raw_tx = bundle.rlp_signed(&signature);

        let tx_hash: H256 = self
            .0
            .inner()
            .provider()
            .request(
                "eth_sendRawTransactionConditional",
                (raw_tx, ConditionalOptions { known_accounts, ..Default::default() }),
            )
            .await
            .map_err(|err| {
                if let Some(jsonrpc_err) = err.as_error_response() {
                    if jsonrpc_err.code == aurelius_contracts::METHOD_NOT_FOUND_CODE {
                        return BundlerError::MethodNotFound {
                            inner: jsonrpc_err.message.clone(),
                        };
                    }
                }
                BundlerError::Provider { inner: err.to_string() }
            })?;

        trace!("Conditional transaction sent: {tx_hash:?}");

        Ok(tx_hash)
    }
}

impl<M> ConditionalClient<M>
where
    M: Middleware + 'static,
{
    pub fn new(eth_client: Arc<M>, wallet: Wallet) -> Self {
        Self(SignerMiddleware::new(eth_client, wallet.signer))
    }
}
