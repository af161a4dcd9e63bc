use crate::{error::JsonRpcError, eth_api::EthApiServer};
use alloy_chains::Chain;
use async_trait::async_trait;
use aurelius_mempool::{UoPoolHandle, UserOperationValidator};
use aurelius_primitives::{
    UserOperation, UserOperationByHash, UserOperationGasEstimation, UserOperationHash,
    UserOperationReceipt, UserOperationRequest, UserOperationSigned,
};
use ethers::{
    providers::Middleware,
    types::{Address, U64},
    utils::to_checksum,
};
use jsonrpsee::{
    core::RpcResult,
    types::{error::INVALID_PARAMS_CODE, ErrorObject, ErrorObjectOwned},
};
use std::str::FromStr;
use tokio::sync::mpsc;

/// The `eth` namespace endpoints, served over the shared pool handle
pub struct EthApiServerImpl<M, V>
where
    M: Middleware + 'static,
    V: UserOperationValidator + 'static,
{
    pub uopool: UoPoolHandle<M, V>,
    pub entry_point: Address,
    pub chain: Chain,
    /// Mempool size at which a bundle is scheduled right away; 0 schedules on
    /// every admission
    pub auto_bundle_size: usize,
    /// Wakes the bundling service
    pub bundle_trigger: mpsc::UnboundedSender<()>,
}

fn invalid_hash_err() -> ErrorObjectOwned {
    ErrorObject::owned(INVALID_PARAMS_CODE, "Missing/invalid userOpHash".to_string(), None::<bool>)
}

#[async_trait]
impl<M, V> EthApiServer for EthApiServerImpl<M, V>
where
    M: Middleware + 'static,
    V: UserOperationValidator + 'static,
{
    async fn chain_id(&self) -> RpcResult<U64> {
        Ok(U64::from(self.chain.id()))
    }

    async fn supported_entry_points(&self) -> RpcResult<Vec<String>> {
        Ok(vec![to_checksum(&self.entry_point, None)])
    }

    async fn send_user_operation(
        &self,
        user_operation: UserOperationRequest,
        entry_point: Address,
    ) -> RpcResult<UserOperationHash> {
        if entry_point != self.entry_point {
            return Err(ErrorObject::owned(
                INVALID_PARAMS_CODE,
                format!("entry point {entry_point:?} is not supported"),
                None::<bool>,
            ));
        }

        let uo: UserOperationSigned = user_operation.into();
        let uo_hash = uo.hash(&self.entry_point, self.chain.id());
        let uo = UserOperation::from_user_operation_signed(uo_hash, uo);

        let mempool_len = {
            let mut uopool = self.uopool.lock().await;
            let res = uopool.validate_user_operation(&uo).await;
            uopool.add_user_operation(uo, res).await.map_err(JsonRpcError::from)?;
            uopool.mempool.len()
        };

        if self.auto_bundle_size == 0 || mempool_len >= self.auto_bundle_size {
            let _ = self.bundle_trigger.send(());
        }

        Ok(uo_hash)
    }

    async fn estimate_user_operation_gas(
        &self,
        user_operation: UserOperationRequest,
        entry_point: Address,
    ) -> RpcResult<UserOperationGasEstimation> {
        if entry_point != self.entry_point {
            return Err(ErrorObject::owned(
                INVALID_PARAMS_CODE,
                format!("entry point {entry_point:?} is not supported"),
                None::<bool>,
            ));
        }

        let uo: UserOperationSigned = user_operation.into();
        let uo_hash = uo.hash(&self.entry_point, self.chain.id());
        let uo = UserOperation::from_user_operation_signed(uo_hash, uo);

        let uopool = self.uopool.lock().await;
        uopool
            .estimate_user_operation_gas(&uo)
            .await
            .map_err(|err| JsonRpcError::from(err).0)
    }

    async fn get_user_operation_receipt(
        &self,
        user_operation_hash: String,
    ) -> RpcResult<Option<UserOperationReceipt>> {
        let uo_hash = UserOperationHash::from_str(&user_operation_hash)
            .map_err(|_| invalid_hash_err())?;

        let uopool = self.uopool.lock().await;
        Ok(uopool.get_user_operation_receipt(&uo_hash).await.ok())
    }

    async fn get_user_operation_by_hash(
        &self,
        user_operation_hash: String,
    ) -> RpcResult<Option<UserOperationByHash>> {
        let uo_hash = UserOperationHash::from_str(&user_operation_hash)
            .map_err(|_| invalid_hash_err())?;

        let uopool = self.uopool.lock().await;
        Ok(uopool.get_user_operation_by_hash(&uo_hash).await.ok())
    }
}
