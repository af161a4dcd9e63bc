use crate::debug_api::{DebugApiServer, ResponseSuccess};
use async_trait::async_trait;
use aurelius_bundler::{BundlerService, SendBundleOp};
use aurelius_mempool::UserOperationValidator;
use aurelius_primitives::{reputation::ReputationEntry, BundleMode, UserOperationRequest};
use ethers::{
    providers::Middleware,
    types::{Address, H256},
};
use jsonrpsee::{
    core::RpcResult,
    types::{error::INTERNAL_ERROR_CODE, ErrorObject},
};

/// The `debug` namespace endpoints, served over the bundler service (which
/// also carries the pool handle)
pub struct DebugApiServerImpl<M, V, S>
where
    M: Middleware + 'static,
    V: UserOperationValidator + 'static,
    S: SendBundleOp + Clone,
{
    pub bundler_service: BundlerService<M, V, S>,
    /// Interval used when switching back to auto bundling
    pub bundle_interval: u64,
}

#[async_trait]
impl<M, V, S> DebugApiServer for DebugApiServerImpl<M, V, S>
where
    M: Middleware + 'static,
    V: UserOperationValidator + 'static,
    S: SendBundleOp + Clone,
{
    async fn clear_state(&self) -> RpcResult<ResponseSuccess> {
        let mut uopool = self.bundler_service.uopool.lock().await;
        uopool.clear();
        Ok(ResponseSuccess::Ok)
    }

    async fn dump_mempool(&self, _entry_point: Address) -> RpcResult<Vec<UserOperationRequest>> {
        let uopool = self.bundler_service.uopool.lock().await;
        let mut uos = uopool.get_all().unwrap_or_default();
        uos.sort_by_key(|uo| uo.nonce);
        Ok(uos.into_iter().map(|uo| uo.user_operation.into()).collect())
    }

    async fn set_reputation(
        &self,
        entries: Vec<ReputationEntry>,
        _entry_point: Address,
    ) -> RpcResult<ResponseSuccess> {
        let mut uopool = self.bundler_service.uopool.lock().await;
        uopool
            .set_reputation(entries)
            .map_err(|err| ErrorObject::owned(INTERNAL_ERROR_CODE, err.to_string(), None::<bool>))?;
        Ok(ResponseSuccess::Ok)
    }

    async fn dump_reputation(&self, _entry_point: Address) -> RpcResult<Vec<ReputationEntry>> {
        let uopool = self.bundler_service.uopool.lock().await;
        Ok(uopool.get_reputation())
    }

    async fn set_bundling_mode(&self, mode: BundleMode) -> RpcResult<ResponseSuccess> {
        match mode {
            BundleMode::Manual => self.bundler_service.stop_bundling(),
            BundleMode::Auto => self.bundler_service.start_bundling(self.bundle_interval),
        }
        Ok(ResponseSuccess::Ok)
    }

    async fn send_bundle_now(&self) -> RpcResult<H256> {
        let res = self
            .bundler_service
            .send_next_bundle()
            .await
            .map_err(|err| ErrorObject::owned(INTERNAL_ERROR_CODE, err.to_string(), None::<bool>))?;
        Ok(res.unwrap_or_default())
    }
}
