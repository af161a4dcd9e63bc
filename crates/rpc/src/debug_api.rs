use ethers::types::{Address, H256};
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use aurelius_primitives::{reputation::ReputationEntry, BundleMode, UserOperationRequest};
use serde::{Deserialize, Serialize};

/// Response for successful debug calls
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSuccess {
    Ok,
}

/// The `debug` namespace RPC methods trait (introspection and test hooks)
#[rpc(server, namespace = "debug")]
pub trait DebugApi {
    /// Clears the mempool and the reputation registry.
    #[method(name = "bundler_clearState")]
    async fn clear_state(&self) -> RpcResult<ResponseSuccess>;

    /// All user operations currently in the mempool.
    #[method(name = "bundler_dumpMempool")]
    async fn dump_mempool(&self, entry_point: Address) -> RpcResult<Vec<UserOperationRequest>>;

    /// Overwrites reputation entries.
    #[method(name = "bundler_setReputation")]
    async fn set_reputation(
        &self,
        entries: Vec<ReputationEntry>,
        entry_point: Address,
    ) -> RpcResult<ResponseSuccess>;

    /// All reputation entries with their derived statuses.
    #[method(name = "bundler_dumpReputation")]
    async fn dump_reputation(&self, entry_point: Address) -> RpcResult<Vec<ReputationEntry>>;

    /// Switches between interval-driven and on-demand bundling.
    #[method(name = "bundler_setBundlingMode")]
    async fn set_bundling_mode(&self, mode: BundleMode) -> RpcResult<ResponseSuccess>;

    /// Runs one bundling cycle immediately.
    #[method(name = "bundler_sendBundleNow")]
    async fn send_bundle_now(&self) -> RpcResult<H256>;
}
