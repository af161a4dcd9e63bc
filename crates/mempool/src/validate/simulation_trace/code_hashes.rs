use crate::{
    utils::equal_code_hashes,
    validate::{SimulationTraceCheck, SimulationTraceHelper},
    Mempool, Reputation, SimulationError,
};
use aurelius_primitives::{simulation::CodeHash, UserOperation};
use ethers::{
    providers::Middleware,
    types::{Address, H256},
    utils::keccak256,
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

#[derive(Clone)]
pub struct CodeHashes;

impl CodeHashes {
    /// Current code hashes for the given addresses, fetched concurrently
    async fn get_code_hashes<M: Middleware + 'static>(
        &self,
        addrs: Vec<Address>,
        hashes: &mut Vec<CodeHash>,
        eth_client: &Arc<M>,
    ) -> Result<(), SimulationError> {
        let mut ts: JoinSet<Option<(Address, H256)>> = JoinSet::new();

        for addr in addrs {
            let eth_client = eth_client.clone();

            ts.spawn(async move {
                match eth_client.get_code(addr, None).await {
                    Ok(code) => Some((addr, keccak256(&code).into())),
                    Err(_) => None,
                }
            });
        }

        while let Some(res) = ts.join_next().await {
            match res {
                Ok(Some(h)) => hashes.push(CodeHash { address: h.0, hash: h.1 }),
                Ok(None) | Err(_) => {
                    return Err(SimulationError::Other {
                        inner: "failed to retrieve code hashes".into(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl<M: Middleware> SimulationTraceCheck<M> for CodeHashes {
    /// [COD-010] - between the first and the second validations, the code of
    /// any visited address may not change
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        mempool: &Mempool,
        _reputation: &Reputation,
        helper: &mut SimulationTraceHelper<M>,
    ) -> Result<(), SimulationError> {
        let addrs = helper
            .js_trace
            .calls_from_entry_point
            .iter()
            .flat_map(|l| l.contract_size.keys().copied().collect::<Vec<Address>>())
            .collect::<Vec<Address>>();

        let hashes: &mut Vec<CodeHash> = &mut vec![];
        self.get_code_hashes(addrs, hashes, &helper.entry_point.eth_client()).await?;

        let uo_hash = &uo.hash;

        match mempool.has_code_hashes(uo_hash) {
            Ok(true) => {
                // second validation
                let hashes_prev = mempool
                    .get_code_hashes(uo_hash)
                    .map_err(|err| SimulationError::Other { inner: err.to_string() })?;
                debug!(
                    "Verifying {uo_hash:?} code hashes in 2nd validation: {hashes:?} vs {hashes_prev:?}"
                );
                if !equal_code_hashes(hashes, &hashes_prev) {
                    return Err(SimulationError::CodeHashes);
                } else {
                    helper.code_hashes = Some(hashes.to_vec());
                }
            }
            Ok(false) => {
                // first validation
                debug!("Setting code hashes for {uo_hash:?} in 1st validation: {hashes:?}");
                helper.code_hashes = Some(hashes.to_vec());
            }
            Err(err) => return Err(SimulationError::Other { inner: err.to_string() }),
        }

        Ok(())
    }
}
