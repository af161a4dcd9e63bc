use crate::{
    utils::calculate_valid_gas,
    validate::{SanityCheck, SanityHelper},
    Mempool, Reputation, SanityError,
};
use aurelius_primitives::{constants::mempool::GAS_INCREASE_PERC, UserOperation};
use ethers::providers::Middleware;

#[derive(Clone)]
pub struct Sender;

#[async_trait::async_trait]
impl<M: Middleware> SanityCheck<M> for Sender {
    /// Either the sender is a deployed contract, or there is an init code to
    /// deploy it, never both; a resubmission for the same sender and nonce
    /// must raise the priority fee by at least the replacement percentage.
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        mempool: &Mempool,
        _reputation: &Reputation,
        helper: &SanityHelper<M>,
    ) -> Result<(), SanityError> {
        let code = helper
            .entry_point
            .eth_client()
            .get_code(uo.sender, None)
            .await
            .map_err(|e| SanityError::Provider { inner: e.to_string() })?;

        if (code.is_empty() && uo.init_code.is_empty()) ||
            (!code.is_empty() && !uo.init_code.is_empty())
        {
            return Err(SanityError::Sender {
                inner: format!(
                    "sender {:?} {}",
                    uo.sender,
                    if code.is_empty() {
                        "is not deployed and initCode is empty"
                    } else {
                        "is already deployed but initCode is not empty"
                    }
                ),
            });
        }

        if let Some(uo_prev) = mempool.get_prev_by_sender(uo) {
            if uo.max_priority_fee_per_gas <
                calculate_valid_gas(uo_prev.max_priority_fee_per_gas, GAS_INCREASE_PERC.into())
            {
                return Err(SanityError::Sender {
                    inner: "couldn't replace user operation (priority fee increase too low)"
                        .into(),
                });
            }
        }

        Ok(())
    }
}
