use crate::{
    validate::{SanityCheck, SanityHelper},
    Mempool, Reputation, SanityError,
};
use aurelius_primitives::{get_address, UserOperation};
use ethers::providers::Middleware;

#[derive(Clone)]
pub struct Paymaster;

#[async_trait::async_trait]
impl<M: Middleware> SanityCheck<M> for Paymaster {
    /// A sponsoring paymaster must be a deployed contract with enough deposit
    /// in the entry point to cover the operation's maximum cost.
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        _mempool: &Mempool,
        _reputation: &Reputation,
        helper: &SanityHelper<M>,
    ) -> Result<(), SanityError> {
        let paymaster = match get_address(&uo.paymaster_and_data) {
            Some(paymaster) => paymaster,
            None => return Ok(()),
        };

        let code = helper
            .entry_point
            .eth_client()
            .get_code(paymaster, None)
            .await
            .map_err(|e| SanityError::Provider { inner: e.to_string() })?;

        if code.is_empty() {
            return Err(SanityError::Paymaster {
                inner: format!("paymaster {paymaster:?} is not deployed"),
            });
        }

        let max_cost = uo
            .max_fee_per_gas
            .saturating_mul(
                uo.pre_verification_gas
                    .saturating_add(uo.verification_gas_limit)
                    .saturating_add(uo.call_gas_limit),
            );
        let deposit = helper.entry_point.balance_of(&paymaster).await?;

        if deposit < max_cost {
            return Err(SanityError::Paymaster {
                inner: format!(
                    "paymaster {paymaster:?} deposit {deposit} is below the max cost {max_cost}"
                ),
            });
        }

        Ok(())
    }
}
