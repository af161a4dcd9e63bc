use crate::{
    validate::{SanityCheck, SanityHelper},
    Mempool, Reputation, SanityError,
};
use aurelius_primitives::UserOperation;
use ethers::{
    providers::Middleware,
    types::{BlockNumber, U256},
};

#[derive(Clone)]
pub struct MaxFee {
    pub min_priority_fee_per_gas: U256,
}

#[async_trait::async_trait]
impl<M: Middleware> SanityCheck<M> for MaxFee {
    /// Fee fields are internally consistent and the max fee covers the
    /// current base fee.
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        _mempool: &Mempool,
        _reputation: &Reputation,
        helper: &SanityHelper<M>,
    ) -> Result<(), SanityError> {
        if uo.max_priority_fee_per_gas > uo.max_fee_per_gas {
            return Err(SanityError::MaxPriorityFeePerGasTooHigh {
                max_priority_fee_per_gas: uo.max_priority_fee_per_gas,
                max_fee_per_gas: uo.max_fee_per_gas,
            });
        }

        let block = helper
            .entry_point
            .eth_client()
            .get_block(BlockNumber::Latest)
            .await
            .map_err(|err| SanityError::Provider { inner: err.to_string() })?
            .ok_or(SanityError::Other { inner: "no block found".into() })?;
        let base_fee_per_gas =
            block.base_fee_per_gas.ok_or(SanityError::Other { inner: "no base fee".into() })?;

        if base_fee_per_gas > uo.max_fee_per_gas {
            return Err(SanityError::MaxFeePerGasTooLow {
                max_fee_per_gas: uo.max_fee_per_gas,
                base_fee_per_gas,
            });
        }

        if uo.max_priority_fee_per_gas < self.min_priority_fee_per_gas {
            return Err(SanityError::MaxPriorityFeePerGasTooLow {
                max_priority_fee_per_gas: uo.max_priority_fee_per_gas,
                max_priority_fee_per_gas_expected: self.min_priority_fee_per_gas,
            });
        }

        Ok(())
    }
}
