use crate::{
    validate::{SanityCheck, SanityHelper},
    Mempool, Reputation, SanityError,
};
use aurelius_primitives::UserOperation;
use ethers::{providers::Middleware, types::U256};

#[derive(Clone)]
pub struct CallGas;

#[async_trait::async_trait]
impl<M: Middleware> SanityCheck<M> for CallGas {
    /// Call gas limit covers at least the cost of a CALL with non-zero value.
    // https://github.com/wolflo/evm-opcodes/blob/main/gas.md#aa-1-call
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        _mempool: &Mempool,
        _reputation: &Reputation,
        _helper: &SanityHelper<M>,
    ) -> Result<(), SanityError> {
        let call_gas_limit = U256::from(9100);

        if uo.call_gas_limit >= call_gas_limit {
            return Ok(());
        }

        Err(SanityError::CallGasLimitTooLow {
            call_gas_limit: uo.call_gas_limit,
            call_gas_limit_expected: call_gas_limit,
        })
    }
}
