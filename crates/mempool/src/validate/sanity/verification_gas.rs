use crate::{
    validate::{SanityCheck, SanityHelper},
    Mempool, Overhead, Reputation, SanityError,
};
use aurelius_primitives::UserOperation;
use ethers::{providers::Middleware, types::U256};

#[derive(Clone)]
pub struct VerificationGas {
    pub max_verification_gas: U256,
}

#[async_trait::async_trait]
impl<M: Middleware> SanityCheck<M> for VerificationGas {
    /// The verification gas limit must fit the bundler's budget and the
    /// pre-verification gas must cover the calldata overhead of the packed
    /// operation.
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        _mempool: &Mempool,
        _reputation: &Reputation,
        _helper: &SanityHelper<M>,
    ) -> Result<(), SanityError> {
        if uo.verification_gas_limit > self.max_verification_gas {
            return Err(SanityError::VerificationGasLimitTooHigh {
                verification_gas_limit: uo.verification_gas_limit,
                verification_gas_limit_expected: self.max_verification_gas,
            });
        }

        let pre_gas = Overhead::default().calculate_pre_verification_gas(uo);
        if uo.pre_verification_gas < pre_gas {
            return Err(SanityError::PreVerificationGasTooLow {
                pre_verification_gas: uo.pre_verification_gas,
                pre_verification_gas_expected: pre_gas,
            });
        }

        Ok(())
    }
}
