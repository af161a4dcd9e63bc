use crate::{
    validate::{SanityCheck, SanityHelper},
    Mempool, Reputation, ReputationError, SanityError,
};
use aurelius_primitives::{
    constants::validation::{
        entities::{FACTORY, PAYMASTER, SENDER},
        reputation::THROTTLED_ENTITY_MEMPOOL_COUNT,
    },
    reputation::Status,
    UserOperation,
};
use ethers::{providers::Middleware, types::Address};

#[derive(Clone)]
pub struct Entities;

impl Entities {
    /// [SREP-020] - a BANNED address is not allowed into the mempool
    fn check_banned(
        &self,
        entity: &str,
        addr: &Address,
        status: &Status,
    ) -> Result<(), SanityError> {
        if *status == Status::BANNED {
            return Err(
                ReputationError::BannedEntity { entity: entity.into(), address: *addr }.into()
            );
        }

        Ok(())
    }

    /// [SREP-030] - a THROTTLED address is limited in how many entries it may
    /// have pending
    fn check_throttled(
        &self,
        entity: &str,
        addr: &Address,
        status: &Status,
        mempool: &Mempool,
    ) -> Result<(), SanityError> {
        if *status == Status::THROTTLED &&
            (mempool.get_number_by_sender(addr) + mempool.get_number_by_entity(addr)) >=
                THROTTLED_ENTITY_MEMPOOL_COUNT
        {
            return Err(
                ReputationError::ThrottledEntity { entity: entity.into(), address: *addr }.into()
            );
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl<M: Middleware> SanityCheck<M> for Entities {
    /// No entity of the user operation may be banned; throttled entities are
    /// rate-limited.
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        mempool: &Mempool,
        reputation: &Reputation,
        _helper: &SanityHelper<M>,
    ) -> Result<(), SanityError> {
        let (sender, factory, paymaster) = uo.get_entities();

        let status = Status::from(reputation.get_status(&sender)?);
        self.check_banned(SENDER, &sender, &status)?;
        self.check_throttled(SENDER, &sender, &status, mempool)?;

        if let Some(factory) = factory {
            let status = Status::from(reputation.get_status(&factory)?);
            self.check_banned(FACTORY, &factory, &status)?;
            self.check_throttled(FACTORY, &factory, &status, mempool)?;
        }

        if let Some(paymaster) = paymaster {
            let status = Status::from(reputation.get_status(&paymaster)?);
            self.check_banned(PAYMASTER, &paymaster, &status)?;
            self.check_throttled(PAYMASTER, &paymaster, &status, mempool)?;
        }

        Ok(())
    }
}
