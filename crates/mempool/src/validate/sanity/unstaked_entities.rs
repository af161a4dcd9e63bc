use crate::{
    validate::{SanityCheck, SanityHelper},
    Mempool, Reputation, ReputationError, SanityError,
};
use aurelius_primitives::{
    constants::validation::{
        entities::{FACTORY, PAYMASTER, SENDER},
        reputation::{
            INCLUSION_RATE_FACTOR, SAME_SENDER_MEMPOOL_COUNT,
            SAME_UNSTAKED_ENTITY_MEMPOOL_COUNT,
        },
    },
    reputation::{ReputationEntry, StakeInfo},
    UserOperation,
};
use ethers::{
    providers::Middleware,
    types::{Address, U256},
};
use std::cmp;

#[derive(Clone)]
pub struct UnstakedEntities;

impl UnstakedEntities {
    /// Deposit info for an entity, from the entry point
    async fn get_stake<'a, M: Middleware>(
        &self,
        addr: &Address,
        helper: &SanityHelper<'a, M>,
    ) -> Result<StakeInfo, SanityError> {
        let info = helper.entry_point.get_deposit_info(addr).await?;

        Ok(StakeInfo {
            address: *addr,
            stake: U256::from(info.stake),
            unstake_delay: U256::from(info.unstake_delay_sec),
        })
    }

    /// [UREP-020] - pending-op allowance of an unstaked entity grows with its
    /// inclusion rate
    fn calculate_allowed_user_operations(entity: ReputationEntry) -> u64 {
        if entity.uo_seen == 0 {
            SAME_UNSTAKED_ENTITY_MEMPOOL_COUNT as u64
        } else {
            SAME_UNSTAKED_ENTITY_MEMPOOL_COUNT as u64 +
                ((entity.uo_included as f64 / entity.uo_seen as f64) *
                    INCLUSION_RATE_FACTOR as f64) as u64 +
                cmp::min(entity.uo_included, 10000)
        }
    }
}

#[async_trait::async_trait]
impl<M: Middleware> SanityCheck<M> for UnstakedEntities {
    /// Unstaked entities are held to per-entity mempool quotas; addresses may
    /// not play both the account role and an entity role across operations.
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        mempool: &Mempool,
        reputation: &Reputation,
        helper: &SanityHelper<M>,
    ) -> Result<(), SanityError> {
        let (sender, factory, paymaster) = uo.get_entities();

        // [STO-040] - an entity address used as "account" elsewhere in the
        // mempool may not appear here, and vice versa
        if mempool.get_number_by_entity(&sender) > 0 {
            return Err(SanityError::EntityRoles {
                entity: SENDER.into(),
                address: sender,
                entity_other: "different".into(),
            });
        }

        // [UREP-010] - unstaked sender allowed only limited entries
        let sender_stake = self.get_stake(&sender, helper).await?;
        if reputation
            .verify_stake(
                SENDER,
                Some(sender_stake),
                helper.val_config.min_stake,
                helper.val_config.min_unstake_delay,
            )
            .is_err() &&
            mempool.get_number_by_sender(&uo.sender) >= SAME_SENDER_MEMPOOL_COUNT
        {
            return Err(ReputationError::UnstakedEntity {
                entity: SENDER.into(),
                address: uo.sender,
                inner: format!("already has {SAME_SENDER_MEMPOOL_COUNT} operations pending"),
            }
            .into());
        }

        if let Some(factory) = factory {
            if mempool.get_number_by_sender(&factory) > 0 {
                return Err(SanityError::EntityRoles {
                    entity: FACTORY.into(),
                    address: factory,
                    entity_other: "sender".into(),
                });
            }

            let factory_stake = self.get_stake(&factory, helper).await?;
            if reputation
                .verify_stake(
                    FACTORY,
                    Some(factory_stake),
                    helper.val_config.min_stake,
                    helper.val_config.min_unstake_delay,
                )
                .is_err()
            {
                let entity = reputation.get(&factory)?;
                let uos_allowed = Self::calculate_allowed_user_operations(entity);
                if mempool.get_number_by_entity(&factory) as u64 >= uos_allowed {
                    return Err(ReputationError::UnstakedEntity {
                        entity: FACTORY.into(),
                        address: factory,
                        inner: format!("already has {uos_allowed} operations pending"),
                    }
                    .into());
                }
            }
        }

        if let Some(paymaster) = paymaster {
            if mempool.get_number_by_sender(&paymaster) > 0 {
                return Err(SanityError::EntityRoles {
                    entity: PAYMASTER.into(),
                    address: paymaster,
                    entity_other: "sender".into(),
                });
            }

            let paymaster_stake = self.get_stake(&paymaster, helper).await?;
            if reputation
                .verify_stake(
                    PAYMASTER,
                    Some(paymaster_stake),
                    helper.val_config.min_stake,
                    helper.val_config.min_unstake_delay,
                )
                .is_err()
            {
                let entity = reputation.get(&paymaster)?;
                let uos_allowed = Self::calculate_allowed_user_operations(entity);
                if mempool.get_number_by_entity(&paymaster) as u64 >= uos_allowed {
                    return Err(ReputationError::UnstakedEntity {
                        entity: PAYMASTER.into(),
                        address: paymaster,
                        inner: format!("already has {uos_allowed} operations pending"),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}
