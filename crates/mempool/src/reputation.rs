use crate::{mempool::ClearOp, ReputationError};
use aurelius_primitives::{
    get_address,
    reputation::{ReputationEntry, ReputationStatus, StakeInfo, Status},
};
use dyn_clone::DynClone;
use ethers::types::{Address, Bytes, U256};
use parking_lot::RwLock;
use std::{collections::HashSet, fmt::Debug, ops::Deref, sync::Arc};

/// Set membership operations for the allow- and denylist
pub trait HashSetOp: Default + Sync + Send {
    fn add_into_list(&mut self, addr: &Address) -> bool;
    fn remove_from_list(&mut self, addr: &Address) -> bool;
    fn is_in_list(&self, addr: &Address) -> bool;
}

impl HashSetOp for HashSet<Address> {
    fn add_into_list(&mut self, addr: &Address) -> bool {
        self.insert(*addr)
    }

    fn remove_from_list(&mut self, addr: &Address) -> bool {
        self.remove(addr)
    }

    fn is_in_list(&self, addr: &Address) -> bool {
        self.contains(addr)
    }
}

impl<T: HashSetOp> HashSetOp for Arc<RwLock<T>> {
    fn add_into_list(&mut self, addr: &Address) -> bool {
        self.write().add_into_list(addr)
    }

    fn remove_from_list(&mut self, addr: &Address) -> bool {
        self.write().remove_from_list(addr)
    }

    fn is_in_list(&self, addr: &Address) -> bool {
        self.read().is_in_list(addr)
    }
}

/// Storage operations for reputation entries
pub trait ReputationEntryOp: ClearOp + Sync + Send + Debug + DynClone {
    fn get_entry(&self, addr: &Address) -> Result<Option<ReputationEntry>, ReputationError>;

    fn set_entry(
        &mut self,
        entry: ReputationEntry,
    ) -> Result<Option<ReputationEntry>, ReputationError>;

    fn contains_entry(&self, addr: &Address) -> Result<bool, ReputationError>;

    /// Applies the hourly decay: both counters shrink by 1/24 (truncated), so
    /// misbehaving entities converge back to OK over roughly a day
    fn update(&mut self) -> Result<(), ReputationError> {
        let all = self.get_all();
        for mut ent in all {
            ent.uo_seen = ent.uo_seen * 23 / 24;
            ent.uo_included = ent.uo_included * 23 / 24;
            self.set_entry(ent)?;
        }
        Ok(())
    }

    fn get_all(&self) -> Vec<ReputationEntry>;
}
dyn_clone::clone_trait_object!(ReputationEntryOp);

impl<T: ReputationEntryOp> ReputationEntryOp for Arc<RwLock<T>> {
    fn get_entry(&self, addr: &Address) -> Result<Option<ReputationEntry>, ReputationError> {
        self.read().get_entry(addr)
    }

    fn set_entry(
        &mut self,
        entry: ReputationEntry,
    ) -> Result<Option<ReputationEntry>, ReputationError> {
        self.write().set_entry(entry)
    }

    fn contains_entry(&self, addr: &Address) -> Result<bool, ReputationError> {
        self.read().contains_entry(addr)
    }

    fn update(&mut self) -> Result<(), ReputationError> {
        self.write().update()
    }

    fn get_all(&self) -> Vec<ReputationEntry> {
        self.read().get_all()
    }
}

/// Tracks how often entities appear in the mempool versus how often their
/// operations actually land on chain, and derives an OK/THROTTLED/BANNED
/// status from the difference
#[derive(Debug)]
pub struct Reputation {
    /// Offset credited per inclusion before an entity counts as lagging
    throttling_slack: u64,
    /// Lag above which an entity is banned
    ban_slack: u64,
    /// Minimum stake amount
    min_stake: U256,
    /// Minimum time required to unstake (seconds)
    min_unstake_delay: U256,
    /// Whitelisted addresses (always OK)
    whitelist: Arc<RwLock<HashSet<Address>>>,
    /// Blacklisted addresses (always BANNED)
    blacklist: Arc<RwLock<HashSet<Address>>>,
    /// Entities' reputation registry
    entities: Box<dyn ReputationEntryOp>,
}

impl Clone for Reputation {
    fn clone(&self) -> Self {
        Self {
            throttling_slack: self.throttling_slack,
            ban_slack: self.ban_slack,
            min_stake: self.min_stake,
            min_unstake_delay: self.min_unstake_delay,
            whitelist: self.whitelist.clone(),
            blacklist: self.blacklist.clone(),
            entities: self.entities.clone(),
        }
    }
}

impl Reputation {
    pub fn new(
        throttling_slack: u64,
        ban_slack: u64,
        min_stake: U256,
        min_unstake_delay: U256,
        whitelist: Arc<RwLock<HashSet<Address>>>,
        blacklist: Arc<RwLock<HashSet<Address>>>,
        entities: Box<dyn ReputationEntryOp>,
    ) -> Self {
        Self {
            throttling_slack,
            ban_slack,
            min_stake,
            min_unstake_delay,
            whitelist,
            blacklist,
            entities,
        }
    }

    /// Sets the default reputation entry for an address if none exists yet
    fn set_default(&mut self, addr: &Address) -> Result<(), ReputationError> {
        if !self.entities.contains_entry(addr)? {
            self.entities.set_entry(ReputationEntry::default_with_addr(*addr))?;
        }

        Ok(())
    }

    /// Entity's [ReputationEntry](ReputationEntry) with the derived status
    pub fn get(&self, addr: &Address) -> Result<ReputationEntry, ReputationError> {
        if let Some(ent) = self.entities.get_entry(addr)? {
            Ok(ReputationEntry { status: self.get_status(addr)?, ..ent })
        } else {
            Ok(ReputationEntry::default_with_addr(*addr))
        }
    }

    /// Increments the number of times an entity's address has been seen in a
    /// user operation; entries are created lazily
    pub fn increment_seen(&mut self, addr: &Address) -> Result<(), ReputationError> {
        self.set_default(addr)?;
        if let Some(mut ent) = self.entities.get_entry(addr)? {
            ent.uo_seen += 1;
            self.entities.set_entry(ent)?;
        }
        Ok(())
    }

    /// Increments the number of times an entity's user operations made it
    /// into a block
    pub fn increment_included(&mut self, addr: &Address) -> Result<(), ReputationError> {
        self.set_default(addr)?;
        if let Some(mut ent) = self.entities.get_entry(addr)? {
            ent.uo_included += 1;
            self.entities.set_entry(ent)?;
        }
        Ok(())
    }

    /// Hourly decay of all counters
    pub fn update_hourly(&mut self) -> Result<(), ReputationError> {
        self.entities.update()
    }

    pub fn add_whitelist(&mut self, addr: &Address) -> bool {
        self.whitelist.add_into_list(addr)
    }

    pub fn remove_whitelist(&mut self, addr: &Address) -> bool {
        self.whitelist.remove_from_list(addr)
    }

    pub fn is_whitelist(&self, addr: &Address) -> bool {
        self.whitelist.is_in_list(addr)
    }

    pub fn add_blacklist(&mut self, addr: &Address) -> bool {
        self.blacklist.add_into_list(addr)
    }

    pub fn remove_blacklist(&mut self, addr: &Address) -> bool {
        self.blacklist.remove_from_list(addr)
    }

    pub fn is_blacklist(&self, addr: &Address) -> bool {
        self.blacklist.is_in_list(addr)
    }

    pub fn min_stake(&self) -> U256 {
        self.min_stake
    }

    pub fn min_unstake_delay(&self) -> U256 {
        self.min_unstake_delay
    }

    /// Derives the entity's reputation status.
    ///
    /// Every inclusion earns the entity `throttling_slack` sightings worth of
    /// credit; an entity whose uncredited sightings exceed `ban_slack` is
    /// banned, one that merely exceeds `throttling_slack` is throttled.
    pub fn get_status(&self, addr: &Address) -> Result<ReputationStatus, ReputationError> {
        if self.whitelist.is_in_list(addr) {
            return Ok(Status::OK.into());
        }

        if self.blacklist.is_in_list(addr) {
            return Ok(Status::BANNED.into());
        }

        Ok(match self.entities.get_entry(addr)? {
            Some(ent) => {
                let credit = ent.uo_included.saturating_mul(self.throttling_slack);
                let lag = ent.uo_seen.saturating_sub(credit);
                if lag > self.ban_slack {
                    Status::BANNED.into()
                } else if lag > self.throttling_slack {
                    Status::THROTTLED.into()
                } else {
                    Status::OK.into()
                }
            }
            _ => Status::OK.into(),
        })
    }

    /// Records an on-chain `handleOps` revert attributed to this entity.
    ///
    /// The counters are forced to a state that stays BANNED for at least one
    /// decay cycle, since off-chain validation failed to catch it.
    pub fn update_handle_ops_reverted(&mut self, addr: &Address) -> Result<(), ReputationError> {
        self.set_default(addr)?;
        if let Some(mut ent) = self.entities.get_entry(addr)? {
            ent.uo_seen = 100;
            ent.uo_included = 0;
            self.entities.set_entry(ent)?;
        }

        Ok(())
    }

    /// Verifies the stake information of an entity against the configured
    /// minimums (overridable per call)
    pub fn verify_stake(
        &self,
        entity: &str,
        info: Option<StakeInfo>,
        min_stake: Option<U256>,
        min_unstake_delay: Option<U256>,
    ) -> Result<(), ReputationError> {
        if let Some(info) = info {
            if self.whitelist.is_in_list(&info.address) {
                return Ok(());
            }

            let min_stake = min_stake.unwrap_or(self.min_stake);
            let min_unstake_delay = min_unstake_delay.unwrap_or(self.min_unstake_delay);

            if info.stake < min_stake {
                return Err(ReputationError::StakeTooLow {
                    entity: entity.into(),
                    address: info.address,
                    stake: info.stake,
                    min_stake,
                });
            }

            if info.unstake_delay < min_unstake_delay {
                return Err(ReputationError::UnstakeDelayTooLow {
                    entity: entity.into(),
                    address: info.address,
                    unstake_delay: info.unstake_delay,
                    min_unstake_delay,
                });
            }
        }

        Ok(())
    }

    /// Sets the [ReputationEntries](ReputationEntry) (debug RPC)
    pub fn set_entities(&mut self, entries: Vec<ReputationEntry>) -> Result<(), ReputationError> {
        for en in entries {
            self.entities.set_entry(en)?;
        }

        Ok(())
    }

    /// All [ReputationEntries](ReputationEntry) with derived statuses
    pub fn get_all(&self) -> Result<Vec<ReputationEntry>, ReputationError> {
        Ok(self
            .entities
            .get_all()
            .into_iter()
            .flat_map(|entry| {
                let status = self.get_status(&entry.address)?;
                Ok::<ReputationEntry, ReputationError>(ReputationEntry { status, ..entry })
            })
            .collect())
    }

    /// Reputation status for the address packed into the first 20 bytes of
    /// `paymaster_and_data` or `init_code`; OK when the bytes hold no address
    pub fn get_status_from_bytes(
        &self,
        bytes: &Bytes,
    ) -> Result<ReputationStatus, ReputationError> {
        if let Some(addr) = get_address(bytes.deref()) {
            self.get_status(&addr)
        } else {
            Ok(Status::OK.into())
        }
    }

    /// Clears all [ReputationEntries](ReputationEntry)
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
