use crate::MempoolErrorKind;
use aurelius_primitives::{simulation::CodeHash, UserOperation, UserOperationHash};
use dyn_clone::DynClone;
use ethers::{
    abi::AbiEncode,
    types::{Address, H256, U256},
    utils::{keccak256, to_checksum},
};
use parking_lot::RwLock;
use std::sync::Arc;

pub type MempoolId = H256;

pub fn mempool_id(ep: &Address, chain_id: u64) -> MempoolId {
    H256::from_slice(
        keccak256([to_checksum(ep, None).encode(), U256::from(chain_id).encode()].concat())
            .as_slice(),
    )
}

/// Ability to add and remove user operations
pub trait AddRemoveUserOp {
    /// Adds a [UserOperation](UserOperation) to the store
    fn add(&mut self, uo: UserOperation) -> Result<UserOperationHash, MempoolErrorKind>;
    /// Removes a [UserOperation](UserOperation) by its hash; `Ok(false)` means
    /// it was not found
    fn remove_by_uo_hash(&mut self, uo_hash: &UserOperationHash) -> Result<bool, MempoolErrorKind>;
}

impl<T: AddRemoveUserOp> AddRemoveUserOp for Arc<RwLock<T>> {
    fn add(&mut self, uo: UserOperation) -> Result<UserOperationHash, MempoolErrorKind> {
        self.write().add(uo)
    }

    fn remove_by_uo_hash(&mut self, uo_hash: &UserOperationHash) -> Result<bool, MempoolErrorKind> {
        self.write().remove_by_uo_hash(uo_hash)
    }
}

/// Ability to maintain a set of user operation hashes associated with an
/// address
pub trait AddRemoveUserOpHash {
    fn add(
        &mut self,
        address: &Address,
        uo_hash: UserOperationHash,
    ) -> Result<(), MempoolErrorKind>;

    fn remove_uo_hash(
        &mut self,
        address: &Address,
        uo_hash: &UserOperationHash,
    ) -> Result<bool, MempoolErrorKind>;
}

impl<T: AddRemoveUserOpHash> AddRemoveUserOpHash for Arc<RwLock<T>> {
    fn add(
        &mut self,
        address: &Address,
        uo_hash: UserOperationHash,
    ) -> Result<(), MempoolErrorKind> {
        self.write().add(address, uo_hash)
    }

    fn remove_uo_hash(
        &mut self,
        address: &Address,
        uo_hash: &UserOperationHash,
    ) -> Result<bool, MempoolErrorKind> {
        self.write().remove_uo_hash(address, uo_hash)
    }
}

/// Read access to the stored user operations
pub trait UserOperationOp {
    /// Retrieves a user operation by its hash
    fn get_by_uo_hash(
        &self,
        uo_hash: &UserOperationHash,
    ) -> Result<Option<UserOperation>, MempoolErrorKind>;

    /// Retrieves all user operations sorted by `max_priority_fee_per_gas`
    /// (descending), ties broken by insertion order
    fn get_sorted(&self) -> Result<Vec<UserOperation>, MempoolErrorKind>;

    /// Retrieves all user operations
    fn get_all(&self) -> Result<Vec<UserOperation>, MempoolErrorKind>;

    /// Number of user operations in the store
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: UserOperationOp> UserOperationOp for Arc<RwLock<T>> {
    fn get_by_uo_hash(
        &self,
        uo_hash: &UserOperationHash,
    ) -> Result<Option<UserOperation>, MempoolErrorKind> {
        self.read().get_by_uo_hash(uo_hash)
    }

    fn get_sorted(&self) -> Result<Vec<UserOperation>, MempoolErrorKind> {
        self.read().get_sorted()
    }

    fn get_all(&self) -> Result<Vec<UserOperation>, MempoolErrorKind> {
        self.read().get_all()
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}

/// Read access to the per-address hash sets
pub trait UserOperationAddrOp {
    fn get_all_by_address(&self, addr: &Address) -> Vec<UserOperationHash>;

    fn get_number_by_address(&self, addr: &Address) -> usize {
        self.get_all_by_address(addr).len()
    }
}

impl<T: UserOperationAddrOp> UserOperationAddrOp for Arc<RwLock<T>> {
    fn get_all_by_address(&self, addr: &Address) -> Vec<UserOperationHash> {
        self.read().get_all_by_address(addr)
    }
}

/// Storage for code hashes captured during the traced validation of a user
/// operation
pub trait UserOperationCodeHashOp {
    fn has_code_hashes(&self, uo_hash: &UserOperationHash) -> Result<bool, MempoolErrorKind>;

    fn set_code_hashes(
        &mut self,
        uo_hash: &UserOperationHash,
        hashes: Vec<CodeHash>,
    ) -> Result<(), MempoolErrorKind>;

    fn get_code_hashes(
        &self,
        uo_hash: &UserOperationHash,
    ) -> Result<Vec<CodeHash>, MempoolErrorKind>;

    fn remove_code_hashes(&mut self, uo_hash: &UserOperationHash)
        -> Result<bool, MempoolErrorKind>;
}

impl<T: UserOperationCodeHashOp> UserOperationCodeHashOp for Arc<RwLock<T>> {
    fn has_code_hashes(&self, uo_hash: &UserOperationHash) -> Result<bool, MempoolErrorKind> {
        self.read().has_code_hashes(uo_hash)
    }

    fn set_code_hashes(
        &mut self,
        uo_hash: &UserOperationHash,
        hashes: Vec<CodeHash>,
    ) -> Result<(), MempoolErrorKind> {
        self.write().set_code_hashes(uo_hash, hashes)
    }

    fn get_code_hashes(
        &self,
        uo_hash: &UserOperationHash,
    ) -> Result<Vec<CodeHash>, MempoolErrorKind> {
        self.read().get_code_hashes(uo_hash)
    }

    fn remove_code_hashes(
        &mut self,
        uo_hash: &UserOperationHash,
    ) -> Result<bool, MempoolErrorKind> {
        self.write().remove_code_hashes(uo_hash)
    }
}

/// A trait for clearing operation
pub trait ClearOp {
    fn clear(&mut self);
}

impl<T: ClearOp> ClearOp for Arc<RwLock<T>> {
    fn clear(&mut self) {
        self.write().clear()
    }
}

pub trait UserOperationAct:
    AddRemoveUserOp + UserOperationOp + ClearOp + Send + Sync + DynClone
{
}

dyn_clone::clone_trait_object!(UserOperationAct);
impl<T> UserOperationAct for T where
    T: AddRemoveUserOp + UserOperationOp + ClearOp + Send + Sync + Clone
{
}

pub trait UserOperationAddrAct:
    AddRemoveUserOpHash + UserOperationAddrOp + ClearOp + Send + Sync + DynClone
{
}

dyn_clone::clone_trait_object!(UserOperationAddrAct);
impl<T> UserOperationAddrAct for T where
    T: AddRemoveUserOpHash + UserOperationAddrOp + ClearOp + Send + Sync + Clone
{
}

pub trait UserOperationCodeHashAct:
    UserOperationCodeHashOp + ClearOp + Send + Sync + DynClone
{
}

dyn_clone::clone_trait_object!(UserOperationCodeHashAct);
impl<T> UserOperationCodeHashAct for T where
    T: UserOperationCodeHashOp + ClearOp + Send + Sync + Clone
{
}

/// The user operation store with its secondary indexes: by sender, by entity
/// (factory/paymaster), and the captured code hashes per operation
#[derive(Clone)]
pub struct Mempool {
    user_operations: Box<dyn UserOperationAct>,
    user_operations_by_sender: Box<dyn UserOperationAddrAct>,
    user_operations_by_entity: Box<dyn UserOperationAddrAct>,
    user_operations_code_hashes: Box<dyn UserOperationCodeHashAct>,
}

impl Mempool {
    pub fn new(
        user_operations: Box<dyn UserOperationAct>,
        user_operations_by_sender: Box<dyn UserOperationAddrAct>,
        user_operations_by_entity: Box<dyn UserOperationAddrAct>,
        user_operations_code_hashes: Box<dyn UserOperationCodeHashAct>,
    ) -> Self {
        Self {
            user_operations,
            user_operations_by_sender,
            user_operations_by_entity,
            user_operations_code_hashes,
        }
    }

    pub fn add(&mut self, uo: UserOperation) -> Result<UserOperationHash, MempoolErrorKind> {
        let (sender, factory, paymaster) = uo.get_entities();
        let uo_hash = uo.hash;
        self.user_operations.add(uo)?;
        self.user_operations_by_sender.add(&sender, uo_hash)?;
        if let Some(factory) = factory {
            self.user_operations_by_entity.add(&factory, uo_hash)?;
        }
        if let Some(paymaster) = paymaster {
            self.user_operations_by_entity.add(&paymaster, uo_hash)?;
        }
        Ok(uo_hash)
    }

    pub fn get(
        &self,
        uo_hash: &UserOperationHash,
    ) -> Result<Option<UserOperation>, MempoolErrorKind> {
        self.user_operations.get_by_uo_hash(uo_hash)
    }

    pub fn get_all_by_sender(&self, addr: &Address) -> Vec<UserOperation> {
        self.user_operations_by_sender
            .get_all_by_address(addr)
            .iter()
            .flat_map(|uo_hash| self.user_operations.get_by_uo_hash(uo_hash))
            .flatten()
            .collect()
    }

    pub fn get_number_by_sender(&self, addr: &Address) -> usize {
        self.user_operations_by_sender.get_number_by_address(addr)
    }

    pub fn get_number_by_entity(&self, addr: &Address) -> usize {
        self.user_operations_by_entity.get_number_by_address(addr)
    }

    /// Incumbent user operation with the same sender and nonce, if any
    pub fn get_prev_by_sender(&self, uo: &UserOperation) -> Option<UserOperation> {
        self.user_operations_by_sender
            .get_all_by_address(&uo.sender)
            .iter()
            .flat_map(|uo_hash| self.get(uo_hash))
            .flatten()
            .filter(|uo_prev| uo_prev.nonce == uo.nonce)
            .max_by_key(|uo_prev| uo_prev.max_priority_fee_per_gas)
    }

    pub fn has_code_hashes(&self, uo_hash: &UserOperationHash) -> Result<bool, MempoolErrorKind> {
        self.user_operations_code_hashes.has_code_hashes(uo_hash)
    }

    pub fn set_code_hashes(
        &mut self,
        uo_hash: &UserOperationHash,
        hashes: Vec<CodeHash>,
    ) -> Result<(), MempoolErrorKind> {
        self.user_operations_code_hashes.set_code_hashes(uo_hash, hashes)
    }

    pub fn get_code_hashes(
        &self,
        uo_hash: &UserOperationHash,
    ) -> Result<Vec<CodeHash>, MempoolErrorKind> {
        self.user_operations_code_hashes.get_code_hashes(uo_hash)
    }

    pub fn remove(&mut self, uo_hash: &UserOperationHash) -> Result<bool, MempoolErrorKind> {
        let uo = if let Some(uo) = self.user_operations.get_by_uo_hash(uo_hash)? {
            uo
        } else {
            return Ok(false);
        };

        let (sender, factory, paymaster) = uo.get_entities();

        self.user_operations.remove_by_uo_hash(uo_hash)?;
        self.user_operations_by_sender.remove_uo_hash(&sender, uo_hash)?;

        if let Some(factory) = factory {
            self.user_operations_by_entity.remove_uo_hash(&factory, uo_hash)?;
        }

        if let Some(paymaster) = paymaster {
            self.user_operations_by_entity.remove_uo_hash(&paymaster, uo_hash)?;
        }

        self.user_operations_code_hashes.remove_code_hashes(uo_hash)?;

        Ok(true)
    }

    pub fn remove_by_entity(&mut self, entity: &Address) -> Result<(), MempoolErrorKind> {
        let uos = self.user_operations_by_entity.get_all_by_address(entity);

        for uo_hash in uos {
            self.remove(&uo_hash)?;
        }

        Ok(())
    }

    /// User operations in inclusion order: highest tip first, ties broken by
    /// insertion order
    pub fn get_sorted(&self) -> Result<Vec<UserOperation>, MempoolErrorKind> {
        self.user_operations.get_sorted()
    }

    pub fn get_all(&self) -> Result<Vec<UserOperation>, MempoolErrorKind> {
        self.user_operations.get_all()
    }

    pub fn len(&self) -> usize {
        self.user_operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.user_operations.is_empty()
    }

    pub fn clear(&mut self) {
        self.user_operations.clear();
        self.user_operations_by_sender.clear();
        self.user_operations_by_entity.clear();
        self.user_operations_code_hashes.clear();
    }
}
