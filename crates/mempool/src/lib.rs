//! The user operation mempool: admission validation, reputation tracking,
//! bundle assembly and on-chain event reconciliation.

pub mod error;
mod estimate;
pub mod memory;
mod mempool;
mod reputation;
mod uopool;
mod utils;
pub mod validate;

pub use error::{
    InvalidMempoolUserOperationError, MempoolError, MempoolErrorKind, ReputationError, SanityError,
    SimulationError,
};
pub use estimate::{estimate_user_op_gas, GasEstimate};
pub use memory::{mempool_in_memory, reputation_in_memory};
pub use mempool::{
    mempool_id, AddRemoveUserOp, AddRemoveUserOpHash, ClearOp, Mempool, MempoolId,
    UserOperationAct, UserOperationAddrAct, UserOperationAddrOp, UserOperationCodeHashAct,
    UserOperationCodeHashOp, UserOperationOp,
};
pub use reputation::{HashSetOp, Reputation, ReputationEntryOp};
pub use uopool::{UoPool, UoPoolHandle};
pub use utils::Overhead;
pub use validate::{
    validator::{new_canonical, new_canonical_unsafe, StandardValidator, UnsafeValidator},
    SanityCheck, SimulationCheck, SimulationTraceCheck, UserOperationValidationOutcome,
    UserOperationValidator, UserOperationValidatorMode,
};
