//! Primitive types for the ERC-4337 account abstraction bundler

pub mod bundler;
pub mod constants;
pub mod reputation;
pub mod simulation;
mod user_operation;
pub mod utils;
mod wallet;

pub use bundler::BundleMode;
pub use user_operation::{
    UserOperation, UserOperationByHash, UserOperationGasEstimation, UserOperationHash,
    UserOperationReceipt, UserOperationRequest, UserOperationSigned,
};
pub use utils::{get_address, parse_address, parse_u256};
pub use wallet::Wallet;

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The mode the user operation pool is running in
///
/// `Standard` runs the full traced validation, `Unsafe` skips the opcode and
/// storage rules for nodes without `debug_traceCall` support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UoPoolMode {
    Standard,
    Unsafe,
}

impl fmt::Display for UoPoolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UoPoolMode::Standard => write!(f, "standard"),
            UoPoolMode::Unsafe => write!(f, "unsafe"),
        }
    }
}

impl FromStr for UoPoolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(UoPoolMode::Standard),
            "unsafe" => Ok(UoPoolMode::Unsafe),
            _ => Err(format!("{s} is not a valid uopool mode")),
        }
    }
}
