//! Static admission checks, run before any simulation

pub mod call_gas;
pub mod entities;
pub mod max_fee;
pub mod paymaster;
pub mod sender;
pub mod unstaked_entities;
pub mod verification_gas;

pub use call_gas::CallGas;
pub use entities::Entities;
pub use max_fee::MaxFee;
pub use paymaster::Paymaster;
pub use sender::Sender;
pub use unstaked_entities::UnstakedEntities;
pub use verification_gas::VerificationGas;
