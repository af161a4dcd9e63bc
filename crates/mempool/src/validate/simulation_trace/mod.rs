//! Checks on the collector tracer output (ERC-7562 validation rules)

pub mod call_stack;
pub mod code_hashes;
pub mod external_contracts;
pub mod gas;
pub mod opcodes;
pub mod storage_access;

pub use call_stack::CallStack;
pub use code_hashes::CodeHashes;
pub use external_contracts::ExternalContracts;
pub use gas::Gas;
pub use opcodes::Opcodes;
pub use storage_access::StorageAccess;
