//! Checks on the decoded result of `simulateValidation`

pub mod aggregator;
pub mod signature;
pub mod timestamp;

pub use aggregator::Aggregator;
pub use signature::Signature;
pub use timestamp::Timestamp;
