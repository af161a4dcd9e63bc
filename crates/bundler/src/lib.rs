//! Bundle construction, signing and submission, and the service that drives
//! the bundling pipeline

mod bundler;
mod conditional;
mod errors;
mod ethereum;
mod service;

pub use bundler::{Bundler, SendBundleOp};
pub use conditional::{AccountStorage, ConditionalClient, ConditionalOptions};
pub use errors::BundlerError;
pub use ethereum::EthereumClient;
pub use service::BundlerService;
