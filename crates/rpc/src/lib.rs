//! JSON-RPC API of the bundler: the `eth` admission surface and the `debug`
//! introspection namespace

mod debug;
mod debug_api;
mod error;
mod eth;
mod eth_api;
mod rpc;

pub use debug::DebugApiServerImpl;
pub use debug_api::{DebugApiServer, ResponseSuccess};
pub use error::JsonRpcError;
pub use eth::EthApiServerImpl;
pub use eth_api::EthApiServer;
pub use rpc::JsonRpcServer;
