use aurelius_primitives::{constants, parse_u256, UoPoolMode};
use clap::Parser;
use ethers::types::{Address, U256};
use expanded_pathbuf::ExpandedPathBuf;
use std::net::IpAddr;

/// CLI options of the bundler
#[derive(Clone, Debug, Parser)]
#[command(name = "aurelius", about = "ERC-4337 bundler")]
pub struct Opts {
    /// HTTP address of the Ethereum execution client
    #[arg(long, default_value = "http://127.0.0.1:8545")]
    pub eth_client_address: String,

    /// Address of the entry point contract this bundler serves
    #[arg(long, default_value = constants::entry_point::ADDRESS)]
    pub entry_point: Address,

    /// Path to the file containing the signer mnemonic
    #[arg(long, conflicts_with = "private_key")]
    pub mnemonic_file: Option<ExpandedPathBuf>,

    /// Private key of the signer (hex)
    #[arg(long)]
    pub private_key: Option<String>,

    /// Address the gas refunds of bundles are sent to
    #[arg(long)]
    pub beneficiary: Address,

    /// Signer balance below which refunds are routed back to the signer
    #[arg(long, value_parser = parse_u256, default_value = "100000000000000000")]
    pub min_balance: U256,

    /// Minimum stake (wei) for an entity to count as staked
    #[arg(long, value_parser = parse_u256, default_value = "1")]
    pub min_stake: U256,

    /// Minimum unstake delay (seconds) for an entity to count as staked
    #[arg(long, default_value_t = constants::validation::reputation::MIN_UNSTAKE_DELAY)]
    pub min_unstake_delay: u64,

    /// Minimum priority fee per gas this bundler accepts
    #[arg(long, value_parser = parse_u256, default_value = "0")]
    pub min_priority_fee_per_gas: U256,

    /// Maximum verification gas of a single user operation
    #[arg(long, value_parser = parse_u256, default_value = "5000000")]
    pub max_verification_gas: U256,

    /// Gas the user operations of one bundle may claim in total
    #[arg(long, default_value_t = constants::bundler::MAX_BUNDLE_GAS)]
    pub max_bundle_gas: u64,

    /// Maximum number of user operations resident in the mempool
    #[arg(long, default_value_t = constants::mempool::MAX_SIZE)]
    pub mempool_max_size: usize,

    /// Seconds between bundling cycles; 0 disables the interval trigger
    #[arg(long, default_value_t = constants::bundler::BUNDLE_INTERVAL)]
    pub bundle_interval: u64,

    /// Mempool size that triggers a bundle without waiting for the interval;
    /// 0 bundles on every admission
    #[arg(long, default_value_t = constants::bundler::AUTO_BUNDLE_MEMPOOL_SIZE)]
    pub auto_bundle_size: usize,

    /// Validation mode: standard (traced) or unsafe (no debug_traceCall)
    #[arg(long, default_value = "standard")]
    pub uopool_mode: UoPoolMode,

    /// Submit bundles through eth_sendRawTransactionConditional
    #[arg(long)]
    pub conditional_rpc: bool,

    /// HTTP-RPC address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    pub http_addr: IpAddr,

    /// HTTP-RPC port to listen on
    #[arg(long, default_value_t = constants::rpc::HTTP_PORT)]
    pub http_port: u16,

    /// CORS domains of the HTTP-RPC server
    #[arg(long, value_delimiter = ',', default_value = "*")]
    pub http_corsdomain: Vec<String>,
}
