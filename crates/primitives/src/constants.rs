//! Account abstraction (ERC-4337)-related constants

/// Entry point smart contract
pub mod entry_point {
    /// Address of the entry point smart contract
    pub const ADDRESS: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";
    /// Version of the entry point smart contract
    pub const VERSION: &str = "0.6.0";
}

/// Bundler
pub mod bundler {
    /// Default time interval for auto bundling mode (in seconds)
    pub const BUNDLE_INTERVAL: u64 = 10;
    /// Mempool size at which a bundle is triggered without waiting for the
    /// interval; 0 bundles on every admission
    pub const AUTO_BUNDLE_MEMPOOL_SIZE: usize = 10;
    /// Gas budget of a single `handleOps` transaction
    pub const BUNDLE_GAS_LIMIT: u64 = 10_000_000;
    /// Upper bound on the gas the user operations of one bundle may claim
    pub const MAX_BUNDLE_GAS: u64 = 5_000_000;
}

/// User operation mempool
pub mod mempool {
    /// Percentage increase of priority fee required to replace a user
    /// operation with the same sender and nonce
    pub const GAS_INCREASE_PERC: u64 = 10;
    /// Depth scan when searching for past entry point events
    pub const LATEST_SCAN_DEPTH: u64 = 1000;
    /// Default bound on the number of user operations resident in the mempool
    pub const MAX_SIZE: usize = 4096;
}

/// User operation validation
pub mod validation {
    /// Entities (factory, sender/account, paymaster)
    pub mod entities {
        // 0 - factory, 1 - sender/account, 2 - paymaster
        pub const NUMBER_OF_LEVELS: usize = 3;

        pub const FACTORY: &str = "factory";
        pub const SENDER: &str = "account";
        pub const PAYMASTER: &str = "paymaster";

        pub const FACTORY_LEVEL: usize = 0;
        pub const SENDER_LEVEL: usize = 1;
        pub const PAYMASTER_LEVEL: usize = 2;

        pub const LEVEL_TO_ENTITY: [&str; NUMBER_OF_LEVELS] = [FACTORY, SENDER, PAYMASTER];
    }

    /// Reputation
    /// https://github.com/eth-infinitism/account-abstraction/blob/develop/erc/ERCS/erc-7562.md#constants
    pub mod reputation {
        pub const MIN_UNSTAKE_DELAY: u64 = 86400;
        pub const SAME_SENDER_MEMPOOL_COUNT: usize = 4;
        pub const SAME_UNSTAKED_ENTITY_MEMPOOL_COUNT: usize = 10;
        pub const THROTTLED_ENTITY_MEMPOOL_COUNT: usize = 4;
        pub const THROTTLED_ENTITY_BUNDLE_COUNT: usize = 1;
        pub const INCLUSION_RATE_FACTOR: u64 = 10;
        pub const THROTTLING_SLACK: u64 = 10;
        pub const BAN_SLACK: u64 = 50;
    }
}

/// RPC
pub mod rpc {
    /// The default port for HTTP
    pub const HTTP_PORT: u16 = 3000;

    /// JSON-RPC error codes of the ERC-4337 validation domain
    pub mod error_codes {
        /// Rejected by `simulateValidation`
        pub const SIMULATE_VALIDATION: i32 = -32500;
        /// Opcode or storage access rule violation during traced simulation
        pub const OPCODE_VALIDATION: i32 = -32501;
        /// User operation expires too soon
        pub const EXPIRATION: i32 = -32502;
        /// Entity is banned or throttled
        pub const REPUTATION: i32 = -32503;
        /// Stake or unstake delay of an entity is too low
        pub const STAKE_TOO_LOW: i32 = -32504;
        /// Signature aggregator is not supported
        pub const UNSUPPORTED_AGGREGATOR: i32 = -32506;
        /// Signature of the user operation is invalid
        pub const SIGNATURE: i32 = -32507;
        /// User operation reverted on chain
        pub const EXECUTION_REVERTED: i32 = -32521;
    }
}
