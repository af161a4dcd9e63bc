//! Typed bindings for the v0.6 entry point and the contracts it calls into
//! during validation

use aurelius_primitives::constants::validation::entities::{
    FACTORY_LEVEL, PAYMASTER_LEVEL, SENDER_LEVEL,
};
use ethers::{contract::abigen, prelude::EthCall, types::Bytes};
use lazy_static::lazy_static;
use std::collections::HashMap;

abigen!(
    EntryPointAPI,
    r#"[
        struct UserOperation {address sender; uint256 nonce; bytes initCode; bytes callData; uint256 callGasLimit; uint256 verificationGasLimit; uint256 preVerificationGas; uint256 maxFeePerGas; uint256 maxPriorityFeePerGas; bytes paymasterAndData; bytes signature;}
        struct ReturnInfo {uint256 preOpGas; uint256 prefund; bool sigFailed; uint48 validAfter; uint48 validUntil; bytes paymasterContext;}
        struct StakeInfo {uint256 stake; uint256 unstakeDelaySec;}
        struct AggregatorStakeInfo {address aggregator; StakeInfo stakeInfo;}
        function handleOps(UserOperation[] calldata ops, address beneficiary)
        function simulateValidation(UserOperation calldata userOp)
        function getUserOpHash(UserOperation calldata userOp) view returns (bytes32)
        function balanceOf(address account) view returns (uint256)
        function depositTo(address account) payable
        function getNonce(address sender, uint192 key) view returns (uint256 nonce)
        function getDepositInfo(address account) view returns (uint112 deposit, bool staked, uint112 stake, uint32 unstakeDelaySec, uint48 withdrawTime)
        function getSenderAddress(bytes initCode)
        event UserOperationEvent(bytes32 indexed userOpHash, address indexed sender, address indexed paymaster, uint256 nonce, bool success, uint256 actualGasCost, uint256 actualGasUsed)
        event AccountDeployed(bytes32 indexed userOpHash, address indexed sender, address factory, address paymaster)
        event UserOperationRevertReason(bytes32 indexed userOpHash, address indexed sender, uint256 nonce, bytes revertReason)
        event SignatureAggregatorChanged(address indexed aggregator)
        event Deposited(address indexed account, uint256 totalDeposit)
        error FailedOp(uint256 opIndex, string reason)
        error SenderAddressResult(address sender)
        error SignatureValidationFailed(address aggregator)
        error ValidationResult(ReturnInfo returnInfo, StakeInfo senderInfo, StakeInfo factoryInfo, StakeInfo paymasterInfo)
        error ValidationResultWithAggregation(ReturnInfo returnInfo, StakeInfo senderInfo, StakeInfo factoryInfo, StakeInfo paymasterInfo, AggregatorStakeInfo aggregatorInfo)
    ]"#;

    AccountAPI,
    r#"[
        struct UserOperation {address sender; uint256 nonce; bytes initCode; bytes callData; uint256 callGasLimit; uint256 verificationGasLimit; uint256 preVerificationGas; uint256 maxFeePerGas; uint256 maxPriorityFeePerGas; bytes paymasterAndData; bytes signature;}
        function validateUserOp(UserOperation calldata userOp, bytes32 userOpHash, uint256 missingAccountFunds) returns (uint256 validationData)
    ]"#;

    PaymasterAPI,
    r#"[
        struct UserOperation {address sender; uint256 nonce; bytes initCode; bytes callData; uint256 callGasLimit; uint256 verificationGasLimit; uint256 preVerificationGas; uint256 maxFeePerGas; uint256 maxPriorityFeePerGas; bytes paymasterAndData; bytes signature;}
        function validatePaymasterUserOp(UserOperation calldata userOp, bytes32 userOpHash, uint256 maxCost) returns (bytes context, uint256 validationData)
        function postOp(uint8 mode, bytes context, uint256 actualGasCost)
    ]"#;

    SenderCreatorAPI,
    r#"[
        function createSender(bytes initCode) returns (address sender)
    ]"#;
);

lazy_static! {
    /// Top-level method signature of a validation frame -> entity level
    /// (the tracer splits the trace by the call the entry point makes into
    /// the factory, the account and the paymaster)
    pub static ref SELECTORS_INDICES: HashMap<Bytes, usize> = {
        let mut map = HashMap::new();
        map.insert(CreateSenderCall::selector().to_vec().into(), FACTORY_LEVEL);
        map.insert(ValidateUserOpCall::selector().to_vec().into(), SENDER_LEVEL);
        map.insert(ValidatePaymasterUserOpCall::selector().to_vec().into(), PAYMASTER_LEVEL);
        map
    };

    /// Method selector -> human readable name, for call stack inspection
    pub static ref SELECTORS_NAMES: HashMap<Bytes, String> = {
        let mut map = HashMap::new();
        map.insert(
            CreateSenderCall::selector().to_vec().into(),
            CreateSenderCall::function_name().to_string(),
        );
        map.insert(
            ValidateUserOpCall::selector().to_vec().into(),
            ValidateUserOpCall::function_name().to_string(),
        );
        map.insert(
            ValidatePaymasterUserOpCall::selector().to_vec().into(),
            ValidatePaymasterUserOpCall::function_name().to_string(),
        );
        map.insert(
            HandleOpsCall::selector().to_vec().into(),
            HandleOpsCall::function_name().to_string(),
        );
        map.insert(
            DepositToCall::selector().to_vec().into(),
            DepositToCall::function_name().to_string(),
        );
        map
    };
}

impl From<aurelius_primitives::UserOperationSigned> for UserOperation {
    fn from(uo: aurelius_primitives::UserOperationSigned) -> Self {
        Self {
            sender: uo.sender,
            nonce: uo.nonce,
            init_code: uo.init_code,
            call_data: uo.call_data,
            call_gas_limit: uo.call_gas_limit,
            verification_gas_limit: uo.verification_gas_limit,
            pre_verification_gas: uo.pre_verification_gas,
            max_fee_per_gas: uo.max_fee_per_gas,
            max_priority_fee_per_gas: uo.max_priority_fee_per_gas,
            paymaster_and_data: uo.paymaster_and_data,
            signature: uo.signature,
        }
    }
}

impl From<UserOperation> for aurelius_primitives::UserOperationSigned {
    fn from(uo: UserOperation) -> Self {
        Self {
            sender: uo.sender,
            nonce: uo.nonce,
            init_code: uo.init_code,
            call_data: uo.call_data,
            call_gas_limit: uo.call_gas_limit,
            verification_gas_limit: uo.verification_gas_limit,
            pre_verification_gas: uo.pre_verification_gas,
            max_fee_per_gas: uo.max_fee_per_gas,
            max_priority_fee_per_gas: uo.max_priority_fee_per_gas,
            paymaster_and_data: uo.paymaster_and_data,
            signature: uo.signature,
        }
    }
}
