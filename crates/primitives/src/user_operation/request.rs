//! User operation request (optional fields)

use super::UserOperationSigned;
use crate::utils::{as_checksum_addr, as_checksum_bytes};
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// User operation as it arrives over RPC; gas and signature fields may be
/// omitted (gas estimation fills them in)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationRequest {
    #[serde(default = "Address::zero", serialize_with = "as_checksum_addr")]
    pub sender: Address,
    #[serde(default)]
    pub nonce: U256,
    #[serde(default, serialize_with = "as_checksum_bytes")]
    pub init_code: Bytes,
    #[serde(default)]
    pub call_data: Bytes,
    #[serde(default)]
    pub call_gas_limit: Option<U256>,
    #[serde(default)]
    pub verification_gas_limit: Option<U256>,
    #[serde(default)]
    pub pre_verification_gas: Option<U256>,
    #[serde(default)]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default, serialize_with = "as_checksum_bytes")]
    pub paymaster_and_data: Bytes,
    #[serde(default)]
    pub signature: Option<Bytes>,
}

impl From<UserOperationRequest> for UserOperationSigned {
    fn from(req: UserOperationRequest) -> Self {
        Self {
            sender: req.sender,
            nonce: req.nonce,
            init_code: req.init_code,
            call_data: req.call_data,
            call_gas_limit: req.call_gas_limit.unwrap_or_default(),
            verification_gas_limit: req.verification_gas_limit.unwrap_or_default(),
            pre_verification_gas: req.pre_verification_gas.unwrap_or_default(),
            max_fee_per_gas: req.max_fee_per_gas.unwrap_or_default(),
            max_priority_fee_per_gas: req.max_priority_fee_per_gas.unwrap_or_default(),
            paymaster_and_data: req.paymaster_and_data,
            signature: req.signature.unwrap_or_default(),
        }
    }
}

impl From<UserOperationSigned> for UserOperationRequest {
    fn from(uo: UserOperationSigned) -> Self {
        Self {
            sender: uo.sender,
            nonce: uo.nonce,
            init_code: uo.init_code,
            call_data: uo.call_data,
            call_gas_limit: Some(uo.call_gas_limit),
            verification_gas_limit: Some(uo.verification_gas_limit),
            pre_verification_gas: Some(uo.pre_verification_gas),
            max_fee_per_gas: Some(uo.max_fee_per_gas),
            max_priority_fee_per_gas: Some(uo.max_priority_fee_per_gas),
            paymaster_and_data: uo.paymaster_and_data,
            signature: Some(uo.signature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserialization_fills_defaults() {
        let req: UserOperationRequest = serde_json::from_str(
            r#"{
                "sender": "0x9c5754De1443984659E1b3a8d1931D83475ba29C",
                "nonce": "0x5",
                "callData": "0xb61d27f6"
            }"#,
        )
        .unwrap();

        let uo = UserOperationSigned::from(req);
        assert_eq!(uo.nonce, U256::from(5));
        assert!(uo.init_code.is_empty());
        assert!(uo.call_gas_limit.is_zero());
        assert!(uo.signature.is_empty());
    }
}
