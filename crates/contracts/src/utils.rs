use crate::gen::HandleOpsCall;
use aurelius_primitives::UserOperationSigned;
use ethers::{abi::AbiDecode, types::Bytes};

/// Decodes the user operations from the calldata of a `handleOps` transaction
pub fn parse_from_input_data(data: Bytes) -> Option<Vec<UserOperationSigned>> {
    HandleOpsCall::decode(data.as_ref())
        .map(|call| call.ops.into_iter().map(|uo| uo.into()).collect())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gen::{self, EntryPointAPICalls};
    use ethers::abi::AbiEncode;
    use ethers::types::Address;

    #[test]
    fn parse_handle_ops_calldata() {
        let uo = UserOperationSigned::default()
            .sender("0x9c5754De1443984659E1b3a8d1931D83475ba29C".parse().unwrap())
            .nonce(7.into())
            .call_gas_limit(33_100.into());

        let call = EntryPointAPICalls::HandleOps(HandleOpsCall {
            ops: vec![gen::UserOperation::from(uo.clone())],
            beneficiary: Address::random(),
        });

        let parsed = parse_from_input_data(call.encode().into()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0], uo);

        assert!(parse_from_input_data("0x1f2f3f".parse().unwrap()).is_none());
    }
}
