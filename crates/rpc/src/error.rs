use aurelius_mempool::{
    InvalidMempoolUserOperationError, MempoolError, MempoolErrorKind, ReputationError, SanityError,
    SimulationError,
};
use aurelius_primitives::constants::rpc::error_codes::{
    EXECUTION_REVERTED, EXPIRATION, OPCODE_VALIDATION, REPUTATION, SIGNATURE, SIMULATE_VALIDATION,
    STAKE_TOO_LOW, UNSUPPORTED_AGGREGATOR,
};
use jsonrpsee::types::{
    error::{ErrorCode, INTERNAL_ERROR_CODE},
    ErrorObject, ErrorObjectOwned,
};

/// A wrapper for the [ErrorObjectOwned](ErrorObjectOwned) type, carrying the
/// validation-domain error codes of ERC-4337
pub struct JsonRpcError(pub ErrorObjectOwned);

impl From<JsonRpcError> for ErrorObjectOwned {
    fn from(err: JsonRpcError) -> Self {
        err.0
    }
}

impl From<serde_json::Error> for JsonRpcError {
    fn from(err: serde_json::Error) -> Self {
        JsonRpcError(ErrorObject::owned(
            ErrorCode::ParseError.code(),
            err.to_string(),
            None::<bool>,
        ))
    }
}

impl From<MempoolError> for JsonRpcError {
    fn from(err: MempoolError) -> Self {
        match err.kind {
            MempoolErrorKind::InvalidUserOperation(err) => match err {
                InvalidMempoolUserOperationError::Sanity(err) => err.into(),
                InvalidMempoolUserOperationError::Simulation(err) => err.into(),
                InvalidMempoolUserOperationError::Reputation(err) => err.into(),
            },
            _ => JsonRpcError(ErrorObject::owned(INTERNAL_ERROR_CODE, err.to_string(), None::<bool>)),
        }
    }
}

impl From<ReputationError> for JsonRpcError {
    fn from(err: ReputationError) -> Self {
        JsonRpcError(match err {
            ReputationError::BannedEntity { .. } | ReputationError::ThrottledEntity { .. } => {
                ErrorObject::owned(REPUTATION, err.to_string(), None::<bool>)
            }
            ReputationError::StakeTooLow { .. } |
            ReputationError::UnstakeDelayTooLow { .. } |
            ReputationError::UnstakedEntity { .. } => {
                ErrorObject::owned(STAKE_TOO_LOW, err.to_string(), None::<bool>)
            }
        })
    }
}

impl From<SanityError> for JsonRpcError {
    fn from(err: SanityError) -> Self {
        JsonRpcError(match err {
            SanityError::VerificationGasLimitTooHigh { .. } |
            SanityError::PreVerificationGasTooLow { .. } |
            SanityError::CallGasLimitTooLow { .. } |
            SanityError::MaxFeePerGasTooLow { .. } |
            SanityError::MaxPriorityFeePerGasTooHigh { .. } |
            SanityError::MaxPriorityFeePerGasTooLow { .. } |
            SanityError::Paymaster { .. } |
            SanityError::Sender { .. } => {
                ErrorObject::owned(SIMULATE_VALIDATION, err.to_string(), None::<bool>)
            }
            SanityError::EntityRoles { .. } => {
                ErrorObject::owned(OPCODE_VALIDATION, err.to_string(), None::<bool>)
            }
            SanityError::Reputation(err) => JsonRpcError::from(err).0,
            _ => ErrorObject::owned(INTERNAL_ERROR_CODE, err.to_string(), None::<bool>),
        })
    }
}

impl From<SimulationError> for JsonRpcError {
    fn from(err: SimulationError) -> Self {
        JsonRpcError(match err {
            SimulationError::Signature => {
                ErrorObject::owned(SIGNATURE, err.to_string(), None::<bool>)
            }
            SimulationError::UnsupportedAggregator { .. } => {
                ErrorObject::owned(UNSUPPORTED_AGGREGATOR, err.to_string(), None::<bool>)
            }
            SimulationError::Timestamp { .. } => {
                ErrorObject::owned(EXPIRATION, err.to_string(), None::<bool>)
            }
            SimulationError::Validation { .. } => {
                ErrorObject::owned(SIMULATE_VALIDATION, err.to_string(), None::<bool>)
            }
            SimulationError::Execution { .. } => {
                ErrorObject::owned(EXECUTION_REVERTED, err.to_string(), None::<bool>)
            }
            SimulationError::Opcode { .. } |
            SimulationError::StorageAccess { .. } |
            SimulationError::Unstaked { .. } |
            SimulationError::CallStack { .. } |
            SimulationError::CodeHashes |
            SimulationError::OutOfGas => {
                ErrorObject::owned(OPCODE_VALIDATION, err.to_string(), None::<bool>)
            }
            SimulationError::Reputation(err) => JsonRpcError::from(err).0,
            _ => ErrorObject::owned(INTERNAL_ERROR_CODE, err.to_string(), None::<bool>),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    #[test]
    fn validation_errors_map_to_erc4337_codes() {
        let err = JsonRpcError::from(SimulationError::Signature);
        assert_eq!(err.0.code(), SIGNATURE);

        let err = JsonRpcError::from(SimulationError::Opcode {
            entity: "account".into(),
            opcode: "GASPRICE".into(),
        });
        assert_eq!(err.0.code(), OPCODE_VALIDATION);

        let err = JsonRpcError::from(SimulationError::Timestamp { inner: "expires too soon".into() });
        assert_eq!(err.0.code(), EXPIRATION);

        let err = JsonRpcError::from(ReputationError::BannedEntity {
            entity: "paymaster".into(),
            address: Address::random(),
        });
        assert_eq!(err.0.code(), REPUTATION);

        let err = JsonRpcError::from(SanityError::Reputation(ReputationError::StakeTooLow {
            entity: "factory".into(),
            address: Address::random(),
            stake: 0.into(),
            min_stake: 1.into(),
        }));
        assert_eq!(err.0.code(), STAKE_TOO_LOW);

        let err = JsonRpcError::from(SimulationError::UnsupportedAggregator {
            aggregator: Address::random(),
        });
        assert_eq!(err.0.code(), UNSUPPORTED_AGGREGATOR);

        let err =
            JsonRpcError::from(SimulationError::Execution { inner: "reverted".into() });
        assert_eq!(err.0.code(), EXECUTION_REVERTED);
    }
}
