use crate::{
    validate::{utils::extract_stake_info, SimulationTraceCheck, SimulationTraceHelper},
    Mempool, Reputation, SimulationError,
};
use aurelius_contracts::{gen::ValidatePaymasterUserOpReturn, SELECTORS_NAMES};
use aurelius_primitives::{
    constants::validation::entities::{LEVEL_TO_ENTITY, PAYMASTER},
    simulation::{CREATE_OPCODE, RETURN_OPCODE, REVERT_OPCODE, VALIDATE_PAYMASTER_USER_OP_FUNCTION},
    UserOperation,
};
use ethers::{abi::AbiDecode, providers::Middleware};
use aurelius_contracts::tracer::{Call, CallEntry, JsTracerFrame};

#[derive(Clone)]
pub struct CallStack;

impl CallStack {
    /// Pairs the raw calls with their returns/reverts into call entries
    fn parse_call_stack(
        &self,
        trace: &JsTracerFrame,
        calls: &mut Vec<CallEntry>,
    ) -> Result<(), SimulationError> {
        let mut st: Vec<Call> = vec![];

        for call in trace.calls.iter() {
            if call.typ == *REVERT_OPCODE || call.typ == *RETURN_OPCODE {
                let top = st.pop();

                if let Some(top) = top {
                    if top.typ.contains(CREATE_OPCODE.as_str()) {
                        calls.push(CallEntry {
                            typ: top.typ,
                            from: top.from,
                            to: top.to,
                            ..Default::default()
                        });
                    } else {
                        let method = top
                            .method
                            .as_ref()
                            .and_then(|m| SELECTORS_NAMES.get(m).cloned());

                        if call.typ == *REVERT_OPCODE {
                            calls.push(CallEntry {
                                typ: top.typ,
                                from: top.from,
                                to: top.to,
                                method,
                                rev: call.data.clone(),
                                value: top.value,
                                ..Default::default()
                            });
                        } else {
                            calls.push(CallEntry {
                                typ: top.typ,
                                from: top.from,
                                to: top.to,
                                method,
                                ret: call.data.clone(),
                                value: top.value,
                                ..Default::default()
                            });
                        }
                    }
                }
            } else {
                st.push(call.clone());
            }
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl<M: Middleware> SimulationTraceCheck<M> for CallStack {
    /// Calls back into the entry point during validation are restricted, and
    /// an unstaked paymaster may not return a postOp context.
    async fn check_user_operation(
        &self,
        uo: &UserOperation,
        _mempool: &Mempool,
        reputation: &Reputation,
        helper: &mut SimulationTraceHelper<M>,
    ) -> Result<(), SimulationError> {
        if helper.stake_info.is_none() {
            helper.stake_info = Some(extract_stake_info(uo, helper.simulate_validation_result));
        }

        let mut calls: Vec<CallEntry> = vec![];
        self.parse_call_stack(helper.js_trace, &mut calls)?;

        for call in calls.iter() {
            // [OP-052] - may call depositTo(sender) with any value from the
            // sender or factory
            // [OP-053] - may call the fallback function from the sender with
            // any value
            // [OP-054] - any other access to the entry point is forbidden
            if call.to.unwrap_or_default() == helper.entry_point.address() &&
                call.from.unwrap_or_default() != helper.entry_point.address() &&
                (call.method.is_some() &&
                    call.method.clone().unwrap_or_default() != *"depositTo")
            {
                return Err(SimulationError::CallStack {
                    inner: format!("illegal call into the entry point during validation: {call:?}"),
                });
            }

            // [OP-061] - CALL with value is forbidden, except to the entry
            // point
            if call.to.unwrap_or_default() != helper.entry_point.address() &&
                !call.value.unwrap_or_default().is_zero()
            {
                return Err(SimulationError::CallStack {
                    inner: format!("illegal call with value: {call:?}"),
                });
            }

            // [EREP-050] - an unstaked paymaster may not return a context
            for (i, stake_info) in helper.stake_info.unwrap_or_default().iter().enumerate() {
                if LEVEL_TO_ENTITY[i] == PAYMASTER &&
                    call.method == Some(VALIDATE_PAYMASTER_USER_OP_FUNCTION.clone()) &&
                    call.to == Some(stake_info.address)
                {
                    if let Some(ret) = call.ret.as_ref() {
                        let validate_paymaster_return: ValidatePaymasterUserOpReturn =
                            AbiDecode::decode(ret).map_err(|_| SimulationError::Validation {
                                inner: "error during simulate validation on entry point".into(),
                            })?;

                        if !validate_paymaster_return.context.is_empty() &&
                            reputation
                                .verify_stake(
                                    PAYMASTER,
                                    Some(*stake_info),
                                    helper.val_config.min_stake,
                                    helper.val_config.min_unstake_delay,
                                )
                                .is_err()
                        {
                            return Err(SimulationError::Unstaked {
                                entity: PAYMASTER.into(),
                                address: stake_info.address,
                                inner: "must not return context".into(),
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
