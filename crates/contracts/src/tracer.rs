//! Types for the output of the validation collector tracer and the tracer
//! itself

use ethers::types::{Address, Bytes, GethTrace, U256};
use serde::Deserialize;
use std::collections::HashMap;

/// Object (frame) returned by the JavaScript tracer when simulating
/// validation of a user operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JsTracerFrame {
    #[serde(rename = "callsFromEntryPoint")]
    pub calls_from_entry_point: Vec<TopLevelCallInfo>,
    pub keccak: Vec<Bytes>,
    pub logs: Vec<Log>,
    pub calls: Vec<Call>,
    pub debug: Vec<String>,
}

impl TryFrom<GethTrace> for JsTracerFrame {
    type Error = eyre::Error;
    fn try_from(val: GethTrace) -> Result<Self, Self::Error> {
        match val {
            GethTrace::Known(val) => Err(eyre::eyre!("invalid geth trace: {val:?}")),
            GethTrace::Unknown(val) => serde_json::from_value(val)
                .map_err(|error| eyre::eyre!("failed to parse geth trace: {error}")),
        }
    }
}

/// One validation phase: the call the entry point makes into the factory, the
/// account or the paymaster, with everything observed underneath it
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TopLevelCallInfo {
    #[serde(rename = "topLevelMethodSig")]
    pub top_level_method_sig: Bytes,
    #[serde(rename = "topLevelTargetAddress")]
    pub top_level_target_address: Option<Address>,
    #[serde(default)]
    pub access: HashMap<Address, ReadsAndWrites>,
    #[serde(default)]
    pub opcodes: HashMap<String, u64>,
    #[serde(rename = "contractSize", default)]
    pub contract_size: HashMap<Address, ContractSizeInfo>,
    #[serde(rename = "extCodeAccessInfo", default)]
    pub ext_code_access_info: HashMap<Address, String>,
    pub oog: Option<bool>,
}

/// Storage slots read and written under one top-level validation call;
/// reads record the first observed value
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReadsAndWrites {
    #[serde(default)]
    pub reads: HashMap<String, String>,
    #[serde(default)]
    pub writes: HashMap<String, u64>,
}

/// Size and the opcode used for accessing an external contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContractSizeInfo {
    pub opcode: String,
    #[serde(rename = "contractSize")]
    pub contract_size: u64,
}

/// Log emitted during the traced validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Log {
    pub topics: Vec<String>,
    pub data: Bytes,
}

/// Raw call or return/revert recorded by the tracer, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Call {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(rename = "gasUsed")]
    pub gas_used: Option<u64>,
    pub data: Option<Bytes>,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub method: Option<Bytes>,
    pub gas: Option<u64>,
    pub value: Option<U256>,
}

/// Entry of the reconstructed call stack (a call paired with its return or
/// revert)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallEntry {
    pub typ: String,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub method: Option<String>,
    pub ret: Option<Bytes>,
    pub rev: Option<Bytes>,
    pub value: Option<U256>,
}

// https://github.com/eth-infinitism/bundler/blob/main/packages/bundler/src/BundlerCollectorTracer.ts
pub const JS_TRACER: &str = r#"
{
    callsFromEntryPoint: [],
    currentLevel: null,
    keccak: [],
    calls: [],
    logs: [],
    debug: [],
    lastOp: '',
    lastThreeOpcodes: [],
    topLevelCallCounter: 0,
    fault(log, db) {
        this.debug.push('fault depth=' + log.getDepth() + ' gas=' + log.getGas() + ' cost=' + log.getCost() + ' err=' + log.getError());
    },
    result(ctx, db) {
        return {
            callsFromEntryPoint: this.callsFromEntryPoint,
            keccak: this.keccak,
            logs: this.logs,
            calls: this.calls,
            debug: this.debug
        };
    },
    enter(frame) {
        this.debug.push('enter gas=' + frame.getGas() + ' type=' + frame.getType() + ' to=' + toHex(frame.getTo()) + ' in=' + toHex(frame.getInput()).slice(0, 500));
        this.calls.push({
            type: frame.getType(),
            from: toHex(frame.getFrom()),
            to: toHex(frame.getTo()),
            method: toHex(frame.getInput()).slice(0, 10),
            gas: frame.getGas(),
            value: frame.getValue()
        });
    },
    exit(frame) {
        this.calls.push({
            type: frame.getError() != null ? 'REVERT' : 'RETURN',
            gasUsed: frame.getGasUsed(),
            data: toHex(frame.getOutput()).slice(0, 4000)
        });
    },
    countSlot(list, key) {
        var _a;
        list[key] = ((_a = list[key]) !== null && _a !== void 0 ? _a : 0) + 1;
    },
    step(log, db) {
        var _a;
        const opcode = log.op.toString();
        const stackSize = log.stack.length();
        const stackTop3 = [];
        for (let i = 0; i < 3 && i < stackSize; i++) {
            stackTop3.push(log.stack.peek(i));
        }
        this.lastThreeOpcodes.push({ opcode, stackTop3 });
        if (this.lastThreeOpcodes.length > 3) {
            this.lastThreeOpcodes.shift();
        }
        if (log.getGas() < log.getCost() || (opcode === 'SSTORE' && log.getGas() < 2300)) {
            this.currentLevel.oog = true;
        }
        if (opcode === 'REVERT' || opcode === 'RETURN') {
            if (log.getDepth() === 1) {
                const ofs = parseInt(log.stack.peek(0).toString());
                const len = parseInt(log.stack.peek(1).toString());
                const data = toHex(log.memory.slice(ofs, ofs + len)).slice(0, 4000);
                this.calls.push({
                    type: opcode,
                    gasUsed: 0,
                    data
                });
            }
            this.lastThreeOpcodes = [];
        }
        if (log.getDepth() === 1) {
            if (opcode === 'CALL' || opcode === 'STATICCALL') {
                const addr = toAddress(log.stack.peek(1).toString(16));
                const topLevelTargetAddress = toHex(addr);
                const ofs = parseInt(log.stack.peek(3).toString());
                const topLevelMethodSig = toHex(log.memory.slice(ofs, ofs + 4));
                this.currentLevel = this.callsFromEntryPoint[this.topLevelCallCounter] = {
                    topLevelMethodSig,
                    topLevelTargetAddress,
                    access: {},
                    opcodes: {},
                    extCodeAccessInfo: {},
                    contractSize: {}
                };
                this.topLevelCallCounter++;
            }
            else if (opcode === 'LOG1') {
                const topic = log.stack.peek(2).toString(16);
                if (topic === 'bb47ee3e183a558b1a2ff0874b079f3fc5478b7454eacf2bfc5af2ff5878f972') {
                    // BeforeExecution marker: stop collecting
                    this.topLevelCallCounter = 1000;
                }
            }
            this.lastOp = '';
            return;
        }
        const lastOpInfo = this.lastThreeOpcodes[this.lastThreeOpcodes.length - 2];
        if ((lastOpInfo === null || lastOpInfo === void 0 ? void 0 : lastOpInfo.opcode) === null || (lastOpInfo === null || lastOpInfo === void 0 ? void 0 : lastOpInfo.opcode.match(/^(EXT.*)$/)) != null) {
            const addr = toAddress(lastOpInfo.stackTop3[0].toString(16));
            const addrHex = toHex(addr);
            const last3opcodesString = this.lastThreeOpcodes.map(x => x.opcode).join(' ');
            if (last3opcodesString.match(/^(\w+) EXTCODESIZE ISZERO$/) == null) {
                this.currentLevel.extCodeAccessInfo[addrHex] = opcode;
            }
        }
        const isAllowedPrecompiled = (address) => {
            const addrHex = toHex(address);
            const addressInt = parseInt(addrHex);
            return addressInt > 0 && addressInt < 10;
        };
        if (opcode.match(/^(EXT.*|CALL|CALLCODE|DELEGATECALL|STATICCALL)$/) != null) {
            const idx = opcode.startsWith('EXT') ? 0 : 1;
            const addr = toAddress(log.stack.peek(idx).toString(16));
            const addrHex = toHex(addr);
            if (((_a = this.currentLevel.contractSize[addrHex]) === null || _a === void 0 ? void 0 : _a.contractSize) == null && !isAllowedPrecompiled(addr)) {
                this.currentLevel.contractSize[addrHex] = {
                    contractSize: db.getCode(addr).length,
                    opcode
                };
            }
        }
        if (this.lastOp === 'GAS' && !opcode.includes('CALL')) {
            this.countSlot(this.currentLevel.opcodes, 'GAS');
        }
        if (opcode !== 'GAS') {
            if (opcode.match(/^(DUP\d+|PUSH\d+|SWAP\d+|POP|ADD|SUB|MUL|DIV|EQ|LTE?|S?GTE?|SLT|SH[LR]|AND|OR|NOT|ISZERO)$/) == null) {
                this.countSlot(this.currentLevel.opcodes, opcode);
            }
        }
        this.lastOp = opcode;
        if (opcode === 'SLOAD' || opcode === 'SSTORE') {
            const slot = toWord(log.stack.peek(0).toString(16));
            const slotHex = toHex(slot);
            const addr = log.contract.getAddress();
            const addrHex = toHex(addr);
            let access = this.currentLevel.access[addrHex];
            if (access == null) {
                access = {
                    reads: {},
                    writes: {}
                };
                this.currentLevel.access[addrHex] = access;
            }
            if (opcode === 'SLOAD') {
                if (access.reads[slotHex] == null && access.writes[slotHex] == null) {
                    access.reads[slotHex] = toHex(db.getState(addr, slot));
                }
            }
            else {
                this.countSlot(access.writes, slotHex);
            }
        }
        if (opcode === 'KECCAK256') {
            const ofs = parseInt(log.stack.peek(0).toString());
            const len = parseInt(log.stack.peek(1).toString());
            if (len > 20 && len < 512) {
                this.keccak.push(toHex(log.memory.slice(ofs, ofs + len)));
            }
        }
        else if (opcode.startsWith('LOG')) {
            const count = parseInt(opcode.substring(3));
            const ofs = parseInt(log.stack.peek(0).toString());
            const len = parseInt(log.stack.peek(1).toString());
            const topics = [];
            for (let i = 0; i < count; i++) {
                topics.push('0x' + log.stack.peek(2 + i).toString(16));
            }
            const data = toHex(log.memory.slice(ofs, ofs + len));
            this.logs.push({
                topics,
                data
            });
        }
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tracer_frame_deserialization() {
        let frame = json!({
            "callsFromEntryPoint": [{
                "topLevelMethodSig": "0x3a871cdd",
                "topLevelTargetAddress": "0x9c5754de1443984659e1b3a8d1931d83475ba29c",
                "access": {
                    "0x9c5754de1443984659e1b3a8d1931d83475ba29c": {
                        "reads": { "0x0": "0x1" },
                        "writes": { "0x0": 1 }
                    }
                },
                "opcodes": { "SLOAD": 2, "SSTORE": 1 },
                "contractSize": {
                    "0x5ff137d4b0fdcd49dca30c7cf57e578a026d2789": {
                        "opcode": "CALL",
                        "contractSize": 12345
                    }
                },
                "extCodeAccessInfo": {},
                "oog": false
            }],
            "keccak": ["0x01"],
            "logs": [],
            "calls": [{ "type": "RETURN", "gasUsed": 0, "data": "0x" }],
            "debug": []
        });

        let parsed: JsTracerFrame = serde_json::from_value(frame).unwrap();
        assert_eq!(parsed.calls_from_entry_point.len(), 1);

        let level = &parsed.calls_from_entry_point[0];
        assert_eq!(level.opcodes.get("SLOAD"), Some(&2));
        assert_eq!(level.oog, Some(false));
        assert_eq!(
            level.access.values().next().unwrap().reads.get("0x0"),
            Some(&"0x1".to_string())
        );
    }
}
