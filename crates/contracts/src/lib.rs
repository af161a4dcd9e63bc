//! EntryPoint (v0.6) contract bindings, revert decoding and the validation
//! tracer

pub mod entry_point;
mod error;
pub mod gen;
pub mod tracer;
pub mod utils;

pub use entry_point::{EntryPoint, SimulateValidationResult};
pub use error::{
    decode_revert_error, decode_revert_string, EntryPointError, METHOD_NOT_FOUND_CODE,
};
pub use gen::{
    AccountDeployedFilter, EntryPointAPI, EntryPointAPIErrors, EntryPointAPIEvents, FailedOp,
    SignatureAggregatorChangedFilter, UserOperationEventFilter, UserOperationRevertReasonFilter,
    SELECTORS_INDICES, SELECTORS_NAMES,
};
pub use utils::parse_from_input_data;
