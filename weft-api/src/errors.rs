//! # Weft Error Types
//!
//! `WeftError` is the single error surfaced by pool, proxy and handle
//! operations. Failures that originate inside a unit travel over the wire as
//! [`UnitFault`](crate::protocol::UnitFault) and are converted on arrival.
//!
//! ## Propagation
//! - Per-unit registration failures are absorbed by deployment; only
//!   `DeploymentFailed` reaches the deploying caller.
//! - Per-call failures reach only the caller of that call.

use std::time::Duration;
use thiserror::Error;

use crate::ids::{FunctionId, UnitId};
use crate::protocol::{ProtocolError, UnitFault};

#[derive(Error, Debug)]
pub enum WeftError {
    /// A unit could not materialize the function body.
    #[error("Function definition could not be materialized: {0}")]
    DefinitionError(String),

    /// The function id is already present in the unit's registry.
    #[error("Function {0} is already registered on this unit")]
    DuplicateFunction(FunctionId),

    /// Every unit of the pool rejected the function.
    #[error("Function {function_id} could not be deployed on any of {attempts} units")]
    DeploymentFailed {
        function_id: FunctionId,
        attempts: usize,
    },

    /// An invoke reached a unit that never registered the function.
    /// The orchestrator and the unit disagree; this is a defect.
    #[error("Function {0} is not registered on the target unit")]
    FunctionNotFound(FunctionId),

    /// The deployed function failed while executing this call.
    #[error("Call failed: {0}")]
    CallFailed(String),

    /// The pool or unit proxy has been torn down.
    #[error("{0} has been destroyed already")]
    AlreadyDestroyed(String),

    /// No reply arrived within the configured timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The unit stopped before replying.
    #[error("Unit {0} stopped before replying")]
    UnitStopped(UnitId),

    /// The unit thread panicked outside of any function call.
    #[error("Unit {unit} panicked: {reason}")]
    UnitPanicked { unit: UnitId, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn unit: {0}")]
    Spawn(String),

    #[error("Failed during shutdown: {0}")]
    Shutdown(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<UnitFault> for WeftError {
    fn from(fault: UnitFault) -> Self {
        match fault {
            UnitFault::Definition(reason) => WeftError::DefinitionError(reason),
            UnitFault::DuplicateFunction(id) => WeftError::DuplicateFunction(id),
            UnitFault::FunctionNotFound(id) => WeftError::FunctionNotFound(id),
            UnitFault::Execution(reason) => WeftError::CallFailed(reason),
        }
    }
}
