//! # Unit Wire Protocol
//!
//! The messages exchanged between the orchestrator and an execution unit, and
//! the codec that turns them into frames.
//!
//! ## Message Kinds
//! | direction | kind |
//! |---|---|
//! | orchestrator → unit | `register`, `invoke` |
//! | unit → orchestrator | `register_succeeded`, `register_failed`, `invoke_succeeded`, `invoke_failed` |
//!
//! Frames are JSON text tagged by `"kind"`. A frame whose kind is unknown, or
//! whose fields do not match its kind, fails to decode with
//! [`ProtocolError::Unrecognized`]; the receiving handler rejects that frame
//! and keeps running.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::function::FunctionDefinition;
use crate::ids::{CallId, FunctionId};
use crate::types::Value;

/// One encoded protocol message.
pub type Frame = String;

/// Messages sent from the orchestrator to a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitRequest {
    Register {
        function_id: FunctionId,
        definition: FunctionDefinition,
    },
    Invoke {
        function_id: FunctionId,
        call_id: CallId,
        args: Vec<Value>,
    },
}

impl UnitRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            UnitRequest::Register { .. } => "register",
            UnitRequest::Invoke { .. } => "invoke",
        }
    }
}

/// Messages sent from a unit back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitReply {
    RegisterSucceeded {
        function_id: FunctionId,
    },
    RegisterFailed {
        function_id: FunctionId,
        error: UnitFault,
    },
    InvokeSucceeded {
        call_id: CallId,
        value: Value,
    },
    InvokeFailed {
        call_id: CallId,
        error: UnitFault,
    },
}

impl UnitReply {
    pub fn kind(&self) -> &'static str {
        match self {
            UnitReply::RegisterSucceeded { .. } => "register_succeeded",
            UnitReply::RegisterFailed { .. } => "register_failed",
            UnitReply::InvokeSucceeded { .. } => "invoke_succeeded",
            UnitReply::InvokeFailed { .. } => "invoke_failed",
        }
    }
}

/// Failure reported by a unit for one register or invoke request.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fault", content = "detail", rename_all = "snake_case")]
pub enum UnitFault {
    #[error("Function definition could not be materialized: {0}")]
    Definition(String),
    #[error("Function {0} is already registered")]
    DuplicateFunction(FunctionId),
    #[error("Function {0} is not registered")]
    FunctionNotFound(FunctionId),
    #[error("Function execution failed: {0}")]
    Execution(String),
}

/// Errors raised by the frame codec.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Failed to encode {kind} message: {reason}")]
    Encode { kind: &'static str, reason: String },
    #[error("Unrecognized message: {0}")]
    Unrecognized(String),
}

/// Encode a request into a frame.
pub fn encode_request(request: &UnitRequest) -> Result<Frame, ProtocolError> {
    encode(request.kind(), request)
}

/// Encode a reply into a frame.
pub fn encode_reply(reply: &UnitReply) -> Result<Frame, ProtocolError> {
    encode(reply.kind(), reply)
}

pub fn decode_request(frame: &str) -> Result<UnitRequest, ProtocolError> {
    decode(frame)
}

pub fn decode_reply(frame: &str) -> Result<UnitReply, ProtocolError> {
    decode(frame)
}

fn encode<M: Serialize>(kind: &'static str, message: &M) -> Result<Frame, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Encode {
        kind,
        reason: e.to_string(),
    })
}

fn decode<M: DeserializeOwned>(frame: &str) -> Result<M, ProtocolError> {
    serde_json::from_str(frame).map_err(|e| ProtocolError::Unrecognized(e.to_string()))
}
