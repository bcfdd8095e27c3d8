//! Error types for the rustyblue-eatt library
//!
//! One taxonomy covers local misuse, resolution failures delivered to waiting
//! exchanges, and failures reported by the channel transport.

use crate::att::AttErrorCode;
use crate::eatt::types::{BearerId, ConnHandle};
use crate::transport::TransportError;
use thiserror::Error;

/// Errors produced by the bearer pool and exchange engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EattError {
    #[error("Bearer already has an outstanding exchange")]
    BearerBusy,

    #[error("Bearer is not connected")]
    NotConnected,

    #[error("Bearer disconnected before the exchange completed")]
    BearerLost,

    #[error("Exchange timed out")]
    ExchangeTimedOut,

    #[error("No bearer available")]
    NoBearerAvailable,

    #[error("Requested bearer is unavailable")]
    BearerUnavailable,

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Enhanced bearer limit reached")]
    PoolFull,

    #[error("ATT error {code:?} for request {request_opcode:#04x} on handle {handle:#06x}")]
    Att {
        request_opcode: u8,
        handle: u16,
        code: AttErrorCode,
    },

    #[error("Payload of {len} bytes exceeds bearer MTU {mtu}")]
    PayloadTooLarge { len: usize, mtu: u16 },

    #[error("Invalid PDU")]
    InvalidPdu,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnHandle),

    #[error("Unknown bearer: {0}")]
    UnknownBearer(BearerId),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for EATT operations
pub type EattResult<T> = Result<T, EattError>;
