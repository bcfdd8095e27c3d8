//! ATT opcode classification
//!
//! The multiplexer never decodes attribute payloads. It only needs to know which
//! family an opcode belongs to, so that inbound PDUs can be matched against the
//! exchange outstanding on a bearer.

use super::constants::*;
use super::error::AttErrorCode;
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

bitflags! {
    /// Flag bits of an ATT opcode octet
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpcodeFlags: u8 {
        /// Command flag, set for PDUs that never get a response
        const COMMAND = 0x40;
        /// Authentication signature flag
        const AUTH_SIGNATURE = 0x80;
    }
}

/// Bits 0-5 of the opcode
pub const OPCODE_METHOD_MASK: u8 = 0x3F;

/// Method family of an ATT opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeClass {
    /// Client request awaiting a response
    Request,
    /// Server response to a request
    Response,
    /// Error Response, terminates any request
    ErrorResponse,
    /// Command, no response
    Command,
    /// Handle value notification, no confirmation
    Notification,
    /// Handle value indication, awaits confirmation
    Indication,
    /// Handle value confirmation
    Confirmation,
    /// Opcode this stack does not know
    Unknown,
}

/// An ATT opcode octet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(u8);

impl Opcode {
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Method bits without the flag bits
    pub const fn method(self) -> u8 {
        self.0 & OPCODE_METHOD_MASK
    }

    pub fn flags(self) -> OpcodeFlags {
        OpcodeFlags::from_bits_truncate(self.0)
    }

    pub fn class(self) -> OpcodeClass {
        if self.flags().contains(OpcodeFlags::COMMAND) {
            return match self.0 {
                ATT_WRITE_CMD | ATT_SIGNED_WRITE_CMD => OpcodeClass::Command,
                _ => OpcodeClass::Unknown,
            };
        }

        match self.0 {
            ATT_ERROR_RSP => OpcodeClass::ErrorResponse,
            ATT_HANDLE_VALUE_NTF | ATT_MULTIPLE_HANDLE_VALUE_NTF => OpcodeClass::Notification,
            ATT_HANDLE_VALUE_IND => OpcodeClass::Indication,
            ATT_HANDLE_VALUE_CONF => OpcodeClass::Confirmation,
            _ if self.response_opcode().is_some() => OpcodeClass::Request,
            _ if self.request_opcode().is_some() => OpcodeClass::Response,
            _ => OpcodeClass::Unknown,
        }
    }

    /// The response opcode that completes this request
    pub fn response_opcode(self) -> Option<u8> {
        let rsp = match self.0 {
            ATT_EXCHANGE_MTU_REQ => ATT_EXCHANGE_MTU_RSP,
            ATT_FIND_INFO_REQ => ATT_FIND_INFO_RSP,
            ATT_FIND_BY_TYPE_VALUE_REQ => ATT_FIND_BY_TYPE_VALUE_RSP,
            ATT_READ_BY_TYPE_REQ => ATT_READ_BY_TYPE_RSP,
            ATT_READ_REQ => ATT_READ_RSP,
            ATT_READ_BLOB_REQ => ATT_READ_BLOB_RSP,
            ATT_READ_MULTIPLE_REQ => ATT_READ_MULTIPLE_RSP,
            ATT_READ_BY_GROUP_TYPE_REQ => ATT_READ_BY_GROUP_TYPE_RSP,
            ATT_WRITE_REQ => ATT_WRITE_RSP,
            ATT_PREPARE_WRITE_REQ => ATT_PREPARE_WRITE_RSP,
            ATT_EXECUTE_WRITE_REQ => ATT_EXECUTE_WRITE_RSP,
            ATT_READ_MULTIPLE_VARIABLE_REQ => ATT_READ_MULTIPLE_VARIABLE_RSP,
            _ => return None,
        };
        Some(rsp)
    }

    /// The request opcode this response answers
    pub fn request_opcode(self) -> Option<u8> {
        let req = match self.0 {
            ATT_EXCHANGE_MTU_RSP => ATT_EXCHANGE_MTU_REQ,
            ATT_FIND_INFO_RSP => ATT_FIND_INFO_REQ,
            ATT_FIND_BY_TYPE_VALUE_RSP => ATT_FIND_BY_TYPE_VALUE_REQ,
            ATT_READ_BY_TYPE_RSP => ATT_READ_BY_TYPE_REQ,
            ATT_READ_RSP => ATT_READ_REQ,
            ATT_READ_BLOB_RSP => ATT_READ_BLOB_REQ,
            ATT_READ_MULTIPLE_RSP => ATT_READ_MULTIPLE_REQ,
            ATT_READ_BY_GROUP_TYPE_RSP => ATT_READ_BY_GROUP_TYPE_REQ,
            ATT_WRITE_RSP => ATT_WRITE_REQ,
            ATT_PREPARE_WRITE_RSP => ATT_PREPARE_WRITE_REQ,
            ATT_EXECUTE_WRITE_RSP => ATT_EXECUTE_WRITE_REQ,
            ATT_READ_MULTIPLE_VARIABLE_RSP => ATT_READ_MULTIPLE_VARIABLE_REQ,
            _ => return None,
        };
        Some(req)
    }
}

impl From<u8> for Opcode {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

/// Parsed ATT Error Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Opcode of the request that failed
    pub request_opcode: u8,
    /// Attribute handle in error
    pub handle: u16,
    /// Error code
    pub code: AttErrorCode,
}

impl ErrorResponse {
    /// Parse a complete Error Response PDU, opcode included
    pub fn parse(pdu: &[u8]) -> Option<Self> {
        if pdu.len() != ATT_ERROR_RSP_LEN || pdu[0] != ATT_ERROR_RSP {
            return None;
        }

        Some(Self {
            request_opcode: pdu[1],
            handle: LittleEndian::read_u16(&pdu[2..4]),
            code: AttErrorCode::from(pdu[4]),
        })
    }
}

/// Read the rx MTU carried by an Exchange MTU request or response PDU
pub fn parse_exchange_mtu(pdu: &[u8]) -> Option<u16> {
    if pdu.len() < ATT_EXCHANGE_MTU_LEN {
        return None;
    }
    Some(LittleEndian::read_u16(&pdu[1..3]))
}
