//! Attribute Protocol (ATT) definitions
//!
//! Only the parts of ATT the bearer multiplexer needs: opcode values and
//! families, the error code table and the two fixed-layout PDUs it inspects.

pub mod constants;
pub mod error;
pub mod opcode;

pub use self::constants::*;
pub use self::error::AttErrorCode;
pub use self::opcode::{ErrorResponse, Opcode, OpcodeClass, OpcodeFlags};
