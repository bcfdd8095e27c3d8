//! RustyBlue EATT - Enhanced ATT bearer multiplexing for Bluetooth LE
//!
//! This library runs ATT request/response and indication/confirmation
//! exchanges over several L2CAP bearers of one LE connection at once. It sits
//! between a GATT layer above and an L2CAP channel transport below, and it
//! never decodes attribute payloads.

pub mod att;
pub mod eatt;
pub mod error;
pub mod transport;

pub use error::{EattError, EattResult};
pub use eatt::{EattConfig, EattManager};
pub use transport::{ChannelTransport, TransportError};
