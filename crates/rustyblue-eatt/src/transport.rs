//! Channel transport seam
//!
//! The L2CAP layer underneath the bearers is an external collaborator. It is
//! reached through [`ChannelTransport`] for outbound operations, and it calls
//! back into [`EattManager`](crate::eatt::EattManager) for inbound frames,
//! credit grants and channel lifecycle changes.

use crate::eatt::types::{BearerId, BearerRole, ConnHandle};
use thiserror::Error;

/// Failures reported by the channel transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Channel open rejected: {0}")]
    OpenRejected(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Link disconnected")]
    LinkDisconnected,

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Outbound half of the L2CAP channel layer
pub trait ChannelTransport: Send + Sync {
    /// Start opening a channel for `role`. The returned id is the channel's
    /// local CID; the legacy role always maps to the fixed ATT channel. The
    /// channel is usable once `on_channel_connected` is delivered for it.
    fn open_channel(&self, conn: ConnHandle, role: BearerRole) -> Result<BearerId, TransportError>;

    /// Start closing a channel. Completion is reported by `on_channel_disconnected`.
    fn close_channel(&self, conn: ConnHandle, bearer: BearerId) -> Result<(), TransportError>;

    /// Transmit one complete ATT PDU on a channel
    fn send(&self, conn: ConnHandle, bearer: BearerId, pdu: &[u8]) -> Result<(), TransportError>;

    /// Tear down the whole link, used when the legacy bearer desynchronizes
    fn disconnect_link(&self, conn: ConnHandle) -> Result<(), TransportError>;
}
