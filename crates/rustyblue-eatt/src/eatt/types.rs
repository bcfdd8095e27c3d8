//! Identifiers and small value types shared by the EATT modules

use crate::att::ATT_CID;
use std::fmt;

/// HCI handle of an LE connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnHandle(pub u16);

impl fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn {:#06x}", self.0)
    }
}

/// Local channel identifier of a bearer, unique within its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BearerId(pub u16);

impl BearerId {
    /// The fixed ATT channel
    pub const LEGACY: BearerId = BearerId(ATT_CID);
}

impl fmt::Display for BearerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cid {:#06x}", self.0)
    }
}

/// Which kind of channel a bearer rides on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BearerRole {
    /// Fixed ATT channel, exactly one per connection
    Legacy,
    /// L2CAP enhanced credit-based channel
    Enhanced,
}

/// Bearer connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerState {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

/// Restricts which bearers an eligibility scan yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleFilter {
    #[default]
    Any,
    Legacy,
    Enhanced,
}

impl RoleFilter {
    pub fn matches(self, role: BearerRole) -> bool {
        match self {
            RoleFilter::Any => true,
            RoleFilter::Legacy => role == BearerRole::Legacy,
            RoleFilter::Enhanced => role == BearerRole::Enhanced,
        }
    }
}

/// Bearer placement hint for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affinity {
    /// First eligible bearer in creation order
    #[default]
    Any,
    /// Only the legacy bearer
    Legacy,
    /// Any enhanced bearer
    Enhanced,
    /// This exact bearer
    Bearer(BearerId),
}
