//! ATT bearer
//!
//! One flow-controlled channel of a connection: the fixed legacy channel or an
//! enhanced credit-based channel. Each bearer carries its own exchange slot.

use super::exchange::{ExchangeId, PendingExchange, Resolution};
use super::tracker::RequestTracker;
use super::types::{BearerId, BearerRole, BearerState, ConnHandle};
use crate::att::ATT_DEFAULT_MTU;
use crate::error::{EattError, EattResult};
use log::{debug, warn};
use std::fmt;
use std::time::Instant;

/// Public view of a bearer handed to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerInfo {
    /// Connection the bearer belongs to
    pub conn: ConnHandle,
    pub bearer: BearerId,
    pub role: BearerRole,
    pub mtu: u16,
}

/// Point-in-time bearer state, for queries and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerStatus {
    pub info: BearerInfo,
    pub state: BearerState,
    pub mps: u16,
    /// Transmit credits, always zero for the legacy bearer
    pub credits: u16,
    /// Opcode of the outstanding exchange, if any
    pub pending_opcode: Option<u8>,
}

pub struct Bearer {
    id: BearerId,
    conn: ConnHandle,
    role: BearerRole,
    state: BearerState,
    /// Maximum Transmission Unit
    mtu: u16,
    /// Maximum PDU payload size
    mps: u16,
    /// Transmit credits (enhanced bearers only)
    credits: u16,
    tracker: RequestTracker,
    opened_at: Instant,
}

impl Bearer {
    /// Allocate a bearer for a channel the transport is opening
    pub(crate) fn open(conn: ConnHandle, id: BearerId, role: BearerRole) -> Self {
        Self {
            id,
            conn,
            role,
            state: BearerState::Connecting,
            mtu: ATT_DEFAULT_MTU,
            mps: ATT_DEFAULT_MTU,
            credits: 0,
            tracker: RequestTracker::default(),
            opened_at: Instant::now(),
        }
    }

    pub fn id(&self) -> BearerId {
        self.id
    }

    pub fn role(&self) -> BearerRole {
        self.role
    }

    pub fn is_enhanced(&self) -> bool {
        self.role == BearerRole::Enhanced
    }

    pub fn state(&self) -> BearerState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == BearerState::Connected
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub(crate) fn set_mtu(&mut self, mtu: u16) {
        debug!("{} {} MTU {} -> {}", self.conn, self.id, self.mtu, mtu);
        self.mtu = mtu;
    }

    pub fn credits(&self) -> u16 {
        self.credits
    }

    pub fn info(&self) -> BearerInfo {
        BearerInfo {
            conn: self.conn,
            bearer: self.id,
            role: self.role,
            mtu: self.mtu,
        }
    }

    pub fn status(&self) -> BearerStatus {
        BearerStatus {
            info: self.info(),
            state: self.state,
            mps: self.mps,
            credits: self.credits,
            pending_opcode: self.tracker.pending().map(PendingExchange::opcode),
        }
    }

    /// `connecting -> connected`. Returns false, and leaves the bearer
    /// untouched, from any other state.
    pub(crate) fn mark_connected(&mut self, mtu: u16, mps: u16, initial_credits: u16) -> bool {
        if self.state != BearerState::Connecting {
            warn!(
                "{} {}: ignoring connect in state {:?}",
                self.conn, self.id, self.state
            );
            return false;
        }

        self.state = BearerState::Connected;
        self.mtu = mtu;
        self.mps = mps;
        if self.is_enhanced() {
            self.credits = initial_credits;
        }

        debug!(
            "{} {} connected after {:?} (mtu {}, mps {}, credits {})",
            self.conn,
            self.id,
            self.opened_at.elapsed(),
            self.mtu,
            self.mps,
            self.credits
        );
        true
    }

    /// `connected -> disconnecting`, cancelling any outstanding exchange
    pub(crate) fn mark_disconnecting(&mut self) -> bool {
        if self.state != BearerState::Connected {
            return false;
        }
        self.state = BearerState::Disconnecting;
        self.cancel(Resolution::BearerLost);
        true
    }

    /// Any state `-> disconnected`, cancelling any outstanding exchange
    pub(crate) fn mark_disconnected(&mut self) {
        self.state = BearerState::Disconnected;
        self.credits = 0;
        self.cancel(Resolution::BearerLost);
    }

    /// Resolve the outstanding exchange, if any, and forget peer-side state
    pub(crate) fn cancel(&mut self, resolution: Resolution) -> bool {
        self.tracker.reset_peer_state();
        match self.tracker.take() {
            Some(exchange) => {
                debug!(
                    "{} {}: cancelling exchange {:?} with {:?}",
                    self.conn,
                    self.id,
                    exchange.id(),
                    resolution
                );
                exchange.resolve(resolution);
                true
            }
            None => false,
        }
    }

    /// Connected with a free slot and, when enhanced, a credit to send with
    pub fn is_eligible_for_request(&self) -> bool {
        self.tracker.is_idle() && self.can_transmit()
    }

    /// Connected and able to put one PDU on the wire now
    pub fn can_transmit(&self) -> bool {
        self.is_connected() && (!self.is_enhanced() || self.credits >= 1)
    }

    pub fn has_pending(&self) -> bool {
        !self.tracker.is_idle()
    }

    pub(crate) fn submit(&mut self, exchange: PendingExchange) -> EattResult<()> {
        if !self.is_connected() {
            return Err(EattError::NotConnected);
        }
        self.tracker.install(exchange)
    }

    /// Resolve the outstanding exchange with `resolution`
    pub(crate) fn resolve(&mut self, resolution: Resolution) -> bool {
        match self.tracker.take() {
            Some(exchange) => {
                exchange.resolve(resolution);
                true
            }
            None => false,
        }
    }

    /// Resolve the outstanding exchange only if it is still `id`
    pub(crate) fn resolve_if(&mut self, id: ExchangeId, resolution: Resolution) -> bool {
        match self.tracker.take_if(id) {
            Some(exchange) => {
                exchange.resolve(resolution);
                true
            }
            None => false,
        }
    }

    pub(crate) fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut RequestTracker {
        &mut self.tracker
    }

    /// Apply a credit grant from the peer
    pub(crate) fn add_credits(&mut self, credits: u16) {
        if !self.is_enhanced() {
            warn!("{} {}: credit grant on the legacy bearer ignored", self.conn, self.id);
            return;
        }

        self.credits = self.credits.saturating_add(credits);
    }

    /// Give back a credit taken for a PDU the transport never sent
    pub(crate) fn refund_credit(&mut self) {
        if self.is_enhanced() {
            self.credits = self.credits.saturating_add(1);
        }
    }

    /// Take one credit for a PDU about to be transmitted
    pub(crate) fn consume_credit(&mut self) -> EattResult<()> {
        if !self.is_enhanced() {
            return Ok(());
        }

        if self.credits == 0 {
            return Err(EattError::NoBearerAvailable);
        }

        self.credits -= 1;
        Ok(())
    }
}

impl fmt::Debug for Bearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bearer")
            .field("id", &self.id)
            .field("conn", &self.conn)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("mtu", &self.mtu)
            .field("mps", &self.mps)
            .field("credits", &self.credits)
            .field("pending", &self.tracker.pending().map(PendingExchange::opcode))
            .finish()
    }
}
