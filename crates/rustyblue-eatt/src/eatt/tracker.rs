//! Per-bearer exchange slot
//!
//! ATT allows one outstanding request or indication per bearer in each
//! direction. The outbound slot holds our own exchange; the inbound side
//! remembers the peer's request awaiting our response and an indication we
//! still owe a confirmation for.

use super::exchange::{ExchangeId, PendingExchange};
use crate::error::{EattError, EattResult};
use std::time::Instant;

#[derive(Debug, Default)]
pub(crate) struct RequestTracker {
    slot: Option<PendingExchange>,
    /// Opcode of the peer request we have not answered yet
    peer_request: Option<u8>,
    /// Peer indication received, confirmation not sent yet
    confirmation_owed: bool,
}

impl RequestTracker {
    pub(crate) fn is_idle(&self) -> bool {
        self.slot.is_none()
    }

    pub(crate) fn pending(&self) -> Option<&PendingExchange> {
        self.slot.as_ref()
    }

    pub(crate) fn install(&mut self, exchange: PendingExchange) -> EattResult<()> {
        if self.slot.is_some() {
            return Err(EattError::BearerBusy);
        }
        self.slot = Some(exchange);
        Ok(())
    }

    pub(crate) fn take(&mut self) -> Option<PendingExchange> {
        self.slot.take()
    }

    /// Take the pending exchange only if it is `id`
    pub(crate) fn take_if(&mut self, id: ExchangeId) -> Option<PendingExchange> {
        if self.slot.as_ref().is_some_and(|exchange| exchange.id() == id) {
            self.slot.take()
        } else {
            None
        }
    }

    pub(crate) fn take_overdue(&mut self, now: Instant) -> Option<PendingExchange> {
        if self.slot.as_ref().is_some_and(|exchange| exchange.is_overdue(now)) {
            self.slot.take()
        } else {
            None
        }
    }

    pub(crate) fn peer_request(&self) -> Option<u8> {
        self.peer_request
    }

    pub(crate) fn begin_peer_request(&mut self, opcode: u8) -> EattResult<()> {
        if let Some(outstanding) = self.peer_request {
            return Err(EattError::ProtocolViolation(format!(
                "request {:#04x} received while {:#04x} is unanswered",
                opcode, outstanding
            )));
        }
        self.peer_request = Some(opcode);
        Ok(())
    }

    pub(crate) fn finish_peer_request(&mut self) -> Option<u8> {
        self.peer_request.take()
    }

    pub(crate) fn owe_confirmation(&mut self) -> EattResult<()> {
        if self.confirmation_owed {
            return Err(EattError::ProtocolViolation(
                "indication received before the previous one was confirmed".into(),
            ));
        }
        self.confirmation_owed = true;
        Ok(())
    }

    pub(crate) fn confirmation_owed(&self) -> bool {
        self.confirmation_owed
    }

    pub(crate) fn clear_confirmation(&mut self) {
        self.confirmation_owed = false;
    }

    /// Forget inbound state, used on disconnect
    pub(crate) fn reset_peer_state(&mut self) {
        self.peer_request = None;
        self.confirmation_owed = false;
    }
}
