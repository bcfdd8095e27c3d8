//! Exchanges and their single resolution
//!
//! A [`PendingExchange`] owns the sending half of a one-shot channel and is
//! consumed by [`PendingExchange::resolve`], so it can be resolved at most once.
//! The [`ExchangeHandle`] returned to the submitter owns the receiving half.

use super::connection::Connection;
use super::types::BearerId;
use crate::att::opcode::{parse_exchange_mtu, ErrorResponse};
use crate::att::ATT_EXCHANGE_MTU_REQ;
use crate::error::{EattError, EattResult};
use crate::transport::TransportError;
use log::{debug, trace};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Weak;
use std::time::{Duration, Instant};

/// Connection-local exchange sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(pub u64);

/// What the exchange waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Request awaiting a response or error response
    Request,
    /// Indication awaiting a confirmation
    Indication,
}

/// How an exchange ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Matching response or confirmation, opcode included
    Completed(Vec<u8>),
    /// Peer answered with an Error Response
    ErrorResponse(ErrorResponse),
    /// No answer before the deadline
    TimedOut,
    /// Bearer went away first
    BearerLost,
    /// Bearer desynchronized while the exchange was outstanding
    ProtocolViolation(String),
    /// The PDU could not be handed to the transport
    TransportFailed(TransportError),
}

/// Resolution event delivered to the submitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub id: ExchangeId,
    pub bearer: BearerId,
    pub kind: ExchangeKind,
    pub opcode: u8,
    pub resolution: Resolution,
}

impl ExchangeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.resolution, Resolution::Completed(_))
    }

    /// Answer PDU on success, the matching error otherwise
    pub fn into_result(self) -> EattResult<Vec<u8>> {
        match self.resolution {
            Resolution::Completed(pdu) => Ok(pdu),
            Resolution::ErrorResponse(rsp) => Err(EattError::Att {
                request_opcode: rsp.request_opcode,
                handle: rsp.handle,
                code: rsp.code,
            }),
            Resolution::TimedOut => Err(EattError::ExchangeTimedOut),
            Resolution::BearerLost => Err(EattError::BearerLost),
            Resolution::ProtocolViolation(reason) => Err(EattError::ProtocolViolation(reason)),
            Resolution::TransportFailed(err) => Err(EattError::Transport(err)),
        }
    }
}

/// Exchange installed in a bearer's slot
#[derive(Debug)]
pub(crate) struct PendingExchange {
    id: ExchangeId,
    bearer: BearerId,
    kind: ExchangeKind,
    opcode: u8,
    submitted_at: Instant,
    deadline: Instant,
    /// Client rx MTU, set for Exchange MTU requests
    client_mtu: Option<u16>,
    completion: Sender<ExchangeOutcome>,
}

impl PendingExchange {
    pub(crate) fn new(
        id: ExchangeId,
        bearer: BearerId,
        kind: ExchangeKind,
        pdu: &[u8],
        timeout: Duration,
    ) -> (Self, Receiver<ExchangeOutcome>) {
        let (completion, receiver) = mpsc::channel();
        let opcode = pdu.first().copied().unwrap_or_default();
        let client_mtu = if opcode == ATT_EXCHANGE_MTU_REQ {
            parse_exchange_mtu(pdu)
        } else {
            None
        };
        let submitted_at = Instant::now();

        let exchange = Self {
            id,
            bearer,
            kind,
            opcode,
            submitted_at,
            deadline: submitted_at + timeout,
            client_mtu,
            completion,
        };
        (exchange, receiver)
    }

    pub(crate) fn id(&self) -> ExchangeId {
        self.id
    }

    pub(crate) fn kind(&self) -> ExchangeKind {
        self.kind
    }

    pub(crate) fn opcode(&self) -> u8 {
        self.opcode
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }

    pub(crate) fn client_mtu(&self) -> Option<u16> {
        self.client_mtu
    }

    pub(crate) fn is_overdue(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Deliver the resolution to the submitter
    pub(crate) fn resolve(self, resolution: Resolution) {
        trace!(
            "Exchange {:?} (opcode {:#04x}) on {} resolved after {:?}: {:?}",
            self.id,
            self.opcode,
            self.bearer,
            self.submitted_at.elapsed(),
            resolution
        );

        let outcome = ExchangeOutcome {
            id: self.id,
            bearer: self.bearer,
            kind: self.kind,
            opcode: self.opcode,
            resolution,
        };

        if self.completion.send(outcome).is_err() {
            debug!("Exchange {:?} resolved after its handle was dropped", self.id);
        }
    }
}

/// Submitter's side of an exchange
pub struct ExchangeHandle {
    id: ExchangeId,
    bearer: BearerId,
    kind: ExchangeKind,
    deadline: Instant,
    receiver: Receiver<ExchangeOutcome>,
    outcome: Option<ExchangeOutcome>,
    connection: Weak<Connection>,
}

impl ExchangeHandle {
    pub(crate) fn new(
        id: ExchangeId,
        bearer: BearerId,
        kind: ExchangeKind,
        deadline: Instant,
        receiver: Receiver<ExchangeOutcome>,
        connection: Weak<Connection>,
    ) -> Self {
        Self {
            id,
            bearer,
            kind,
            deadline,
            receiver,
            outcome: None,
            connection,
        }
    }

    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Bearer the exchange was placed on
    pub fn bearer(&self) -> BearerId {
        self.bearer
    }

    pub fn kind(&self) -> ExchangeKind {
        self.kind
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Non-blocking check for the resolution
    pub fn try_outcome(&mut self) -> Option<&ExchangeOutcome> {
        if self.outcome.is_none() {
            match self.receiver.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.outcome = Some(self.lost()),
            }
        }
        self.outcome.as_ref()
    }

    pub fn is_resolved(&mut self) -> bool {
        self.try_outcome().is_some()
    }

    /// Block until the exchange resolves.
    ///
    /// Once the deadline passes the exchange is expired through its
    /// connection, so the resolution still comes from the engine, and a
    /// response racing the deadline wins if it got there first.
    pub fn wait(mut self) -> ExchangeOutcome {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }

        loop {
            let now = Instant::now();
            if now < self.deadline {
                match self.receiver.recv_timeout(self.deadline - now) {
                    Ok(outcome) => return outcome,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => return self.lost(),
                }
            }

            if let Some(connection) = self.connection.upgrade() {
                connection.expire_exchange(self.bearer, self.id);
            }
            return match self.receiver.recv() {
                Ok(outcome) => outcome,
                Err(_) => self.lost(),
            };
        }
    }

    /// Block until resolution and convert it into a result
    pub fn wait_result(self) -> EattResult<Vec<u8>> {
        self.wait().into_result()
    }

    // The sender only disappears unsent when its connection was dropped.
    fn lost(&self) -> ExchangeOutcome {
        ExchangeOutcome {
            id: self.id,
            bearer: self.bearer,
            kind: self.kind,
            opcode: 0,
            resolution: Resolution::BearerLost,
        }
    }
}

impl std::fmt::Debug for ExchangeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeHandle")
            .field("id", &self.id)
            .field("bearer", &self.bearer)
            .field("kind", &self.kind)
            .field("resolved", &self.outcome.is_some())
            .finish()
    }
}
