//! Inbound PDU routing
//!
//! A frame is matched against the exchange outstanding on the bearer it
//! arrived on. Anything that does not fit what the bearer is waiting for is a
//! protocol violation.

use super::bearer::Bearer;
use super::exchange::{ExchangeKind, Resolution};
use super::pool::BearerPool;
use super::types::{BearerId, ConnHandle};
use crate::att::opcode::parse_exchange_mtu;
use crate::att::{ErrorResponse, Opcode, OpcodeClass, ATT_DEFAULT_MTU};
use log::{debug, trace, warn};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// PDU handed to the upper layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPdu {
    pub conn: ConnHandle,
    /// Bearer the PDU arrived on; a response to a request must go back on it
    pub bearer: BearerId,
    pub opcode: u8,
    /// Parameters following the opcode
    pub payload: Vec<u8>,
}

/// Callback for inbound requests, commands, notifications and indications
pub type InboundCallback = Arc<Mutex<dyn FnMut(&InboundPdu) + Send + 'static>>;

/// Upper-layer sink shared by every connection of a manager
#[derive(Default)]
pub(crate) struct InboundSink {
    callback: RwLock<Option<InboundCallback>>,
}

impl InboundSink {
    pub(crate) fn set(&self, callback: InboundCallback) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub(crate) fn clear(&self) {
        *self.callback.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn deliver(&self, pdu: &InboundPdu) {
        let callback = self
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match callback {
            Some(callback) => {
                let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
                (*callback)(pdu);
            }
            None => debug!(
                "No inbound handler, dropping opcode {:#04x} from {}",
                pdu.opcode, pdu.bearer
            ),
        }
    }
}

/// What the connection has to do after routing a frame
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Routed {
    /// Outstanding exchange resolved
    Resolved,
    /// Hand to the upper layer
    Deliver(InboundPdu),
    /// Hand to the upper layer, then confirm on the same bearer
    DeliverAndConfirm(InboundPdu),
    /// Bearer is out of sync with the peer
    Violation(String),
    /// Frame could not be parsed; the bearer is out of sync as well
    Malformed(String),
    /// Bearer unknown or not connected
    Dropped,
}

pub(crate) fn route(pool: &mut BearerPool, conn: ConnHandle, id: BearerId, pdu: &[u8]) -> Routed {
    let Some(bearer) = pool.bearer_by_id_mut(id) else {
        warn!("{} {}: frame for unknown bearer dropped", conn, id);
        return Routed::Dropped;
    };

    if !bearer.is_connected() {
        debug!("{} {}: frame in state {:?} dropped", conn, id, bearer.state());
        return Routed::Dropped;
    }

    let Some(&opcode) = pdu.first() else {
        return Routed::Malformed("empty PDU".into());
    };

    let inbound = || InboundPdu {
        conn,
        bearer: id,
        opcode,
        payload: pdu[1..].to_vec(),
    };

    match Opcode::new(opcode).class() {
        OpcodeClass::Response => resolve_response(bearer, opcode, pdu),
        OpcodeClass::ErrorResponse => match ErrorResponse::parse(pdu) {
            Some(rsp) => resolve_error(bearer, rsp),
            None => Routed::Malformed(format!("error response of {} bytes", pdu.len())),
        },
        OpcodeClass::Confirmation => resolve_confirmation(bearer, pdu),
        OpcodeClass::Request => match bearer.tracker_mut().begin_peer_request(opcode) {
            Ok(()) => Routed::Deliver(inbound()),
            Err(err) => Routed::Violation(err.to_string()),
        },
        OpcodeClass::Indication => match bearer.tracker_mut().owe_confirmation() {
            Ok(()) => Routed::DeliverAndConfirm(inbound()),
            Err(err) => Routed::Violation(err.to_string()),
        },
        OpcodeClass::Command | OpcodeClass::Notification => Routed::Deliver(inbound()),
        OpcodeClass::Unknown => {
            warn!("{} {}: unknown opcode {:#04x} dropped", conn, id, opcode);
            Routed::Dropped
        }
    }
}

fn outstanding(bearer: &Bearer) -> Option<(ExchangeKind, u8, Option<u16>)> {
    bearer
        .tracker()
        .pending()
        .map(|exchange| (exchange.kind(), exchange.opcode(), exchange.client_mtu()))
}

fn resolve_response(bearer: &mut Bearer, opcode: u8, pdu: &[u8]) -> Routed {
    match outstanding(bearer) {
        Some((ExchangeKind::Request, request, client_mtu))
            if Opcode::new(request).response_opcode() == Some(opcode) =>
        {
            bearer.resolve(Resolution::Completed(pdu.to_vec()));

            if let (Some(client), Some(server)) = (client_mtu, parse_exchange_mtu(pdu)) {
                bearer.set_mtu(client.min(server).max(ATT_DEFAULT_MTU));
            }
            trace!("{}: response {:#04x} matched request {:#04x}", bearer.id(), opcode, request);
            Routed::Resolved
        }
        Some((kind, request, _)) => Routed::Violation(format!(
            "response {:#04x} does not match outstanding {:?} {:#04x}",
            opcode, kind, request
        )),
        None => Routed::Violation(format!("unsolicited response {:#04x}", opcode)),
    }
}

fn resolve_error(bearer: &mut Bearer, rsp: ErrorResponse) -> Routed {
    match outstanding(bearer) {
        Some((ExchangeKind::Request, request, _)) if request == rsp.request_opcode => {
            debug!(
                "{}: request {:#04x} failed with {:?} on handle {:#06x}",
                bearer.id(),
                request,
                rsp.code,
                rsp.handle
            );
            bearer.resolve(Resolution::ErrorResponse(rsp));
            Routed::Resolved
        }
        Some((kind, request, _)) => Routed::Violation(format!(
            "error response for {:#04x} while {:?} {:#04x} is outstanding",
            rsp.request_opcode, kind, request
        )),
        None => Routed::Violation(format!(
            "unsolicited error response for {:#04x}",
            rsp.request_opcode
        )),
    }
}

fn resolve_confirmation(bearer: &mut Bearer, pdu: &[u8]) -> Routed {
    match outstanding(bearer) {
        Some((ExchangeKind::Indication, _, _)) => {
            bearer.resolve(Resolution::Completed(pdu.to_vec()));
            Routed::Resolved
        }
        Some((kind, request, _)) => Routed::Violation(format!(
            "confirmation while {:?} {:#04x} is outstanding",
            kind, request
        )),
        None => Routed::Violation("unsolicited confirmation".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::*;
    use crate::eatt::exchange::{ExchangeId, ExchangeOutcome, PendingExchange};
    use crate::eatt::types::BearerRole;
    use crate::error::EattError;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    const CONN: ConnHandle = ConnHandle(9);
    const EATT: BearerId = BearerId(0x40);

    fn pool() -> BearerPool {
        let mut legacy = Bearer::open(CONN, BearerId::LEGACY, BearerRole::Legacy);
        legacy.mark_connected(23, 23, 0);
        let mut pool = BearerPool::new(legacy, 2);
        let mut enhanced = Bearer::open(CONN, EATT, BearerRole::Enhanced);
        enhanced.mark_connected(64, 64, 4);
        pool.add(enhanced).unwrap();
        pool
    }

    fn install(
        pool: &mut BearerPool,
        id: BearerId,
        kind: ExchangeKind,
        pdu: &[u8],
    ) -> Receiver<ExchangeOutcome> {
        let (exchange, rx) =
            PendingExchange::new(ExchangeId(1), id, kind, pdu, Duration::from_secs(30));
        pool.bearer_by_id_mut(id).unwrap().submit(exchange).unwrap();
        rx
    }

    #[test]
    fn test_response_resolves_on_its_bearer_only() {
        let mut pool = pool();
        let rx = install(&mut pool, EATT, ExchangeKind::Request, &[ATT_READ_REQ, 0x05, 0x00]);

        // Same response on the other bearer is unsolicited there
        assert!(matches!(
            route(&mut pool, CONN, BearerId::LEGACY, &[ATT_READ_RSP, 1]),
            Routed::Violation(_)
        ));
        assert!(rx.try_recv().is_err());

        assert_eq!(route(&mut pool, CONN, EATT, &[ATT_READ_RSP, 1, 2]), Routed::Resolved);
        let outcome = rx.recv().unwrap();
        assert_eq!(outcome.resolution, Resolution::Completed(vec![ATT_READ_RSP, 1, 2]));
        assert!(!pool.bearer_by_id(EATT).unwrap().has_pending());
    }

    #[test]
    fn test_mismatched_response_is_violation() {
        let mut pool = pool();
        let _rx = install(&mut pool, EATT, ExchangeKind::Request, &[ATT_READ_REQ, 0x05, 0x00]);
        assert!(matches!(
            route(&mut pool, CONN, EATT, &[ATT_WRITE_RSP]),
            Routed::Violation(_)
        ));
        assert!(matches!(
            route(&mut pool, CONN, EATT, &[ATT_HANDLE_VALUE_CONF]),
            Routed::Violation(_)
        ));
    }

    #[test]
    fn test_error_response() {
        let mut pool = pool();
        let rx = install(&mut pool, EATT, ExchangeKind::Request, &[ATT_WRITE_REQ, 0x05, 0x00, 0x01]);

        let wrong = [ATT_ERROR_RSP, ATT_READ_REQ, 0x05, 0x00, ATT_ERROR_INVALID_HANDLE];
        assert!(matches!(route(&mut pool, CONN, EATT, &wrong), Routed::Violation(_)));
        assert!(matches!(
            route(&mut pool, CONN, EATT, &[ATT_ERROR_RSP, ATT_WRITE_REQ]),
            Routed::Malformed(_)
        ));

        let pdu = [ATT_ERROR_RSP, ATT_WRITE_REQ, 0x05, 0x00, ATT_ERROR_WRITE_NOT_PERMITTED];
        assert_eq!(route(&mut pool, CONN, EATT, &pdu), Routed::Resolved);
        match rx.recv().unwrap().into_result() {
            Err(EattError::Att { request_opcode, handle, code }) => {
                assert_eq!(request_opcode, ATT_WRITE_REQ);
                assert_eq!(handle, 0x0005);
                assert_eq!(code, AttErrorCode::WriteNotPermitted);
            }
            other => panic!("Expected ATT error, got {:?}", other),
        }
    }

    #[test]
    fn test_confirmation_matches_indication() {
        let mut pool = pool();
        let rx = install(
            &mut pool,
            EATT,
            ExchangeKind::Indication,
            &[ATT_HANDLE_VALUE_IND, 0x10, 0x00, 0xFF],
        );
        assert_eq!(route(&mut pool, CONN, EATT, &[ATT_HANDLE_VALUE_CONF]), Routed::Resolved);
        assert!(rx.recv().unwrap().is_success());
    }

    #[test]
    fn test_mtu_response_updates_legacy_mtu() {
        let mut pool = pool();
        let _rx = install(
            &mut pool,
            BearerId::LEGACY,
            ExchangeKind::Request,
            &[ATT_EXCHANGE_MTU_REQ, 0xF7, 0x00],
        );
        assert_eq!(
            route(&mut pool, CONN, BearerId::LEGACY, &[ATT_EXCHANGE_MTU_RSP, 0x9E, 0x00]),
            Routed::Resolved
        );
        assert_eq!(pool.legacy().unwrap().mtu(), 158);
    }

    #[test]
    fn test_inbound_traffic() {
        let mut pool = pool();
        let ntf = [ATT_HANDLE_VALUE_NTF, 0x10, 0x00, 0x01];
        assert!(matches!(route(&mut pool, CONN, EATT, &ntf), Routed::Deliver(_)));

        let ind = [ATT_HANDLE_VALUE_IND, 0x10, 0x00, 0x01];
        match route(&mut pool, CONN, EATT, &ind) {
            Routed::DeliverAndConfirm(pdu) => {
                assert_eq!(pdu.bearer, EATT);
                assert_eq!(pdu.opcode, ATT_HANDLE_VALUE_IND);
            }
            other => panic!("Expected DeliverAndConfirm, got {:?}", other),
        }
        // Peer must wait for our confirmation
        assert!(matches!(route(&mut pool, CONN, EATT, &ind), Routed::Violation(_)));

        let req = [ATT_READ_REQ, 0x03, 0x00];
        assert!(matches!(route(&mut pool, CONN, BearerId::LEGACY, &req), Routed::Deliver(_)));
        assert!(matches!(
            route(&mut pool, CONN, BearerId::LEGACY, &req),
            Routed::Violation(_)
        ));
    }

    #[test]
    fn test_dropped_frames() {
        let mut pool = pool();
        assert_eq!(route(&mut pool, CONN, BearerId(0x77), &[ATT_READ_RSP]), Routed::Dropped);
        assert_eq!(route(&mut pool, CONN, EATT, &[0x3F]), Routed::Dropped);
        assert!(matches!(route(&mut pool, CONN, EATT, &[]), Routed::Malformed(_)));
    }
}
