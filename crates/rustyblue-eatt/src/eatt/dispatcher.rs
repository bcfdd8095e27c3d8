//! Bearer selection for outbound work
//!
//! Selection is a pure function of the pool. The connection holds its lock
//! across selection and installation so the chosen bearer cannot be taken by a
//! concurrent submission in between.

use super::bearer::Bearer;
use super::exchange::ExchangeKind;
use super::pool::BearerPool;
use super::types::{Affinity, BearerId, BearerRole, RoleFilter};
use crate::att::{Opcode, OpcodeClass, ATT_EXCHANGE_MTU_REQ, ATT_HANDLE_VALUE_IND};
use crate::error::{EattError, EattResult};
use log::trace;

/// Outbound work submitted by the upper layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub kind: ExchangeKind,
    pub opcode: u8,
    /// Parameters following the opcode
    pub payload: Vec<u8>,
    pub affinity: Affinity,
}

impl ExchangeRequest {
    pub fn request(opcode: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ExchangeKind::Request,
            opcode,
            payload: payload.into(),
            affinity: Affinity::Any,
        }
    }

    pub fn indication(opcode: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ExchangeKind::Indication,
            opcode,
            payload: payload.into(),
            affinity: Affinity::Any,
        }
    }

    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }

    /// Complete PDU, opcode first
    pub(crate) fn pdu(&self) -> Vec<u8> {
        let mut pdu = Vec::with_capacity(1 + self.payload.len());
        pdu.push(self.opcode);
        pdu.extend_from_slice(&self.payload);
        pdu
    }

    /// Check the opcode fits the kind and resolve protocol-mandated pinning
    pub(crate) fn effective_affinity(&self) -> EattResult<Affinity> {
        let class = Opcode::new(self.opcode).class();
        match self.kind {
            ExchangeKind::Request if class != OpcodeClass::Request => {
                return Err(EattError::InvalidParameter(format!(
                    "opcode {:#04x} is not a request",
                    self.opcode
                )));
            }
            ExchangeKind::Indication if self.opcode != ATT_HANDLE_VALUE_IND => {
                return Err(EattError::InvalidParameter(format!(
                    "opcode {:#04x} is not an indication",
                    self.opcode
                )));
            }
            _ => {}
        }

        // MTU exchange is only defined on the fixed channel
        if self.opcode == ATT_EXCHANGE_MTU_REQ {
            return match self.affinity {
                Affinity::Any | Affinity::Legacy | Affinity::Bearer(BearerId::LEGACY) => {
                    Ok(Affinity::Legacy)
                }
                other => Err(EattError::InvalidParameter(format!(
                    "MTU exchange cannot use {:?}",
                    other
                ))),
            };
        }

        Ok(self.affinity)
    }
}

/// Result of one selection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    /// Bearer that can take the exchange now
    Selected(BearerId),
    /// Candidates exist but none is eligible at the moment
    Busy,
    /// The pinned bearer does not exist or is not connected
    Unavailable,
}

pub(crate) fn is_pinned(affinity: Affinity) -> bool {
    matches!(affinity, Affinity::Legacy | Affinity::Bearer(_))
}

fn role_filter(affinity: Affinity) -> RoleFilter {
    match affinity {
        Affinity::Any | Affinity::Bearer(_) => RoleFilter::Any,
        Affinity::Legacy => RoleFilter::Legacy,
        Affinity::Enhanced => RoleFilter::Enhanced,
    }
}

/// Pick the bearer for a request-style exchange of `pdu_len` bytes.
///
/// The first eligible bearer in creation order whose MTU fits wins. When no
/// connected candidate could ever carry the PDU the call fails with
/// `PayloadTooLarge`.
pub(crate) fn select_for_exchange(
    pool: &BearerPool,
    affinity: Affinity,
    pdu_len: usize,
) -> EattResult<Selection> {
    if let Some(selection) = precheck(pool, affinity, pdu_len)? {
        return Ok(selection);
    }

    let chosen = pool
        .for_each_eligible(role_filter(affinity))
        .find(|b| targets(affinity, b) && fits(b, pdu_len));
    Ok(selected(chosen, pdu_len))
}

/// Pick the bearer for a command or notification: no slot needed, only a
/// connected bearer with a credit.
pub(crate) fn select_for_command(
    pool: &BearerPool,
    affinity: Affinity,
    pdu_len: usize,
) -> EattResult<Selection> {
    if let Some(selection) = precheck(pool, affinity, pdu_len)? {
        return Ok(selection);
    }

    let chosen = pool
        .iter()
        .find(|b| targets(affinity, b) && b.can_transmit() && fits(b, pdu_len));
    Ok(selected(chosen, pdu_len))
}

fn targets(affinity: Affinity, bearer: &Bearer) -> bool {
    match affinity {
        Affinity::Bearer(id) => bearer.id() == id,
        _ => role_filter(affinity).matches(bearer.role()),
    }
}

fn fits(bearer: &Bearer, pdu_len: usize) -> bool {
    pdu_len <= bearer.mtu() as usize
}

/// Outcome decided before looking at eligibility: nothing connected to
/// choose from, or a PDU no connected candidate can carry
fn precheck(pool: &BearerPool, affinity: Affinity, pdu_len: usize) -> EattResult<Option<Selection>> {
    let largest = pool
        .iter()
        .filter(|b| targets(affinity, b) && b.is_connected())
        .map(Bearer::mtu)
        .max();

    match largest {
        None if is_pinned(affinity) => Ok(Some(Selection::Unavailable)),
        None => Ok(Some(Selection::Busy)),
        Some(mtu) if pdu_len > mtu as usize => Err(EattError::PayloadTooLarge { len: pdu_len, mtu }),
        Some(_) => Ok(None),
    }
}

fn selected(chosen: Option<&Bearer>, pdu_len: usize) -> Selection {
    match chosen {
        Some(bearer) => {
            trace!(
                "Selected {} ({:?}, credits {}) for {} byte PDU",
                bearer.id(),
                bearer.role(),
                bearer.credits(),
                pdu_len
            );
            Selection::Selected(bearer.id())
        }
        None => Selection::Busy,
    }
}

/// Error to report for a busy selection under the fail-fast policy
pub(crate) fn exhausted_error(affinity: Affinity) -> EattError {
    if is_pinned(affinity) {
        EattError::BearerUnavailable
    } else {
        EattError::NoBearerAvailable
    }
}

/// Role a pinned affinity refers to, used for log context
pub(crate) fn pinned_role(affinity: Affinity) -> Option<BearerRole> {
    match affinity {
        Affinity::Legacy | Affinity::Bearer(BearerId::LEGACY) => Some(BearerRole::Legacy),
        Affinity::Bearer(_) => Some(BearerRole::Enhanced),
        _ => None,
    }
}
