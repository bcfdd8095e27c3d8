//! Per-connection bearer engine
//!
//! A [`Connection`] owns the bearer pool of one LE link. All pool mutation
//! happens under a single mutex; transport calls and observer callbacks are
//! made after it is released.

use super::bearer::{Bearer, BearerStatus};
use super::config::{EattConfig, ExhaustionPolicy};
use super::demux::{self, InboundSink, Routed};
use super::dispatcher::{self, ExchangeRequest, Selection};
use super::exchange::{ExchangeHandle, ExchangeId, PendingExchange, Resolution};
use super::notifier::{BearerEvent, LifecycleNotifier};
use super::pool::BearerPool;
use super::types::{Affinity, BearerId, BearerRole, BearerState, ConnHandle};
use crate::att::{ErrorResponse, Opcode, OpcodeClass, ATT_HANDLE_VALUE_CONF};
use crate::error::{EattError, EattResult};
use crate::transport::{ChannelTransport, TransportError};
use log::{debug, error, info, trace, warn};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

struct Shared {
    pool: BearerPool,
    next_exchange: u64,
    closed: bool,
}

/// Bearers and exchanges of one LE connection
pub struct Connection {
    handle: ConnHandle,
    config: EattConfig,
    transport: Arc<dyn ChannelTransport>,
    notifier: Arc<LifecycleNotifier>,
    inbound: Arc<InboundSink>,
    shared: Mutex<Shared>,
    /// Signalled whenever a bearer may have become eligible
    bearer_ready: Condvar,
    me: Weak<Connection>,
}

impl Connection {
    /// Open the legacy bearer for a new link. It becomes usable once the
    /// transport reports the fixed channel connected.
    pub(crate) fn establish(
        handle: ConnHandle,
        config: EattConfig,
        transport: Arc<dyn ChannelTransport>,
        notifier: Arc<LifecycleNotifier>,
        inbound: Arc<InboundSink>,
    ) -> EattResult<Arc<Self>> {
        let legacy_id = transport.open_channel(handle, BearerRole::Legacy)?;
        if legacy_id != BearerId::LEGACY {
            warn!("{}: legacy bearer opened on unexpected {}", handle, legacy_id);
        }

        let pool = BearerPool::new(
            Bearer::open(handle, legacy_id, BearerRole::Legacy),
            config.max_enhanced_bearers,
        );
        info!(
            "{}: connection established (up to {} enhanced bearers)",
            handle, config.max_enhanced_bearers
        );

        Ok(Arc::new_cyclic(|me| Self {
            handle,
            config,
            transport,
            notifier,
            inbound,
            shared: Mutex::new(Shared {
                pool,
                next_exchange: 1,
                closed: false,
            }),
            bearer_ready: Condvar::new(),
            me: me.clone(),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handle(&self) -> ConnHandle {
        self.handle
    }

    pub fn config(&self) -> &EattConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Connected enhanced bearers
    pub fn enhanced_bearer_count(&self) -> usize {
        self.lock().pool.count_connected_enhanced()
    }

    pub fn bearer_status(&self, id: BearerId) -> Option<BearerStatus> {
        self.lock().pool.bearer_by_id(id).map(Bearer::status)
    }

    /// Snapshot of every bearer in creation order
    pub fn bearers(&self) -> Vec<BearerStatus> {
        self.lock().pool.iter().map(Bearer::status).collect()
    }

    /// Submit a request that expects a response
    pub fn submit_request(
        &self,
        opcode: u8,
        payload: impl Into<Vec<u8>>,
        affinity: Affinity,
    ) -> EattResult<ExchangeHandle> {
        self.dispatch(ExchangeRequest::request(opcode, payload).with_affinity(affinity))
    }

    /// Submit an indication that expects a confirmation. `payload` is the
    /// attribute handle followed by its value.
    pub fn submit_indication(
        &self,
        opcode: u8,
        payload: impl Into<Vec<u8>>,
        affinity: Affinity,
    ) -> EattResult<ExchangeHandle> {
        self.dispatch(ExchangeRequest::indication(opcode, payload).with_affinity(affinity))
    }

    /// Place an exchange on a bearer and transmit it
    pub fn dispatch(&self, request: ExchangeRequest) -> EattResult<ExchangeHandle> {
        let affinity = request.effective_affinity()?;
        let pdu = request.pdu();
        let started = Instant::now();

        let mut shared = self.lock();
        let bearer_id = loop {
            if shared.closed {
                return Err(EattError::NotConnected);
            }
            match dispatcher::select_for_exchange(&shared.pool, affinity, pdu.len())? {
                Selection::Selected(id) => break id,
                Selection::Unavailable => {
                    debug!(
                        "{}: pinned {:?} bearer unavailable for opcode {:#04x}",
                        self.handle,
                        dispatcher::pinned_role(affinity),
                        request.opcode
                    );
                    return Err(EattError::BearerUnavailable);
                }
                Selection::Busy => shared = self.wait_for_bearer(shared, affinity, started)?,
            }
        };

        let id = ExchangeId(shared.next_exchange);
        shared.next_exchange += 1;
        let (exchange, receiver) = PendingExchange::new(
            id,
            bearer_id,
            request.kind,
            &pdu,
            self.config.exchange_timeout,
        );
        let deadline = exchange.deadline();

        let bearer = shared
            .pool
            .bearer_by_id_mut(bearer_id)
            .ok_or(EattError::UnknownBearer(bearer_id))?;
        bearer.consume_credit()?;
        if let Err(err) = bearer.submit(exchange) {
            bearer.refund_credit();
            return Err(err);
        }
        drop(shared);

        debug!(
            "{} {}: exchange {:?} {:?} opcode {:#04x}",
            self.handle, bearer_id, id, request.kind, request.opcode
        );

        if let Err(err) = self.transmit(bearer_id, &pdu) {
            self.fail_exchange(bearer_id, id, err.clone());
            return Err(err.into());
        }

        Ok(ExchangeHandle::new(
            id,
            bearer_id,
            request.kind,
            deadline,
            receiver,
            self.me.clone(),
        ))
    }

    fn wait_for_bearer<'a>(
        &'a self,
        shared: MutexGuard<'a, Shared>,
        affinity: Affinity,
        started: Instant,
    ) -> EattResult<MutexGuard<'a, Shared>> {
        match self.config.exhaustion_policy {
            ExhaustionPolicy::FailFast => Err(dispatcher::exhausted_error(affinity)),
            ExhaustionPolicy::Block { max_wait } => {
                let elapsed = started.elapsed();
                if elapsed >= max_wait {
                    debug!("{}: no bearer became eligible within {:?}", self.handle, max_wait);
                    return Err(dispatcher::exhausted_error(affinity));
                }
                let (shared, _) = self
                    .bearer_ready
                    .wait_timeout(shared, max_wait - elapsed)
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(shared)
            }
        }
    }

    /// Send a command or notification. Nothing is tracked, so no slot is
    /// needed, and the exhaustion policy always fails fast.
    pub fn submit_command(
        &self,
        opcode: u8,
        payload: &[u8],
        affinity: Affinity,
    ) -> EattResult<BearerId> {
        match Opcode::new(opcode).class() {
            OpcodeClass::Command | OpcodeClass::Notification => {}
            _ => {
                return Err(EattError::InvalidParameter(format!(
                    "opcode {:#04x} is not a command or notification",
                    opcode
                )))
            }
        }

        let mut pdu = Vec::with_capacity(1 + payload.len());
        pdu.push(opcode);
        pdu.extend_from_slice(payload);

        let mut shared = self.lock();
        if shared.closed {
            return Err(EattError::NotConnected);
        }
        let bearer_id = match dispatcher::select_for_command(&shared.pool, affinity, pdu.len())? {
            Selection::Selected(id) => id,
            Selection::Unavailable => return Err(EattError::BearerUnavailable),
            Selection::Busy => return Err(dispatcher::exhausted_error(affinity)),
        };
        shared
            .pool
            .bearer_by_id_mut(bearer_id)
            .ok_or(EattError::UnknownBearer(bearer_id))?
            .consume_credit()?;
        drop(shared);

        if let Err(err) = self.transmit(bearer_id, &pdu) {
            error!("{} {}: command send failed: {}", self.handle, bearer_id, err);
            if let Some(bearer) = self.lock().pool.bearer_by_id_mut(bearer_id) {
                bearer.refund_credit();
            }
            return Err(err.into());
        }
        Ok(bearer_id)
    }

    /// Answer the peer request outstanding on `bearer_id`
    pub fn respond(&self, bearer_id: BearerId, opcode: u8, payload: &[u8]) -> EattResult<()> {
        let mut pdu = Vec::with_capacity(1 + payload.len());
        pdu.push(opcode);
        pdu.extend_from_slice(payload);

        let mut shared = self.lock();
        let bearer = shared
            .pool
            .bearer_by_id_mut(bearer_id)
            .ok_or(EattError::UnknownBearer(bearer_id))?;
        if !bearer.is_connected() {
            return Err(EattError::NotConnected);
        }

        let Some(request) = bearer.tracker().peer_request() else {
            return Err(EattError::InvalidParameter(format!(
                "no peer request outstanding on {}",
                bearer_id
            )));
        };

        let answers = match Opcode::new(opcode).class() {
            OpcodeClass::Response => Opcode::new(request).response_opcode() == Some(opcode),
            OpcodeClass::ErrorResponse => {
                ErrorResponse::parse(&pdu).is_some_and(|rsp| rsp.request_opcode == request)
            }
            _ => false,
        };
        if !answers {
            return Err(EattError::InvalidParameter(format!(
                "opcode {:#04x} does not answer request {:#04x}",
                opcode, request
            )));
        }

        if pdu.len() > bearer.mtu() as usize {
            return Err(EattError::PayloadTooLarge {
                len: pdu.len(),
                mtu: bearer.mtu(),
            });
        }

        bearer.consume_credit()?;
        bearer.tracker_mut().finish_peer_request();
        drop(shared);

        if let Err(err) = self.transmit(bearer_id, &pdu) {
            error!("{} {}: response send failed: {}", self.handle, bearer_id, err);
            let mut shared = self.lock();
            if let Some(bearer) = shared.pool.bearer_by_id_mut(bearer_id) {
                bearer.refund_credit();
                // Peer is still waiting for the answer
                if bearer.is_connected()
                    && bearer.tracker_mut().begin_peer_request(request).is_err()
                {
                    warn!("{} {}: peer request replaced while responding", self.handle, bearer_id);
                }
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn transmit(&self, bearer: BearerId, pdu: &[u8]) -> Result<(), TransportError> {
        trace!("{} {} TX {}", self.handle, bearer, hex::encode(pdu));
        self.transport.send(self.handle, bearer, pdu)
    }

    fn fail_exchange(&self, bearer_id: BearerId, id: ExchangeId, err: TransportError) {
        error!("{} {}: send failed for {:?}: {}", self.handle, bearer_id, id, err);
        let mut shared = self.lock();
        if let Some(bearer) = shared.pool.bearer_by_id_mut(bearer_id) {
            if bearer.resolve_if(id, Resolution::TransportFailed(err)) {
                bearer.refund_credit();
            }
        }
        self.bearer_ready.notify_all();
    }

    /// Open one more enhanced bearer. The bearer stays connecting until the
    /// transport reports the channel connected.
    pub fn open_enhanced_bearer(&self) -> EattResult<BearerId> {
        {
            let shared = self.lock();
            if shared.closed {
                return Err(EattError::NotConnected);
            }
            if shared.pool.free_enhanced_slots() == 0 {
                warn!(
                    "{}: enhanced bearer limit {} reached",
                    self.handle,
                    shared.pool.max_enhanced()
                );
                return Err(EattError::PoolFull);
            }
        }

        let id = match self.transport.open_channel(self.handle, BearerRole::Enhanced) {
            Ok(id) => id,
            Err(err) => {
                warn!("{}: enhanced bearer open failed: {}", self.handle, err);
                self.notifier.notify(&BearerEvent::OpenFailed {
                    conn: self.handle,
                    bearer: None,
                    reason: err.to_string(),
                });
                return Err(err.into());
            }
        };

        let added = {
            let mut shared = self.lock();
            if shared.closed {
                Err(EattError::NotConnected)
            } else if shared.pool.bearer_by_id(id).is_some() {
                // Connect event raced ahead of us
                Ok(())
            } else {
                shared.pool.add(Bearer::open(self.handle, id, BearerRole::Enhanced))
            }
        };

        if let Err(err) = added {
            warn!("{} {}: dropping opened channel: {}", self.handle, id, err);
            let _ = self.close_channel(id);
            return Err(err);
        }

        debug!("{} {}: enhanced bearer connecting", self.handle, id);
        Ok(id)
    }

    /// Open `count` enhanced bearers. Fails with `PoolFull` before opening
    /// anything if the pool cannot take all of them.
    pub fn connect_enhanced(&self, count: usize) -> EattResult<Vec<BearerId>> {
        if count == 0 {
            return Err(EattError::InvalidParameter("bearer count must be non-zero".into()));
        }

        let free = {
            let shared = self.lock();
            if shared.closed {
                return Err(EattError::NotConnected);
            }
            shared.pool.free_enhanced_slots()
        };
        if count > free {
            warn!(
                "{}: {} enhanced bearers requested, {} slots free",
                self.handle, count, free
            );
            return Err(EattError::PoolFull);
        }

        let mut opened = Vec::with_capacity(count);
        for _ in 0..count {
            match self.open_enhanced_bearer() {
                Ok(id) => opened.push(id),
                Err(err) => {
                    warn!(
                        "{}: bulk open stopped after {} of {}: {}",
                        self.handle,
                        opened.len(),
                        count,
                        err
                    );
                    for id in opened {
                        if self.close_channel(id).is_ok() {
                            self.on_channel_disconnected(id);
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(opened)
    }

    /// Start disconnecting the first connected enhanced bearer
    pub fn disconnect_one(&self) -> EattResult<BearerId> {
        let id = self
            .lock()
            .pool
            .iter()
            .find(|b| b.is_enhanced() && b.is_connected())
            .map(Bearer::id)
            .ok_or(EattError::NoBearerAvailable)?;
        self.disconnect_bearer(id)?;
        Ok(id)
    }

    /// Start disconnecting an enhanced bearer. Its outstanding exchange is
    /// resolved `BearerLost` immediately.
    pub fn disconnect_bearer(&self, id: BearerId) -> EattResult<()> {
        {
            let mut shared = self.lock();
            let bearer = shared
                .pool
                .bearer_by_id_mut(id)
                .ok_or(EattError::UnknownBearer(id))?;
            if !bearer.is_enhanced() {
                return Err(EattError::InvalidParameter(
                    "the legacy bearer lives as long as the link".into(),
                ));
            }
            if !bearer.mark_disconnecting() {
                return Err(EattError::NotConnected);
            }
            self.bearer_ready.notify_all();
        }

        info!("{} {}: disconnecting enhanced bearer", self.handle, id);
        self.close_channel(id)?;
        Ok(())
    }

    /// Ask the transport to close `id`. If it cannot, no disconnect callback
    /// will follow, so the bearer is dropped here.
    fn close_channel(&self, id: BearerId) -> Result<(), TransportError> {
        let result = self.transport.close_channel(self.handle, id);
        if let Err(err) = &result {
            warn!("{} {}: close failed, dropping bearer: {}", self.handle, id, err);
            self.on_channel_disconnected(id);
        }
        result
    }

    /// Reject a channel the pool will not take
    fn reject_channel(&self, id: BearerId, reason: String) {
        warn!("{} {}: rejecting channel: {}", self.handle, id, reason);
        let _ = self.close_channel(id);
        self.notifier.notify(&BearerEvent::OpenFailed {
            conn: self.handle,
            bearer: Some(id),
            reason,
        });
    }

    /// Transport callback: channel `id` finished connecting. Unknown
    /// enhanced channels were opened by the peer and join the pool.
    pub fn on_channel_connected(
        &self,
        id: BearerId,
        mtu: u16,
        mps: u16,
        initial_credits: u16,
    ) -> EattResult<()> {
        let info = {
            let mut shared = self.lock();
            if shared.closed {
                return Err(EattError::NotConnected);
            }

            if shared.pool.bearer_by_id(id).is_none() {
                let added = shared.pool.add(Bearer::open(self.handle, id, BearerRole::Enhanced));
                if let Err(err) = added {
                    drop(shared);
                    self.reject_channel(id, format!("peer-initiated bearer refused: {}", err));
                    return Err(err);
                }
                info!("{} {}: peer opened an enhanced bearer", self.handle, id);
            }

            let enhanced = shared.pool.bearer_by_id(id).is_some_and(Bearer::is_enhanced);
            if enhanced && mtu < self.config.enhanced_mtu {
                shared.pool.remove(id);
                drop(shared);
                let reason = format!(
                    "MTU {} below the enhanced minimum {}",
                    mtu, self.config.enhanced_mtu
                );
                self.reject_channel(id, reason.clone());
                return Err(EattError::InvalidParameter(reason));
            }

            let Some(bearer) = shared.pool.bearer_by_id_mut(id) else {
                return Err(EattError::UnknownBearer(id));
            };
            let connected = if enhanced {
                bearer.mark_connected(mtu, mps, initial_credits)
            } else {
                let mtu = self.config.legacy_mtu;
                bearer.mark_connected(mtu, mtu, 0)
            };
            if !connected {
                return Ok(());
            }

            let info = bearer.info();
            self.bearer_ready.notify_all();
            info
        };

        info!(
            "{} {}: {:?} bearer connected (mtu {})",
            self.handle, id, info.role, info.mtu
        );
        self.notifier.notify(&BearerEvent::Connected(info));
        Ok(())
    }

    /// Transport callback: channel `id` is gone. Losing the legacy channel
    /// tears the whole connection down.
    pub fn on_channel_disconnected(&self, id: BearerId) {
        let event = {
            let mut shared = self.lock();
            let role = match shared.pool.bearer_by_id(id) {
                Some(bearer) => bearer.role(),
                None => {
                    debug!("{} {}: disconnect for unknown bearer", self.handle, id);
                    return;
                }
            };

            if role == BearerRole::Legacy {
                drop(shared);
                info!("{}: legacy channel closed", self.handle);
                self.teardown();
                return;
            }

            let Some(mut bearer) = shared.pool.remove(id) else {
                return;
            };
            let was_open = matches!(
                bearer.state(),
                BearerState::Connected | BearerState::Disconnecting
            );
            bearer.mark_disconnected();
            self.bearer_ready.notify_all();

            if was_open {
                BearerEvent::Disconnected(bearer.info())
            } else {
                BearerEvent::OpenFailed {
                    conn: self.handle,
                    bearer: Some(id),
                    reason: "channel closed before connecting".into(),
                }
            }
        };

        info!("{} {}: bearer removed ({:?})", self.handle, id, event);
        self.notifier.notify(&event);
    }

    /// Transport callback: the peer granted `credits` on `id`
    pub fn on_credits(&self, id: BearerId, credits: u16) {
        let confirm = {
            let mut shared = self.lock();
            let Some(bearer) = shared.pool.bearer_by_id_mut(id) else {
                warn!("{} {}: credits for unknown bearer", self.handle, id);
                return;
            };
            bearer.add_credits(credits);
            trace!("{} {}: +{} credits, now {}", self.handle, id, credits, bearer.credits());
            let confirm = Self::take_owed_confirmation(bearer);
            self.bearer_ready.notify_all();
            confirm
        };

        if confirm {
            self.send_confirmation(id);
        }
    }

    fn take_owed_confirmation(bearer: &mut Bearer) -> bool {
        if !bearer.tracker().confirmation_owed() || !bearer.can_transmit() {
            return false;
        }
        if bearer.consume_credit().is_err() {
            return false;
        }
        bearer.tracker_mut().clear_confirmation();
        true
    }

    fn send_confirmation(&self, id: BearerId) {
        if let Err(err) = self.transmit(id, &[ATT_HANDLE_VALUE_CONF]) {
            error!("{} {}: confirmation not sent: {}", self.handle, id, err);
        }
    }

    /// Transport callback: one complete ATT PDU arrived on `id`
    pub fn on_pdu(&self, id: BearerId, pdu: &[u8]) -> EattResult<()> {
        trace!("{} {} RX {}", self.handle, id, hex::encode(pdu));

        let routed = {
            let mut shared = self.lock();
            if shared.closed {
                return Err(EattError::NotConnected);
            }
            let routed = demux::route(&mut shared.pool, self.handle, id, pdu);
            if routed == Routed::Resolved {
                self.bearer_ready.notify_all();
            }
            routed
        };

        match routed {
            Routed::Resolved | Routed::Dropped => Ok(()),
            Routed::Deliver(inbound) => {
                self.inbound.deliver(&inbound);
                Ok(())
            }
            Routed::DeliverAndConfirm(inbound) => {
                self.inbound.deliver(&inbound);
                let confirm = {
                    let mut shared = self.lock();
                    shared
                        .pool
                        .bearer_by_id_mut(id)
                        .is_some_and(Self::take_owed_confirmation)
                };
                if confirm {
                    self.send_confirmation(id);
                } else {
                    debug!("{} {}: confirmation deferred until credits arrive", self.handle, id);
                }
                Ok(())
            }
            Routed::Violation(reason) => {
                self.handle_violation(id, &reason);
                Err(EattError::ProtocolViolation(reason))
            }
            Routed::Malformed(reason) => {
                self.handle_violation(id, &reason);
                Err(EattError::InvalidPdu)
            }
        }
    }

    /// A desynchronized enhanced bearer is disconnected. A desynchronized
    /// legacy bearer takes the link down with it.
    fn handle_violation(&self, id: BearerId, reason: &str) {
        warn!("{} {}: protocol violation: {}", self.handle, id, reason);

        let role = {
            let mut shared = self.lock();
            let Some(bearer) = shared.pool.bearer_by_id_mut(id) else {
                return;
            };
            bearer.cancel(Resolution::ProtocolViolation(reason.to_string()));
            let role = bearer.role();
            if role == BearerRole::Enhanced {
                bearer.mark_disconnecting();
            }
            self.bearer_ready.notify_all();
            role
        };

        match role {
            BearerRole::Enhanced => {
                let _ = self.close_channel(id);
            }
            BearerRole::Legacy => {
                error!("{}: legacy bearer out of sync, dropping the link", self.handle);
                self.teardown();
                if let Err(err) = self.transport.disconnect_link(self.handle) {
                    warn!("{}: link disconnect failed: {}", self.handle, err);
                }
            }
        }
    }

    /// Resolve every exchange whose deadline is at or before `now`
    pub fn expire_overdue(&self, now: Instant) -> usize {
        let mut shared = self.lock();
        let mut expired = 0;
        for bearer in shared.pool.iter_mut() {
            if let Some(exchange) = bearer.tracker_mut().take_overdue(now) {
                warn!(
                    "{} {}: exchange {:?} (opcode {:#04x}) timed out",
                    self.handle,
                    bearer.id(),
                    exchange.id(),
                    exchange.opcode()
                );
                exchange.resolve(Resolution::TimedOut);
                expired += 1;
            }
        }
        if expired > 0 {
            self.bearer_ready.notify_all();
        }
        expired
    }

    pub fn process_timeouts(&self) -> usize {
        self.expire_overdue(Instant::now())
    }

    /// Time out one exchange, if it is still outstanding
    pub(crate) fn expire_exchange(&self, bearer_id: BearerId, id: ExchangeId) {
        let mut shared = self.lock();
        if let Some(bearer) = shared.pool.bearer_by_id_mut(bearer_id) {
            if bearer.resolve_if(id, Resolution::TimedOut) {
                warn!("{} {}: exchange {:?} timed out", self.handle, bearer_id, id);
                self.bearer_ready.notify_all();
            }
        }
    }

    /// Drop every bearer and resolve their exchanges `BearerLost`
    pub(crate) fn teardown(&self) {
        let events: Vec<_> = {
            let mut shared = self.lock();
            if shared.closed {
                return;
            }
            shared.closed = true;
            let events = shared
                .pool
                .drain()
                .into_iter()
                .filter_map(|mut bearer| {
                    let was_open = matches!(
                        bearer.state(),
                        BearerState::Connected | BearerState::Disconnecting
                    );
                    bearer.mark_disconnected();
                    was_open.then(|| BearerEvent::Disconnected(bearer.info()))
                })
                .collect();
            self.bearer_ready.notify_all();
            events
        };

        info!("{}: connection torn down", self.handle);
        for event in &events {
            self.notifier.notify(event);
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.lock();
        f.debug_struct("Connection")
            .field("handle", &self.handle)
            .field("bearers", &shared.pool.len())
            .field("closed", &shared.closed)
            .finish()
    }
}
