//! EATT manager
//!
//! Tracks every live LE connection and routes transport callbacks to the
//! connection that owns the channel.

use super::bearer::BearerStatus;
use super::config::EattConfig;
use super::connection::Connection;
use super::demux::{InboundCallback, InboundPdu, InboundSink};
use super::exchange::ExchangeHandle;
use super::notifier::{BearerEvent, LifecycleNotifier, ObserverId};
use super::types::{Affinity, BearerId, ConnHandle};
use crate::error::{EattError, EattResult};
use crate::transport::ChannelTransport;
use log::{debug, info, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Owner of all connections and their bearer pools
pub struct EattManager {
    config: EattConfig,
    transport: Arc<dyn ChannelTransport>,
    notifier: Arc<LifecycleNotifier>,
    inbound: Arc<InboundSink>,
    connections: RwLock<HashMap<ConnHandle, Arc<Connection>>>,
}

impl EattManager {
    pub fn new(config: EattConfig, transport: Arc<dyn ChannelTransport>) -> EattResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            notifier: Arc::new(LifecycleNotifier::new()),
            inbound: Arc::new(InboundSink::default()),
            connections: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EattConfig {
        &self.config
    }

    /// A new LE link is up: create its connection and open the legacy bearer
    pub fn connection_established(&self, conn: ConnHandle) -> EattResult<Arc<Connection>> {
        let duplicate = || EattError::InvalidParameter(format!("{} already established", conn));
        if self.connection(conn).is_some() {
            return Err(duplicate());
        }

        let connection = Connection::establish(
            conn,
            self.config.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.notifier),
            Arc::clone(&self.inbound),
        )?;

        let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);
        match connections.entry(conn) {
            Entry::Occupied(_) => {
                drop(connections);
                connection.teardown();
                Err(duplicate())
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&connection));
                Ok(connection)
            }
        }
    }

    /// The LE link is gone: every bearer is dropped
    pub fn connection_lost(&self, conn: ConnHandle) -> EattResult<()> {
        let connection = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&conn)
            .ok_or(EattError::UnknownConnection(conn))?;
        info!("{}: link lost", conn);
        connection.teardown();
        Ok(())
    }

    /// Look up a live connection
    pub fn connection(&self, conn: ConnHandle) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&conn)
            .cloned()
    }

    pub fn connections(&self) -> Vec<ConnHandle> {
        let mut handles: Vec<_> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        handles.sort();
        handles
    }

    fn require(&self, conn: ConnHandle) -> EattResult<Arc<Connection>> {
        self.connection(conn).ok_or(EattError::UnknownConnection(conn))
    }

    /// Forget a connection that tore itself down
    fn reap(&self, connection: &Connection) {
        if connection.is_closed() {
            let mut connections = self.connections.write().unwrap_or_else(PoisonError::into_inner);
            if connections.remove(&connection.handle()).is_some() {
                debug!("{}: closed connection removed", connection.handle());
            }
        }
    }

    pub fn register_lifecycle_observer<F>(&self, callback: F) -> ObserverId
    where
        F: FnMut(&BearerEvent) + Send + 'static,
    {
        self.notifier.register(callback)
    }

    pub fn unregister_lifecycle_observer(&self, id: ObserverId) -> bool {
        self.notifier.unregister(id)
    }

    /// Install the upper-layer sink for inbound requests, commands,
    /// notifications and indications
    pub fn set_inbound_handler<F>(&self, handler: F)
    where
        F: FnMut(&InboundPdu) + Send + 'static,
    {
        let handler: InboundCallback = Arc::new(Mutex::new(handler));
        self.inbound.set(handler);
    }

    pub fn clear_inbound_handler(&self) {
        self.inbound.clear();
    }

    pub fn submit_request(
        &self,
        conn: ConnHandle,
        opcode: u8,
        payload: impl Into<Vec<u8>>,
        affinity: Option<Affinity>,
    ) -> EattResult<ExchangeHandle> {
        self.require(conn)?
            .submit_request(opcode, payload, affinity.unwrap_or_default())
    }

    pub fn submit_indication(
        &self,
        conn: ConnHandle,
        opcode: u8,
        payload: impl Into<Vec<u8>>,
    ) -> EattResult<ExchangeHandle> {
        self.require(conn)?
            .submit_indication(opcode, payload, Affinity::Any)
    }

    pub fn submit_command(
        &self,
        conn: ConnHandle,
        opcode: u8,
        payload: &[u8],
        affinity: Option<Affinity>,
    ) -> EattResult<BearerId> {
        self.require(conn)?
            .submit_command(opcode, payload, affinity.unwrap_or_default())
    }

    pub fn respond(
        &self,
        conn: ConnHandle,
        bearer: BearerId,
        opcode: u8,
        payload: &[u8],
    ) -> EattResult<()> {
        self.require(conn)?.respond(bearer, opcode, payload)
    }

    /// Connected enhanced bearers on `conn`, 0 for an unknown connection
    pub fn enhanced_bearer_count(&self, conn: ConnHandle) -> usize {
        self.connection(conn)
            .map_or(0, |connection| connection.enhanced_bearer_count())
    }

    pub fn bearers(&self, conn: ConnHandle) -> EattResult<Vec<BearerStatus>> {
        Ok(self.require(conn)?.bearers())
    }

    pub fn connect_enhanced(&self, conn: ConnHandle, count: usize) -> EattResult<Vec<BearerId>> {
        self.require(conn)?.connect_enhanced(count)
    }

    pub fn disconnect_one(&self, conn: ConnHandle) -> EattResult<BearerId> {
        self.require(conn)?.disconnect_one()
    }

    pub fn disconnect_bearer(&self, conn: ConnHandle, bearer: BearerId) -> EattResult<()> {
        self.require(conn)?.disconnect_bearer(bearer)
    }

    /// Transport callback: inbound PDU
    pub fn on_pdu(&self, conn: ConnHandle, bearer: BearerId, pdu: &[u8]) -> EattResult<()> {
        let connection = self.routed(conn)?;
        let result = connection.on_pdu(bearer, pdu);
        self.reap(&connection);
        result
    }

    /// Transport callback: credit grant
    pub fn on_credits(&self, conn: ConnHandle, bearer: BearerId, credits: u16) -> EattResult<()> {
        self.routed(conn)?.on_credits(bearer, credits);
        Ok(())
    }

    /// Transport callback: channel connected
    pub fn on_channel_connected(
        &self,
        conn: ConnHandle,
        bearer: BearerId,
        mtu: u16,
        mps: u16,
        initial_credits: u16,
    ) -> EattResult<()> {
        self.routed(conn)?
            .on_channel_connected(bearer, mtu, mps, initial_credits)
    }

    /// Transport callback: channel disconnected
    pub fn on_channel_disconnected(&self, conn: ConnHandle, bearer: BearerId) -> EattResult<()> {
        let connection = self.routed(conn)?;
        connection.on_channel_disconnected(bearer);
        self.reap(&connection);
        Ok(())
    }

    fn routed(&self, conn: ConnHandle) -> EattResult<Arc<Connection>> {
        self.connection(conn).ok_or_else(|| {
            warn!("Transport callback for unknown {} dropped", conn);
            EattError::UnknownConnection(conn)
        })
    }

    /// Expire overdue exchanges on every connection
    pub fn process_timeouts(&self) -> usize {
        let connections: Vec<_> = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        connections.iter().map(|c| c.process_timeouts()).sum()
    }
}

impl std::fmt::Debug for EattManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EattManager")
            .field("config", &self.config)
            .field("connections", &self.connections())
            .field("observers", &self.notifier.observer_count())
            .finish()
    }
}
