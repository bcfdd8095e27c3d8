//! Bearer pool of one connection
//!
//! Bearers are kept in creation order. Selection scans that order, so which
//! bearer a submission lands on is reproducible.

use super::bearer::Bearer;
use super::types::{BearerId, BearerRole, BearerState, RoleFilter};
use crate::error::{EattError, EattResult};
use log::{debug, warn};

#[derive(Debug)]
pub struct BearerPool {
    bearers: Vec<Bearer>,
    max_enhanced: u8,
}

impl BearerPool {
    /// Create a pool around the connection's legacy bearer
    pub(crate) fn new(legacy: Bearer, max_enhanced: u8) -> Self {
        debug_assert_eq!(legacy.role(), BearerRole::Legacy);
        Self {
            bearers: vec![legacy],
            max_enhanced,
        }
    }

    pub fn max_enhanced(&self) -> u8 {
        self.max_enhanced
    }

    pub(crate) fn add(&mut self, bearer: Bearer) -> EattResult<()> {
        if bearer.role() == BearerRole::Legacy {
            return Err(EattError::InvalidParameter(
                "connection already has a legacy bearer".into(),
            ));
        }

        if self.bearer_by_id(bearer.id()).is_some() {
            return Err(EattError::InvalidParameter(format!(
                "{} already in the pool",
                bearer.id()
            )));
        }

        if self.enhanced_count() >= self.max_enhanced as usize {
            return Err(EattError::PoolFull);
        }

        debug!("Adding enhanced bearer {}", bearer.id());
        self.bearers.push(bearer);
        Ok(())
    }

    /// Remove an enhanced bearer for teardown. The legacy bearer lives as long
    /// as the connection and is never handed out here.
    pub(crate) fn remove(&mut self, id: BearerId) -> Option<Bearer> {
        let index = self.bearers.iter().position(|b| b.id() == id)?;
        if self.bearers[index].role() == BearerRole::Legacy {
            warn!("Refusing to remove the legacy bearer from its pool");
            return None;
        }
        Some(self.bearers.remove(index))
    }

    /// Remove every bearer, legacy included, in creation order
    pub(crate) fn drain(&mut self) -> Vec<Bearer> {
        std::mem::take(&mut self.bearers)
    }

    pub fn bearer_by_id(&self, id: BearerId) -> Option<&Bearer> {
        self.bearers.iter().find(|b| b.id() == id)
    }

    pub(crate) fn bearer_by_id_mut(&mut self, id: BearerId) -> Option<&mut Bearer> {
        self.bearers.iter_mut().find(|b| b.id() == id)
    }

    pub fn legacy(&self) -> Option<&Bearer> {
        self.bearers.iter().find(|b| b.role() == BearerRole::Legacy)
    }

    pub fn len(&self) -> usize {
        self.bearers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bearers.is_empty()
    }

    /// Enhanced bearers occupying a slot, whatever their state
    pub fn enhanced_count(&self) -> usize {
        self.bearers
            .iter()
            .filter(|b| b.is_enhanced() && b.state() != BearerState::Disconnected)
            .count()
    }

    pub fn count_connected_enhanced(&self) -> usize {
        self.bearers
            .iter()
            .filter(|b| b.is_enhanced() && b.is_connected())
            .count()
    }

    pub fn free_enhanced_slots(&self) -> usize {
        (self.max_enhanced as usize).saturating_sub(self.enhanced_count())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bearer> {
        self.bearers.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Bearer> {
        self.bearers.iter_mut()
    }

    /// Bearers that can take a new request right now, in creation order.
    ///
    /// The iterator is lazy and can be cloned to restart the scan.
    pub fn for_each_eligible(&self, filter: RoleFilter) -> Eligible<'_> {
        Eligible {
            inner: self.bearers.iter(),
            filter,
        }
    }
}

/// Iterator returned by [`BearerPool::for_each_eligible`]
#[derive(Clone)]
pub struct Eligible<'a> {
    inner: std::slice::Iter<'a, Bearer>,
    filter: RoleFilter,
}

impl<'a> Iterator for Eligible<'a> {
    type Item = &'a Bearer;

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter;
        self.inner
            .by_ref()
            .find(|b| filter.matches(b.role()) && b.is_eligible_for_request())
    }
}
