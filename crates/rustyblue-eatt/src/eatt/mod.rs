//! Enhanced ATT bearer management
//!
//! This module multiplexes ATT exchanges over the legacy fixed channel and a
//! pool of credit-based enhanced bearers:
//! - One outstanding exchange per bearer, many bearers in parallel
//! - Credit accounting on enhanced bearers
//! - Per-exchange timeouts
//! - Bearer lifecycle notifications

pub mod types;
pub mod exchange;
mod tracker;
pub mod bearer;
pub mod pool;
pub mod config;
pub mod dispatcher;
pub mod demux;
pub mod notifier;
pub mod connection;
pub mod manager;

// Re-export the public API
pub use self::types::*;
pub use self::bearer::{Bearer, BearerInfo, BearerStatus};
pub use self::config::{EattConfig, ExhaustionPolicy, DEFAULT_MAX_ENHANCED_BEARERS};
pub use self::connection::Connection;
pub use self::demux::{InboundCallback, InboundPdu};
pub use self::dispatcher::ExchangeRequest;
pub use self::exchange::{ExchangeHandle, ExchangeId, ExchangeKind, ExchangeOutcome, Resolution};
pub use self::manager::EattManager;
pub use self::notifier::{BearerEvent, LifecycleCallback, LifecycleNotifier, ObserverId};
pub use self::pool::BearerPool;
