//! EATT configuration

use crate::att::{ATT_DEFAULT_MTU, ATT_MAX_MTU, ATT_TRANSACTION_TIMEOUT, EATT_MAX_BEARERS, EATT_MIN_MTU};
use crate::error::{EattError, EattResult};
use std::time::Duration;

/// Default number of enhanced bearers per connection
pub const DEFAULT_MAX_ENHANCED_BEARERS: u8 = 3;

/// What a submission does when no bearer can take it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Fail at once with `NoBearerAvailable`, leaving retry to the caller
    #[default]
    FailFast,
    /// Wait up to `max_wait` for a bearer to become eligible
    Block { max_wait: Duration },
}

/// EATT configuration
#[derive(Debug, Clone)]
pub struct EattConfig {
    /// Maximum enhanced bearers per connection
    pub max_enhanced_bearers: u8,
    /// Deadline for each request or indication
    pub exchange_timeout: Duration,
    /// Behaviour when every bearer is busy or out of credits
    pub exhaustion_policy: ExhaustionPolicy,
    /// Lowest MTU accepted for an enhanced bearer
    pub enhanced_mtu: u16,
    /// Initial MTU of the legacy bearer
    pub legacy_mtu: u16,
}

impl Default for EattConfig {
    fn default() -> Self {
        Self {
            max_enhanced_bearers: DEFAULT_MAX_ENHANCED_BEARERS,
            exchange_timeout: ATT_TRANSACTION_TIMEOUT,
            exhaustion_policy: ExhaustionPolicy::default(),
            enhanced_mtu: EATT_MIN_MTU,
            legacy_mtu: ATT_DEFAULT_MTU,
        }
    }
}

impl EattConfig {
    pub fn with_max_enhanced_bearers(mut self, max: u8) -> Self {
        self.max_enhanced_bearers = max;
        self
    }

    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion_policy = policy;
        self
    }

    pub fn with_enhanced_mtu(mut self, mtu: u16) -> Self {
        self.enhanced_mtu = mtu;
        self
    }

    pub fn validate(&self) -> EattResult<()> {
        if self.max_enhanced_bearers > EATT_MAX_BEARERS {
            return Err(EattError::InvalidConfig(format!(
                "max_enhanced_bearers {} exceeds {}",
                self.max_enhanced_bearers, EATT_MAX_BEARERS
            )));
        }

        if self.exchange_timeout.is_zero() {
            return Err(EattError::InvalidConfig("exchange_timeout must be non-zero".into()));
        }

        if let ExhaustionPolicy::Block { max_wait } = self.exhaustion_policy {
            if max_wait.is_zero() {
                return Err(EattError::InvalidConfig("blocking max_wait must be non-zero".into()));
            }
        }

        if !(EATT_MIN_MTU..=ATT_MAX_MTU).contains(&self.enhanced_mtu) {
            return Err(EattError::InvalidConfig(format!(
                "enhanced_mtu {} outside {}..={}",
                self.enhanced_mtu, EATT_MIN_MTU, ATT_MAX_MTU
            )));
        }

        if !(ATT_DEFAULT_MTU..=ATT_MAX_MTU).contains(&self.legacy_mtu) {
            return Err(EattError::InvalidConfig(format!(
                "legacy_mtu {} outside {}..={}",
                self.legacy_mtu, ATT_DEFAULT_MTU, ATT_MAX_MTU
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EattConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.exhaustion_policy, ExhaustionPolicy::FailFast);
        assert_eq!(config.exchange_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(EattConfig::default().with_max_enhanced_bearers(17).validate().is_err());
        assert!(EattConfig::default().with_max_enhanced_bearers(0).validate().is_ok());
        assert!(EattConfig::default()
            .with_exchange_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(EattConfig::default().with_enhanced_mtu(48).validate().is_err());
        assert!(EattConfig::default()
            .with_exhaustion_policy(ExhaustionPolicy::Block { max_wait: Duration::ZERO })
            .validate()
            .is_err());
    }
}
