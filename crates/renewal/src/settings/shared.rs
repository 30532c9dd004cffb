use std::sync::{Arc, RwLock};

use certkeeper_core::RenewalConfig;

use crate::collaborators::ConfigSource;
use crate::error::{RenewalError, Result};

/// Renewal policy shared between the supervisor and whoever updates it.
///
/// Readers always get a copy of the current value; updates are validated
/// before they become visible.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<RenewalConfig>>,
}

impl SharedConfig {
    pub fn new(config: RenewalConfig) -> Result<Self> {
        validate(&config)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
        })
    }

    pub fn get(&self) -> RenewalConfig {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the policy. Returns whether the value actually changed.
    ///
    /// An invalid policy is rejected and the previous one kept.
    pub fn update(&self, config: RenewalConfig) -> Result<bool> {
        validate(&config)?;
        let mut current = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if *current == config {
            return Ok(false);
        }
        *current = config;
        Ok(true)
    }
}

pub(crate) fn validate(config: &RenewalConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| RenewalError::Config(e.to_string()))
}

impl ConfigSource for SharedConfig {
    fn renewal_config(&self) -> RenewalConfig {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(hours: u64, days: u64) -> RenewalConfig {
        RenewalConfig {
            enable_auto_renew: true,
            hours_between_checks: hours,
            days_to_renewal: days,
        }
    }

    #[test]
    fn rejects_invalid_initial_policy() {
        let err = SharedConfig::new(policy(0, 30)).unwrap_err();
        assert!(matches!(err, RenewalError::Config(_)));
        assert!(err.to_string().contains("hours_between_checks"));
    }

    #[test]
    fn update_reports_change() {
        let shared = SharedConfig::new(policy(12, 30)).unwrap();
        assert!(!shared.update(policy(12, 30)).unwrap());
        assert!(shared.update(policy(6, 30)).unwrap());
        assert_eq!(shared.renewal_config().hours_between_checks, 6);
    }

    #[test]
    fn invalid_update_keeps_previous_value() {
        let shared = SharedConfig::new(policy(12, 30)).unwrap();
        assert!(shared.update(policy(12, 0)).is_err());
        assert_eq!(shared.get(), policy(12, 30));
    }

    #[test]
    fn clones_share_state() {
        let a = SharedConfig::new(policy(12, 30)).unwrap();
        let b = a.clone();
        b.update(policy(1, 7)).unwrap();
        assert_eq!(a.get(), policy(1, 7));
    }
}
