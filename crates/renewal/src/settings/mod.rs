//! Renewal policy file: loading, sharing and hot-reload.
//!
//! The file is a flat YAML mapping; omitted keys take their defaults.
//!
//! ```yaml
//! enable_auto_renew: true
//! hours_between_checks: 12
//! days_to_renewal: 30
//! ```

mod shared;
mod watcher;

pub use shared::SharedConfig;
pub use watcher::SettingsWatcher;

use std::fs;
use std::path::Path;

use certkeeper_core::RenewalConfig;
use tracing::{debug, info};

use crate::error::Result;
use crate::supervisor::RestartHandle;

/// Read and validate a policy file.
pub fn load_settings_file(path: &Path) -> Result<RenewalConfig> {
    let contents = fs::read_to_string(path)?;
    let config: RenewalConfig = if contents.trim().is_empty() {
        RenewalConfig::default()
    } else {
        serde_yaml::from_str(&contents)?
    };
    shared::validate(&config)?;
    Ok(config)
}

/// Re-read `path` into `shared`, restarting the supervisor when the policy changed.
///
/// On error the previous policy stays in effect.
pub fn reload(path: &Path, shared: &SharedConfig, handle: &RestartHandle) -> Result<bool> {
    let config = load_settings_file(path)?;
    let changed = shared.update(config)?;
    if changed {
        info!(
            path = %path.display(),
            enabled = config.enable_auto_renew,
            hours = config.hours_between_checks,
            days = config.days_to_renewal,
            "Renewal settings changed"
        );
        handle.request_restart();
    } else {
        debug!(path = %path.display(), "Renewal settings unchanged");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenewalError;
    use std::io::Write;

    fn settings_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_file() {
        let file = settings_file(
            "enable_auto_renew: false\nhours_between_checks: 6\ndays_to_renewal: 14\n",
        );
        let config = load_settings_file(file.path()).unwrap();
        assert_eq!(
            config,
            RenewalConfig {
                enable_auto_renew: false,
                hours_between_checks: 6,
                days_to_renewal: 14,
            }
        );
    }

    #[test]
    fn missing_keys_use_defaults() {
        let file = settings_file("days_to_renewal: 45\n");
        let config = load_settings_file(file.path()).unwrap();
        assert!(config.enable_auto_renew);
        assert_eq!(config.hours_between_checks, 12);
        assert_eq!(config.days_to_renewal, 45);
    }

    #[test]
    fn empty_file_is_default_policy() {
        let file = settings_file("   \n");
        assert_eq!(load_settings_file(file.path()).unwrap(), RenewalConfig::default());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let file = settings_file("hours_between_checks: 0\n");
        let err = load_settings_file(file.path()).unwrap_err();
        assert!(matches!(err, RenewalError::Config(_)));
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let file = settings_file("hours_between_checks: [oops\n");
        let err = load_settings_file(file.path()).unwrap_err();
        assert!(matches!(err, RenewalError::Yaml(_)));
    }

    #[test]
    fn reload_restarts_only_on_change() {
        let file = settings_file("hours_between_checks: 12\n");
        let shared = SharedConfig::new(RenewalConfig::default()).unwrap();
        let handle = RestartHandle::new();

        assert!(!reload(file.path(), &shared, &handle).unwrap());
        assert!(!handle.restart_pending());

        let file = settings_file("hours_between_checks: 2\n");
        assert!(reload(file.path(), &shared, &handle).unwrap());
        assert!(handle.restart_pending());
        assert_eq!(shared.get().hours_between_checks, 2);
    }

    #[test]
    fn failed_reload_keeps_policy_and_does_not_restart() {
        let file = settings_file("days_to_renewal: 0\n");
        let shared = SharedConfig::new(RenewalConfig::default()).unwrap();
        let handle = RestartHandle::new();

        assert!(reload(file.path(), &shared, &handle).is_err());
        assert_eq!(shared.get(), RenewalConfig::default());
        assert!(!handle.restart_pending());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_settings_file(Path::new("/nonexistent/certkeeper.yml")).unwrap_err();
        assert!(matches!(err, RenewalError::Io(_)));
    }
}
