use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str) -> Option<u16> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str) -> Option<bool> {
    profiled_env_opt(profile, key).map(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub renewal: RenewalConfig,
    pub smtp: SmtpConfig,
    pub webhook: WebhookConfig,
    pub templates: TemplateConfig,
    pub issuer: IssuerConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CERTKEEPER_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("CERTKEEPER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            renewal: RenewalConfig::from_env_profiled(p),
            smtp: SmtpConfig::from_env_profiled(p),
            webhook: WebhookConfig::from_env_profiled(p),
            templates: TemplateConfig::from_env_profiled(p),
            issuer: IssuerConfig::from_env_profiled(p),
            store: StoreConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  renewal:   enabled={}, every={}h, threshold={}d",
            self.renewal.enable_auto_renew,
            self.renewal.hours_between_checks,
            self.renewal.days_to_renewal
        );
        tracing::info!(
            "  smtp:      host={}, recipients={}, auth={}",
            self.smtp.host.as_deref().unwrap_or("(none)"),
            self.smtp.to.len(),
            self.smtp.username.is_some() && self.smtp.password.is_some()
        );
        tracing::info!(
            "  webhook:   configured={}, token={}",
            self.webhook.is_configured(),
            if self.webhook.token.is_some() { "***" } else { "(none)" }
        );
        tracing::info!(
            "  templates: subject={}, body={}",
            if self.templates.subject.is_some() { "custom" } else { "default" },
            if self.templates.body.is_some() { "custom" } else { "default" }
        );
        tracing::info!("  issuer:    url={}", self.issuer.url);
        tracing::info!(
            "  store:     manifests={}, settings={}",
            self.store.manifest_dir.display(),
            self.store.settings_file.display()
        );
    }
}

// ── Renewal policy ────────────────────────────────────────────

/// Renewal policy, re-read by the supervisor on every loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalConfig {
    #[serde(default = "default_enable_auto_renew")]
    pub enable_auto_renew: bool,
    #[serde(default = "default_hours_between_checks")]
    pub hours_between_checks: u64,
    #[serde(default = "default_days_to_renewal")]
    pub days_to_renewal: u64,
}

/// Upper bound for `days_to_renewal` (ten years).
pub const MAX_DAYS_TO_RENEWAL: u64 = 3_650;

fn default_enable_auto_renew() -> bool {
    true
}

fn default_hours_between_checks() -> u64 {
    12
}

fn default_days_to_renewal() -> u64 {
    30
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            enable_auto_renew: default_enable_auto_renew(),
            hours_between_checks: default_hours_between_checks(),
            days_to_renewal: default_days_to_renewal(),
        }
    }
}

impl RenewalConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            enable_auto_renew: profiled_env_bool(p, "ENABLE_AUTO_RENEW")
                .unwrap_or_else(default_enable_auto_renew),
            hours_between_checks: profiled_env_u64(
                p,
                "HOURS_BETWEEN_CHECKS",
                default_hours_between_checks(),
            ),
            days_to_renewal: profiled_env_u64(p, "DAYS_TO_RENEWAL", default_days_to_renewal()),
        }
    }

    /// Both intervals must be positive and the threshold bounded.
    pub fn validate(&self) -> Result<()> {
        if self.hours_between_checks == 0 {
            return Err(CoreError::Config(
                "hours_between_checks must be greater than 0".to_string(),
            ));
        }
        if self.days_to_renewal == 0 {
            return Err(CoreError::Config(
                "days_to_renewal must be greater than 0".to_string(),
            ));
        }
        if self.days_to_renewal > MAX_DAYS_TO_RENEWAL {
            return Err(CoreError::Config(format!(
                "days_to_renewal must be at most {MAX_DAYS_TO_RENEWAL}"
            )));
        }
        Ok(())
    }

    /// Cadence between scan passes.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.hours_between_checks.saturating_mul(3_600))
    }

    /// Lead time before expiry at which renewal becomes due.
    pub fn renewal_threshold(&self) -> chrono::Duration {
        chrono::Duration::days(self.days_to_renewal.min(MAX_DAYS_TO_RENEWAL) as i64)
    }
}

// ── SMTP ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub from: String,
    pub to: Vec<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl SmtpConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_opt(p, "SMTP_HOST"),
            port: profiled_env_u16(p, "SMTP_PORT"),
            tls: profiled_env_bool(p, "SMTP_TLS"),
            from: profiled_env_or(p, "SMTP_FROM", "certkeeper@localhost"),
            to: profiled_env_opt(p, "SMTP_TO")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            username: profiled_env_opt(p, "SMTP_USERNAME"),
            password: profiled_env_opt(p, "SMTP_PASSWORD"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.host.is_some() && !self.to.is_empty()
    }
}

// ── Webhook ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: Option<String>,
    /// Sent as `Authorization: Bearer <token>`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl WebhookConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "WEBHOOK_URL"),
            token: profiled_env_opt(p, "WEBHOOK_TOKEN"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

// ── Notification templates ────────────────────────────────────

/// Optional minijinja overrides for notification subject and body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl TemplateConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            subject: profiled_env_opt(p, "NOTIFY_SUBJECT_TEMPLATE"),
            body: profiled_env_opt(p, "NOTIFY_BODY_TEMPLATE"),
        }
    }
}

// ── Issuer ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl IssuerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "ISSUER_URL", "http://localhost:8080"),
            timeout_secs: profiled_env_u64(p, "ISSUER_TIMEOUT_SECS", 120),
        }
    }
}

// ── Resource store ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub manifest_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            manifest_dir: PathBuf::from(profiled_env_or(p, "MANIFEST_DIR", "manifests")),
            settings_file: PathBuf::from(profiled_env_or(
                p,
                "SETTINGS_FILE",
                "config/renewal.yml",
            )),
        }
    }
}
