//! renewal-worker: keeps ingress TLS certificates renewed.
//!
//! Loads configuration from the environment (and `.env`), reads the renewal
//! policy file, then runs the renewal supervisor until SIGINT/SIGTERM.
//! Edits to the policy file (or SIGHUP on Unix) restart the live cycle with
//! the new settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use certkeeper_core::config::{load_dotenv, Config, TemplateConfig};
use certkeeper_core::RenewalConfig;
use certkeeper_notify::templating::{
    TemplateRenderer, DEFAULT_BODY_TEMPLATE, DEFAULT_SUBJECT_TEMPLATE,
};
use certkeeper_notify::{Dispatcher, EmailNotifier, SmtpSettings, WebhookNotifier};
use certkeeper_renewal::settings::{load_settings_file, reload};
use certkeeper_renewal::{
    ConfigSource, DispatchNotifier, FileResourceStore, HttpIssuer, RenewalSupervisor,
    ResourceEvaluator, RestartHandle, ScanExecutor, SettingsWatcher, SharedConfig,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Certificate renewal worker for ingress TLS secrets.
///
/// Flags override the matching environment configuration.
#[derive(Parser, Debug)]
#[command(name = "renewal-worker", version, about)]
struct Cli {
    /// Renewal policy file (YAML), hot-reloaded on change.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory of Ingress/Secret manifests.
    #[arg(long)]
    manifests: Option<PathBuf>,

    /// Base URL of the certificate issuance service.
    #[arg(long)]
    issuer_url: Option<String>,

    /// Run a single scan pass and exit.
    #[arg(long)]
    once: bool,

    /// Send a test notification through every configured channel and exit.
    #[arg(long)]
    test_notify: bool,

    /// Seconds to wait for the supervisor to stop after a shutdown signal.
    #[arg(long, env = "RENEWAL_SHUTDOWN_TIMEOUT", default_value_t = 30)]
    shutdown_timeout: u64,
}

// ── Wiring ──────────────────────────────────────────────────────────

fn build_dispatcher(config: &Config) -> anyhow::Result<Dispatcher> {
    let mut dispatcher = Dispatcher::empty();

    if let (true, Some(host)) = (config.smtp.is_configured(), config.smtp.host.as_deref()) {
        let settings = SmtpSettings {
            host: host.to_string(),
            port: config.smtp.port,
            tls: config.smtp.tls,
            from: config.smtp.from.clone(),
            to: config.smtp.to.clone(),
            username: config.smtp.username.clone(),
            password: config.smtp.password.clone(),
        };
        let email = EmailNotifier::new(&settings).context("invalid SMTP configuration")?;
        info!(host, recipients = email.recipient_count(), "email channel enabled");
        dispatcher.add_channel(Box::new(email));
    }

    if let Some(url) = config.webhook.url.as_deref() {
        let webhook = WebhookNotifier::new(url, config.webhook.token.clone())
            .context("invalid webhook configuration")?;
        info!(url = webhook.url(), "webhook channel enabled");
        dispatcher.add_channel(Box::new(webhook));
    }

    if dispatcher.is_empty() {
        warn!("no notification channels configured; renewal outcomes will only be logged");
    }
    Ok(dispatcher)
}

fn build_renderer(templates: &TemplateConfig) -> anyhow::Result<TemplateRenderer> {
    if templates.subject.is_none() && templates.body.is_none() {
        return Ok(TemplateRenderer::new());
    }
    let subject = templates
        .subject
        .clone()
        .unwrap_or_else(|| DEFAULT_SUBJECT_TEMPLATE.to_string());
    let body = templates
        .body
        .clone()
        .unwrap_or_else(|| DEFAULT_BODY_TEMPLATE.to_string());
    TemplateRenderer::with_templates(subject, body).context("invalid notification template")
}

/// Policy from the settings file when it exists, otherwise from the environment.
fn initial_policy(path: &Path, from_env: RenewalConfig) -> anyhow::Result<RenewalConfig> {
    if !path.exists() {
        info!(path = %path.display(), "no settings file, using environment policy");
        return Ok(from_env);
    }
    let policy = load_settings_file(path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    info!(
        path = %path.display(),
        enabled = policy.enable_auto_renew,
        hours = policy.hours_between_checks,
        days = policy.days_to_renewal,
        "loaded renewal settings"
    );
    Ok(policy)
}

// ── Signals ─────────────────────────────────────────────────────────

async fn os_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint =
            signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl_c")?;
    }

    Ok(())
}

#[cfg(unix)]
fn spawn_reload_on_sighup(path: PathBuf, shared: SharedConfig, handle: RestartHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to register SIGHUP handler, reload on signal disabled");
            return;
        }
    };

    tokio::spawn(async move {
        while sighup.recv().await.is_some() {
            info!(path = %path.display(), "SIGHUP received, reloading settings");
            match reload(&path, &shared, &handle) {
                Ok(true) => {}
                Ok(false) => {
                    // Unchanged settings still get a fresh cycle on explicit request.
                    handle.request_restart();
                }
                Err(e) => warn!(error = %e, "settings reload failed, keeping previous policy"),
            }
        }
    });
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.settings.clone() {
        config.store.settings_file = path;
    }
    if let Some(dir) = cli.manifests.clone() {
        config.store.manifest_dir = dir;
    }
    if let Some(url) = cli.issuer_url.clone() {
        config.issuer.url = url;
    }
    config.log_summary();

    let dispatcher = build_dispatcher(&config)?;
    if cli.test_notify {
        let channels = dispatcher.test_all().await.context("test notification failed")?;
        info!(channels, "test notification delivered");
        return Ok(());
    }

    let settings_path = config.store.settings_file.clone();
    let shared = SharedConfig::new(initial_policy(&settings_path, config.renewal)?)
        .context("invalid renewal policy")?;
    let config_source: Arc<dyn ConfigSource> = Arc::new(shared.clone());

    let store = Arc::new(FileResourceStore::new(config.store.manifest_dir.clone()));
    let issuer = Arc::new(HttpIssuer::new(&config.issuer).context("invalid issuer configuration")?);
    let notifier = Arc::new(DispatchNotifier::new(
        dispatcher,
        build_renderer(&config.templates)?,
    ));
    let evaluator = ResourceEvaluator::new(store.clone(), issuer, notifier, config_source.clone());
    let scanner = Arc::new(ScanExecutor::new(store, evaluator));

    if cli.once {
        let report = scanner
            .run_scan(&CancellationToken::new())
            .await
            .context("scan cancelled")?;
        if let Some(failure) = report.failure {
            anyhow::bail!(
                "scan {} stopped at {}: {}",
                report.scan_id,
                failure.resource.as_deref().unwrap_or("enumeration"),
                failure.error
            );
        }
        return Ok(());
    }

    let supervisor = RenewalSupervisor::new(config_source, scanner);
    let handle = supervisor.restart_handle();

    let _watcher = match SettingsWatcher::start(settings_path.clone(), shared.clone(), handle.clone())
    {
        Ok(w) => Some(w),
        Err(e) => {
            warn!(
                path = %settings_path.display(),
                error = %e,
                "settings hot-reload disabled"
            );
            None
        }
    };
    #[cfg(unix)]
    spawn_reload_on_sighup(settings_path, shared, handle.clone());

    let mut task = tokio::spawn(supervisor.run());

    tokio::select! {
        res = os_signal() => {
            res?;
            info!("shutdown signal received");
        }
        res = &mut task => {
            return match res {
                Ok(()) => Err(anyhow::anyhow!("renewal supervisor exited unexpectedly")),
                Err(e) => {
                    error!(error = %e, "renewal supervisor task failed");
                    Err(anyhow::anyhow!("renewal supervisor task failed: {e}"))
                }
            };
        }
    }

    handle.shutdown();
    match tokio::time::timeout(Duration::from_secs(cli.shutdown_timeout), task).await {
        Ok(Ok(())) => info!("renewal-worker stopped"),
        Ok(Err(e)) => error!(error = %e, "renewal supervisor task failed during shutdown"),
        Err(_) => warn!(
            timeout_secs = cli.shutdown_timeout,
            "supervisor did not stop in time (issuance still running)"
        ),
    }

    Ok(())
}
