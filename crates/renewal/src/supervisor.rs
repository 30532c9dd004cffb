//! Long-running renewal loop with in-place restart.
//!
//! The supervisor owns one live [`CancellationToken`] per cycle, always a
//! child of the shutdown token. A restart cancels the live token: the cycle
//! stops at its next cancellation point (between resources, or mid-sleep)
//! and a fresh cycle starts immediately with a new token. Shutdown cancels
//! the parent and ends the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::collaborators::ConfigSource;
use crate::scan::ScanExecutor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// A cycle is scanning or sleeping.
    Active,
    /// The live token was cancelled; the next cycle is being started.
    Restarting,
    /// Shutdown was requested and the loop returned.
    Stopped,
}

/// How an inner cycle ended. Cycles cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleExit {
    Restart,
    Shutdown,
}

struct Shared {
    live: Mutex<CancellationToken>,
    state: Mutex<SupervisorState>,
    generation: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cloneable control surface for a running [`RenewalSupervisor`].
#[derive(Clone)]
pub struct RestartHandle {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl RestartHandle {
    pub(crate) fn new() -> Self {
        let shutdown = CancellationToken::new();
        Self {
            shared: Arc::new(Shared {
                live: Mutex::new(shutdown.child_token()),
                state: Mutex::new(SupervisorState::Active),
                generation: AtomicU64::new(0),
            }),
            shutdown,
        }
    }

    /// Cancel the live cycle so a new one starts with fresh settings.
    ///
    /// Safe to call from any task, any number of times. An issuance already
    /// in progress completes before the cycle stops.
    pub fn request_restart(&self) {
        let live = lock(&self.shared.live);
        if !live.is_cancelled() {
            info!(
                cycle = self.generation(),
                "Restart requested, cancelling live renewal cycle"
            );
            live.cancel();
        }
    }

    /// Stop the supervisor for good.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.cancel();
    }

    pub fn state(&self) -> SupervisorState {
        *lock(&self.shared.state)
    }

    /// Number of cycles started so far; the current cycle's number.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn restart_pending(&self) -> bool {
        lock(&self.shared.live).is_cancelled()
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn set_state(&self, state: SupervisorState) {
        *lock(&self.shared.state) = state;
    }

    /// Install a fresh live token and bump the generation.
    fn begin_cycle(&self) -> (u64, CancellationToken) {
        let token = self.shutdown.child_token();
        *lock(&self.shared.live) = token.clone();
        let cycle = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(SupervisorState::Active);
        (cycle, token)
    }
}

/// Repeats scans on the configured interval until shut down.
pub struct RenewalSupervisor {
    config: Arc<dyn ConfigSource>,
    scanner: Arc<ScanExecutor>,
    handle: RestartHandle,
}

impl RenewalSupervisor {
    pub fn new(config: Arc<dyn ConfigSource>, scanner: Arc<ScanExecutor>) -> Self {
        Self {
            config,
            scanner,
            handle: RestartHandle::new(),
        }
    }

    pub fn restart_handle(&self) -> RestartHandle {
        self.handle.clone()
    }

    /// Run cycles until [`RestartHandle::shutdown`] is called.
    pub async fn run(self) {
        info!("Renewal supervisor started");
        loop {
            let (cycle, token) = self.handle.begin_cycle();
            info!(cycle, "Renewal cycle started");

            match self.run_cycle(cycle, &token).await {
                CycleExit::Restart => {
                    self.handle.set_state(SupervisorState::Restarting);
                    info!(cycle, "Renewal cycle cancelled, restarting");
                }
                CycleExit::Shutdown => {
                    self.handle.set_state(SupervisorState::Stopped);
                    info!(cycle, "Renewal supervisor stopped");
                    return;
                }
            }
        }
    }

    async fn run_cycle(&self, cycle: u64, token: &CancellationToken) -> CycleExit {
        loop {
            if token.is_cancelled() {
                return self.exit_reason();
            }

            // Re-read every iteration so toggles apply without a restart.
            let config = self.config.renewal_config();

            if config.enable_auto_renew {
                match self.scanner.run_scan(token).await {
                    Ok(report) => debug!(
                        cycle,
                        scan_id = %report.scan_id,
                        complete = report.is_complete(),
                        "Scan returned"
                    ),
                    Err(e) if e.is_cancelled() => return self.exit_reason(),
                    Err(e) => error!(cycle, error = %e, "Scan returned unexpected error"),
                }
            } else {
                info!(cycle, "Auto-renew disabled, skipping scan");
            }

            let interval = config.check_interval();
            debug!(
                cycle,
                hours = config.hours_between_checks,
                "Sleeping until next scan"
            );

            tokio::select! {
                _ = token.cancelled() => return self.exit_reason(),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    fn exit_reason(&self) -> CycleExit {
        if self.handle.is_shutting_down() {
            CycleExit::Shutdown
        } else {
            CycleExit::Restart
        }
    }
}
