//! Filesystem watcher that hot-reloads the policy file.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{info, warn};

use super::{reload, SharedConfig};
use crate::error::Result;
use crate::supervisor::RestartHandle;

/// Keeps a notify watcher alive for the policy file.
///
/// The parent directory is watched rather than the file itself so that
/// atomic replace-by-rename by editors is picked up. A mounted ConfigMap
/// only swaps its `..data` link on update, so events on that name reload
/// the policy as well.
pub struct SettingsWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl SettingsWatcher {
    pub fn start(path: PathBuf, shared: SharedConfig, handle: RestartHandle) -> Result<Self> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let target = path.clone();

        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        handle_fs_event(&event, &target, &shared, &handle);
                    }
                    Err(e) => warn!(error = %e, "settings watcher error"),
                }
            })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        info!(path = %path.display(), "watching renewal settings for changes");
        Ok(Self {
            path,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Name of the link a Kubernetes ConfigMap volume swaps atomically on update.
const CONFIGMAP_DATA_LINK: &str = "..data";

fn touches(event: &Event, target: &Path) -> bool {
    let Some(wanted) = target.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| match p.file_name() {
        Some(name) => name == wanted || name == CONFIGMAP_DATA_LINK,
        None => false,
    })
}

/// React to one watcher event; anything but a write to the policy file is ignored.
pub(super) fn handle_fs_event(
    event: &Event,
    target: &Path,
    shared: &SharedConfig,
    handle: &RestartHandle,
) -> bool {
    if !touches(event, target) {
        return false;
    }

    match &event.kind {
        EventKind::Create(CreateKind::File)
        | EventKind::Create(CreateKind::Any)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Name(_))
        | EventKind::Modify(ModifyKind::Any) => match reload(target, shared, handle) {
            Ok(changed) => changed,
            Err(e) => {
                warn!(
                    path = %target.display(),
                    error = %e,
                    "failed to reload renewal settings, keeping previous policy"
                );
                false
            }
        },
        _ => false,
    }
}
