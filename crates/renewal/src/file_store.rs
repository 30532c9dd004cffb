//! Resource store backed by a directory of Kubernetes-style YAML manifests.
//!
//! Every `*.yml` / `*.yaml` file under the directory may hold several
//! `---`-separated documents. Documents are parsed in two passes: a light
//! envelope reads `kind` and `metadata`, then the remainder is decoded into
//! the concrete shape. Only `Ingress` and `Secret` are understood; other
//! kinds are ignored.
//!
//! Dot-prefixed entries are skipped and symlinked directories are not
//! followed, so a mounted ConfigMap (`..data -> ..<timestamp>/`, with
//! top-level symlinks into it) yields each manifest once.
//!
//! The directory is re-read on every listing, so edits show up on the next
//! scan. Secret lookups are served from the latest listing.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use certkeeper_core::{RoutingResource, Secret};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::collaborators::ResourceStore;
use crate::error::{RenewalError, Result};

// ── Manifest shapes ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ManifestEnvelope {
    kind: String,
    metadata: ObjectMeta,
    #[serde(flatten)]
    rest: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default = "default_namespace")]
    namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct IngressBody {
    #[serde(default)]
    spec: IngressSpec,
}

#[derive(Debug, Default, Deserialize)]
struct IngressSpec {
    #[serde(default)]
    tls: Vec<IngressTls>,
}

#[derive(Debug, Deserialize)]
struct IngressTls {
    #[serde(default)]
    hosts: Vec<String>,
    #[serde(rename = "secretName")]
    secret_name: Option<String>,
}

/// `data` holds base64 values, `stringData` plain text. On a key clash
/// `stringData` wins, as it does when the API server merges them.
#[derive(Debug, Default, Deserialize)]
struct SecretBody {
    #[serde(default)]
    data: BTreeMap<String, String>,
    #[serde(rename = "stringData", default)]
    string_data: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct Manifests {
    ingresses: Vec<RoutingResource>,
    secrets: Vec<Secret>,
}

// ── Parsing ───────────────────────────────────────────────────

fn ingress_from(meta: ObjectMeta, body: IngressBody) -> RoutingResource {
    let mut hosts: Vec<String> = Vec::new();
    for host in body.spec.tls.iter().flat_map(|t| t.hosts.iter()) {
        if !hosts.contains(host) {
            hosts.push(host.clone());
        }
    }
    let secret_name = body
        .spec
        .tls
        .into_iter()
        .find_map(|t| t.secret_name.filter(|s| !s.is_empty()));

    RoutingResource {
        namespace: meta.namespace,
        name: meta.name,
        hosts,
        secret_name,
    }
}

fn secret_from(meta: ObjectMeta, body: SecretBody) -> Result<Secret> {
    let mut data = BTreeMap::new();
    for (key, encoded) in body.data {
        let compact: String = encoded.split_whitespace().collect();
        let decoded = STANDARD
            .decode(compact.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| {
                RenewalError::Store(format!(
                    "secret {}/{}: data entry '{key}' is not base64-encoded text",
                    meta.namespace, meta.name
                ))
            })?;
        data.insert(key, decoded);
    }
    data.extend(body.string_data);

    Ok(Secret {
        namespace: meta.namespace,
        name: meta.name,
        data,
    })
}

fn parse_manifest(contents: &str, into: &mut Manifests) -> Result<()> {
    for document in serde_yaml::Deserializer::from_str(contents) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        let envelope: ManifestEnvelope = serde_yaml::from_value(value)?;

        match envelope.kind.as_str() {
            "Ingress" => {
                let body: IngressBody = serde_yaml::from_value(envelope.rest)?;
                into.ingresses.push(ingress_from(envelope.metadata, body));
            }
            "Secret" => {
                let body: SecretBody = serde_yaml::from_value(envelope.rest)?;
                into.secrets.push(secret_from(envelope.metadata, body)?);
            }
            other => {
                debug!(kind = %other, name = %envelope.metadata.name, "ignoring manifest kind");
            }
        }
    }
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true)
}

fn is_manifest(path: &Path) -> bool {
    let yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false);
    yaml && !is_hidden(path)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }

        // `file_type` does not follow symlinks: linked directories are never
        // descended into, linked files are read through the link.
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if is_manifest(&path) && path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Parse every manifest under `dir`, in path order.
///
/// A file that fails to parse is logged and skipped as a whole.
fn load_manifests(dir: &Path) -> Result<Manifests> {
    if !dir.is_dir() {
        return Err(RenewalError::Store(format!(
            "manifest directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut manifests = Manifests::default();
    for path in &files {
        let mut parsed = Manifests::default();
        let outcome = fs::read_to_string(path)
            .map_err(RenewalError::from)
            .and_then(|contents| parse_manifest(&contents, &mut parsed));
        match outcome {
            Ok(()) => {
                manifests.ingresses.append(&mut parsed.ingresses);
                manifests.secrets.append(&mut parsed.secrets);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable manifest"),
        }
    }

    debug!(
        dir = %dir.display(),
        files = files.len(),
        ingresses = manifests.ingresses.len(),
        secrets = manifests.secrets.len(),
        "loaded manifests"
    );
    Ok(manifests)
}

// ── Store ─────────────────────────────────────────────────────

type SecretIndex = HashMap<(String, String), Secret>;

/// [`ResourceStore`] reading manifests from a local directory.
#[derive(Debug, Clone)]
pub struct FileResourceStore {
    dir: PathBuf,
    /// Secrets seen by the latest load, keyed by `(namespace, name)`.
    secrets: Arc<Mutex<Option<SecretIndex>>>,
}

impl FileResourceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            secrets: Arc::new(Mutex::new(None)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Re-read the directory and replace the secret index.
    async fn load(&self) -> Result<Vec<RoutingResource>> {
        let dir = self.dir.clone();
        let manifests = tokio::task::spawn_blocking(move || load_manifests(&dir))
            .await
            .map_err(|e| RenewalError::Store(format!("manifest loader task failed: {e}")))??;

        let index: SecretIndex = manifests
            .secrets
            .into_iter()
            .map(|s| ((s.namespace.clone(), s.name.clone()), s))
            .collect();
        *self.lock_secrets() = Some(index);
        Ok(manifests.ingresses)
    }

    fn lock_secrets(&self) -> std::sync::MutexGuard<'_, Option<SecretIndex>> {
        self.secrets.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cached_secret(&self, namespace: &str, name: &str) -> Option<Option<Secret>> {
        self.lock_secrets()
            .as_ref()
            .map(|index| index.get(&(namespace.to_string(), name.to_string())).cloned())
    }
}

#[async_trait]
impl ResourceStore for FileResourceStore {
    async fn list_routing_resources(&self) -> Result<Vec<RoutingResource>> {
        self.load().await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        if let Some(found) = self.cached_secret(namespace, name) {
            return Ok(found);
        }
        self.load().await?;
        Ok(self.cached_secret(namespace, name).flatten())
    }
}
