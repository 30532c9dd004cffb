use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::certificate::Certificate;
use crate::error::{CoreError, Result};

/// Key under which a TLS secret stores its PEM-encoded certificate chain.
pub const TLS_CERT_KEY: &str = "tls.crt";

/// A routing resource (ingress) whose TLS certificate is kept renewed.
///
/// Owned by the cluster resource store; read-only from the scheduler's
/// point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingResource {
    pub namespace: String,
    pub name: String,
    pub hosts: Vec<String>,
    /// Name of the secret (in the same namespace) holding the certificate.
    pub secret_name: Option<String>,
}

impl RoutingResource {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            hosts: Vec::new(),
            secret_name: None,
        }
    }

    pub fn with_hosts(mut self, hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_secret(mut self, secret_name: impl Into<String>) -> Self {
        self.secret_name = Some(secret_name.into());
        self
    }

    /// `namespace/name`, used as the log key for this resource.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl std::fmt::Display for RoutingResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Certificate material stored alongside a routing resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub namespace: String,
    pub name: String,
    /// Entries keyed by file name (`tls.crt`, `tls.key`), values are PEM text.
    pub data: BTreeMap<String, String>,
}

impl Secret {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    /// Attach a PEM certificate under [`TLS_CERT_KEY`].
    pub fn with_certificate_pem(mut self, pem: impl Into<String>) -> Self {
        self.data.insert(TLS_CERT_KEY.to_string(), pem.into());
        self
    }

    /// Parse the leaf certificate from the `tls.crt` entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingCertificate`] when the entry is absent and
    /// [`CoreError::MalformedCertificate`] when it cannot be decoded.
    pub fn extract_certificate(&self) -> Result<Certificate> {
        let pem = self
            .data
            .get(TLS_CERT_KEY)
            .ok_or_else(|| CoreError::MissingCertificate {
                namespace: self.namespace.clone(),
                name: self.name.clone(),
                key: TLS_CERT_KEY.to_string(),
            })?;

        Certificate::from_pem(pem.as_bytes()).map_err(|source| CoreError::MalformedCertificate {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            source,
        })
    }
}
