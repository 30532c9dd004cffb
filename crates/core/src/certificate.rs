//! Leaf certificate details extracted from secret PEM material.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;

use crate::error::CertificateError;

/// The parts of an X.509 certificate the renewal policy cares about.
///
/// Recomputed from the secret on every scan; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub subject: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub dns_names: Vec<String>,
}

impl Certificate {
    /// Parse the first certificate of a PEM bundle.
    ///
    /// Callers attach the secret context (see
    /// [`Secret::extract_certificate`](crate::Secret::extract_certificate)).
    pub fn from_pem(pem_bytes: &[u8]) -> std::result::Result<Self, CertificateError> {
        let (_, pem) =
            parse_x509_pem(pem_bytes).map_err(|e| CertificateError::Pem(e.to_string()))?;

        let (_, cert) = x509_parser::parse_x509_certificate(&pem.contents)
            .map_err(|e| CertificateError::X509(e.to_string()))?;

        let validity = cert.validity();
        let not_before = DateTime::from_timestamp(validity.not_before.timestamp(), 0)
            .ok_or(CertificateError::Validity("not_before"))?;
        let not_after = DateTime::from_timestamp(validity.not_after.timestamp(), 0)
            .ok_or(CertificateError::Validity("not_after"))?;

        let dns_names = match cert.subject_alternative_name() {
            Ok(Some(san)) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            subject: cert.subject().to_string(),
            not_before,
            not_after,
            dns_names,
        })
    }

    /// Whole days until expiry, negative once expired.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        self.not_after.signed_duration_since(now).num_days()
    }
}
