use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Secret {namespace}/{name} has no '{key}' entry")]
    MissingCertificate {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("Malformed certificate in secret {namespace}/{name}: {source}")]
    MalformedCertificate {
        namespace: String,
        name: String,
        #[source]
        source: CertificateError,
    },
}

/// Why PEM material could not be turned into a [`Certificate`](crate::Certificate).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    #[error("failed to parse PEM: {0}")]
    Pem(String),

    #[error("failed to parse X.509 certificate: {0}")]
    X509(String),

    #[error("validity timestamp out of range: {0}")]
    Validity(&'static str),
}

pub type Result<T> = std::result::Result<T, CoreError>;
