pub mod certificate;
pub mod config;
pub mod error;
pub mod renewal;
pub mod resource;

pub use certificate::Certificate;
pub use config::{Config, RenewalConfig};
pub use error::*;
pub use renewal::RenewalResult;
pub use resource::{RoutingResource, Secret, TLS_CERT_KEY};
