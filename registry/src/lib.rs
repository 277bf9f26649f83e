//! Service discovery for the portal.
//!
//! A [`Registry`] maps an abstract service identifier plus a capability (standard ID) to a
//! concrete URL. A [`LocalAuthority`] lists which identifiers offer a capability at this site.
//! [`EndpointResolver`] builds on both and never lets a single failed lookup break a batch.

pub mod client;
pub mod config;
pub mod endpoints;
pub mod metrics_defs;
pub mod static_registry;
pub mod types;

use async_trait::async_trait;
use std::collections::BTreeSet;
use url::Url;

pub use client::RegistryClient;
pub use endpoints::{EndpointResolver, Endpoints};
pub use types::{AuthMode, Capability, ResolvedEndpoint, ServiceId};

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("no {capability} endpoint registered for {id}")]
    NotFound { id: String, capability: String },

    #[error("registry unavailable")]
    Unavailable,

    #[error("registry returned unexpected status {0}")]
    UnexpectedStatus(http::StatusCode),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Access URL of `capability` on service `id`. `auth` narrows the lookup to interfaces
    /// accepting that authentication mode; `None` accepts any.
    async fn resolve_url(
        &self,
        id: &ServiceId,
        capability: &Capability,
        auth: Option<AuthMode>,
    ) -> Result<Url, RegistryError>;
}

#[async_trait]
pub trait LocalAuthority: Send + Sync {
    /// Identifiers offering `capability`. An empty set means the capability is not offered.
    async fn list_identifiers(
        &self,
        capability: &Capability,
    ) -> Result<BTreeSet<ServiceId>, RegistryError>;
}
