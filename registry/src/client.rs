use crate::config::RegistryConfig;
use crate::static_registry::StaticRegistry;
use crate::types::{AuthMode, Capability, ServiceId};
use crate::{LocalAuthority, Registry, RegistryError};
use async_trait::async_trait;
use http::StatusCode;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A unified registry client that answers from an in-process table or a remote lookup service.
#[derive(Clone)]
pub struct RegistryClient(RegistryInner);

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        match config {
            RegistryConfig::Static { services } => {
                let registry = StaticRegistry::new(services);
                tracing::info!(services = registry.len(), "Using static registry");
                Ok(RegistryClient::from_static(registry))
            }
            RegistryConfig::Url { url, timeout_secs } => {
                tracing::info!(%url, timeout_secs, "Using remote registry");
                let client = HttpRegistry::new(&url, Duration::from_secs(timeout_secs))?;
                Ok(RegistryClient(RegistryInner::Url(client)))
            }
        }
    }

    pub fn from_static(registry: StaticRegistry) -> Self {
        RegistryClient(RegistryInner::InProcess(Arc::new(registry)))
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn resolve_url(
        &self,
        id: &ServiceId,
        capability: &Capability,
        auth: Option<AuthMode>,
    ) -> Result<Url, RegistryError> {
        match &self.0 {
            RegistryInner::InProcess(r) => r.resolve_url(id, capability, auth).await,
            RegistryInner::Url(client) => client.resolve_url(id, capability, auth).await,
        }
    }
}

#[async_trait]
impl LocalAuthority for RegistryClient {
    async fn list_identifiers(
        &self,
        capability: &Capability,
    ) -> Result<BTreeSet<ServiceId>, RegistryError> {
        match &self.0 {
            RegistryInner::InProcess(r) => r.list_identifiers(capability).await,
            RegistryInner::Url(client) => client.list_identifiers(capability).await,
        }
    }
}

#[derive(Clone)]
enum RegistryInner {
    InProcess(Arc<StaticRegistry>),
    Url(HttpRegistry),
}

#[derive(serde::Deserialize)]
struct ResolveResponse {
    url: Url,
}

#[derive(serde::Deserialize)]
struct AuthorityResponse {
    identifiers: Vec<ServiceId>,
}

/// Client for a registry lookup service exposing
/// `GET <base>/resolve?id=&standard=[&auth=]` and `GET <base>/authority?standard=`.
#[derive(Clone)]
pub struct HttpRegistry {
    client: reqwest::Client,
    resolve_url: Url,
    authority_url: Url,
}

impl HttpRegistry {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, RegistryError> {
        let base = base_url.as_str().trim_end_matches('/');
        let endpoint = |path: &str| {
            Url::parse(&format!("{base}/{path}"))
                .map_err(|e| RegistryError::InvalidUrl(e.to_string()))
        };

        Ok(HttpRegistry {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            resolve_url: endpoint("resolve")?,
            authority_url: endpoint("authority")?,
        })
    }

    async fn resolve_url(
        &self,
        id: &ServiceId,
        capability: &Capability,
        auth: Option<AuthMode>,
    ) -> Result<Url, RegistryError> {
        let mut query = vec![("id", id.as_str()), ("standard", capability.as_str())];
        if let Some(mode) = auth {
            query.push(("auth", mode.as_str()));
        }

        let response = self
            .client
            .get(self.resolve_url.clone())
            .query(&query)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<ResolveResponse>().await?.url),
            StatusCode::NOT_FOUND => Err(RegistryError::NotFound {
                id: id.to_string(),
                capability: capability.to_string(),
            }),
            StatusCode::SERVICE_UNAVAILABLE => Err(RegistryError::Unavailable),
            status => Err(RegistryError::UnexpectedStatus(status)),
        }
    }

    async fn list_identifiers(
        &self,
        capability: &Capability,
    ) -> Result<BTreeSet<ServiceId>, RegistryError> {
        let response = self
            .client
            .get(self.authority_url.clone())
            .query(&[("standard", capability.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response
                .json::<AuthorityResponse>()
                .await?
                .identifiers
                .into_iter()
                .collect()),
            StatusCode::NOT_FOUND => Ok(BTreeSet::new()),
            StatusCode::SERVICE_UNAVAILABLE => Err(RegistryError::Unavailable),
            status => Err(RegistryError::UnexpectedStatus(status)),
        }
    }
}
