use crate::metrics_defs::LOOKUP_FAILURES;
use crate::types::{standards, AuthMode, Capability, ResolvedEndpoint, ServiceId};
use crate::{LocalAuthority, Registry, RegistryClient, RegistryError};
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

/// Resolved URLs keyed by service identifier, in lookup order. Failed lookups are left out.
pub type Endpoints = IndexMap<ServiceId, Url>;

/// Services linked from the page header.
pub const HEADER_SERVICES: &[&str] = &[
    "ivo://cadc.nrc.ca/groups",
    "ivo://cadc.nrc.ca/search",
    "ivo://cadc.nrc.ca/acctrequest",
    "ivo://cadc.nrc.ca/acctupdate",
    "ivo://cadc.nrc.ca/passchg",
    "ivo://cadc.nrc.ca/passreset",
];

#[derive(Clone)]
pub struct EndpointResolver {
    registry: Arc<dyn Registry>,
    authority: Arc<dyn LocalAuthority>,
}

impl EndpointResolver {
    pub fn new(registry: Arc<dyn Registry>, authority: Arc<dyn LocalAuthority>) -> Self {
        EndpointResolver {
            registry,
            authority,
        }
    }

    pub fn from_client(client: RegistryClient) -> Self {
        let client = Arc::new(client);
        EndpointResolver::new(client.clone(), client)
    }

    /// Looks up every identifier concurrently. A failed lookup is logged and counted, and the
    /// identifier is left out of the result; the call itself never fails.
    pub async fn resolve(
        &self,
        ids: &[ServiceId],
        capability: &Capability,
        auth: Option<AuthMode>,
    ) -> Endpoints {
        let mut lookups = JoinSet::new();
        for (index, id) in ids.iter().enumerate() {
            let registry = self.registry.clone();
            let id = id.clone();
            let capability = capability.clone();
            lookups.spawn(async move {
                let result = registry.resolve_url(&id, &capability, auth).await;
                (index, id, result)
            });
        }

        let mut resolved: Vec<Option<(ServiceId, Url)>> = vec![None; ids.len()];
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((index, id, Ok(url))) => resolved[index] = Some((id, url)),
                Ok((_, id, Err(error))) => lookup_failed(&id, capability, &error),
                Err(error) => {
                    shared::counter!(LOOKUP_FAILURES, "reason" => "panic").increment(1);
                    tracing::warn!(%capability, %error, "Endpoint lookup task failed");
                }
            }
        }

        resolved.into_iter().flatten().collect()
    }

    pub async fn resolve_one(
        &self,
        id: &ServiceId,
        capability: &Capability,
        auth: Option<AuthMode>,
    ) -> ResolvedEndpoint {
        let url = match self.registry.resolve_url(id, capability, auth).await {
            Ok(url) => Some(url),
            Err(error) => {
                lookup_failed(id, capability, &error);
                None
            }
        };

        ResolvedEndpoint {
            identifier: id.clone(),
            url,
        }
    }

    /// The identifier offering `capability` at this site, if any. When several do, the
    /// lexicographically smallest is chosen.
    pub async fn discover(&self, capability: &Capability) -> Option<ServiceId> {
        match self.authority.list_identifiers(capability).await {
            Ok(ids) => ids.into_iter().next(),
            Err(error) => {
                shared::counter!(LOOKUP_FAILURES, "reason" => error_reason(&error)).increment(1);
                tracing::warn!(%capability, %error, "Local authority enumeration failed");
                None
            }
        }
    }

    /// URLs of the header links, plus the credential delegation service when this site offers
    /// one.
    pub async fn header_urls(&self) -> Endpoints {
        let mut ids: Vec<ServiceId> = HEADER_SERVICES
            .iter()
            .copied()
            .map(ServiceId::from)
            .collect();
        let applications = Capability::from(standards::APPLICATIONS);
        let mut endpoints = self.resolve(&ids, &applications, None).await;

        let delegation = Capability::from(standards::CRED_DELEGATION);
        if let Some(id) = self.discover(&delegation).await {
            let endpoint = self.resolve_one(&id, &delegation, None).await;
            if let Some(url) = endpoint.url {
                endpoints.insert(endpoint.identifier, url);
            }
            ids.push(id);
        }

        tracing::debug!(
            requested = ids.len(),
            resolved = endpoints.len(),
            "Resolved header URLs"
        );
        endpoints
    }
}

fn lookup_failed(id: &ServiceId, capability: &Capability, error: &RegistryError) {
    shared::counter!(LOOKUP_FAILURES, "reason" => error_reason(error)).increment(1);
    tracing::warn!(%id, %capability, %error, "Endpoint lookup failed");
}

fn error_reason(error: &RegistryError) -> &'static str {
    match error {
        RegistryError::NotFound { .. } => "not_found",
        RegistryError::Unavailable => "unavailable",
        RegistryError::UnexpectedStatus(_) => "unexpected_status",
        RegistryError::InvalidUrl(_) => "invalid_url",
        RegistryError::Request(_) => "request",
    }
}
