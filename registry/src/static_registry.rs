use crate::config::ServiceConfig;
use crate::types::{AuthMode, Capability, ServiceId};
use crate::{LocalAuthority, Registry, RegistryError};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use url::Url;

struct Interface {
    url: Url,
    auth: Vec<AuthMode>,
}

impl Interface {
    fn accepts(&self, auth: Option<AuthMode>) -> bool {
        match auth {
            None => true,
            Some(mode) => self.auth.is_empty() || self.auth.contains(&mode),
        }
    }
}

/// Registry answered from an in-memory table.
#[derive(Default)]
pub struct StaticRegistry {
    services: HashMap<ServiceId, HashMap<Capability, Vec<Interface>>>,
}

impl StaticRegistry {
    pub fn new(services: Vec<ServiceConfig>) -> Self {
        let mut table: HashMap<ServiceId, HashMap<Capability, Vec<Interface>>> = HashMap::new();

        for service in services {
            let capabilities = table.entry(service.id).or_default();
            for capability in service.capabilities {
                capabilities
                    .entry(capability.standard)
                    .or_default()
                    .push(Interface {
                        url: capability.url,
                        auth: capability.auth,
                    });
            }
        }

        StaticRegistry { services: table }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn resolve_url(
        &self,
        id: &ServiceId,
        capability: &Capability,
        auth: Option<AuthMode>,
    ) -> Result<Url, RegistryError> {
        self.services
            .get(id)
            .and_then(|capabilities| capabilities.get(capability))
            .and_then(|interfaces| interfaces.iter().find(|i| i.accepts(auth)))
            .map(|interface| interface.url.clone())
            .ok_or_else(|| RegistryError::NotFound {
                id: id.to_string(),
                capability: capability.to_string(),
            })
    }
}

#[async_trait]
impl LocalAuthority for StaticRegistry {
    async fn list_identifiers(
        &self,
        capability: &Capability,
    ) -> Result<BTreeSet<ServiceId>, RegistryError> {
        Ok(self
            .services
            .iter()
            .filter(|(_, capabilities)| capabilities.contains_key(capability))
            .map(|(id, _)| id.clone())
            .collect())
    }
}
