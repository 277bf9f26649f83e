use crate::types::{AuthMode, Capability, ServiceId};
use serde::Deserialize;
use url::Url;

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum RegistryConfig {
    /// Lookups answered from a table in the service config file.
    Static { services: Vec<ServiceConfig> },
    /// Lookups delegated to a remote registry lookup service.
    Url {
        url: Url,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct ServiceConfig {
    pub id: ServiceId,
    pub capabilities: Vec<CapabilityConfig>,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct CapabilityConfig {
    pub standard: Capability,
    pub url: Url,
    /// Authentication modes the interface accepts. Empty accepts any.
    #[serde(default)]
    pub auth: Vec<AuthMode>,
}
