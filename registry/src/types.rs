use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Well known capability identifiers.
pub mod standards {
    /// Session management (launching and listing interactive sessions).
    pub const PROC_SESSIONS_10: &str = "vos://cadc.nrc.ca~vospace/CADC/std/Proc#sessions-1.0";
    /// Credential delegation.
    pub const CRED_DELEGATION: &str = "ivo://ivoa.net/std/CDP#proxy-1.0";
    /// The registry's listing of browser applications, used for header and menu links.
    pub const APPLICATIONS: &str = "applications";
}

/// Opaque URI naming a logical service, e.g. `ivo://cadc.nrc.ca/skaha`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        ServiceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        ServiceId::new(id)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque standard ID of a capability a service may offer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(standard: impl Into<String>) -> Self {
        Capability(standard.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Capability {
    fn from(standard: &str) -> Self {
        Capability::new(standard)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Anonymous,
    Token,
    Cookie,
    Cert,
}

impl AuthMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Anonymous => "anonymous",
            AuthMode::Token => "token",
            AuthMode::Cookie => "cookie",
            AuthMode::Cert => "cert",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single lookup. `url` is `None` when the lookup failed or the capability is not
/// offered.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedEndpoint {
    pub identifier: ServiceId,
    pub url: Option<Url>,
}
