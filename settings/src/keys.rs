//! The closed set of portal configuration keys.

/// Expands to the full dotted name of a key under the portal namespace.
macro_rules! portal_key {
    ($suffix:literal) => {
        concat!("org.opencadc.science-portal.", $suffix)
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub name: &'static str,
    pub required: bool,
}

impl ConfigKey {
    const fn required(name: &'static str) -> Self {
        ConfigKey {
            name,
            required: true,
        }
    }

    const fn optional(name: &'static str) -> Self {
        ConfigKey {
            name,
            required: false,
        }
    }
}

/// Service identifier of the session management service.
pub const SESSIONS_RESOURCE_ID: ConfigKey = ConfigKey::required(portal_key!("sessions.resourceID"));
/// Capability the session service is looked up under.
pub const SESSIONS_STANDARD: ConfigKey = ConfigKey::required(portal_key!("sessions.standard"));
pub const LOGO_URL: ConfigKey = ConfigKey::required(portal_key!("logoURL"));
pub const BANNER_TEXT: ConfigKey = ConfigKey::optional(portal_key!("sessions.bannerText"));
pub const THEME_NAME: ConfigKey = ConfigKey::optional(portal_key!("themeName"));
/// Comma separated.
pub const TAB_LABELS: ConfigKey = ConfigKey::optional(portal_key!("tabLabels"));
pub const TOKEN_CACHE_URL: ConfigKey = ConfigKey::optional(portal_key!("tokenCache.url"));
pub const OIDC_URI: ConfigKey = ConfigKey::optional(portal_key!("oidc.uri"));
pub const OIDC_CLIENT_ID: ConfigKey = ConfigKey::optional(portal_key!("oidc.clientID"));
pub const OIDC_CLIENT_SECRET: ConfigKey = ConfigKey::optional(portal_key!("oidc.clientSecret"));
pub const OIDC_CALLBACK_URI: ConfigKey = ConfigKey::optional(portal_key!("oidc.callbackURI"));
pub const OIDC_REDIRECT_URI: ConfigKey = ConfigKey::optional(portal_key!("oidc.redirectURI"));
pub const OIDC_SCOPE: ConfigKey = ConfigKey::optional(portal_key!("oidc.scope"));

/// Prefix of the feature gate namespace, including the trailing dot.
pub const EXPERIMENTAL_PREFIX: &str = portal_key!("experimental.");

pub const ALL_KEYS: &[ConfigKey] = &[
    SESSIONS_RESOURCE_ID,
    SESSIONS_STANDARD,
    LOGO_URL,
    BANNER_TEXT,
    THEME_NAME,
    TAB_LABELS,
    TOKEN_CACHE_URL,
    OIDC_URI,
    OIDC_CLIENT_ID,
    OIDC_CLIENT_SECRET,
    OIDC_CALLBACK_URI,
    OIDC_REDIRECT_URI,
    OIDC_SCOPE,
];

/// Keys that must all be set before the OIDC login flow is offered.
pub const OIDC_KEYS: &[ConfigKey] = &[
    OIDC_URI,
    OIDC_CLIENT_ID,
    OIDC_CLIENT_SECRET,
    OIDC_CALLBACK_URI,
    OIDC_REDIRECT_URI,
    OIDC_SCOPE,
    TOKEN_CACHE_URL,
];

/// Looks a key up by its full dotted name.
pub fn find(name: &str) -> Option<&'static ConfigKey> {
    ALL_KEYS.iter().find(|key| key.name == name)
}
