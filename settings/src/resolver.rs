use crate::errors::ConfigError;
use crate::features::FeatureGateSet;
use crate::keys::{self, ConfigKey};
use crate::source::ConfigSource;
use std::fmt;

const LIST_DELIMITER: char = ',';

/// Typed, validating access to the portal configuration.
///
/// Required keys are only checked when read, so a process can start with an incomplete
/// configuration and report exactly which key is missing once something needs it.
#[derive(Clone, Debug)]
pub struct ConfigurationResolver {
    source: ConfigSource,
}

impl ConfigurationResolver {
    pub fn new(source: ConfigSource) -> Self {
        ConfigurationResolver { source }
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Returns the raw value of `key`.
    ///
    /// Fails with `MissingConfig` if the key is required and its value is absent or blank.
    /// Optional keys yield `Ok(None)` when absent.
    pub fn get_string(&self, key: &ConfigKey) -> Result<Option<&str>, ConfigError> {
        let value = self.source.get(key.name);
        if key.required && value.is_none_or(is_blank) {
            return Err(self.missing(key));
        }
        Ok(value)
    }

    /// Splits the value of `key` on commas, trimming elements and dropping empty ones.
    pub fn get_string_list(&self, key: &ConfigKey) -> Result<Vec<String>, ConfigError> {
        let values: Vec<String> = self
            .source
            .get(key.name)
            .unwrap_or_default()
            .split(LIST_DELIMITER)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        if key.required && values.is_empty() {
            return Err(self.missing(key));
        }
        Ok(values)
    }

    /// True only if every key in `group` has a non-blank value.
    pub fn is_fully_configured(&self, group: &[ConfigKey]) -> bool {
        group
            .iter()
            .all(|key| self.source.get(key.name).is_some_and(|v| !is_blank(v)))
    }

    /// Every required key that currently fails to resolve.
    pub fn check_required(&self) -> Vec<ConfigError> {
        keys::ALL_KEYS
            .iter()
            .filter(|key| key.required)
            .filter_map(|key| self.get_string(key).err())
            .collect()
    }

    pub fn feature_gates(&self) -> FeatureGateSet {
        FeatureGateSet::from_source(&self.source)
    }

    pub fn resource_id(&self) -> Result<&str, ConfigError> {
        self.required(&keys::SESSIONS_RESOURCE_ID)
    }

    pub fn standard_id(&self) -> Result<&str, ConfigError> {
        self.required(&keys::SESSIONS_STANDARD)
    }

    pub fn logo_url(&self) -> Result<&str, ConfigError> {
        self.required(&keys::LOGO_URL)
    }

    pub fn banner_message(&self) -> Option<&str> {
        self.optional(&keys::BANNER_TEXT)
    }

    pub fn theme_name(&self) -> Option<&str> {
        self.optional(&keys::THEME_NAME)
    }

    pub fn tab_labels(&self) -> Result<Vec<String>, ConfigError> {
        self.get_string_list(&keys::TAB_LABELS)
    }

    pub fn token_cache_url(&self) -> Option<&str> {
        self.optional(&keys::TOKEN_CACHE_URL)
    }

    /// OIDC client settings, present only when the whole OIDC group is configured.
    pub fn oidc_settings(&self) -> Option<OidcSettings> {
        if !self.is_fully_configured(keys::OIDC_KEYS) {
            return None;
        }

        let value = |key: &ConfigKey| self.source.get(key.name).unwrap_or_default().to_string();
        Some(OidcSettings {
            uri: value(&keys::OIDC_URI),
            client_id: value(&keys::OIDC_CLIENT_ID),
            client_secret: value(&keys::OIDC_CLIENT_SECRET),
            callback_uri: value(&keys::OIDC_CALLBACK_URI),
            redirect_uri: value(&keys::OIDC_REDIRECT_URI),
            scope: value(&keys::OIDC_SCOPE),
            token_cache_url: value(&keys::TOKEN_CACHE_URL),
        })
    }

    fn required(&self, key: &ConfigKey) -> Result<&str, ConfigError> {
        self.get_string(key)?.ok_or_else(|| self.missing(key))
    }

    fn optional(&self, key: &ConfigKey) -> Option<&str> {
        self.source.get(key.name).filter(|v| !is_blank(v))
    }

    fn missing(&self, key: &ConfigKey) -> ConfigError {
        ConfigError::MissingConfig {
            key: key.name,
            location: self.source.description(),
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[derive(Clone, PartialEq, Eq)]
pub struct OidcSettings {
    pub uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub callback_uri: String,
    pub redirect_uri: String,
    pub scope: String,
    pub token_cache_url: String,
}

impl fmt::Debug for OidcSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcSettings")
            .field("uri", &self.uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("callback_uri", &self.callback_uri)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("token_cache_url", &self.token_cache_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Layer;

    fn resolver(entries: &[(&ConfigKey, &str)]) -> ConfigurationResolver {
        let entries = entries.iter().map(|(k, v)| (k.name, *v));
        ConfigurationResolver::new(ConfigSource::new(vec![Layer::new(
            "/etc/portal.properties",
            entries,
        )]))
    }

    fn oidc_entries() -> Vec<(&'static ConfigKey, &'static str)> {
        vec![
            (&keys::OIDC_URI, "https://iam.example.org/"),
            (&keys::OIDC_CLIENT_ID, "portal"),
            (&keys::OIDC_CLIENT_SECRET, "s3cret"),
            (&keys::OIDC_CALLBACK_URI, "https://portal.example.org/oidc-callback"),
            (&keys::OIDC_REDIRECT_URI, "https://portal.example.org/"),
            (&keys::OIDC_SCOPE, "openid profile"),
            (&keys::TOKEN_CACHE_URL, "redis://cache:6379"),
        ]
    }

    #[test]
    fn test_required_keys_missing() {
        let resolver = resolver(&[]);
        for key in keys::ALL_KEYS {
            let result = resolver.get_string(key);
            if key.required {
                match result {
                    Err(ConfigError::MissingConfig { key: name, location }) => {
                        assert_eq!(name, key.name);
                        assert_eq!(location, "/etc/portal.properties");
                    }
                    other => panic!("expected MissingConfig for {}, got {other:?}", key.name),
                }
            } else {
                assert!(matches!(result, Ok(None)), "{}", key.name);
            }
        }
        assert_eq!(resolver.check_required().len(), 3);
    }

    #[test]
    fn test_blank_required_value_is_missing() {
        let resolver = resolver(&[(&keys::SESSIONS_RESOURCE_ID, "   ")]);
        let err = resolver.resource_id().unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration property org.opencadc.science-portal.sessions.resourceID \
             is missing or invalid at /etc/portal.properties"
        );
    }

    #[test]
    fn test_typed_getters() {
        let resolver = resolver(&[
            (&keys::SESSIONS_RESOURCE_ID, "ivo://cadc.nrc.ca/skaha"),
            (&keys::SESSIONS_STANDARD, "vos://cadc.nrc.ca~vospace/CADC/std/Proc#sessions-1.0"),
            (&keys::LOGO_URL, "/logo.png"),
            (&keys::THEME_NAME, "canfar"),
            (&keys::BANNER_TEXT, " "),
        ]);
        assert_eq!(resolver.resource_id().unwrap(), "ivo://cadc.nrc.ca/skaha");
        assert_eq!(
            resolver.standard_id().unwrap(),
            "vos://cadc.nrc.ca~vospace/CADC/std/Proc#sessions-1.0"
        );
        assert_eq!(resolver.logo_url().unwrap(), "/logo.png");
        assert_eq!(resolver.theme_name(), Some("canfar"));
        assert_eq!(resolver.banner_message(), None);
        assert_eq!(resolver.get_string(&keys::BANNER_TEXT).unwrap(), Some(" "));
        assert!(resolver.check_required().is_empty());
    }

    #[test]
    fn test_string_list() {
        let resolver = resolver(&[(&keys::TAB_LABELS, "a, b ,c")]);
        assert_eq!(resolver.tab_labels().unwrap(), vec!["a", "b", "c"]);

        let resolver = self::resolver(&[(&keys::TAB_LABELS, " , Sessions,,Storage ,")]);
        assert_eq!(resolver.tab_labels().unwrap(), vec!["Sessions", "Storage"]);

        let resolver = self::resolver(&[]);
        assert!(resolver.tab_labels().unwrap().is_empty());
    }

    #[test]
    fn test_required_string_list_empty() {
        let required = ConfigKey {
            name: "org.opencadc.science-portal.requiredList",
            required: true,
        };
        let resolver = resolver(&[(&required, " , ,")]);
        assert!(matches!(
            resolver.get_string_list(&required),
            Err(ConfigError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_oidc_requires_every_key() {
        let complete = oidc_entries();
        let resolver = resolver(&complete);
        assert!(resolver.is_fully_configured(keys::OIDC_KEYS));
        let settings = resolver.oidc_settings().unwrap();
        assert_eq!(settings.client_id, "portal");
        assert_eq!(settings.token_cache_url, "redis://cache:6379");
        assert!(!format!("{settings:?}").contains("s3cret"));

        for skip in 0..complete.len() {
            let mut partial = complete.clone();
            partial[skip].1 = "";
            let resolver = self::resolver(&partial);
            assert!(!resolver.is_fully_configured(keys::OIDC_KEYS));
            assert!(resolver.oidc_settings().is_none());
        }
    }

    #[test]
    fn test_feature_gates_from_resolver() {
        let resolver = ConfigurationResolver::new(ConfigSource::new(vec![Layer::new(
            "test",
            [("org.opencadc.science-portal.experimental.gallery", "true")],
        )]));
        assert!(resolver.feature_gates().is_enabled("gallery").unwrap());
    }
}
