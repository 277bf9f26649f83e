//! Feature gates: boolean toggles for unreleased behaviour.
//!
//! Every key under `org.opencadc.science-portal.experimental.` declares one gate. The part after
//! the namespace is the gate name and must be a single non-empty segment; the value is `true` or
//! `false` (case-insensitive, surrounding whitespace ignored):
//!
//! ```text
//! org.opencadc.science-portal.experimental.sessionGallery = true
//! org.opencadc.science-portal.experimental.batchLaunch = false
//! ```
//!
//! A gate whose value is anything else is registered as disabled. Keys with empty or extra
//! segments (`experimental.`, `experimental.a..b`, `experimental.foo.true`) are skipped. Neither
//! case is an error; both are logged.

use crate::errors::ConfigError;
use crate::keys::EXPERIMENTAL_PREFIX;
use crate::source::ConfigSource;
use serde::Serialize;
use std::collections::BTreeMap;

/// Serializes as a flat JSON object of gate name to boolean.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureGateSet {
    gates: BTreeMap<String, bool>,
}

impl FeatureGateSet {
    pub fn from_source(source: &ConfigSource) -> Self {
        let mut gates = BTreeMap::new();

        for key in source.keys_with_prefix(EXPERIMENTAL_PREFIX) {
            let name = &key[EXPERIMENTAL_PREFIX.len()..];
            if name.is_empty() || name.split('.').any(str::is_empty) {
                tracing::warn!(key, "Skipping feature gate with an empty name segment");
                continue;
            }
            if name.contains('.') {
                tracing::warn!(key, "Skipping feature gate with a dotted name");
                continue;
            }

            let value = source.get(key).unwrap_or_default();
            gates.insert(name.to_string(), parse_flag(key, value));
        }

        FeatureGateSet { gates }
    }

    /// Fails for names no gate was declared for.
    pub fn is_enabled(&self, name: &str) -> Result<bool, ConfigError> {
        self.gates
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownFeature(name.to_string()))
    }

    /// Like [`FeatureGateSet::is_enabled`], but undeclared gates are simply off.
    pub fn is_enabled_or_false(&self, name: &str) -> bool {
        self.gates.get(name).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.gates.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

fn parse_flag(key: &str, value: &str) -> bool {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        true
    } else if value.eq_ignore_ascii_case("false") {
        false
    } else {
        tracing::warn!(key, value, "Feature gate value is not true/false, defaulting to false");
        false
    }
}
