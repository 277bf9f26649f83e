use crate::errors::ConfigError;
use crate::{PROPERTY_NAME_PREFIX, properties};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single named set of key/value pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layer {
    name: String,
    values: IndexMap<String, String>,
}

impl Layer {
    pub fn new<N, I, K, V>(name: N, values: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Layer {
            name: name.into(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Portal keys found in the process environment. Variable names are used verbatim, so the
    /// variable `org.opencadc.science-portal.themeName` overrides the key of the same name.
    pub fn from_env() -> Self {
        Self::from_env_vars(std::env::vars())
    }

    pub fn from_env_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let values = vars
            .into_iter()
            .filter(|(name, _)| name.starts_with(PROPERTY_NAME_PREFIX));
        Layer::new("environment", values)
    }

    pub fn from_properties_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let values = properties::parse(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            line: e.line,
            message: e.message,
        })?;

        Ok(Layer {
            name: path.display().to_string(),
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered stack of layers; the first layer holding a key wins.
#[derive(Clone, Debug, Default)]
pub struct ConfigSource {
    layers: Vec<Layer>,
}

impl ConfigSource {
    /// `layers` must be ordered from highest to lowest priority.
    pub fn new(layers: Vec<Layer>) -> Self {
        ConfigSource { layers }
    }

    /// Builds the standard stack: `overrides`, then the environment, then the properties file.
    ///
    /// A properties file that cannot be read or parsed is not an error. A warning is logged and
    /// an empty layer named after the path stands in for it, so missing keys are still reported
    /// against the file they were expected in.
    pub fn load(overrides: Vec<(String, String)>, properties_file: &Path) -> Self {
        let file_layer = match Layer::from_properties_file(properties_file) {
            Ok(layer) => {
                tracing::info!(
                    path = %properties_file.display(),
                    keys = layer.len(),
                    "Loaded portal configuration"
                );
                layer
            }
            Err(e) => {
                tracing::warn!(
                    path = %properties_file.display(),
                    error = %e,
                    "No usable configuration file, using defaults"
                );
                Layer::new(
                    properties_file.display().to_string(),
                    Vec::<(String, String)>::new(),
                )
            }
        };

        ConfigSource::new(vec![
            Layer::new("overrides", overrides),
            Layer::from_env(),
            file_layer,
        ])
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    /// All keys starting with `prefix`, across every layer, sorted and deduplicated.
    pub fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<&str> {
        self.layers
            .iter()
            .flat_map(|layer| layer.keys())
            .filter(|key| key.starts_with(prefix))
            .collect()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Where values are looked up, for error messages.
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.layers.is_empty() {
            return write!(f, "(no configuration sources)");
        }
        let names: Vec<&str> = self.layers.iter().map(Layer::name).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// `$HOME/config/org.opencadc.science-portal.properties`, or a relative path when no home
/// directory is known.
pub fn default_properties_path(home: Option<&Path>) -> PathBuf {
    let file_name = format!("{PROPERTY_NAME_PREFIX}.properties");
    match home {
        Some(home) => home.join("config").join(file_name),
        None => PathBuf::from("config").join(file_name),
    }
}
