//! Layered runtime configuration for the science portal.
//!
//! Values are read from an ordered stack of layers (explicit overrides, the process environment
//! and a `.properties` file) and accessed through [`ConfigurationResolver`], which knows which
//! keys are required. Feature gates live under the `experimental` namespace and are exposed as a
//! [`FeatureGateSet`].

mod errors;
pub mod features;
pub mod keys;
mod properties;
pub mod resolver;
pub mod source;

pub use errors::ConfigError;
pub use features::FeatureGateSet;
pub use keys::ConfigKey;
pub use resolver::{ConfigurationResolver, OidcSettings};
pub use source::{ConfigSource, Layer};

/// Namespace shared by every portal configuration key.
pub const PROPERTY_NAME_PREFIX: &str = "org.opencadc.science-portal";
