use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("configuration property {key} is missing or invalid at {location}")]
    MissingConfig { key: &'static str, location: String },

    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("could not read {}: {source}", path.display())]
    Load {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse {} line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}
