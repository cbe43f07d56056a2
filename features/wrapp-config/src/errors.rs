use std::path::PathBuf;

/// Errors when loading or layering the wiring configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A layer is not valid TOML, has unknown keys or holds values of the wrong type
    #[error("Failed to load config layer '{origin}': {source}")]
    Layer {
        origin: String,
        #[source]
        source: figment::Error,
    },
    /// The merged layers could not be turned into a config
    #[error("Failed to extract config: {0}")]
    Extract(#[from] figment::Error),
}
