//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A required provider credential was not found anywhere.
    #[error("{name} is required. Set the {env_var} env var or add it to the [provider] section")]
    MissingCredential { name: String, env_var: String },

    /// A provider credential still holds the sample placeholder value.
    #[error("{name} is still the placeholder value. Replace it with your real provider credential")]
    PlaceholderCredential { name: String },

    /// A setting has a value that cannot be used.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
