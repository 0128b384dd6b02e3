//! Configuration system for the voxrelay voice relay.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (XDG user config + project-local overrides)
//! - Environment overrides for the provider credentials, port and bind host
//! - Secret resolution with provenance (env var → config file)
//! - Validation into a [`RelayConfig`] that the server can start from

pub mod discovery;
pub mod error;
pub mod resolver;
pub mod secrets;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, xdg_config_dir,
    xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use resolver::{
    ENV_API_KEY, ENV_BIND, ENV_CONFIG_ID, ENV_PORT, ENV_SECRET_KEY, ProviderCredentials,
    RelayConfig, resolve_relay_config, resolve_with_env,
};
pub use secrets::{ResolvedSecret, SecretSource};
pub use types::*;
