//! Secrets management: provider credential lookup with provenance.
//!
//! Resolution order:
//! 1. Environment variable
//! 2. Config file (with warning)

/// Sample values shipped in the example env file. Starting with these is a
/// configuration mistake, not a credential the provider will accept.
const PLACEHOLDER_VALUES: &[&str] = &[
    "your_hume_api_key_here",
    "your_hume_secret_key_here",
    "your_api_key_here",
    "your_secret_key_here",
];

/// Result of secret resolution with provenance.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

impl ResolvedSecret {
    /// Whether the value is one of the sample placeholders.
    pub fn is_placeholder(&self) -> bool {
        is_placeholder(&self.value)
    }
}

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("value", &"***")
            .field("source", &self.source)
            .finish()
    }
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve a secret from `env_var` (via `env`) or the config file value.
///
/// Empty values count as absent at every layer.
pub fn resolve_secret<F>(
    env_var: &str,
    config_value: Option<&str>,
    env: F,
) -> Option<ResolvedSecret>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env(env_var)
        && !value.is_empty()
    {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var.to_string()),
        });
    }

    config_value
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}

/// Whether `value` is a known sample placeholder.
pub fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_VALUES.contains(&value.trim())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
