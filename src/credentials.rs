use crate::registry::{ProviderId, SourceRegistry};
use std::collections::{HashMap, HashSet};

/// Per-provider API keys, read once at start-up
///
/// The environment is not re-read after construction.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    keys: HashMap<ProviderId, String>,
    required: HashSet<ProviderId>,
}

impl CredentialStore {
    /// Read every provider's key variable from the process environment
    pub fn from_env(registry: &SourceRegistry) -> Self {
        Self::from_lookup(registry, |var| std::env::var(var).ok())
    }

    /// Build from an explicit key map (tests, embedding callers)
    pub fn from_map(registry: &SourceRegistry, keys: HashMap<ProviderId, String>) -> Self {
        Self::from_lookup(registry, |var| {
            ProviderId::ALL
                .into_iter()
                .find(|id| id.credential_env() == Some(var))
                .and_then(|id| keys.get(&id).cloned())
        })
    }

    fn from_lookup<F>(registry: &SourceRegistry, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = HashMap::new();
        for descriptor in registry.providers() {
            let Some(var) = descriptor.id.credential_env() else {
                continue;
            };
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                keys.insert(descriptor.id, value);
            }
        }

        let required = registry
            .providers()
            .iter()
            .filter(|d| d.requires_key)
            .map(|d| d.id)
            .collect();

        tracing::debug!("Loaded credentials for {} providers", keys.len());

        Self { keys, required }
    }

    /// True when the provider needs no key or has a non-empty one.
    /// Network reachability is not checked.
    pub fn is_available(&self, provider: ProviderId) -> bool {
        !self.required.contains(&provider) || !self.get_credential(provider).is_empty()
    }

    /// The provider's key, or "" when none was configured
    pub fn get_credential(&self, provider: ProviderId) -> &str {
        self.keys.get(&provider).map(String::as_str).unwrap_or("")
    }
}
