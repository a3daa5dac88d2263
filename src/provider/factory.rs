//! Backend constructor registry.
//!
//! Maps a provider `kind` to a constructor closure so new backend adapters
//! plug in without editing the dispatcher's core logic.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::{Error, Result};

use super::backend::ProviderBackend;

type BackendCtor = Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn ProviderBackend>> + Send + Sync>;

/// Registry of backend constructors, keyed by provider kind.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    ctors: HashMap<String, BackendCtor>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, ctor: F)
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn ProviderBackend>> + Send + Sync + 'static,
    {
        self.ctors.insert(kind.into(), Arc::new(ctor));
    }

    /// Construct the backend for one provider record.
    pub fn build(&self, config: &ProviderConfig) -> Result<Arc<dyn ProviderBackend>> {
        let kind = config.kind();
        let ctor = self.ctors.get(kind).ok_or_else(|| {
            Error::configuration(format!(
                "no backend registered for kind '{}' (provider '{}')",
                kind, config.name
            ))
        })?;
        ctor(config)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.ctors.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.ctors.keys().map(|k| k.as_str()).collect()
    }
}
