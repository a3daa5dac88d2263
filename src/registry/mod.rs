//! Provider registry: registration-ordered lookup by name.
//!
//! Registration order is load-bearing: the selection strategies break
//! score ties in favor of the earliest-registered provider, so selection
//! stays deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::Provider;
use crate::{Error, Result};

#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<Provider>>,
    by_name: HashMap<String, usize>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, preserving insertion order.
    pub fn register(&mut self, provider: Arc<Provider>) -> Result<()> {
        let name = provider.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(Error::configuration(format!(
                "duplicate provider name '{}'",
                name
            )));
        }
        self.by_name.insert(name, self.providers.len());
        self.providers.push(provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Provider>> {
        self.by_name
            .get(name)
            .map(|&idx| Arc::clone(&self.providers[idx]))
    }

    /// All providers, in registration order.
    pub fn all(&self) -> &[Arc<Provider>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
