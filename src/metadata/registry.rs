//! Provider registry mapping logical categories onto concrete providers.
//!
//! Several providers may serve one category (e.g. two game catalogs). Each
//! category has a default: the first provider registered for it unless
//! overridden with [`ProviderRegistry::set_default`]. A category with no
//! providers at all falls back to the global fallback category.

use std::collections::HashMap;
use std::sync::Arc;

use mediaforge_common::{Category, Error, Result};
use tracing::debug;

use super::provider::MetadataProvider;

/// Category used when the requested one has no registered provider.
pub const FALLBACK_CATEGORY: Category = Category::Music;

/// A registry that manages multiple [`MetadataProvider`] implementations.
///
/// Providers are stored in registration order.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use mediaforge::metadata::ProviderRegistry;
/// use mediaforge_common::Category;
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(Arc::new(my_provider));
///
/// let books = registry.resolve(Category::Books, None)?;
/// ```
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MetadataProvider>>,
    defaults: HashMap<Category, &'static str>,
    fallback: Category,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            defaults: HashMap::new(),
            fallback: FALLBACK_CATEGORY,
        }
    }

    /// Register a provider. The first one registered for a category becomes
    /// that category's default.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        self.defaults
            .entry(provider.category())
            .or_insert(provider.id());
        self.providers.push(provider);
    }

    /// Make `provider_id` the default for its category.
    pub fn set_default(&mut self, provider_id: &str) -> Result<()> {
        let provider = self
            .get(provider_id)
            .ok_or_else(|| Error::not_found("provider", provider_id))?;
        self.defaults.insert(provider.category(), provider.id());
        Ok(())
    }

    /// Change the global fallback category.
    pub fn set_fallback(&mut self, category: Category) {
        self.fallback = category;
    }

    /// Every registered provider, in registration order.
    pub fn all(&self) -> &[Arc<dyn MetadataProvider>] {
        &self.providers
    }

    /// Return all providers that are currently available
    /// (i.e. configured with the credentials they need).
    pub fn available(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect()
    }

    /// Providers serving `category`, in registration order.
    pub fn for_category(&self, category: Category) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.category() == category)
            .cloned()
            .collect()
    }

    /// Look up a provider by its [`MetadataProvider::id`].
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .find(|p| p.id() == provider_id)
            .cloned()
    }

    /// The default provider id for `category`, if it has any provider.
    pub fn default_for(&self, category: Category) -> Option<&'static str> {
        self.defaults.get(&category).copied()
    }

    /// Resolve the provider that should serve a request.
    ///
    /// An explicit `provider_id` wins and must be registered. Otherwise the
    /// category default is used, then the fallback category's default.
    pub fn resolve(
        &self,
        category: Category,
        provider_id: Option<&str>,
    ) -> Result<Arc<dyn MetadataProvider>> {
        if let Some(id) = provider_id {
            let provider = self.get(id).ok_or_else(|| Error::not_found("provider", id))?;
            if provider.category() != category {
                debug!(provider = id, requested = %category, serves = %provider.category(), "Explicit provider serves a different category");
            }
            return Ok(provider);
        }

        let resolved = self
            .default_for(category)
            .or_else(|| {
                debug!(requested = %category, fallback = %self.fallback, "No provider for category, using fallback");
                self.default_for(self.fallback)
            })
            .and_then(|id| self.get(id));

        resolved.ok_or_else(|| Error::not_found("provider for category", category))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
