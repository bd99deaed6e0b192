//! Factory registry: id-keyed lookup over the available merge strategies.

use std::sync::Arc;

use super::builtin::{BestOfFactory, GuidedMergeFactory, SynthesizeFactory};
use super::FusionFactory;

/// A fixed, id-keyed set of merge strategies.
///
/// Constructed once per session; the builtin strategies are always available
/// and custom ones can be registered alongside them. Insertion order is
/// preserved for display listings.
#[derive(Clone)]
pub struct FactoryRegistry {
    factories: Vec<Arc<dyn FusionFactory>>,
}

impl FactoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Creates a registry holding the builtin strategies.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BestOfFactory));
        registry.register(Arc::new(SynthesizeFactory));
        registry.register(Arc::new(GuidedMergeFactory));
        registry
    }

    /// Registers a strategy. A strategy with the same id replaces the
    /// existing entry in place.
    pub fn register(&mut self, factory: Arc<dyn FusionFactory>) {
        if let Some(existing) = self
            .factories
            .iter_mut()
            .find(|f| f.id() == factory.id())
        {
            *existing = factory;
        } else {
            self.factories.push(factory);
        }
    }

    /// Looks a strategy up by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn FusionFactory>> {
        self.factories.iter().find(|f| f.id() == id).cloned()
    }

    /// Returns true if a strategy with the given id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.factories.iter().any(|f| f.id() == id)
    }

    /// Lists the registered strategy ids in insertion order.
    pub fn ids(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.id()).collect()
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
