//! Capability-keyed extractor registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::extractor::{Extractor, ExtractorHandle};

/// Maps capability tags to extractors in registration order.
#[derive(Debug, Default)]
pub struct ExtractorRegistry {
    by_capability: HashMap<String, Vec<Arc<ExtractorHandle>>>,
    count: usize,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extractor under every capability it advertises.
    pub fn register(&mut self, extractor: impl Extractor + 'static) -> Arc<ExtractorHandle> {
        let handle = Arc::new(ExtractorHandle::new(Box::new(extractor)));

        for capability in handle.capabilities() {
            let slot = self.by_capability.entry(capability.clone()).or_default();
            if !slot.iter().any(|h| Arc::ptr_eq(h, &handle)) {
                slot.push(Arc::clone(&handle));
            }
        }
        self.count += 1;

        tracing::info!(
            extractor = handle.name(),
            capabilities = ?handle.capabilities(),
            "Registered metadata extractor"
        );
        handle
    }

    /// Resolve the ordered extractor chain for a capability list.
    ///
    /// Capabilities are visited in order; within a capability extractors
    /// keep registration order. An extractor matching several capabilities
    /// appears once, at its first position.
    #[must_use]
    pub fn resolve<S: AsRef<str>>(&self, capabilities: &[S]) -> Vec<Arc<ExtractorHandle>> {
        let mut chain: Vec<Arc<ExtractorHandle>> = Vec::new();

        for capability in capabilities {
            let Some(handles) = self.by_capability.get(capability.as_ref()) else {
                continue;
            };
            for handle in handles {
                if !chain.iter().any(|h| Arc::ptr_eq(h, handle)) {
                    chain.push(Arc::clone(handle));
                }
            }
        }

        chain
    }

    /// Number of registered extractors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Whether no extractor is registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}
