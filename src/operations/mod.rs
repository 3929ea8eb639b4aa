//! Operation registry and the built-in operations
//!
//! The engine only knows the [`Operation`] trait. Concrete operations are
//! looked up here by name, which is how graph descriptions refer to them.

pub mod image;
pub mod math;

use crate::core::operation::{Operation, OperationDescription};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creates a fresh operation instance
pub type OperationFactory = Arc<dyn Fn() -> Box<dyn Operation> + Send + Sync>;

/// Named operation factories
#[derive(Clone, Default)]
pub struct OperationRegistry {
    factories: BTreeMap<String, OperationFactory>,
}

impl OperationRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in operation
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        image::register(&mut registry);
        math::register(&mut registry);
        registry
    }

    /// Register a factory under the name its operations describe themselves
    /// with. A later registration replaces an earlier one.
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Operation> + Send + Sync + 'static,
    {
        let name = factory().description().name.clone();
        self.factories.insert(name, Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Create a new instance of the named operation
    pub fn create(&self, name: &str) -> Option<Box<dyn Operation>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Description of the named operation
    pub fn describe(&self, name: &str) -> Option<OperationDescription> {
        self.create(name).map(|op| op.description().clone())
    }

    /// Descriptions of every registered operation, sorted by name
    pub fn descriptions(&self) -> Vec<OperationDescription> {
        self.factories
            .values()
            .map(|factory| factory().description().clone())
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
