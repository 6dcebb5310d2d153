use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::instantiator::args::FactoryContext;
use crate::instantiator::linker::FieldCache;
use crate::kernel::component::ServiceInstance;
use crate::kernel::error::Result;

/// Builds a service from its resolved arguments.
pub type Factory = Arc<dyn Fn(&FactoryContext<'_>) -> Result<ServiceInstance> + Send + Sync>;

/// Factories keyed by the `type` names used in module definitions.
#[derive(Default)]
pub struct TypeRegistry {
    factories: HashMap<String, Factory>,
    fields: FieldCache,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the factory for `type_name`. Replacing a factory
    /// drops the cached field table of that type.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&FactoryContext<'_>) -> Result<ServiceInstance> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self.factories.insert(type_name.clone(), Arc::new(factory)).is_some() {
            debug!("Replaced factory for type '{}'", type_name);
            self.fields.invalidate(&type_name);
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn get(&self, type_name: &str) -> Option<Factory> {
        self.factories.get(type_name).cloned()
    }

    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn field_cache(&self) -> &FieldCache {
        &self.fields
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_names())
            .field("fields", &self.fields)
            .finish()
    }
}
