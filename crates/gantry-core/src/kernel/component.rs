use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;

use crate::instantiator::args::{Arg, LinkFault};
use crate::kernel::error::Result;

/// Lifecycle trait implemented by every service the kernel manages.
///
/// `start` runs once the instance is registered; `stop` runs in reverse start
/// order on shutdown or rollback. Field links arrive through [`Service::link`]
/// before the service is visible to anyone else, so implementations usually
/// keep linkable fields in a `OnceLock` or `Mutex`.
#[async_trait]
pub trait Service: Any + Send + Sync + Debug {
    /// Name of the implementing type, used in diagnostics.
    fn type_name(&self) -> &str;

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Fields accepting links. Looked up once per type and cached.
    fn linkable_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Bind `value` to `field`. Only called for names in [`Service::linkable_fields`].
    fn link(&self, field: &str, value: Arg) -> std::result::Result<(), LinkFault> {
        let _ = value;
        Err(LinkFault::Unknown(field.to_string()))
    }
}

/// A constructed service plus the interfaces it exports.
///
/// Exports are keyed by interface type, so `instance.interface::<dyn Clock>()`
/// yields the `Arc<dyn Clock>` registered for it. Cloning is cheap.
#[derive(Clone)]
pub struct ServiceInstance {
    service: Arc<dyn Service>,
    exports: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    export_names: Vec<&'static str>,
}

impl ServiceInstance {
    pub fn new(service: Arc<dyn Service>) -> Self {
        Self {
            service,
            exports: HashMap::new(),
            export_names: Vec::new(),
        }
    }

    /// Shorthand for wrapping a concrete value.
    pub fn of<S: Service>(service: S) -> Self {
        Self::new(Arc::new(service))
    }

    /// Expose `value` under interface `I`. Replaces an earlier export of `I`.
    pub fn export<I>(mut self, value: Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let key = TypeId::of::<Arc<I>>();
        if self.exports.insert(key, Arc::new(value)).is_none() {
            self.export_names.push(type_name::<I>());
        }
        self
    }

    pub fn interface<I>(&self) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.exports
            .get(&TypeId::of::<Arc<I>>())
            .and_then(|any| any.downcast_ref::<Arc<I>>())
            .cloned()
    }

    pub fn exports<I>(&self) -> bool
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.exports.contains_key(&TypeId::of::<Arc<I>>())
    }

    /// Names of the exported interfaces, in export order.
    pub fn export_names(&self) -> &[&'static str] {
        &self.export_names
    }

    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    pub fn type_name(&self) -> &str {
        self.service.type_name()
    }

    /// Recover the concrete service type.
    pub fn downcast<T: Service>(&self) -> Option<Arc<T>> {
        let any: Arc<dyn Any + Send + Sync> = self.service.clone();
        Arc::downcast::<T>(any).ok()
    }

    /// True when both handles wrap the same service object.
    pub fn same_service(&self, other: &ServiceInstance) -> bool {
        Arc::ptr_eq(&self.service, &other.service)
    }
}

impl Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("service", &self.service)
            .field("exports", &self.export_names)
            .finish()
    }
}
