use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::instantiator::args::{Arg, LinkFault};
use crate::instantiator::error::WiringError;
use crate::kernel::component::ServiceInstance;

type FieldTable = Arc<[&'static str]>;

/// Per-type table of linkable fields, filled on first use.
#[derive(Debug, Default)]
pub struct FieldCache {
    tables: Mutex<HashMap<String, FieldTable>>,
    built: AtomicUsize,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, FieldTable>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn table_for(&self, type_name: &str, instance: &ServiceInstance) -> FieldTable {
        let mut tables = self.lock();
        if let Some(table) = tables.get(type_name) {
            return table.clone();
        }
        let table: FieldTable = instance.service().linkable_fields().into();
        debug!("Cached {} linkable field(s) for type '{}'", table.len(), type_name);
        tables.insert(type_name.to_string(), table.clone());
        self.built.fetch_add(1, Ordering::Relaxed);
        table
    }

    /// Drop the table of `type_name`; the next link rebuilds it.
    pub fn invalidate(&self, type_name: &str) {
        self.lock().remove(type_name);
    }

    /// How many tables have been built so far.
    pub fn tables_built(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }
}

/// Apply field bindings in declaration order. Stops at the first failure.
pub fn link_fields(
    cache: &FieldCache,
    service: &str,
    type_name: &str,
    instance: &ServiceInstance,
    fields: Vec<(String, Arg)>,
) -> Result<(), WiringError> {
    if fields.is_empty() {
        return Ok(());
    }
    let table = cache.table_for(type_name, instance);
    for (field, value) in fields {
        let not_found = || WiringError::FieldNotFound {
            service: service.to_string(),
            type_name: type_name.to_string(),
            field: field.clone(),
        };
        if !table.iter().any(|known| *known == field) {
            return Err(not_found());
        }
        match instance.service().link(&field, value) {
            Ok(()) => debug!("Linked field '{}' of '{}'", field, service),
            Err(LinkFault::Unknown(_)) => return Err(not_found()),
            Err(LinkFault::AlreadyLinked) => {
                return Err(WiringError::FieldAlreadyLinked {
                    service: service.to_string(),
                    type_name: type_name.to_string(),
                    field: field.clone(),
                });
            }
            Err(LinkFault::TypeMismatch { expected, found }) => {
                return Err(WiringError::FieldType {
                    service: service.to_string(),
                    type_name: type_name.to_string(),
                    field: field.clone(),
                    expected,
                    found,
                });
            }
        }
    }
    Ok(())
}
