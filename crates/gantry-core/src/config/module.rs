use std::collections::HashMap;
use std::time::Duration;

use log::debug;

use crate::config::error::ConfigError;
use crate::config::value::{ConfigMap, ConfigValue};
use crate::remote::location::{InvocationPolicy, RemoteLocation};

/// How a service instance comes into being.
#[derive(Debug, Clone, PartialEq)]
pub enum Implementation {
    /// Built locally by the factory registered under `type_name`.
    Local { type_name: String, args: ConfigMap },
    /// Backed by a proxy forwarding to another process.
    Remote(RemoteLocation),
}

/// A single service declaration after merging.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    /// Unique key across the merged graph.
    pub name: String,
    /// Module that declared the service.
    pub module: String,
    /// Key under the module's `services` mapping.
    pub key: String,
    pub implementation: Implementation,
    /// Field bindings applied after construction, in declaration order.
    pub fields: ConfigMap,
    /// Post-construction hooks, by registered listener name.
    pub listeners: Vec<String>,
    pub enabled: bool,
}

impl ServiceDefinition {
    pub fn is_remote(&self) -> bool {
        matches!(self.implementation, Implementation::Remote(_))
    }

    pub fn type_name(&self) -> Option<&str> {
        match &self.implementation {
            Implementation::Local { type_name, .. } => Some(type_name),
            Implementation::Remote(_) => None,
        }
    }

    /// Qualified names of every service this definition refers to, in the
    /// order they appear (args first, then fields). Duplicates are kept.
    pub fn references(&self) -> Vec<String> {
        let mut raw = Vec::new();
        if let Implementation::Local { args, .. } = &self.implementation {
            args.iter().for_each(|(_, v)| v.collect_references(&mut raw));
        }
        self.fields.iter().for_each(|(_, v)| v.collect_references(&mut raw));
        raw.into_iter().map(|r| qualify_reference(&self.module, r)).collect()
    }

    pub fn qualify(&self, reference: &str) -> String {
        qualify_reference(&self.module, reference)
    }
}

/// A reference without a `.` names a service in the same module.
pub fn qualify_reference(module: &str, reference: &str) -> String {
    if reference.contains('.') {
        reference.to_string()
    } else {
        format!("{}.{}", module, reference)
    }
}

/// A named bundle of service definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub enabled: bool,
    /// Profiles this module is restricted to; empty means always active.
    pub profiles: Vec<String>,
    pub services: Vec<ServiceDefinition>,
}

impl Module {
    pub fn is_active(&self, active_profiles: &[String]) -> bool {
        self.enabled
            && (self.profiles.is_empty() || self.profiles.iter().any(|p| active_profiles.contains(p)))
    }
}

/// The merged, enabled set of modules the kernel builds its graph from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleSet {
    modules: Vec<Module>,
}

impl ModuleSet {
    pub fn new(modules: Vec<Module>) -> Self {
        Self { modules }
    }

    /// Parse a merged tree. Inactive modules are dropped here and never reach
    /// the kernel.
    pub fn from_tree(tree: &ConfigMap, active_profiles: &[String]) -> Result<Self, ConfigError> {
        let mut modules = Vec::new();
        for (module_name, value) in tree.iter() {
            let module = parse_module(module_name, value)?;
            if module.is_active(active_profiles) {
                modules.push(module);
            } else {
                debug!("Module '{}' is disabled or profile-gated, skipping", module_name);
            }
        }
        let set = Self { modules };
        set.check_unique_names()?;
        Ok(set)
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// All service definitions in declaration order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.modules.iter().flat_map(|m| m.services.iter())
    }

    fn check_unique_names(&self) -> Result<(), ConfigError> {
        let mut seen: HashMap<&str, String> = HashMap::new();
        for module in &self.modules {
            for service in &module.services {
                let declared_by = format!("{}.services.{}", module.name, service.key);
                if let Some(first) = seen.insert(service.name.as_str(), declared_by.clone()) {
                    return Err(ConfigError::DuplicateName {
                        name: service.name.clone(),
                        first,
                        second: declared_by,
                    });
                }
            }
        }
        Ok(())
    }
}

fn parse_module(name: &str, value: &ConfigValue) -> Result<Module, ConfigError> {
    let map = value
        .as_mapping()
        .ok_or_else(|| ConfigError::invalid(name, "mapping", value.kind()))?;
    let enabled = opt_bool(map, "enabled", name)?.unwrap_or(true);
    let profiles = opt_string_list(map, "profiles", name)?;
    let mut services = Vec::new();
    if let Some(services_value) = map.get("services") {
        let path = format!("{}.services", name);
        let services_map = services_value
            .as_mapping()
            .ok_or_else(|| ConfigError::invalid(path.clone(), "mapping", services_value.kind()))?;
        for (service_name, service_value) in services_map.iter() {
            services.push(parse_service(name, service_name, service_value)?);
        }
    }
    Ok(Module {
        name: name.to_string(),
        enabled,
        profiles,
        services,
    })
}

fn parse_service(module: &str, local_name: &str, value: &ConfigValue) -> Result<ServiceDefinition, ConfigError> {
    let path = format!("{}.{}", module, local_name);
    let map = value
        .as_mapping()
        .ok_or_else(|| ConfigError::invalid(path.clone(), "mapping", value.kind()))?;

    let name = match map.get("name") {
        Some(v) => v
            .as_str()
            .ok_or_else(|| ConfigError::invalid(format!("{}.name", path), "string", v.kind()))?
            .to_string(),
        None => path.clone(),
    };

    let implementation = match (map.get("type"), map.get("remote")) {
        (Some(_), Some(_)) => return Err(ConfigError::AmbiguousImplementation { path }),
        (None, None) => return Err(ConfigError::NoImplementation { path }),
        (Some(type_value), None) => {
            let type_name = type_value
                .as_str()
                .ok_or_else(|| ConfigError::invalid(format!("{}.type", path), "string", type_value.kind()))?
                .to_string();
            let args = opt_mapping(map, "args", &path)?;
            Implementation::Local { type_name, args }
        }
        (None, Some(remote)) => Implementation::Remote(parse_remote(&format!("{}.remote", path), remote)?),
    };

    Ok(ServiceDefinition {
        name,
        module: module.to_string(),
        key: local_name.to_string(),
        implementation,
        fields: opt_mapping(map, "fields", &path)?,
        listeners: opt_string_list(map, "listeners", &path)?,
        enabled: opt_bool(map, "enabled", &path)?.unwrap_or(true),
    })
}

fn parse_remote(path: &str, value: &ConfigValue) -> Result<RemoteLocation, ConfigError> {
    let map = value
        .as_mapping()
        .ok_or_else(|| ConfigError::invalid(path, "mapping", value.kind()))?;
    let defaults = InvocationPolicy::default();
    let policy = InvocationPolicy {
        max_retries: opt_u32(map, "max_retries", path)?.unwrap_or(defaults.max_retries),
        timeout: opt_u64(map, "timeout_ms", path)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout),
        backoff: opt_u64(map, "backoff_ms", path)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.backoff),
    };
    Ok(RemoteLocation {
        url: req_str(map, "url", path)?,
        service: req_str(map, "service", path)?,
        interface: req_str(map, "interface", path)?,
        policy,
    })
}

fn req_str(map: &ConfigMap, key: &'static str, path: &str) -> Result<String, ConfigError> {
    match map.get(key) {
        Some(ConfigValue::String(s)) => Ok(s.clone()),
        Some(other) => Err(ConfigError::invalid(format!("{}.{}", path, key), "string", other.kind())),
        None => Err(ConfigError::MissingKey {
            path: path.to_string(),
            key,
        }),
    }
}

fn opt_bool(map: &ConfigMap, key: &str, path: &str) -> Result<Option<bool>, ConfigError> {
    match map.get(key) {
        None => Ok(None),
        Some(ConfigValue::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(ConfigError::invalid(format!("{}.{}", path, key), "bool", other.kind())),
    }
}

fn opt_u64(map: &ConfigMap, key: &str, path: &str) -> Result<Option<u64>, ConfigError> {
    match map.get(key) {
        None => Ok(None),
        Some(ConfigValue::Integer(i)) if *i >= 0 => Ok(Some(*i as u64)),
        Some(other) => Err(ConfigError::invalid(
            format!("{}.{}", path, key),
            "non-negative integer",
            other,
        )),
    }
}

fn opt_u32(map: &ConfigMap, key: &str, path: &str) -> Result<Option<u32>, ConfigError> {
    opt_u64(map, key, path)?
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| ConfigError::invalid(format!("{}.{}", path, key), "integer no larger than u32::MAX", v))
        })
        .transpose()
}

fn opt_mapping(map: &ConfigMap, key: &str, path: &str) -> Result<ConfigMap, ConfigError> {
    match map.get(key) {
        None | Some(ConfigValue::Null) => Ok(ConfigMap::new()),
        Some(ConfigValue::Mapping(m)) => Ok(m.clone()),
        Some(other) => Err(ConfigError::invalid(format!("{}.{}", path, key), "mapping", other.kind())),
    }
}

fn opt_string_list(map: &ConfigMap, key: &str, path: &str) -> Result<Vec<String>, ConfigError> {
    let Some(value) = map.get(key) else {
        return Ok(Vec::new());
    };
    let items = value
        .as_sequence()
        .ok_or_else(|| ConfigError::invalid(format!("{}.{}", path, key), "sequence", value.kind()))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ConfigError::invalid(format!("{}.{}", path, key), "string", item.kind()))
        })
        .collect()
}
