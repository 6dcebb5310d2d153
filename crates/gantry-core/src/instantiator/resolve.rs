use crate::config::module::ServiceDefinition;
use crate::config::value::{ConfigMap, ConfigValue};
use crate::instantiator::args::Arg;
use crate::instantiator::error::WiringError;
use crate::kernel::registry::ServiceRegistry;

/// Resolve every entry of `map`, replacing references with registered
/// instances. Keys keep their declaration order.
pub fn resolve_map(
    definition: &ServiceDefinition,
    map: &ConfigMap,
    registry: &ServiceRegistry,
) -> Result<Vec<(String, Arg)>, WiringError> {
    map.iter()
        .map(|(key, value)| Ok((key.to_string(), resolve_value(definition, value, registry)?)))
        .collect()
}

pub fn resolve_value(
    definition: &ServiceDefinition,
    value: &ConfigValue,
    registry: &ServiceRegistry,
) -> Result<Arg, WiringError> {
    if let Some(reference) = value.as_reference() {
        let target = definition.qualify(reference);
        return registry
            .get(&target)
            .cloned()
            .map(Arg::Service)
            .ok_or_else(|| WiringError::UnresolvedReference {
                service: definition.name.clone(),
                target,
            });
    }
    Ok(match value {
        ConfigValue::Null => Arg::Null,
        ConfigValue::Bool(b) => Arg::Bool(*b),
        ConfigValue::Integer(i) => Arg::Integer(*i),
        ConfigValue::Float(f) => Arg::Float(*f),
        ConfigValue::String(s) => Arg::String(s.clone()),
        ConfigValue::Sequence(items) => Arg::List(
            items
                .iter()
                .map(|item| resolve_value(definition, item, registry))
                .collect::<Result<_, _>>()?,
        ),
        ConfigValue::Mapping(map) => Arg::Map(resolve_map(definition, map, registry)?),
    })
}
