use std::fmt;

use serde_json::Value as JsonValue;

/// Key marking a mapping as a reference to another service.
pub const REFERENCE_KEY: &str = "$ref";

/// Format-independent configuration tree.
///
/// Every supported file format is converted into this shape before merging,
/// so the merge rule is defined once, structurally.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<ConfigValue>),
    Mapping(ConfigMap),
}

/// Insertion-ordered string-keyed mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigValue> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace a value. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Deep-merge `other` into `self`.
    ///
    /// Keys present in both are merged recursively when both sides are
    /// mappings; otherwise the value from `other` wins outright. New keys are
    /// appended in the order `other` declares them.
    pub fn merge(&mut self, other: &ConfigMap) {
        for (key, incoming) in other.iter() {
            match (self.get_mut(key), incoming) {
                (Some(ConfigValue::Mapping(existing)), ConfigValue::Mapping(incoming)) => {
                    existing.merge(incoming);
                }
                (Some(slot), _) => *slot = incoming.clone(),
                (None, _) => self.entries.push((key.to_string(), incoming.clone())),
            }
        }
    }
}

impl FromIterator<(String, ConfigValue)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        let mut map = ConfigMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl ConfigValue {
    /// Build a `{"$ref": name}` reference expression.
    pub fn reference(name: impl Into<String>) -> Self {
        let mut map = ConfigMap::new();
        map.insert(REFERENCE_KEY, ConfigValue::String(name.into()));
        ConfigValue::Mapping(map)
    }

    /// The referenced service name, if this value is a reference expression.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            ConfigValue::Mapping(map) if map.len() == 1 => match map.get(REFERENCE_KEY) {
                Some(ConfigValue::String(name)) => Some(name.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::String(_) => "string",
            ConfigValue::Sequence(_) => "sequence",
            ConfigValue::Mapping(_) => "mapping",
        }
    }

    /// Deep-merge: mappings merge key by key, anything else is replaced.
    pub fn merge(&mut self, other: &ConfigValue) {
        match (self, other) {
            (ConfigValue::Mapping(base), ConfigValue::Mapping(incoming)) => base.merge(incoming),
            (slot, incoming) => *slot = incoming.clone(),
        }
    }

    /// Collect every reference expression nested anywhere in this value.
    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(name) = self.as_reference() {
            out.push(name);
            return;
        }
        match self {
            ConfigValue::Sequence(items) => items.iter().for_each(|v| v.collect_references(out)),
            ConfigValue::Mapping(map) => map.iter().for_each(|(_, v)| v.collect_references(out)),
            _ => {}
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            ConfigValue::Null => JsonValue::Null,
            ConfigValue::Bool(b) => JsonValue::Bool(*b),
            ConfigValue::Integer(i) => JsonValue::from(*i),
            ConfigValue::Float(f) => JsonValue::from(*f),
            ConfigValue::String(s) => JsonValue::String(s.clone()),
            ConfigValue::Sequence(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            ConfigValue::Mapping(map) => JsonValue::Object(
                map.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<JsonValue> for ConfigValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => ConfigValue::Null,
            JsonValue::Bool(b) => ConfigValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Integer(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => ConfigValue::String(s),
            JsonValue::Array(items) => ConfigValue::Sequence(items.into_iter().map(Into::into).collect()),
            JsonValue::Object(map) => ConfigValue::Mapping(
                map.into_iter().map(|(k, v)| (k, ConfigValue::from(v))).collect(),
            ),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
