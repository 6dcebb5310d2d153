use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::error::ConfigError;
use crate::config::value::{ConfigMap, ConfigValue};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    /// Parse a document into the format-independent tree.
    pub fn parse(&self, data: &str, path: &Path) -> Result<ConfigValue, ConfigError> {
        let json: serde_json::Value = match self {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| self.deser_error(path, e))?,
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| self.deser_error(path, e))?,
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| self.deser_error(path, e))?,
        };
        Ok(ConfigValue::from(json))
    }

    fn deser_error<E>(&self, path: &Path, source: E) -> ConfigError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ConfigError::Deserialization {
            format: self.extension().to_string(),
            path: path.to_path_buf(),
            source: Box::new(source),
        }
    }
}

/// One input to the module merge.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// A tree supplied by the embedding program (built-in defaults).
    Embedded { name: String, tree: ConfigValue },
    /// A configuration file on disk.
    File(PathBuf),
}

impl ModuleSource {
    pub fn embedded(name: impl Into<String>, tree: ConfigValue) -> Self {
        ModuleSource::Embedded { name: name.into(), tree }
    }

    pub fn name(&self) -> String {
        match self {
            ModuleSource::Embedded { name, .. } => name.clone(),
            ModuleSource::File(path) => path.display().to_string(),
        }
    }

    fn read(&self) -> Result<ConfigMap, ConfigError> {
        let tree = match self {
            ModuleSource::Embedded { tree, .. } => tree.clone(),
            ModuleSource::File(path) => read_file(path)?,
        };
        match tree {
            ConfigValue::Mapping(map) => Ok(map),
            // An empty YAML document parses as null.
            ConfigValue::Null => Ok(ConfigMap::new()),
            other => Err(ConfigError::NotAMapping {
                source_name: self.name(),
                found: other.kind(),
            }),
        }
    }
}

fn read_file(path: &Path) -> Result<ConfigValue, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::io(e, "read_to_string", path.to_path_buf()))?;
    format.parse(&content, path)
}

/// List the configuration files of an override directory, sorted by file name.
pub fn override_sources(dir: &Path) -> Result<Vec<ModuleSource>, ConfigError> {
    if !dir.is_dir() {
        warn!("Override directory {} does not exist, skipping", dir.display());
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| ConfigError::io(e, "read_dir", dir.to_path_buf()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ConfigError::io(e, "read_dir_entry", dir.to_path_buf()))?
            .path();
        if path.is_file() && ConfigFormat::from_path(&path).is_some() {
            files.push(path);
        } else {
            debug!("Ignoring non-configuration entry {}", path.display());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files.into_iter().map(ModuleSource::File).collect())
}

/// Ordered list of module sources, merged front to back.
#[derive(Debug, Clone, Default)]
pub struct ModuleLoader {
    sources: Vec<ModuleSource>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    pub fn with_source(mut self, source: ModuleSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn push(&mut self, source: ModuleSource) {
        self.sources.push(source);
    }

    /// Append the primary file and then the override directory's files.
    pub fn with_locations(mut self, primary: &Path, override_dir: Option<&Path>) -> Result<Self, ConfigError> {
        self.sources.push(ModuleSource::File(primary.to_path_buf()));
        if let Some(dir) = override_dir {
            self.sources.extend(override_sources(dir)?);
        }
        Ok(self)
    }

    pub fn sources(&self) -> &[ModuleSource] {
        &self.sources
    }

    /// Read every source and deep-merge them; later sources win.
    pub fn load(&self) -> Result<ConfigMap, ConfigError> {
        let mut merged = ConfigMap::new();
        for source in &self.sources {
            let tree = source.read()?;
            info!("Merging module source {} ({} top-level entries)", source.name(), tree.len());
            merged.merge(&tree);
        }
        Ok(merged)
    }
}
