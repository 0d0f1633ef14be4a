//! Pipeline definition - the YAML document form of a [`Pipeline`].

use super::{ConnectionDescriptor, ModuleDescriptor, Pipeline};
use crate::error::{KilnError, Result};
use crate::types::{ConnectionId, ModuleId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default maximum size of a definition document (10 MiB).
pub const MAX_DEFINITION_BYTES: usize = 10 * 1024 * 1024;

/// Size limits applied before and after parsing.
#[derive(Debug, Clone)]
pub struct DefinitionLimits {
    /// Maximum document size in bytes.
    pub max_bytes: usize,
    /// Maximum number of modules.
    pub max_modules: usize,
    /// Maximum number of connections.
    pub max_connections: usize,
}

impl Default for DefinitionLimits {
    fn default() -> Self {
        Self {
            max_bytes: MAX_DEFINITION_BYTES,
            max_modules: 10_000,
            max_connections: 50_000,
        }
    }
}

/// A complete pipeline definition from YAML.
///
/// # Example
///
/// ```yaml
/// name: add_one
/// modules:
///   - id: 1
///     package: kiln.basic
///     name: IntegerSource
///     functions:
///       - name: value
///         params: [1]
///   - id: 2
///     package: kiln.basic
///     name: Add
///     functions:
///       - name: b
///         params: [1]
/// connections:
///   - from: 1.value
///     to: 2.a
/// sinks: [2]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Pipeline name (required).
    pub name: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Modules with their local ids.
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,

    /// Connections in `module.port` notation.
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,

    /// Sinks to update. Defaults to every module without outgoing connections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sinks: Option<Vec<u32>>,
}

/// One module entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDefinition {
    /// Local id.
    pub id: u32,
    /// Key and functions.
    #[serde(flatten)]
    pub descriptor: ModuleDescriptor,
}

/// One connection entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDefinition {
    /// Local id. Allocated in document order when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Source in `module.port` notation.
    pub from: String,
    /// Destination in `module.port` notation.
    pub to: String,
}

/// A definition turned into a pipeline.
#[derive(Debug, Clone)]
pub struct LoadedPipeline {
    /// Pipeline name.
    pub name: String,
    /// The pipeline.
    pub pipeline: Pipeline,
    /// Explicit sinks, if the document lists any.
    pub sinks: Option<Vec<ModuleId>>,
}

impl PipelineDefinition {
    /// Create an empty definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            modules: Vec::new(),
            connections: Vec::new(),
            sinks: None,
        }
    }

    /// Parse a definition from a YAML string with default limits.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_yaml_with_limits(yaml, &DefinitionLimits::default())
    }

    /// Parse a definition from a YAML string with custom limits.
    pub fn from_yaml_with_limits(yaml: &str, limits: &DefinitionLimits) -> Result<Self> {
        if yaml.len() > limits.max_bytes {
            return Err(KilnError::ConfigValue {
                field: "document".to_string(),
                cause: format!(
                    "size ({} bytes) exceeds maximum allowed ({} bytes)",
                    yaml.len(),
                    limits.max_bytes
                ),
            });
        }

        let definition: Self = serde_yaml::from_str(yaml).map_err(|e| KilnError::YamlParse {
            path: None,
            cause: e.to_string(),
        })?;

        if definition.modules.len() > limits.max_modules {
            return Err(KilnError::ConfigValue {
                field: "modules".to_string(),
                cause: format!("{} modules exceed the limit of {}", definition.modules.len(), limits.max_modules),
            });
        }
        if definition.connections.len() > limits.max_connections {
            return Err(KilnError::ConfigValue {
                field: "connections".to_string(),
                cause: format!(
                    "{} connections exceed the limit of {}",
                    definition.connections.len(),
                    limits.max_connections
                ),
            });
        }
        Ok(definition)
    }

    /// Parse a definition from a YAML file with default limits.
    pub fn from_file(path: &Path) -> Result<Self> {
        let limits = DefinitionLimits::default();
        let metadata = std::fs::metadata(path).map_err(|e| KilnError::Io {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        if metadata.len() > limits.max_bytes as u64 {
            return Err(KilnError::ConfigValue {
                field: "document".to_string(),
                cause: format!(
                    "file size ({} bytes) exceeds maximum allowed ({} bytes)",
                    metadata.len(),
                    limits.max_bytes
                ),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| KilnError::Io {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;

        Self::from_yaml_with_limits(&content, &limits).map_err(|e| match e {
            KilnError::YamlParse { cause, .. } => KilnError::YamlParse {
                path: Some(path.to_path_buf()),
                cause,
            },
            other => other,
        })
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| KilnError::Serialization(e.to_string()))
    }

    /// Build the definition of an existing pipeline.
    pub fn from_pipeline(name: impl Into<String>, pipeline: &Pipeline) -> Self {
        let mut definition = Self::new(name);
        definition.modules = pipeline
            .modules()
            .map(|(id, descriptor)| ModuleDefinition {
                id: id.as_u32(),
                descriptor: descriptor.clone(),
            })
            .collect();
        definition.connections = pipeline
            .connections()
            .map(|(id, c)| ConnectionDefinition {
                id: Some(id.as_u32()),
                from: format!("{}.{}", c.source.as_u32(), c.source_port),
                to: format!("{}.{}", c.destination.as_u32(), c.destination_port),
            })
            .collect();
        definition
    }

    /// Add a module.
    pub fn with_module(mut self, id: u32, descriptor: ModuleDescriptor) -> Self {
        self.modules.push(ModuleDefinition { id, descriptor });
        self
    }

    /// Add a connection.
    pub fn with_connection(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.connections.push(ConnectionDefinition {
            id: None,
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// Build the pipeline.
    ///
    /// Fails on duplicate ids, malformed endpoints, connections to unknown
    /// modules, cycles, and sinks that name no module.
    pub fn into_pipeline(&self) -> Result<LoadedPipeline> {
        let mut pipeline = Pipeline::new();
        for module in &self.modules {
            pipeline.add_module_with_id(ModuleId::new(module.id), module.descriptor.clone())?;
        }

        // Explicit ids first so that implicit ones never steal them.
        let (explicit, implicit): (Vec<_>, Vec<_>) =
            self.connections.iter().partition(|c| c.id.is_some());
        for conn in explicit.into_iter().chain(implicit) {
            let (source, source_port) = parse_endpoint("from", &conn.from)?;
            let (destination, destination_port) = parse_endpoint("to", &conn.to)?;
            let descriptor =
                ConnectionDescriptor::new(source, source_port, destination, destination_port);
            match conn.id {
                Some(id) => pipeline.connect_with_id(ConnectionId::new(id), descriptor)?,
                None => {
                    pipeline.connect(
                        descriptor.source,
                        descriptor.source_port,
                        descriptor.destination,
                        descriptor.destination_port,
                    )?;
                }
            }
        }

        let sinks = match &self.sinks {
            Some(ids) => {
                let sinks: Vec<ModuleId> = ids.iter().copied().map(ModuleId::new).collect();
                if let Some(missing) = sinks.iter().find(|id| !pipeline.contains(**id)) {
                    return Err(KilnError::ModuleNotFound {
                        module_id: *missing,
                    });
                }
                Some(sinks)
            }
            None => None,
        };

        Ok(LoadedPipeline {
            name: self.name.clone(),
            pipeline,
            sinks,
        })
    }
}

fn parse_endpoint(field: &str, text: &str) -> Result<(ModuleId, String)> {
    let malformed = |cause: &str| KilnError::ConfigValue {
        field: format!("connections.{field}"),
        cause: format!("'{text}': {cause}"),
    };
    let (module, port) = text
        .split_once('.')
        .ok_or_else(|| malformed("expected 'module.port'"))?;
    let id: u32 = module
        .trim()
        .parse()
        .map_err(|_| malformed("module id is not an integer"))?;
    let port = port.trim();
    if port.is_empty() {
        return Err(malformed("port name is empty"));
    }
    Ok((ModuleId::new(id), port.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ModuleKey;
    use std::io::Write;

    const ADD_ONE: &str = r#"
name: add_one
modules:
  - id: 1
    package: kiln.basic
    name: IntegerSource
    functions:
      - name: value
        params: [1]
  - id: 2
    package: kiln.basic
    name: Add
    functions:
      - name: b
        params: [1]
connections:
  - from: 1.value
    to: 2.a
"#;

    #[test]
    fn parse_and_build() {
        let definition = PipelineDefinition::from_yaml(ADD_ONE).unwrap();
        assert_eq!(definition.name, "add_one");
        assert_eq!(definition.modules.len(), 2);
        assert_eq!(definition.modules[0].descriptor.key.namespace, "");

        let loaded = definition.into_pipeline().unwrap();
        assert_eq!(loaded.pipeline.module_count(), 2);
        assert_eq!(loaded.pipeline.connection_count(), 1);
        assert_eq!(loaded.pipeline.sinks(), vec![ModuleId::new(2)]);
        assert!(loaded.sinks.is_none());
    }

    #[test]
    fn malformed_endpoint_is_config_error() {
        let definition = PipelineDefinition::new("bad")
            .with_module(1, ModuleDescriptor::new(ModuleKey::new("p", "m")))
            .with_connection("1", "1.x");
        let err = definition.into_pipeline().unwrap_err();
        assert_eq!(err.code(), "E802");
    }

    #[test]
    fn unknown_sink_is_rejected() {
        let mut definition = PipelineDefinition::from_yaml(ADD_ONE).unwrap();
        definition.sinks = Some(vec![7]);
        let err = definition.into_pipeline().unwrap_err();
        assert_eq!(err.code(), "E102");
    }

    #[test]
    fn non_finite_params_are_parse_errors() {
        for literal in [".inf", "-.inf", ".nan"] {
            let yaml = ADD_ONE.replace("params: [1]\n  - id: 2", &format!("params: [{literal}]\n  - id: 2"));
            assert!(yaml.contains(literal));
            let err = PipelineDefinition::from_yaml(&yaml).unwrap_err();
            assert_eq!(err.code(), "E801", "{literal}");
        }
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let err = PipelineDefinition::from_yaml("name: [unterminated").unwrap_err();
        assert_eq!(err.code(), "E801");
    }

    #[test]
    fn size_limit_is_enforced() {
        let limits = DefinitionLimits {
            max_bytes: 8,
            ..DefinitionLimits::default()
        };
        let err = PipelineDefinition::from_yaml_with_limits(ADD_ONE, &limits).unwrap_err();
        assert_eq!(err.code(), "E802");
    }

    #[test]
    fn yaml_round_trip_through_pipeline() {
        let loaded = PipelineDefinition::from_yaml(ADD_ONE)
            .unwrap()
            .into_pipeline()
            .unwrap();
        let yaml = PipelineDefinition::from_pipeline("copy", &loaded.pipeline)
            .to_yaml()
            .unwrap();
        let again = PipelineDefinition::from_yaml(&yaml)
            .unwrap()
            .into_pipeline()
            .unwrap();
        assert_eq!(again.pipeline.module_count(), 2);
        assert_eq!(
            again.pipeline.module(ModuleId::new(2)),
            loaded.pipeline.module(ModuleId::new(2))
        );
    }

    #[test]
    fn from_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"modules: [").unwrap();
        let err = PipelineDefinition::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));

        let missing = PipelineDefinition::from_file(Path::new("/nonexistent/kiln.yaml"));
        assert_eq!(missing.unwrap_err().code(), "E901");
    }
}
