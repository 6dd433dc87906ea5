//! Smithery `smithery.yaml` model.
//!
//! Only the `startCommand` section matters here; other top-level sections
//! (`build`, `runtime`, ...) are accepted and ignored.

use std::{fs, path::Path};

use indexmap::IndexMap;
use mcp_hub_types::{Property, PropertySchema, PropertyType, SchemaError, TransportType};
use serde::Deserialize;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmitheryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid Smithery YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("property '{property}' has a default that is not a scalar")]
    NonScalarDefault { property: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmitheryConfig {
    pub start_command: StartCommand,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCommand {
    /// Transport tag; `stdio` when absent.
    #[serde(rename = "type", default)]
    pub transport: String,
    #[serde(default)]
    pub config_schema: ConfigSchema,
    pub command_function: String,
}

/// JSON-Schema object describing the server's configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigSchema {
    #[serde(rename = "type", default)]
    pub schema_type: Option<String>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: IndexMap<String, SchemaProperty>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaProperty {
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(rename = "enum", default)]
    pub enum_values: Vec<String>,
    /// Non-standard marker some hub entries use instead of listing the name under `secrets`.
    #[serde(default)]
    pub secret: bool,
}

impl SmitheryConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, SmitheryError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, SmitheryError> {
        let content = fs::read_to_string(path).map_err(|source| SmitheryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
}

impl StartCommand {
    pub fn transport_type(&self) -> TransportType {
        self.transport.parse().unwrap_or_default()
    }
}

impl ConfigSchema {
    /// Builds the typed schema. A property is secret when its name is in `secrets` or
    /// it carries `secret: true`.
    pub fn to_property_schema(&self, secrets: &[&str]) -> Result<PropertySchema, SmitheryError> {
        if let Some(undeclared) = self.required.iter().find(|name| !self.properties.contains_key(*name)) {
            return Err(SchemaError::UndeclaredRequired {
                property: undeclared.clone(),
            }
            .into());
        }

        let mut properties = Vec::with_capacity(self.properties.len());
        for (name, definition) in &self.properties {
            let type_name = definition.type_name.as_deref().unwrap_or("string");
            let property_type = PropertyType::from_json_schema(name, type_name, &definition.enum_values)?;
            let secret = definition.secret || secrets.contains(&name.as_str());

            let mut property = Property::new(name.clone(), property_type)
                .required(self.required.contains(name))
                .secret(secret);
            if let Some(default) = &definition.default {
                property = property.with_default(scalar_to_string(name, default)?);
            }
            if let Some(description) = &definition.description {
                property = property.with_description(description.clone());
            }
            properties.push(property);
        }
        Ok(PropertySchema::new(properties)?)
    }
}

fn scalar_to_string(property: &str, value: &Value) -> Result<String, SmitheryError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(SmitheryError::NonScalarDefault {
            property: property.to_string(),
        }),
    }
}
