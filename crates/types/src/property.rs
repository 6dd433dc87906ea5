//! Property schema model.
//!
//! A [`PropertySchema`] is the typed view of a descriptor's `configSchema`
//! section. It is built once, validated on construction and read-only afterwards.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Value type of a configurable property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    String,
    Integer,
    /// Any finite decimal (`number` in JSON Schema).
    Number,
    Boolean,
    /// A string restricted to a fixed set of values.
    Enum(Vec<String>),
}

impl PropertyType {
    /// Maps a JSON-Schema `type` keyword (plus its optional `enum` list) onto a property type.
    pub fn from_json_schema(property: &str, type_name: &str, enum_values: &[String]) -> Result<Self, SchemaError> {
        match type_name {
            "string" if !enum_values.is_empty() => Ok(PropertyType::Enum(enum_values.to_vec())),
            "string" => Ok(PropertyType::String),
            "integer" => Ok(PropertyType::Integer),
            "number" => Ok(PropertyType::Number),
            "boolean" => Ok(PropertyType::Boolean),
            other => Err(SchemaError::UnsupportedType {
                property: property.to_string(),
                type_name: other.to_string(),
            }),
        }
    }

    /// JSON-Schema keyword for this type; enum values are reported separately.
    pub fn keyword(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Integer => "integer",
            PropertyType::Number => "number",
            PropertyType::Boolean => "boolean",
            PropertyType::Enum(_) => "enum",
        }
    }

    /// Allowed values for enum properties, empty otherwise.
    pub fn enum_values(&self) -> &[String] {
        match self {
            PropertyType::Enum(values) => values,
            _ => &[],
        }
    }

    /// Returns true when `literal` is a valid rendering of a value of this type.
    pub fn accepts(&self, literal: &str) -> bool {
        match self {
            PropertyType::String => true,
            PropertyType::Integer => literal.parse::<i64>().is_ok(),
            PropertyType::Number => literal.parse::<f64>().is_ok_and(f64::is_finite),
            PropertyType::Boolean => matches!(literal, "true" | "false"),
            PropertyType::Enum(values) => values.iter().any(|value| value == literal),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Enum(values) => write!(f, "enum({})", values.join("|")),
            other => write!(f, "{}", other.keyword()),
        }
    }
}

impl Serialize for PropertyType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.keyword())
    }
}

/// One configurable input of a service descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub required: bool,
    pub secret: bool,
    /// Default literal, rendered as a string and checked against `property_type`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Property {
    /// Creates an optional, non-secret property without a default.
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            required: false,
            secret: false,
            default: None,
            description: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn secret(mut self, secret: bool) -> Self {
        self.secret = secret;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks the per-property invariants.
    fn validate(&self) -> Result<(), SchemaError> {
        let Some(default) = &self.default else {
            return Ok(());
        };
        if self.required {
            return Err(SchemaError::RequiredWithDefault { property: self.name.clone() });
        }
        if !self.property_type.accepts(default) {
            return Err(SchemaError::DefaultTypeMismatch {
                property: self.name.clone(),
                expected: self.property_type.to_string(),
                default: default.clone(),
            });
        }
        Ok(())
    }
}

/// Ordered, name-indexed set of properties belonging to a single descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PropertySchema {
    properties: IndexMap<String, Property>,
}

impl PropertySchema {
    /// Builds a schema, rejecting duplicate names and properties that break their invariants.
    pub fn new(properties: impl IntoIterator<Item = Property>) -> Result<Self, SchemaError> {
        let mut indexed = IndexMap::new();
        for property in properties {
            property.validate()?;
            if indexed.contains_key(&property.name) {
                return Err(SchemaError::DuplicateProperty { property: property.name });
            }
            indexed.insert(property.name.clone(), property);
        }
        Ok(Self { properties: indexed })
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Names of the properties flagged as secret.
    pub fn secret_names(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|property| property.secret).map(|property| property.name.as_str())
    }
}

/// Errors raised while constructing a [`PropertySchema`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("property '{property}' has unsupported type '{type_name}'")]
    UnsupportedType { property: String, type_name: String },

    #[error("property '{property}' is required and must not declare a default")]
    RequiredWithDefault { property: String },

    #[error("default '{default}' of property '{property}' is not a valid {expected}")]
    DefaultTypeMismatch { property: String, expected: String, default: String },

    #[error("property '{property}' is declared more than once")]
    DuplicateProperty { property: String },

    #[error("required property '{property}' is not declared under 'properties'")]
    UndeclaredRequired { property: String },
}
