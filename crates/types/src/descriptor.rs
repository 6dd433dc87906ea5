//! The canonical run descriptor.

use indexmap::{IndexMap, IndexSet};
use serde::{Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::{EvaluatedValue, reference_token};

/// A single launch argument or environment value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgValue {
    Literal(String),
    /// Deferred to launch time; names a property of the descriptor's schema.
    Reference(String),
}

impl ArgValue {
    /// Property name when this value is a reference.
    pub fn reference(&self) -> Option<&str> {
        match self {
            ArgValue::Reference(property) => Some(property),
            ArgValue::Literal(_) => None,
        }
    }

    /// Renders the value for display: literals verbatim, references as `$name`.
    pub fn to_token(&self) -> String {
        match self {
            ArgValue::Literal(text) => text.clone(),
            ArgValue::Reference(property) => reference_token(property),
        }
    }
}

impl Serialize for ArgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_token())
    }
}

/// Transport tag carried through unchanged from `startCommand.type`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransportType {
    #[default]
    Stdio,
    Other(String),
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportType::Stdio => write!(f, "stdio"),
            TransportType::Other(tag) => write!(f, "{tag}"),
        }
    }
}

impl FromStr for TransportType {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim() {
            "" | "stdio" => TransportType::Stdio,
            other => TransportType::Other(other.to_string()),
        })
    }
}

impl Serialize for TransportType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Normalized launch description of one service descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDescriptor {
    pub command: String,
    /// Positional arguments, in the order they are passed to the process.
    pub args: Vec<ArgValue>,
    pub env: IndexMap<String, ArgValue>,
    #[serde(rename = "type")]
    pub transport_type: TransportType,
    /// Referenced properties missing from the schema. Always empty on a successful resolution;
    /// filled in on the descriptor carried by a schema-mismatch error.
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub unresolved_required: IndexSet<String>,
    /// Defaults of referenced, non-secret properties, for launch-time fallback.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub defaults: IndexMap<String, String>,
    /// Top-level keys of the command function that carry no launch semantics.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: IndexMap<String, EvaluatedValue>,
}

impl RunDescriptor {
    pub fn new(command: impl Into<String>, transport_type: TransportType) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: IndexMap::new(),
            transport_type,
            unresolved_required: IndexSet::new(),
            defaults: IndexMap::new(),
            extensions: IndexMap::new(),
        }
    }

    /// Every property referenced from `args` or `env`, in first-seen order.
    pub fn referenced_properties(&self) -> IndexSet<&str> {
        self.args
            .iter()
            .chain(self.env.values())
            .filter_map(ArgValue::reference)
            .collect()
    }

    /// Command followed by its arguments, references rendered as `$name` placeholders.
    pub fn placeholder_command_line(&self) -> Vec<String> {
        std::iter::once(self.command.clone())
            .chain(self.args.iter().map(ArgValue::to_token))
            .collect()
    }
}
