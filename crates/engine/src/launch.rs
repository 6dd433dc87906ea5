//! Late binding of property references to concrete values.
//!
//! This is the only place where configuration values meet a [`RunDescriptor`].
//! Values of secret properties are carried in [`ResolvedValue`]s that redact
//! themselves when displayed.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use mcp_hub_types::{ArgValue, PropertySchema, RunDescriptor, reference_token};
use thiserror::Error;
use tracing::debug;

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    #[error("missing values for required properties: {}", .properties.iter().cloned().collect::<Vec<_>>().join(", "))]
    MissingRequired { properties: IndexSet<String> },

    #[error("descriptor references property '{property}' that the schema does not declare")]
    UnknownProperty { property: String },
}

/// A launch value. `Display` hides it when it came from a secret property.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    pub secret: bool,
    /// Property the value was looked up for; `None` for literals.
    pub property: Option<String>,
}

impl ResolvedValue {
    fn public(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
            property: None,
        }
    }

    /// Text safe to persist in a build recipe: secrets stay `$name` placeholders.
    pub fn recipe_token(&self) -> String {
        match (&self.property, self.secret) {
            (Some(property), true) => reference_token(property),
            (None, true) => REDACTED.to_string(),
            (_, false) => self.value.clone(),
        }
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secret { f.write_str(REDACTED) } else { f.write_str(&self.value) }
    }
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedValue")
            .field("value", &self.to_string())
            .field("secret", &self.secret)
            .field("property", &self.property)
            .finish()
    }
}

/// A descriptor with every reference replaced by a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    /// Command followed by its arguments.
    pub command_line: Vec<ResolvedValue>,
    pub env: IndexMap<String, ResolvedValue>,
}

impl ResolvedCommand {
    pub fn argv(&self) -> Vec<String> {
        self.command_line.iter().map(|value| value.value.clone()).collect()
    }

    /// Command line with secret values redacted, safe for logs and terminals.
    pub fn display_command_line(&self) -> Vec<String> {
        self.command_line.iter().map(ToString::to_string).collect()
    }

    /// Command line for a build recipe. Public values are substituted; secrets keep their
    /// `$name` placeholder and are resolved when the image is launched.
    pub fn recipe_command_line(&self) -> Vec<String> {
        self.command_line.iter().map(ResolvedValue::recipe_token).collect()
    }

    pub fn has_secrets(&self) -> bool {
        self.command_line.iter().chain(self.env.values()).any(|value| value.secret)
    }
}

/// Resolves every reference in `descriptor` through `lookup`, falling back to schema defaults.
///
/// Required properties with neither a value nor a default are collected and reported
/// together. Optional properties without either resolve to an empty string.
pub fn substitute(
    descriptor: &RunDescriptor,
    schema: &PropertySchema,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedCommand, LaunchError> {
    let mut values: IndexMap<&str, ResolvedValue> = IndexMap::new();
    let mut missing = IndexSet::new();

    for name in descriptor.referenced_properties() {
        let property = schema.get(name).ok_or_else(|| LaunchError::UnknownProperty {
            property: name.to_string(),
        })?;
        let value = match lookup(name).or_else(|| property.default.clone()) {
            Some(value) => value,
            None if property.required => {
                missing.insert(name.to_string());
                continue;
            }
            None => {
                debug!(property = %name, "optional property has no value; substituting an empty string");
                String::new()
            }
        };
        values.insert(
            name,
            ResolvedValue {
                value,
                secret: property.secret,
                property: Some(name.to_string()),
            },
        );
    }

    if !missing.is_empty() {
        return Err(LaunchError::MissingRequired { properties: missing });
    }

    let resolve = |arg: &ArgValue| match arg {
        ArgValue::Literal(text) => ResolvedValue::public(text.clone()),
        ArgValue::Reference(name) => values[name.as_str()].clone(),
    };
    let mut command_line = Vec::with_capacity(descriptor.args.len() + 1);
    command_line.push(ResolvedValue::public(descriptor.command.clone()));
    command_line.extend(descriptor.args.iter().map(resolve));
    let env = descriptor.env.iter().map(|(name, arg)| (name.clone(), resolve(arg))).collect();

    Ok(ResolvedCommand { command_line, env })
}

/// Reads a property value from the process environment. Empty values count as unset.
pub fn environment_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve_command;
    use mcp_hub_types::{Property, PropertyType, TransportType};

    fn schema() -> PropertySchema {
        PropertySchema::new([
            Property::new("apiKey", PropertyType::String).required(true).secret(true),
            Property::new("port", PropertyType::Integer).with_default("8080"),
            Property::new("region", PropertyType::String),
        ])
        .unwrap()
    }

    fn descriptor() -> RunDescriptor {
        resolve_command(
            "config => ({command: 'srv', args: ['--port', config.port, config.region], env: {API_KEY: config.apiKey}})",
            &schema(),
            TransportType::Stdio,
        )
        .unwrap()
    }

    #[test]
    fn substitutes_values_defaults_and_empty_optionals() {
        let resolved = substitute(&descriptor(), &schema(), |name| (name == "apiKey").then(|| "s3cr3t".to_string())).unwrap();
        assert_eq!(resolved.argv(), vec!["srv", "--port", "8080", ""]);
        assert_eq!(resolved.env["API_KEY"].value, "s3cr3t");
        assert!(resolved.env["API_KEY"].secret);
    }

    #[test]
    fn redacts_secret_values_when_displayed() {
        let resolved = substitute(&descriptor(), &schema(), |name| Some(format!("{name}-value"))).unwrap();
        assert_eq!(resolved.env["API_KEY"].to_string(), "<redacted>");
        assert!(!format!("{resolved:?}").contains("apiKey-value"));
        assert_eq!(resolved.display_command_line(), vec!["srv", "--port", "port-value", "region-value"]);
    }

    #[test]
    fn recipe_command_line_keeps_secret_placeholders() {
        let descriptor = resolve_command(
            "c => ({command: 'srv', args: ['--key', c.apiKey, '--port', c.port]})",
            &schema(),
            TransportType::Stdio,
        )
        .unwrap();
        let resolved = substitute(&descriptor, &schema(), |name| (name == "apiKey").then(|| "TOPSECRET".to_string())).unwrap();

        assert!(resolved.has_secrets());
        assert_eq!(resolved.recipe_command_line(), vec!["srv", "--key", "$apiKey", "--port", "8080"]);
        assert_eq!(resolved.display_command_line(), vec!["srv", "--key", "<redacted>", "--port", "8080"]);
        assert_eq!(resolved.argv()[2], "TOPSECRET");
    }

    #[test]
    fn reports_every_missing_required_property() {
        let schema = PropertySchema::new([
            Property::new("a", PropertyType::String).required(true),
            Property::new("b", PropertyType::String).required(true),
        ])
        .unwrap();
        let descriptor = resolve_command("c => ({command: 'x', args: [c.b, c.a]})", &schema, TransportType::Stdio).unwrap();
        let error = substitute(&descriptor, &schema, |_| None).unwrap_err();
        assert_eq!(error.to_string(), "missing values for required properties: b, a");
    }

    #[test]
    fn rejects_references_outside_the_schema() {
        let error = substitute(&descriptor(), &PropertySchema::default(), |_| None).unwrap_err();
        assert!(matches!(error, LaunchError::UnknownProperty { ref property } if property == "port"));
    }

    #[test]
    fn environment_lookup_ignores_empty_values() {
        temp_env::with_vars([("MCP_HUB_TEST_SET", Some("value")), ("MCP_HUB_TEST_EMPTY", Some(""))], || {
            assert_eq!(environment_lookup("MCP_HUB_TEST_SET").as_deref(), Some("value"));
            assert_eq!(environment_lookup("MCP_HUB_TEST_EMPTY"), None);
            assert_eq!(environment_lookup("MCP_HUB_TEST_UNSET_VARIABLE"), None);
        });
    }
}
