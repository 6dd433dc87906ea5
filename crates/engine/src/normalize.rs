//! Reconciles evaluator output with the property schema.

use indexmap::{IndexMap, IndexSet};
use mcp_hub_types::{ArgValue, EvaluatedValue, PropertySchema, RunDescriptor, TransportType};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ResolveError;
use crate::evaluator::EvalError;

/// Top-level keys with launch semantics.
const RECOGNIZED_KEYS: [&str; 4] = ["command", "args", "env", "type"];

static ENV_KEY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("env key regex should compile"));

/// The command function references properties that the schema does not declare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command function references properties missing from configSchema: {}", .properties.iter().cloned().collect::<Vec<_>>().join(", "))]
pub struct SchemaMismatchError {
    pub properties: IndexSet<String>,
    /// The rejected descriptor, with `unresolved_required` filled in.
    pub descriptor: Box<RunDescriptor>,
}

/// Builds the canonical [`RunDescriptor`] from an evaluated command function.
///
/// `transport` is the `type` declared next to the schema; it is carried through
/// unchanged. Referential integrity between the function and the schema is checked
/// here; whether values exist at runtime is checked at launch.
pub fn normalize(evaluated: &EvaluatedValue, schema: &PropertySchema, transport: TransportType) -> Result<RunDescriptor, ResolveError> {
    let Some(body) = evaluated.as_map() else {
        return Err(shape("<body>", "an object", evaluated).into());
    };

    let command = match body.get("command") {
        Some(EvaluatedValue::Literal(command)) if !command.trim().is_empty() => command.clone(),
        Some(EvaluatedValue::Literal(_)) => {
            return Err(EvalError::Shape {
                key: "command".to_string(),
                expected: "a literal string",
                found: "an empty string".to_string(),
            }
            .into());
        }
        Some(other) => return Err(shape("command", "a literal string", other).into()),
        None => {
            return Err(EvalError::Shape {
                key: "command".to_string(),
                expected: "a literal string",
                found: "nothing".to_string(),
            }
            .into());
        }
    };

    let mut descriptor = RunDescriptor::new(command, transport);
    descriptor.args = normalize_args(body.get("args"))?;
    descriptor.env = normalize_env(body.get("env"))?;
    check_transport(body.get("type"), &descriptor.transport_type)?;

    for (key, value) in body {
        if !RECOGNIZED_KEYS.contains(&key.as_str()) {
            warn!(key = %key, "command function returns an unrecognized key; preserving it without interpretation");
            descriptor.extensions.insert(key.clone(), value.clone());
        }
    }

    let missing: IndexSet<String> = descriptor
        .referenced_properties()
        .into_iter()
        .filter(|property| !schema.contains(property))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        descriptor.unresolved_required = missing.clone();
        return Err(SchemaMismatchError {
            properties: missing,
            descriptor: Box::new(descriptor),
        }
        .into());
    }

    let defaults: IndexMap<String, String> = descriptor
        .referenced_properties()
        .into_iter()
        .filter_map(|name| schema.get(name))
        .filter(|property| !property.secret)
        .filter_map(|property| property.default.clone().map(|default| (property.name.clone(), default)))
        .collect();
    descriptor.defaults = defaults;

    debug!(
        command = %descriptor.command,
        args = descriptor.args.len(),
        env = descriptor.env.len(),
        "normalized run descriptor"
    );
    Ok(descriptor)
}

fn normalize_args(value: Option<&EvaluatedValue>) -> Result<Vec<ArgValue>, EvalError> {
    match value {
        None => Ok(Vec::new()),
        Some(EvaluatedValue::List(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| to_arg_value(&format!("args[{index}]"), item))
            .collect(),
        Some(other) => Err(shape("args", "a list", other)),
    }
}

fn normalize_env(value: Option<&EvaluatedValue>) -> Result<IndexMap<String, ArgValue>, EvalError> {
    let entries = match value {
        None => return Ok(IndexMap::new()),
        Some(EvaluatedValue::Map(entries)) => entries,
        Some(other) => return Err(shape("env", "an object", other)),
    };

    let mut env = IndexMap::with_capacity(entries.len());
    for (name, value) in entries {
        if name.is_empty() || name.contains('=') {
            return Err(EvalError::Shape {
                key: format!("env.{name}"),
                expected: "a valid environment variable name",
                found: format!("'{name}'"),
            });
        }
        if !ENV_KEY_REGEX.is_match(name) {
            debug!(name = %name, "environment variable name is not in conventional upper snake case");
        }
        env.insert(name.clone(), to_arg_value(&format!("env.{name}"), value)?);
    }
    Ok(env)
}

fn to_arg_value(key: &str, value: &EvaluatedValue) -> Result<ArgValue, EvalError> {
    match value {
        EvaluatedValue::Literal(text) => Ok(ArgValue::Literal(text.clone())),
        EvaluatedValue::Reference(property) => Ok(ArgValue::Reference(property.clone())),
        other => Err(shape(key, "a literal or a property reference", other)),
    }
}

/// A `type` key in the function body must be literal; the schema's declaration wins on disagreement.
fn check_transport(value: Option<&EvaluatedValue>, declared: &TransportType) -> Result<(), EvalError> {
    match value {
        None => Ok(()),
        Some(EvaluatedValue::Literal(tag)) => {
            if tag.parse::<TransportType>().ok().as_ref() != Some(declared) {
                warn!(function_type = %tag, declared = %declared, "command function type disagrees with the declared transport");
            }
            Ok(())
        }
        Some(other) => Err(shape("type", "a literal string", other)),
    }
}

fn shape(key: &str, expected: &'static str, found: &EvaluatedValue) -> EvalError {
    EvalError::Shape {
        key: key.to_string(),
        expected,
        found: found.kind().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{evaluate, parse};
    use mcp_hub_types::{Property, PropertyType};

    fn evaluated(source: &str) -> EvaluatedValue {
        let function = parse(source).expect("source parses");
        evaluate(&function, &function.param).expect("source evaluates")
    }

    fn schema(properties: Vec<Property>) -> PropertySchema {
        PropertySchema::new(properties).expect("valid schema")
    }

    #[test]
    fn rejects_config_derived_command() {
        let error = normalize(&evaluated("c => ({command: c.binary})"), &PropertySchema::default(), TransportType::Stdio).unwrap_err();
        assert!(matches!(
            error,
            ResolveError::Eval(EvalError::Shape { ref key, .. }) if key == "command"
        ));
    }

    #[test]
    fn rejects_missing_or_empty_command() {
        let empty = PropertySchema::default();
        assert!(normalize(&evaluated("c => ({args: []})"), &empty, TransportType::Stdio).is_err());
        assert!(normalize(&evaluated("c => ({command: '  '})"), &empty, TransportType::Stdio).is_err());
    }

    #[test]
    fn rejects_structured_args_and_env_values() {
        let empty = PropertySchema::default();
        let error = normalize(&evaluated("c => ({command: 'x', args: ['a', ['b']]})"), &empty, TransportType::Stdio).unwrap_err();
        assert_eq!(error.to_string(), "'args[1]' must be a literal or a property reference, found list");

        let error = normalize(&evaluated("c => ({command: 'x', env: ['A']})"), &empty, TransportType::Stdio).unwrap_err();
        assert!(error.to_string().starts_with("'env' must be an object"));
    }

    #[test]
    fn defaults_args_and_env_to_empty() {
        let descriptor = normalize(&evaluated("c => ({command: 'uvx'})"), &PropertySchema::default(), TransportType::Stdio).unwrap();
        assert!(descriptor.args.is_empty());
        assert!(descriptor.env.is_empty());
    }

    #[test]
    fn records_defaults_of_non_secret_references_only() {
        let schema = schema(vec![
            Property::new("port", PropertyType::Integer).with_default("8080"),
            Property::new("token", PropertyType::String).secret(true).with_default("dev-token"),
            Property::new("unused", PropertyType::String).with_default("x"),
        ]);
        let descriptor = normalize(
            &evaluated("c => ({command: 'srv', args: ['--port', c.port], env: {TOKEN: c.token}})"),
            &schema,
            TransportType::Stdio,
        )
        .unwrap();
        assert_eq!(descriptor.defaults, IndexMap::from([("port".to_string(), "8080".to_string())]));
    }

    #[test]
    fn collects_every_missing_property() {
        let error = normalize(
            &evaluated("c => ({command: 'x', args: [c.b], env: {A: c.a, B: c.b, K: c.known}})"),
            &schema(vec![Property::new("known", PropertyType::String)]),
            TransportType::Stdio,
        )
        .unwrap_err();
        let ResolveError::SchemaMismatch(mismatch) = &error else {
            panic!("expected a schema mismatch, got {error:?}");
        };
        assert_eq!(mismatch.properties.iter().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(mismatch.to_string(), "command function references properties missing from configSchema: b, a");
        assert_eq!(mismatch.descriptor.unresolved_required, mismatch.properties);
        assert_eq!(mismatch.descriptor.env.len(), 3);
    }

    #[test]
    fn preserves_unrecognized_keys_and_tolerates_type_key() {
        let descriptor = normalize(
            &evaluated("c => ({command: 'x', type: 'stdio', cwd: '/srv'})"),
            &PropertySchema::default(),
            TransportType::Stdio,
        )
        .unwrap();
        assert_eq!(descriptor.extensions.keys().collect::<Vec<_>>(), vec!["cwd"]);
        assert_eq!(descriptor.transport_type, TransportType::Stdio);

        let error = normalize(&evaluated("c => ({command: 'x', type: c.mode})"), &PropertySchema::default(), TransportType::Stdio);
        assert!(error.is_err());
    }

    #[test]
    fn rejects_invalid_environment_names() {
        let error = normalize(&evaluated("c => ({command: 'x', env: {'A=B': 'v'}})"), &PropertySchema::default(), TransportType::Stdio).unwrap_err();
        assert!(error.to_string().contains("valid environment variable name"));
    }
}
